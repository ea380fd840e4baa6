pub mod file_ops;

use crate::credentials::CredentialRecord;
use crate::error::Result;
use crate::policy::PolicyTable;
use file_ops::{move_file, sanitize_component};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const MAX_SEQUENCE: u32 = 99;
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Where a resolved file ended up, and where a colliding file was moved to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Placement {
    pub path: PathBuf,
    pub backed_up: Option<PathBuf>,
}

/// Names and commits decrypted files into the output directory. All placements go through
/// one lock, so numbering and backups see a consistent directory.
pub struct Placer<'a> {
    output_dir: PathBuf,
    backup_dir: PathBuf,
    run_timestamp: String,
    policy: &'a PolicyTable,
    placed: Mutex<HashSet<PathBuf>>,
}

impl<'a> Placer<'a> {
    pub fn new<O: Into<PathBuf>, B: Into<PathBuf>, T: Into<String>>(
        output_dir: O,
        backup_dir: B,
        run_timestamp: T,
        policy: &'a PolicyTable,
    ) -> Self {
        Self {
            output_dir: output_dir.into(),
            backup_dir: backup_dir.into(),
            run_timestamp: run_timestamp.into(),
            policy,
            placed: Mutex::new(HashSet::new()),
        }
    }

    pub fn run_timestamp(&self) -> &str {
        &self.run_timestamp
    }

    /// `{display_name}_{account_id}_{account_token}_{run_timestamp}`, empty parts dropped.
    pub fn canonical_stem(&self, account: &CredentialRecord) -> String {
        [
            sanitize_component(&account.display_name),
            sanitize_component(account.account_id.as_deref().unwrap_or("")),
            sanitize_component(&account.account_token),
            self.run_timestamp.clone(),
        ]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
    }

    /// Moves `artifact` into the output directory under the name derived from `account`
    /// and `source_file`, backing up whatever already sits at that path.
    pub fn place(
        &self,
        account: &CredentialRecord,
        source_file: &Path,
        artifact: &Path,
    ) -> Result<Placement> {
        let extension = source_file
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e))
            .unwrap_or_default();

        let mut placed = self.placed.lock();

        let override_prefix = account
            .platform
            .as_deref()
            .and_then(|platform| self.policy.naming_prefix(platform));

        let target = match override_prefix {
            Some(prefix) => {
                let original = source_file
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                self.output_dir.join(format!("{}{}", prefix, original))
            }
            None => self.next_free_name(&placed, account, &extension),
        };

        let backed_up = if target.exists() {
            Some(self.backup(&target)?)
        } else {
            None
        };

        move_file(artifact, &target)?;
        placed.insert(target.clone());

        info!(
            source = %source_file.display(),
            output = %target.display(),
            "placed"
        );

        Ok(Placement {
            path: target,
            backed_up,
        })
    }

    fn next_free_name(
        &self,
        placed: &HashSet<PathBuf>,
        account: &CredentialRecord,
        extension: &str,
    ) -> PathBuf {
        let stem = self.canonical_stem(account);

        for sequence in 1..=MAX_SEQUENCE {
            let candidate = self
                .output_dir
                .join(format!("{}_{:02}{}", stem, sequence, extension));
            if !placed.contains(&candidate) {
                return candidate;
            }
        }

        warn!(account = %account.account_token, "sequence exhausted, using a unique suffix");
        self.output_dir.join(format!(
            "{}_{}{}",
            stem,
            uuid::Uuid::new_v4().simple(),
            extension
        ))
    }

    /// Moves `existing` into the backup directory under a timestamped name.
    fn backup(&self, existing: &Path) -> Result<PathBuf> {
        let stem = existing
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let extension = existing
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let stamp = chrono::Local::now().format(TIMESTAMP_FORMAT).to_string();

        let mut destination = self
            .backup_dir
            .join(format!("{}_{}{}", stem, stamp, extension));
        let mut counter = 1;
        while destination.exists() {
            destination = self
                .backup_dir
                .join(format!("{}_{}_{}{}", stem, stamp, counter, extension));
            counter += 1;
        }

        move_file(existing, &destination)?;
        warn!(
            existing = %existing.display(),
            backup = %destination.display(),
            "moved colliding output to backup"
        );
        Ok(destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const TS: &str = "20240131_101500";

    fn artifact(dir: &TempDir, content: &[u8]) -> PathBuf {
        let path = tempfile::Builder::new()
            .prefix("trial-")
            .tempfile_in(dir.path())
            .unwrap()
            .into_temp_path()
            .keep()
            .unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    fn acme() -> CredentialRecord {
        CredentialRecord::new("AB12", "Acme").with_platform("shopee")
    }

    fn placer<'a>(out: &TempDir, policy: &'a PolicyTable) -> Placer<'a> {
        Placer::new(out.path(), out.path().join("backup"), TS, policy)
    }

    #[test]
    fn test_canonical_name_and_sequence() {
        let scratch = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let policy = PolicyTable::new();
        let placer = placer(&out, &policy);
        let source = Path::new("AB12_report.xlsx");

        let first = placer.place(&acme(), source, &artifact(&scratch, b"one")).unwrap();
        let second = placer.place(&acme(), source, &artifact(&scratch, b"two")).unwrap();

        assert_eq!(first.path, out.path().join(format!("Acme_AB12_{}_01.xlsx", TS)));
        assert_eq!(second.path, out.path().join(format!("Acme_AB12_{}_02.xlsx", TS)));
        assert_eq!(fs::read(&first.path).unwrap(), b"one");
        assert_eq!(fs::read(&second.path).unwrap(), b"two");
        assert!(first.backed_up.is_none());
    }

    #[test]
    fn test_name_components_are_sanitized() {
        let out = TempDir::new().unwrap();
        let policy = PolicyTable::new();
        let placer = placer(&out, &policy);

        let record = CredentialRecord::new("AB 12", "Acme Shop/TW").with_account_id("S:001");
        assert_eq!(
            placer.canonical_stem(&record),
            format!("Acme_Shop_TW_S_001_AB_12_{}", TS)
        );
    }

    #[test]
    fn test_out_of_band_file_is_backed_up_before_reuse() {
        let scratch = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let policy = PolicyTable::new();
        let placer = placer(&out, &policy);

        let leftover = out.path().join(format!("Acme_AB12_{}_01.xlsx", TS));
        fs::write(&leftover, b"leftover").unwrap();

        let placement = placer
            .place(&acme(), Path::new("AB12.xlsx"), &artifact(&scratch, b"new"))
            .unwrap();

        assert_eq!(placement.path, leftover);
        assert_eq!(fs::read(&leftover).unwrap(), b"new");
        let backup = placement.backed_up.unwrap();
        assert!(backup.starts_with(out.path().join("backup")));
        assert_eq!(fs::read(backup).unwrap(), b"leftover");
    }

    #[test]
    fn test_naming_override_backs_up_then_replaces() {
        let scratch = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let policy = PolicyTable::new().with_naming_override("reseller", "RESELLER_");
        let placer = placer(&out, &policy);
        let record = CredentialRecord::new("GH78", "Delta").with_platform("reseller");
        let source = Path::new("GH78_monthly.xlsx");

        let first = placer.place(&record, source, &artifact(&scratch, b"one")).unwrap();
        assert_eq!(first.path, out.path().join("RESELLER_GH78_monthly.xlsx"));
        assert!(first.backed_up.is_none());

        let second = placer.place(&record, source, &artifact(&scratch, b"two")).unwrap();
        assert_eq!(second.path, first.path);
        assert_eq!(fs::read(&second.path).unwrap(), b"two");
        assert_eq!(fs::read(second.backed_up.unwrap()).unwrap(), b"one");
    }

    #[test]
    fn test_unique_suffix_past_sequence_cap() {
        let scratch = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let policy = PolicyTable::new();
        let placer = placer(&out, &policy);
        let source = Path::new("AB12.xlsx");

        for _ in 0..MAX_SEQUENCE {
            placer.place(&acme(), source, &artifact(&scratch, b"x")).unwrap();
        }
        let last = placer.place(&acme(), source, &artifact(&scratch, b"y")).unwrap();

        let name = last.path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with(&format!("Acme_AB12_{}_", TS)));
        assert!(!name.ends_with("_100.xlsx"));
        assert_eq!(name.len(), format!("Acme_AB12_{}_", TS).len() + 32 + ".xlsx".len());
        assert!(last.backed_up.is_none());
    }
}
