use crate::archive::{ExtractError, Extractor};
use crate::credentials::{ArchiveCredential, CredentialRecord, CredentialTable};
use crate::decrypt::{DecryptOutcome, Decryptor};
use crate::matcher::{MatchResult, Scope};
use crate::placement::file_ops::copy_preserving_mtime;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolutionOutcome {
    Decrypted { used_password: String },
    AlreadyPlaintext,
    Exhausted { attempted_count: usize },
    Failed { cause: String },
}

impl ResolutionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            ResolutionOutcome::Decrypted { .. } | ResolutionOutcome::AlreadyPlaintext
        )
    }

    /// Report wording. Passwords never appear in it.
    pub fn describe(&self) -> String {
        match self {
            ResolutionOutcome::Decrypted { .. } => "decrypted".to_string(),
            ResolutionOutcome::AlreadyPlaintext => "not encrypted, copied".to_string(),
            ResolutionOutcome::Exhausted { attempted_count } => {
                format!("no password worked ({} tried)", attempted_count)
            }
            ResolutionOutcome::Failed { cause } => format!("failed: {}", cause),
        }
    }
}

/// Outcome of resolving one document, with the account it was tagged to and the scratch
/// file holding the plaintext on success.
#[derive(Debug)]
pub struct Resolution<'a> {
    pub outcome: ResolutionOutcome,
    pub account: Option<&'a CredentialRecord>,
    pub artifact: Option<PathBuf>,
}

#[derive(Debug)]
pub enum ArchiveOutcome<'a> {
    Extracted {
        members: Vec<PathBuf>,
        credential: Option<&'a ArchiveCredential>,
        dir: PathBuf,
    },
    Exhausted {
        attempted_count: usize,
    },
    Failed {
        cause: String,
    },
}

struct Trial<'a> {
    password: &'a str,
    account: Option<&'a CredentialRecord>,
}

/// Runs the password trial loop for documents and archives. Never writes outside the
/// scratch directory.
pub struct PasswordResolver<'a> {
    table: &'a CredentialTable,
    scratch_dir: &'a Path,
    sweep: bool,
}

impl<'a> PasswordResolver<'a> {
    pub fn new(table: &'a CredentialTable, scratch_dir: &'a Path) -> Self {
        Self {
            table,
            scratch_dir,
            sweep: false,
        }
    }

    pub fn with_sweep(mut self, sweep: bool) -> Self {
        self.sweep = sweep;
        self
    }

    pub fn resolve(
        &self,
        file: &Path,
        candidates: &[MatchResult<'a>],
        scope: &Scope,
        decryptor: &dyn Decryptor,
    ) -> Resolution<'a> {
        let first = candidates.first().map(|m| m.candidate);
        let mut attempted: HashSet<&'a str> = HashSet::new();

        let trials = candidate_trials(candidates, &mut attempted);
        let trials = if trials.is_empty() {
            attempted.insert("");
            vec![Trial {
                password: "",
                account: first,
            }]
        } else {
            trials
        };

        if let Some(resolution) = self.run_trials(file, &trials, decryptor) {
            return resolution;
        }

        if self.sweep {
            let sweep_trials: Vec<Trial<'a>> = self
                .sweep_passwords(candidates, scope)
                .into_iter()
                .filter(|password| attempted.insert(*password))
                .map(|password| Trial {
                    password,
                    account: first,
                })
                .collect();

            if !sweep_trials.is_empty() {
                debug!(
                    file = %file.display(),
                    extra = sweep_trials.len(),
                    "sweeping platform passwords"
                );
                if let Some(resolution) = self.run_trials(file, &sweep_trials, decryptor) {
                    return resolution;
                }
            }
        }

        Resolution {
            outcome: ResolutionOutcome::Exhausted {
                attempted_count: attempted.len(),
            },
            account: first,
            artifact: None,
        }
    }

    /// `None` when every trial was rejected.
    fn run_trials(
        &self,
        file: &Path,
        trials: &[Trial<'a>],
        decryptor: &dyn Decryptor,
    ) -> Option<Resolution<'a>> {
        let suffix = file
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e))
            .unwrap_or_default();

        for trial in trials {
            let scratch = match tempfile::Builder::new()
                .prefix("trial-")
                .suffix(&suffix)
                .tempfile_in(self.scratch_dir)
            {
                Ok(scratch) => scratch,
                Err(e) => return Some(failed(trial.account, format!("scratch file: {}", e))),
            };

            let outcome = match decryptor.decrypt(file, scratch.path(), trial.password) {
                DecryptOutcome::PasswordRejected => continue,
                DecryptOutcome::Decrypted => ResolutionOutcome::Decrypted {
                    used_password: trial.password.to_string(),
                },
                DecryptOutcome::AlreadyPlaintext => {
                    if let Err(e) = copy_preserving_mtime(file, scratch.path()) {
                        return Some(failed(trial.account, e.to_string()));
                    }
                    ResolutionOutcome::AlreadyPlaintext
                }
                DecryptOutcome::Failed(cause) => {
                    warn!(file = %file.display(), error = %cause, "decryption failed");
                    return Some(failed(trial.account, cause.to_string()));
                }
            };

            return Some(match scratch.into_temp_path().keep() {
                Ok(artifact) => {
                    info!(
                        file = %file.display(),
                        account = trial.account.map(|a| a.account_token.as_str()).unwrap_or("-"),
                        outcome = %outcome.describe(),
                        "resolved"
                    );
                    Resolution {
                        outcome,
                        account: trial.account,
                        artifact: Some(artifact),
                    }
                }
                Err(e) => failed(trial.account, format!("scratch file: {}", e)),
            });
        }

        None
    }

    /// Passwords of the candidates' platforms, or of the scope when no candidate has one.
    fn sweep_passwords(&self, candidates: &[MatchResult<'a>], scope: &Scope) -> Vec<&'a str> {
        let table = self.table;

        let mut platforms: Vec<String> = Vec::new();
        for candidate in candidates {
            if let Some(ref platform) = candidate.candidate.platform {
                if !platforms.contains(platform) {
                    platforms.push(platform.clone());
                }
            }
        }

        if platforms.is_empty() {
            platforms = match scope {
                Scope::Platform(name) => vec![name.clone()],
                Scope::All => table.platforms().into_iter().map(str::to_string).collect(),
            };
        }

        platforms
            .iter()
            .flat_map(|platform| table.platform_passwords(platform))
            .map(|(password, _)| password)
            .collect()
    }

    pub fn resolve_archive(
        &self,
        archive: &Path,
        credentials: &'a [ArchiveCredential],
        extractor: &dyn Extractor,
    ) -> ArchiveOutcome<'a> {
        let mut seen: HashSet<&str> = HashSet::new();
        let trials = std::iter::once(None).chain(
            credentials
                .iter()
                .filter(|c| seen.insert(c.password.as_str()))
                .map(Some),
        );

        let mut attempted_count = 0;
        for credential in trials {
            attempted_count += 1;

            let dir = match tempfile::Builder::new()
                .prefix("archive-")
                .tempdir_in(self.scratch_dir)
            {
                Ok(dir) => dir,
                Err(e) => {
                    return ArchiveOutcome::Failed {
                        cause: format!("scratch directory: {}", e),
                    }
                }
            };

            let password = credential.map(|c| c.password.as_str());
            match extractor.extract(archive, dir.path(), password) {
                Ok(members) => {
                    info!(
                        archive = %archive.display(),
                        members = members.len(),
                        credential = credential.map(|c| c.display_name.as_str()).unwrap_or("none"),
                        "archive extracted"
                    );
                    return ArchiveOutcome::Extracted {
                        members,
                        credential,
                        dir: dir.keep(),
                    };
                }
                Err(ExtractError::PasswordRejected) => continue,
                Err(e) => {
                    warn!(archive = %archive.display(), error = %e, "archive extraction failed");
                    return ArchiveOutcome::Failed {
                        cause: e.to_string(),
                    };
                }
            }
        }

        ArchiveOutcome::Exhausted { attempted_count }
    }
}

fn candidate_trials<'a>(
    candidates: &[MatchResult<'a>],
    attempted: &mut HashSet<&'a str>,
) -> Vec<Trial<'a>> {
    let mut trials = Vec::new();
    for candidate in candidates {
        for password in &candidate.candidate.passwords {
            if attempted.insert(password.as_str()) {
                trials.push(Trial {
                    password: password.as_str(),
                    account: Some(candidate.candidate),
                });
            }
        }
    }
    trials
}

fn failed<'a>(account: Option<&'a CredentialRecord>, cause: String) -> Resolution<'a> {
    Resolution {
        outcome: ResolutionOutcome::Failed { cause },
        account,
        artifact: None,
    }
}
