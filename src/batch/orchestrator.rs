use crate::archive::Extractor;
use crate::batch::discovery::{InputItem, InputScanner, ItemKind};
use crate::batch::report::{ProcessingReport, ReportEntry};
use crate::config::Config;
use crate::credentials::CredentialTable;
use crate::decrypt::Decryptor;
use crate::error::Result;
use crate::matcher::{prefer_account, CandidateMatcher, Scope};
use crate::placement::{Placer, TIMESTAMP_FORMAT};
use crate::policy::PolicyTable;
use crate::resolver::{ArchiveOutcome, PasswordResolver};
use crate::ui::GracefulShutdown;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};

const CANCELLED: &str = "cancelled";
const UNMATCHED: &str = "unmatched";

/// Snapshot handed to the progress callback after each top-level input item.
#[derive(Debug, Clone)]
pub struct BatchProgress {
    pub processed: usize,
    pub total: usize,
    pub current: Option<String>,
}

pub type ProgressCallback<'p> = &'p (dyn Fn(&BatchProgress) + Sync);

/// What a run would do with one input file, without touching it.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedItem {
    pub source: PathBuf,
    pub scope: Scope,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    pub candidates: usize,
}

struct RunContext<'r> {
    scanner: InputScanner,
    matcher: CandidateMatcher<'r>,
    resolver: PasswordResolver<'r>,
    placer: Placer<'r>,
}

/// Drives discovery, archive extraction, matching, decryption and placement over the input
/// tree, collecting one report entry per processed file.
pub struct BatchRunner<'a> {
    config: &'a Config,
    table: &'a CredentialTable,
    policy: &'a PolicyTable,
    decryptor: &'a dyn Decryptor,
    extractor: &'a dyn Extractor,
    shutdown: Option<&'a GracefulShutdown>,
}

impl<'a> BatchRunner<'a> {
    pub fn new(
        config: &'a Config,
        table: &'a CredentialTable,
        policy: &'a PolicyTable,
        decryptor: &'a dyn Decryptor,
        extractor: &'a dyn Extractor,
    ) -> Self {
        Self {
            config,
            table,
            policy,
            decryptor,
            extractor,
            shutdown: None,
        }
    }

    pub fn with_shutdown(mut self, shutdown: &'a GracefulShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    fn cancelled(&self) -> bool {
        self.shutdown.map(|s| !s.is_running()).unwrap_or(false)
    }

    /// Processes every input item and saves the report under the log directory. Only a
    /// missing input root or an unusable output directory stop the run early.
    pub fn run(&self, progress: Option<ProgressCallback<'_>>) -> Result<ProcessingReport> {
        let started = Instant::now();
        let run_timestamp = chrono::Local::now().format(TIMESTAMP_FORMAT).to_string();
        let mut report = ProcessingReport::new(run_timestamp.clone());

        let scanner = InputScanner::new(&self.config.batch);
        let items = scanner.scan(&self.config.input_dir())?;
        info!(items = items.len(), run = %run_timestamp, "starting batch");

        let output_dir = self.config.output_dir();
        fs::create_dir_all(&output_dir)?;
        let scratch = tempfile::Builder::new()
            .prefix(".xlunlock-scratch-")
            .tempdir_in(&output_dir)?;

        let context = RunContext {
            scanner,
            matcher: CandidateMatcher::new(self.table, self.policy),
            resolver: PasswordResolver::new(self.table, scratch.path())
                .with_sweep(self.config.resolver.sweep_platform_passwords),
            placer: Placer::new(
                output_dir,
                self.config.backup_dir(),
                run_timestamp,
                self.policy,
            ),
        };

        let per_item = self.process_all(&context, &items, progress)?;
        drop(context);
        for entries in per_item {
            report.extend(entries);
        }

        report.cancelled = self.cancelled();
        report.duration = started.elapsed();

        let report_path = report.save(&self.config.log_dir())?;
        info!(
            report = %report_path.display(),
            succeeded = report.summary.succeeded,
            failed = report.summary.failed,
            skipped = report.summary.skipped,
            "batch finished"
        );

        if let Err(e) = scratch.close() {
            debug!(error = %e, "scratch directory cleanup failed");
        }

        Ok(report)
    }

    #[cfg(not(feature = "parallel"))]
    fn process_all(
        &self,
        context: &RunContext<'_>,
        items: &[InputItem],
        progress: Option<ProgressCallback<'_>>,
    ) -> Result<Vec<Vec<ReportEntry>>> {
        let processed = AtomicUsize::new(0);
        Ok(items
            .iter()
            .map(|item| self.process_top_level(context, item, items.len(), &processed, progress))
            .collect())
    }

    #[cfg(feature = "parallel")]
    fn process_all(
        &self,
        context: &RunContext<'_>,
        items: &[InputItem],
        progress: Option<ProgressCallback<'_>>,
    ) -> Result<Vec<Vec<ReportEntry>>> {
        use rayon::prelude::*;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.effective_workers())
            .build()
            .map_err(|e| crate::error::UnlockError::Config {
                message: format!("Failed to start worker pool: {}", e),
            })?;

        let processed = AtomicUsize::new(0);
        Ok(pool.install(|| {
            items
                .par_iter()
                .map(|item| {
                    self.process_top_level(context, item, items.len(), &processed, progress)
                })
                .collect()
        }))
    }

    fn process_top_level(
        &self,
        context: &RunContext<'_>,
        item: &InputItem,
        total: usize,
        processed: &AtomicUsize,
        progress: Option<ProgressCallback<'_>>,
    ) -> Vec<ReportEntry> {
        let entries = if self.cancelled() {
            vec![ReportEntry::skipped(&item.path, CANCELLED)]
        } else {
            self.process_item(context, item, 0, None)
        };

        let done = processed.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(callback) = progress {
            callback(&BatchProgress {
                processed: done,
                total,
                current: Some(item.filename()),
            });
        }

        entries
    }

    fn process_item(
        &self,
        context: &RunContext<'_>,
        item: &InputItem,
        depth: usize,
        preferred: Option<&str>,
    ) -> Vec<ReportEntry> {
        match item.kind {
            ItemKind::Other => {
                debug!(file = %item.path.display(), "not a document or archive");
                vec![ReportEntry::skipped(&item.path, "unsupported file type")]
            }
            ItemKind::Archive => self.process_archive(context, item, depth, preferred),
            ItemKind::Document => vec![self.process_document(context, item, preferred)],
        }
    }

    fn process_archive(
        &self,
        context: &RunContext<'_>,
        item: &InputItem,
        depth: usize,
        preferred: Option<&str>,
    ) -> Vec<ReportEntry> {
        let max_depth = self.config.batch.max_archive_depth;
        if depth >= max_depth {
            warn!(archive = %item.path.display(), max_depth, "archive nested too deeply");
            return vec![ReportEntry::failed(
                &item.path,
                format!("archive nested deeper than {} levels", max_depth),
            )];
        }

        let outcome = context.resolver.resolve_archive(
            &item.path,
            self.table.archive_credentials(),
            self.extractor,
        );

        let (members, credential, dir) = match outcome {
            ArchiveOutcome::Extracted {
                members,
                credential,
                dir,
            } => (members, credential, dir),
            ArchiveOutcome::Exhausted { attempted_count } => {
                return vec![ReportEntry::failed(
                    &item.path,
                    format!("no archive password worked ({} tried)", attempted_count),
                )];
            }
            ArchiveOutcome::Failed { cause } => {
                return vec![ReportEntry::failed(
                    &item.path,
                    format!("archive extraction failed: {}", cause),
                )];
            }
        };

        let preferred = credential
            .and_then(|c| c.account_token.as_deref())
            .or(preferred);
        let member_items = context.scanner.scan_extracted(&members, &item.scope);

        let mut entries = Vec::new();
        if member_items.is_empty() {
            entries.push(ReportEntry::skipped(&item.path, "archive contains no files"));
        }

        for member in &member_items {
            let member_entries = if self.cancelled() {
                vec![ReportEntry::skipped(&member.path, CANCELLED)]
            } else {
                self.process_item(context, member, depth + 1, preferred)
            };

            entries.extend(
                member_entries
                    .into_iter()
                    .map(|entry| relabel_member(entry, &dir, &item.path)),
            );
        }

        if let Err(e) = fs::remove_dir_all(&dir) {
            debug!(dir = %dir.display(), error = %e, "could not remove extraction directory");
        }

        entries
    }

    fn process_document(
        &self,
        context: &RunContext<'_>,
        item: &InputItem,
        preferred: Option<&str>,
    ) -> ReportEntry {
        let filename = item.filename();
        let scope = context.matcher.effective_scope(&filename, &item.scope);

        if let Some(reason) = scope
            .platform()
            .and_then(|platform| self.policy.rejection_reason(platform, &filename))
        {
            info!(file = %filename, scope = %scope, reason = %reason, "filtered out");
            return ReportEntry::skipped(&item.path, format!("filtered: {}", reason));
        }

        let mut candidates = context.matcher.find_candidates(&filename, &scope);
        if candidates.is_empty() {
            info!(file = %filename, scope = %scope, "no matching account");
            return ReportEntry::skipped(&item.path, UNMATCHED);
        }
        if let Some(token) = preferred {
            prefer_account(&mut candidates, token);
        }

        let resolution = context
            .resolver
            .resolve(&item.path, &candidates, &scope, self.decryptor);
        let description = resolution.outcome.describe();

        let (account, artifact) = match (resolution.account, resolution.artifact) {
            (Some(account), Some(artifact)) if resolution.outcome.is_success() => {
                (account, artifact)
            }
            (account, artifact) => {
                if let Some(artifact) = artifact {
                    let _ = fs::remove_file(artifact);
                }
                let entry = ReportEntry::failed(&item.path, description);
                return match account {
                    Some(account) => entry.with_account(account.label()),
                    None => entry,
                };
            }
        };

        let placement = match context.placer.place(account, &item.path, &artifact) {
            Ok(placement) => placement,
            Err(e) => {
                warn!(file = %filename, error = %e, "placement failed");
                let _ = fs::remove_file(&artifact);
                return ReportEntry::failed(&item.path, format!("placement failed: {}", e))
                    .with_account(account.label());
            }
        };

        if !is_non_empty_file(&placement.path) {
            warn!(output = %placement.path.display(), "placed output is missing or empty");
            return ReportEntry::failed(&item.path, "output missing or empty after placement")
                .with_account(account.label())
                .with_output(placement.path, placement.backed_up);
        }

        ReportEntry::succeeded(&item.path, description)
            .with_account(account.label())
            .with_output(placement.path, placement.backed_up)
    }

    /// Lists the planned action per input file. Nothing is decrypted, extracted or written.
    pub fn plan(&self) -> Result<Vec<PlannedItem>> {
        let scanner = InputScanner::new(&self.config.batch);
        let matcher = CandidateMatcher::new(self.table, self.policy);
        let items = scanner.scan(&self.config.input_dir())?;

        let planned = items
            .into_iter()
            .map(|item| {
                let filename = item.filename();
                let scope = match item.kind {
                    ItemKind::Document => matcher.effective_scope(&filename, &item.scope),
                    _ => item.scope.clone(),
                };
                let mut planned = PlannedItem {
                    source: item.path.clone(),
                    scope: scope.clone(),
                    action: String::new(),
                    account: None,
                    candidates: 0,
                };

                planned.action = match item.kind {
                    ItemKind::Other => "skip: unsupported file type".to_string(),
                    ItemKind::Archive => format!(
                        "extract ({} archive passwords)",
                        self.table.archive_credentials().len()
                    ),
                    ItemKind::Document => {
                        let rejection = scope
                            .platform()
                            .and_then(|platform| self.policy.rejection_reason(platform, &filename));
                        match rejection {
                            Some(reason) => format!("skip: filtered: {}", reason),
                            None => {
                                let candidates = matcher.find_candidates(&filename, &scope);
                                planned.candidates = candidates.len();
                                match candidates.first() {
                                    Some(first) => {
                                        planned.account = Some(first.candidate.label());
                                        "decrypt".to_string()
                                    }
                                    None => format!("skip: {}", UNMATCHED),
                                }
                            }
                        }
                    }
                };
                planned
            })
            .collect();

        Ok(planned)
    }
}

/// Rewrites a member's scratch path as `<archive>/<member path>` for the report.
fn relabel_member(mut entry: ReportEntry, extraction_dir: &Path, archive: &Path) -> ReportEntry {
    if let Ok(relative) = entry.source.strip_prefix(extraction_dir) {
        entry.source = archive.join(relative);
    }
    entry
}

fn is_non_empty_file(path: &Path) -> bool {
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.len() > 0)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::ArchiveExtractor;
    use crate::batch::report::ItemStatus;
    use crate::credentials::{ArchiveCredential, CredentialRecord};
    use crate::decrypt::{DecryptFailure, DecryptOutcome};
    use crate::policy::RequireSubstring;
    use parking_lot::Mutex;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;
    use zip::AesMode;

    /// Unlocks with one password; files whose name contains "broken" fail as corrupt.
    struct FakeDecryptor {
        password: &'static str,
        seen: Mutex<Vec<PathBuf>>,
    }

    impl FakeDecryptor {
        fn accepting(password: &'static str) -> Self {
            Self {
                password,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl Decryptor for FakeDecryptor {
        fn decrypt(&self, input: &Path, output: &Path, password: &str) -> DecryptOutcome {
            self.seen.lock().push(input.to_path_buf());
            if input.to_string_lossy().contains("broken") {
                return DecryptOutcome::Failed(DecryptFailure::Corrupt("bad header".to_string()));
            }
            if password == self.password {
                fs::write(output, b"decrypted workbook").unwrap();
                DecryptOutcome::Decrypted
            } else {
                DecryptOutcome::PasswordRejected
            }
        }
    }

    fn config(root: &TempDir, platforms: &[&str]) -> Config {
        let mut config = Config::default();
        config.paths.root = root.path().to_path_buf();
        config.batch.platforms = platforms.iter().map(|p| p.to_string()).collect();
        config.batch.workers = 2;
        fs::create_dir_all(config.input_dir()).unwrap();
        config
    }

    fn table(archives: Vec<ArchiveCredential>) -> CredentialTable {
        CredentialTable::new(
            vec![
                CredentialRecord::new("AB12", "Acme")
                    .with_platform("shopee")
                    .with_password("secret1"),
                CredentialRecord::new("CD34", "Beta")
                    .with_platform("shopee")
                    .with_password("secret2"),
            ],
            archives,
        )
    }

    fn write_input(config: &Config, relative: &str, content: &[u8]) -> PathBuf {
        let path = config.input_dir().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    fn output_files(config: &Config) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(config.output_dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_document_is_decrypted_and_named_after_account() {
        let root = TempDir::new().unwrap();
        let config = config(&root, &[]);
        let table = table(Vec::new());
        let policy = PolicyTable::new();
        let decryptor = FakeDecryptor::accepting("secret1");
        let extractor = ArchiveExtractor::new();
        write_input(&config, "AB12_report.xlsx", b"encrypted");

        let report = BatchRunner::new(&config, &table, &policy, &decryptor, &extractor)
            .run(None)
            .unwrap();

        let expected = format!("Acme_AB12_{}_01.xlsx", report.run_timestamp);
        assert_eq!(output_files(&config), vec![expected.clone()]);
        assert_eq!(
            fs::read(config.output_dir().join(&expected)).unwrap(),
            b"decrypted workbook"
        );
        assert_eq!(report.summary.succeeded, 1);
        assert_eq!(report.entries[0].account.as_deref(), Some("Acme (AB12)"));
        assert!(config.input_dir().join("AB12_report.xlsx").exists());
    }

    #[test]
    fn test_unmatched_file_is_skipped_without_writes() {
        let root = TempDir::new().unwrap();
        let config = config(&root, &[]);
        let table = table(Vec::new());
        let policy = PolicyTable::new();
        let decryptor = FakeDecryptor::accepting("secret1");
        let extractor = ArchiveExtractor::new();
        write_input(&config, "random_report.xlsx", b"encrypted");

        let report = BatchRunner::new(&config, &table, &policy, &decryptor, &extractor)
            .run(None)
            .unwrap();

        assert_eq!(report.entries.len(), 1);
        assert_eq!(report.entries[0].status, ItemStatus::Skipped);
        assert_eq!(report.entries[0].outcome, UNMATCHED);
        assert!(output_files(&config).is_empty());
        assert!(decryptor.seen.lock().is_empty());
    }

    #[test]
    fn test_protected_zip_member_is_extracted_then_decrypted() {
        let root = TempDir::new().unwrap();
        let config = config(&root, &[]);
        let table = table(vec![ArchiveCredential {
            display_name: "monthly bundle".to_string(),
            account_token: None,
            password: "zip-pass".to_string(),
        }]);
        let policy = PolicyTable::new();
        let decryptor = FakeDecryptor::accepting("secret1");
        let extractor = ArchiveExtractor::new();

        let archive = config.input_dir().join("bundle.zip");
        let mut writer = zip::ZipWriter::new(fs::File::create(&archive).unwrap());
        writer
            .start_file(
                "AB12_report.xlsx",
                SimpleFileOptions::default().with_aes_encryption(AesMode::Aes256, "zip-pass"),
            )
            .unwrap();
        writer.write_all(b"encrypted").unwrap();
        writer.finish().unwrap();

        let report = BatchRunner::new(&config, &table, &policy, &decryptor, &extractor)
            .run(None)
            .unwrap();

        assert_eq!(report.summary.succeeded, 1, "{:?}", report.entries);
        assert_eq!(report.entries[0].source, archive.join("AB12_report.xlsx"));
        assert_eq!(
            output_files(&config),
            vec![format!("Acme_AB12_{}_01.xlsx", report.run_timestamp)]
        );
    }

    #[test]
    fn test_archive_token_prefers_account() {
        let root = TempDir::new().unwrap();
        let config = config(&root, &[]);
        let table = table(vec![ArchiveCredential {
            display_name: "Beta bundle".to_string(),
            account_token: Some("CD34".to_string()),
            password: "zip-pass".to_string(),
        }]);
        let policy = PolicyTable::new();
        let decryptor = FakeDecryptor::accepting("secret2");
        let extractor = ArchiveExtractor::new();

        let archive = config.input_dir().join("bundle.zip");
        let mut writer = zip::ZipWriter::new(fs::File::create(&archive).unwrap());
        writer
            .start_file(
                "AB12_CD34_report.xlsx",
                SimpleFileOptions::default().with_aes_encryption(AesMode::Aes256, "zip-pass"),
            )
            .unwrap();
        writer.write_all(b"encrypted").unwrap();
        writer.finish().unwrap();

        let report = BatchRunner::new(&config, &table, &policy, &decryptor, &extractor)
            .run(None)
            .unwrap();

        assert_eq!(report.summary.succeeded, 1);
        assert_eq!(report.entries[0].account.as_deref(), Some("Beta (CD34)"));
        // CD34 was tried first, so AB12's password never reached the decryptor.
        assert_eq!(decryptor.seen.lock().len(), 1);
    }

    #[test]
    fn test_failures_do_not_stop_the_batch() {
        let root = TempDir::new().unwrap();
        let config = config(&root, &[]);
        let table = table(Vec::new());
        let policy = PolicyTable::new();
        let decryptor = FakeDecryptor::accepting("secret1");
        let extractor = ArchiveExtractor::new();
        write_input(&config, "AB12_broken.xlsx", b"garbage");
        write_input(&config, "AB12_report.xlsx", b"encrypted");
        write_input(&config, "CD34_report.xlsx", b"encrypted");
        write_input(&config, "notes.txt", b"hello");
        write_input(&config, "damaged.zip", b"not a zip");

        let report = BatchRunner::new(&config, &table, &policy, &decryptor, &extractor)
            .run(None)
            .unwrap();

        assert_eq!(report.summary.total, 5);
        assert_eq!(report.summary.succeeded, 1);
        assert_eq!(report.summary.failed, 3);
        assert_eq!(report.summary.skipped, 1);

        let cd34 = report
            .entries
            .iter()
            .find(|e| e.filename == "CD34_report.xlsx")
            .unwrap();
        assert_eq!(cd34.outcome, "no password worked (1 tried)");
        assert!(report.has_failures());
    }

    #[test]
    fn test_report_is_always_written() {
        let root = TempDir::new().unwrap();
        let config = config(&root, &[]);
        let table = table(Vec::new());
        let policy = PolicyTable::new();
        let decryptor = FakeDecryptor::accepting("nothing-matches");
        let extractor = ArchiveExtractor::new();
        write_input(&config, "AB12_report.xlsx", b"encrypted");

        let report = BatchRunner::new(&config, &table, &policy, &decryptor, &extractor)
            .run(None)
            .unwrap();

        assert_eq!(report.summary.failed, 1);
        let text = fs::read_to_string(report.text_path(&config.log_dir())).unwrap();
        assert!(text.contains("[FAILED] AB12_report.xlsx"));
        assert!(!text.contains("secret1"));
        assert!(report.json_path(&config.log_dir()).exists());
    }

    #[test]
    fn test_content_filter_skips_with_reason() {
        let root = TempDir::new().unwrap();
        let config = config(&root, &["shopee"]);
        let table = table(Vec::new());
        let policy = PolicyTable::new()
            .with_content_filter("shopee", Box::new(RequireSubstring("Income".to_string())));
        let decryptor = FakeDecryptor::accepting("secret1");
        let extractor = ArchiveExtractor::new();
        write_input(&config, "shopee/AB12_orders.xlsx", b"encrypted");
        write_input(&config, "shopee/AB12_Income.xlsx", b"encrypted");

        let report = BatchRunner::new(&config, &table, &policy, &decryptor, &extractor)
            .run(None)
            .unwrap();

        let orders = report
            .entries
            .iter()
            .find(|e| e.filename == "AB12_orders.xlsx")
            .unwrap();
        assert_eq!(orders.status, ItemStatus::Skipped);
        assert!(orders.outcome.contains("Income"));
        assert_eq!(report.summary.succeeded, 1);
    }

    #[test]
    fn test_cancelled_run_reports_remaining_items() {
        let root = TempDir::new().unwrap();
        let config = config(&root, &[]);
        let table = table(Vec::new());
        let policy = PolicyTable::new();
        let decryptor = FakeDecryptor::accepting("secret1");
        let extractor = ArchiveExtractor::new();
        write_input(&config, "AB12_report.xlsx", b"encrypted");
        write_input(&config, "CD34_report.xlsx", b"encrypted");

        let shutdown = GracefulShutdown::new_for_test();
        shutdown.request_shutdown();

        let report = BatchRunner::new(&config, &table, &policy, &decryptor, &extractor)
            .with_shutdown(&shutdown)
            .run(None)
            .unwrap();

        assert!(report.cancelled);
        assert_eq!(report.summary.skipped, 2);
        assert!(report.entries.iter().all(|e| e.outcome == CANCELLED));
        assert!(report.text_path(&config.log_dir()).exists());
    }

    #[test]
    fn test_plan_lists_accounts_without_writing() {
        let root = TempDir::new().unwrap();
        let config = config(&root, &[]);
        let table = table(Vec::new());
        let policy = PolicyTable::new();
        let decryptor = FakeDecryptor::accepting("secret1");
        let extractor = ArchiveExtractor::new();
        write_input(&config, "AB12_report.xlsx", b"encrypted");
        write_input(&config, "random_report.xlsx", b"encrypted");

        let plan = BatchRunner::new(&config, &table, &policy, &decryptor, &extractor)
            .plan()
            .unwrap();

        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].account.as_deref(), Some("Acme (AB12)"));
        assert_eq!(plan[0].action, "decrypt");
        assert_eq!(plan[1].action, "skip: unmatched");
        assert!(!config.output_dir().exists());
        assert!(decryptor.seen.lock().is_empty());
    }

    #[test]
    fn test_missing_input_root_is_fatal() {
        let root = TempDir::new().unwrap();
        let mut config = Config::default();
        config.paths.root = root.path().to_path_buf();
        let table = table(Vec::new());
        let policy = PolicyTable::new();
        let decryptor = FakeDecryptor::accepting("secret1");
        let extractor = ArchiveExtractor::new();

        let result = BatchRunner::new(&config, &table, &policy, &decryptor, &extractor).run(None);
        assert!(matches!(
            result.unwrap_err(),
            crate::error::UnlockError::NotFound { .. }
        ));
    }
}
