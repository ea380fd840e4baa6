pub mod archive;
pub mod batch;
pub mod cli;
pub mod config;
pub mod credentials;
pub mod decrypt;
pub mod error;
pub mod matcher;
pub mod placement;
pub mod policy;
pub mod resolver;
pub mod ui;

// Public API re-exports
pub use cli::{Cli, OutputFormat};
pub use config::{CliOverrides, Config};
pub use error::{Result, UnlockError, UserFriendlyError};

// Core functionality re-exports
pub use archive::{ArchiveExtractor, ExtractError, Extractor};
pub use batch::{BatchRunner, ItemStatus, PlannedItem, ProcessingReport, ReportEntry};
pub use credentials::{load_credentials, ArchiveCredential, CredentialRecord, CredentialTable};
pub use decrypt::{DecryptFailure, DecryptOutcome, Decryptor, OfficeDecryptor};
pub use matcher::{CandidateMatcher, MatchResult, MatchedBy, Scope};
pub use placement::{Placement, Placer};
pub use policy::{ContentFilter, PolicyTable};
pub use resolver::{PasswordResolver, Resolution, ResolutionOutcome};
pub use ui::{GracefulShutdown, OutputFormatter, OutputMode, ProgressManager};

use std::path::{Path, PathBuf};

/// Main library interface: loads the credential and policy tables once and runs batches
/// against them.
pub struct XlUnlock {
    config: Config,
    output_formatter: OutputFormatter,
    progress_manager: ProgressManager,
    shutdown: GracefulShutdown,
}

impl XlUnlock {
    pub fn new(config: Config, output_mode: OutputMode, verbose: u8, quiet: bool) -> Result<Self> {
        let output_formatter = OutputFormatter::new(output_mode, verbose, quiet);
        let progress_manager = ProgressManager::new(!quiet && output_mode == OutputMode::Human);
        let shutdown = GracefulShutdown::new()?;

        Ok(Self {
            config,
            output_formatter,
            progress_manager,
            shutdown,
        })
    }

    /// Instance without a Ctrl+C handler, so several can coexist in one process.
    pub fn new_for_test(config: Config, output_mode: OutputMode, verbose: u8, quiet: bool) -> Self {
        Self {
            config,
            output_formatter: OutputFormatter::new(output_mode, verbose, quiet),
            progress_manager: ProgressManager::new(false),
            shutdown: GracefulShutdown::new_for_test(),
        }
    }

    pub fn from_cli(cli_args: &Cli) -> Result<Self> {
        let config = cli_args.load_config()?;
        Self::new(
            config,
            cli_args.output_mode(),
            cli_args.verbosity_level(),
            cli_args.quiet,
        )
    }

    fn load_tables(&self) -> Result<(CredentialTable, PolicyTable)> {
        let source = self.config.credentials_path();
        self.output_formatter
            .info(&format!("Loading credentials from {}", source.display()));

        let table = load_credentials(&source, &self.config.credentials)?;
        for token in table.duplicate_tokens() {
            self.output_formatter.warning(&format!(
                "Account token '{}' appears more than once; the first row wins",
                token
            ));
        }
        for shared in table.cross_platform_passwords() {
            self.output_formatter.warning(&format!(
                "Accounts {} and {} on different platforms share a password",
                shared.first, shared.second
            ));
        }

        let policy = PolicyTable::from_config(&self.config.policy)?;
        Ok((table, policy))
    }

    /// Unlocks everything under the input directory. Returns the report and the path of
    /// its text rendition.
    pub fn run(&self) -> Result<(ProcessingReport, PathBuf)> {
        self.shutdown.check_shutdown()?;
        let (table, policy) = self.load_tables()?;
        self.output_formatter.info(&format!(
            "{} accounts, {} archive passwords",
            table.len(),
            table.archive_credentials().len()
        ));

        self.output_formatter.start_operation("Unlocking reports");
        let decryptor = OfficeDecryptor::new();
        let extractor = ArchiveExtractor::new();
        let runner = BatchRunner::new(&self.config, &table, &policy, &decryptor, &extractor)
            .with_shutdown(&self.shutdown);

        let file_progress = self.progress_manager.create_file_progress(0);
        let progress_callback = {
            let pb = file_progress.clone();
            move |progress: &batch::BatchProgress| {
                ui::progress::update_batch_progress(&pb, progress);
            }
        };

        let report = runner.run(Some(&progress_callback))?;
        ui::progress::finish_progress_with_summary(
            &file_progress,
            &format!("Processed {} files", report.summary.total),
            report.duration,
        );
        self.progress_manager.clear();

        let report_path = report.text_path(&self.config.log_dir());
        self.output_formatter
            .print_batch_summary(&report, &report_path);

        Ok((report, report_path))
    }

    /// Matches input files to accounts without decrypting or writing anything.
    pub fn dry_run(&self) -> Result<Vec<PlannedItem>> {
        let (table, policy) = self.load_tables()?;
        let decryptor = OfficeDecryptor::new();
        let extractor = ArchiveExtractor::new();

        let plan = BatchRunner::new(&self.config, &table, &policy, &decryptor, &extractor).plan()?;
        self.output_formatter.print_plan(&plan);
        Ok(plan)
    }

    pub fn generate_sample_config<P: AsRef<Path>>(output_path: P) -> Result<()> {
        let output_path = output_path.as_ref();
        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = Config::create_sample_config()?;
        std::fs::write(output_path, content)?;
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.shutdown.is_running()
    }

    pub fn request_shutdown(&self) {
        self.shutdown.request_shutdown();
    }

    pub fn handle_error(&self, error: &UnlockError) {
        self.output_formatter.print_user_friendly_error(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;
    use tempfile::TempDir;

    fn install_root() -> TempDir {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("input")).unwrap();
        fs::create_dir_all(root.path().join("mapping")).unwrap();
        fs::write(
            root.path().join("mapping/shops_master.json"),
            r#"[{"platform": "shopee", "shop_account": "AB12", "shop_name": "Acme", "Universal Password": "secret1"}]"#,
        )
        .unwrap();
        root
    }

    fn config_for(root: &TempDir) -> Config {
        Config::load_with_defaults(None::<&Path>, root.path()).unwrap()
    }

    fn plaintext_workbook(path: &Path) {
        let mut writer = zip::ZipWriter::new(fs::File::create(path).unwrap());
        writer
            .start_file("[Content_Types].xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"<Types/>").unwrap();
        writer.finish().unwrap();
    }

    #[test]
    fn test_run_places_plaintext_workbook() {
        let root = install_root();
        let source = root.path().join("input/AB12_report.xlsx");
        plaintext_workbook(&source);

        let app = XlUnlock::new_for_test(config_for(&root), OutputMode::Plain, 0, true);
        let (report, report_path) = app.run().unwrap();

        assert_eq!(report.summary.succeeded, 1, "{:?}", report.entries);
        let output = report.entries[0].output.clone().unwrap();
        assert_eq!(
            output,
            root.path()
                .join("output")
                .join(format!("Acme_AB12_{}_01.xlsx", report.run_timestamp))
        );
        assert_eq!(fs::read(&output).unwrap(), fs::read(&source).unwrap());
        assert!(report_path.exists());
    }

    #[test]
    fn test_missing_credentials_is_not_found() {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("input")).unwrap();

        let app = XlUnlock::new_for_test(config_for(&root), OutputMode::Plain, 0, true);
        assert!(matches!(app.run().unwrap_err(), UnlockError::NotFound { .. }));
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let root = install_root();
        plaintext_workbook(&root.path().join("input/AB12_report.xlsx"));

        let app = XlUnlock::new_for_test(config_for(&root), OutputMode::Plain, 0, true);
        let plan = app.dry_run().unwrap();

        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].account.as_deref(), Some("Acme (AB12)"));
        assert!(!root.path().join("output").exists());
        assert!(!root.path().join("log").exists());
    }

    #[test]
    fn test_cancelled_before_start() {
        let root = install_root();
        let app = XlUnlock::new_for_test(config_for(&root), OutputMode::Plain, 0, true);

        app.request_shutdown();
        assert!(!app.is_running());
        assert!(matches!(app.run().unwrap_err(), UnlockError::Cancelled));
    }

    #[test]
    fn test_sample_config_generation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("xlunlock.toml");

        XlUnlock::generate_sample_config(&path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("[paths]"));
        assert!(content.contains("[batch]"));
        let parsed: Config = toml::from_str(&content).unwrap();
        assert!(parsed.validate().is_ok());
    }
}
