use crate::config::{CliOverrides, Config, CONFIG_FILE_NAMES};
use crate::error::Result;
use crate::ui::OutputMode;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "xlunlock")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Batch-decrypt password-protected spreadsheet reports")]
#[command(
    long_about = "xlunlock matches every spreadsheet under input/ to a merchant account from the \
                  credential table, unlocks it with that account's passwords (extracting \
                  protected zip/rar archives first) and files the result under output/ with a \
                  predictable name."
)]
#[command(before_help = "🔑 xlunlock - Spreadsheet Batch Unlocker")]
#[command(after_help = "EXAMPLES:\n  \
    xlunlock\n  \
    xlunlock --root /srv/reports --platform shopee --platform momo\n  \
    xlunlock --credentials mapping/shops.csv --sweep -v\n  \
    xlunlock --dry-run --output-format json\n  \
    xlunlock --generate-config")]
pub struct Cli {
    /// Install root holding input/, output/, log/ and mapping/
    #[arg(long, env = "XLUNLOCK_ROOT")]
    pub root: Option<PathBuf>,

    /// Configuration file path
    #[arg(short, long, help = "Path to TOML configuration file")]
    pub config: Option<PathBuf>,

    /// Input directory (relative paths resolve against the root)
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Output directory (relative paths resolve against the root)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Credential table (.csv or .json)
    #[arg(long)]
    pub credentials: Option<PathBuf>,

    /// Platform with its own input/<platform>/ folder (repeatable)
    #[arg(short, long = "platform", value_delimiter = ',')]
    pub platforms: Vec<String>,

    /// Also try every password of the platform when the matched accounts' passwords fail
    #[arg(long)]
    pub sweep: bool,

    /// Worker threads (0 = one per CPU); needs the `parallel` feature
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Output format for results
    #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
    pub output_format: OutputFormat,

    /// Verbose output level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-essential output)
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Dry run (match files to accounts without decrypting or writing anything)
    #[arg(long)]
    pub dry_run: bool,

    /// Generate sample configuration file
    #[arg(long, help = "Write a sample configuration file and exit")]
    pub generate_config: bool,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable colored output
    Human,
    /// JSON formatted output
    Json,
    /// Plain text output
    Plain,
}

impl Cli {
    pub fn root_dir(&self) -> PathBuf {
        self.root
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }

    pub fn load_config(&self) -> Result<Config> {
        let mut config = Config::load_with_defaults(self.config.as_ref(), &self.root_dir())?;

        config.merge_with_cli_args(&self.create_cli_overrides());
        config.validate()?;

        Ok(config)
    }

    pub fn create_cli_overrides(&self) -> CliOverrides {
        let platforms = if self.platforms.is_empty() {
            None
        } else {
            Some(self.platforms.clone())
        };

        CliOverrides::new()
            .with_input_dir(self.input.clone())
            .with_output_dir(self.output.clone())
            .with_credentials(self.credentials.clone())
            .with_platforms(platforms)
            .with_workers(self.jobs)
            .with_sweep(self.sweep.then_some(true))
    }

    /// `--config` when given, else `xlunlock.toml` under the root.
    pub fn sample_config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| self.root_dir().join(CONFIG_FILE_NAMES[0]))
    }

    pub fn output_mode(&self) -> OutputMode {
        match self.output_format {
            OutputFormat::Human => OutputMode::Human,
            OutputFormat::Json => OutputMode::Json,
            OutputFormat::Plain => OutputMode::Plain,
        }
    }

    pub fn verbosity_level(&self) -> u8 {
        if self.quiet {
            0
        } else {
            self.verbose
        }
    }
}
