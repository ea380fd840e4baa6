use crate::error::{Result, UnlockError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAMES: [&str; 2] = ["xlunlock.toml", ".xlunlock.toml"];

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub credentials: CredentialsConfig,
    pub batch: BatchConfig,
    pub resolver: ResolverConfig,
    pub policy: PolicyConfig,
}

/// Directory layout. Relative paths are resolved against the install root.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PathsConfig {
    pub root: PathBuf,
    pub input: PathBuf,
    pub output: PathBuf,
    pub log: PathBuf,
    pub backup_dir_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CredentialsConfig {
    pub source: PathBuf,
    /// CSV data rows to drop right after the header row.
    pub skip_rows: usize,
    pub skip_statuses: Vec<String>,
    pub columns: ColumnConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ColumnConfig {
    pub platform: String,
    pub account: String,
    pub name: String,
    pub account_id: String,
    pub status: String,
    /// Password columns, tried in this order.
    pub passwords: Vec<String>,
    /// Also treat every column starting with this prefix as a password column.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_prefix: Option<String>,
    pub archive_password_prefix: String,
    /// Placeholder values that mean "no password".
    pub empty_markers: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Platform names; each has an `input/<platform>/` subfolder scoped to it.
    pub platforms: Vec<String>,
    pub document_extensions: Vec<String>,
    pub archive_extensions: Vec<String>,
    pub max_archive_depth: usize,
    /// 0 means one worker per CPU. Only used with the `parallel` feature.
    pub workers: usize,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub sweep_platform_passwords: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub marker_redirects: Vec<MarkerRedirect>,
    pub naming_overrides: Vec<NamingOverride>,
    pub content_filters: Vec<ContentFilterRule>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MarkerRedirect {
    pub marker: String,
    pub platform: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct NamingOverride {
    pub platform: String,
    pub prefix: String,
}

/// Filename rule applied to one platform. Exactly one of `require`, `exclude` or `pattern`
/// must be set.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ContentFilterRule {
    pub platform: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub require: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            root: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            input: PathBuf::from("input"),
            output: PathBuf::from("output"),
            log: PathBuf::from("log"),
            backup_dir_name: "backup".to_string(),
        }
    }
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::from("mapping/shops_master.json"),
            skip_rows: 0,
            skip_statuses: Vec::new(),
            columns: ColumnConfig::default(),
        }
    }
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            platform: "platform".to_string(),
            account: "shop_account".to_string(),
            name: "shop_name".to_string(),
            account_id: "shop_id".to_string(),
            status: "shop_status".to_string(),
            passwords: vec![
                "Universal Password".to_string(),
                "Report Download Password".to_string(),
            ],
            password_prefix: None,
            archive_password_prefix: "archive_password".to_string(),
            empty_markers: vec!["無".to_string()],
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            platforms: Vec::new(),
            document_extensions: vec![
                "xlsx".to_string(),
                "xls".to_string(),
                "xlsm".to_string(),
                "xlsb".to_string(),
            ],
            archive_extensions: vec!["zip".to_string(), "rar".to_string()],
            max_archive_depth: 2,
            workers: 0,
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(UnlockError::Config {
                message: format!("Configuration file not found: {}", path.display()),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| UnlockError::Config {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| UnlockError::Config {
            message: format!("Failed to parse config file {}: {}", path.display(), e),
        })?;

        Ok(config)
    }

    /// Loads `config_path` if given, else the first config file found under `root`,
    /// else the defaults. The install root always ends up as `root`.
    pub fn load_with_defaults<P: AsRef<Path>>(config_path: Option<P>, root: &Path) -> Result<Self> {
        let mut config = match config_path {
            Some(path) => Self::load_from_file(path)?,
            None => {
                let found = CONFIG_FILE_NAMES
                    .iter()
                    .map(|name| root.join(name))
                    .find(|candidate| candidate.exists());

                match found {
                    Some(path) => Self::load_from_file(path)?,
                    None => Self::default(),
                }
            }
        };

        config.paths.root = root.to_path_buf();
        Ok(config)
    }

    pub fn merge_with_cli_args(&mut self, cli_args: &CliOverrides) {
        if let Some(ref input) = cli_args.input_dir {
            self.paths.input = input.clone();
        }

        if let Some(ref output) = cli_args.output_dir {
            self.paths.output = output.clone();
        }

        if let Some(ref credentials) = cli_args.credentials {
            self.credentials.source = credentials.clone();
        }

        if let Some(ref platforms) = cli_args.platforms {
            self.batch.platforms = platforms.clone();
        }

        if let Some(workers) = cli_args.workers {
            self.batch.workers = workers;
        }

        if let Some(sweep) = cli_args.sweep {
            self.resolver.sweep_platform_passwords = sweep;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch.document_extensions.is_empty() {
            return Err(UnlockError::Config {
                message: "At least one document extension must be specified".to_string(),
            });
        }

        if self.batch.max_archive_depth == 0 && !self.batch.archive_extensions.is_empty() {
            return Err(UnlockError::Config {
                message: "max_archive_depth must be greater than 0 when archives are enabled"
                    .to_string(),
            });
        }

        if self.paths.backup_dir_name.trim().is_empty()
            || self.paths.backup_dir_name.contains(['/', '\\'])
        {
            return Err(UnlockError::Config {
                message: format!(
                    "backup_dir_name must be a plain directory name, got '{}'",
                    self.paths.backup_dir_name
                ),
            });
        }

        let columns = &self.credentials.columns;
        if columns.account.trim().is_empty() {
            return Err(UnlockError::Config {
                message: "credentials.columns.account must name a column".to_string(),
            });
        }
        if columns.passwords.is_empty() && columns.password_prefix.is_none() {
            return Err(UnlockError::Config {
                message: "credentials.columns needs password columns or a password_prefix"
                    .to_string(),
            });
        }

        for platform in &self.batch.platforms {
            if platform.is_empty() || platform.contains(['/', '\\']) || platform.starts_with('.') {
                return Err(UnlockError::Config {
                    message: format!("Invalid platform folder name: '{}'", platform),
                });
            }
        }

        for redirect in &self.policy.marker_redirects {
            if redirect.marker.is_empty() {
                return Err(UnlockError::Config {
                    message: format!("Empty marker in redirect to platform '{}'", redirect.platform),
                });
            }
        }

        for rule in &self.policy.content_filters {
            let kinds = [rule.require.is_some(), rule.exclude.is_some(), rule.pattern.is_some()]
                .iter()
                .filter(|set| **set)
                .count();
            if kinds != 1 {
                return Err(UnlockError::Config {
                    message: format!(
                        "Content filter for '{}' must set exactly one of require, exclude, pattern",
                        rule.platform
                    ),
                });
            }
            if let Some(ref pattern) = rule.pattern {
                regex::Regex::new(pattern).map_err(|e| UnlockError::Config {
                    message: format!("Invalid content filter pattern '{}': {}", pattern, e),
                })?;
            }
        }

        Ok(())
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.paths.root.join(path)
        }
    }

    pub fn input_dir(&self) -> PathBuf {
        self.resolve(&self.paths.input)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.resolve(&self.paths.output)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.resolve(&self.paths.log)
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.output_dir().join(&self.paths.backup_dir_name)
    }

    pub fn credentials_path(&self) -> PathBuf {
        self.resolve(&self.credentials.source)
    }

    pub fn effective_workers(&self) -> usize {
        if self.batch.workers == 0 {
            num_cpus::get()
        } else {
            self.batch.workers
        }
    }

    pub fn create_sample_config() -> Result<String> {
        let mut sample = Self::default();
        sample.paths.root = PathBuf::from(".");
        sample.batch.platforms = vec!["shopee".to_string(), "momo".to_string()];
        sample.policy.marker_redirects = vec![MarkerRedirect {
            marker: "AGG".to_string(),
            platform: "reseller".to_string(),
        }];
        sample.policy.naming_overrides = vec![NamingOverride {
            platform: "reseller".to_string(),
            prefix: "RESELLER_".to_string(),
        }];
        sample.policy.content_filters = vec![ContentFilterRule {
            platform: "shopee".to_string(),
            require: Some("Income".to_string()),
            ..Default::default()
        }];
        toml::to_string_pretty(&sample).map_err(|e| UnlockError::Config {
            message: format!("Failed to serialize sample config: {}", e),
        })
    }
}

#[derive(Debug, Default)]
pub struct CliOverrides {
    pub input_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub credentials: Option<PathBuf>,
    pub platforms: Option<Vec<String>>,
    pub workers: Option<usize>,
    pub sweep: Option<bool>,
}

impl CliOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input_dir(mut self, input_dir: Option<PathBuf>) -> Self {
        self.input_dir = input_dir;
        self
    }

    pub fn with_output_dir(mut self, output_dir: Option<PathBuf>) -> Self {
        self.output_dir = output_dir;
        self
    }

    pub fn with_credentials(mut self, credentials: Option<PathBuf>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_platforms(mut self, platforms: Option<Vec<String>>) -> Self {
        self.platforms = platforms;
        self
    }

    pub fn with_workers(mut self, workers: Option<usize>) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_sweep(mut self, sweep: Option<bool>) -> Self {
        self.sweep = sweep;
        self
    }
}
