use thiserror::Error;

#[derive(Error, Debug)]
pub enum UnlockError {
    #[error("{what} not found: {path}")]
    NotFound { what: String, path: String },

    #[error("Failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Path validation failed: {path}")]
    InvalidPath { path: String },

    #[error("Operation was cancelled by user")]
    Cancelled,
}

pub trait UserFriendlyError {
    fn user_message(&self) -> String;
    fn suggestion(&self) -> Option<String>;
}

impl UserFriendlyError for UnlockError {
    fn user_message(&self) -> String {
        match self {
            UnlockError::NotFound { what, path } => {
                format!("{} not found: {}", what, path)
            }
            UnlockError::Parse { path, message } => {
                format!("Could not read {}: {}", path, message)
            }
            UnlockError::Config { message } => {
                format!("Configuration error: {}", message)
            }
            UnlockError::InvalidPath { path } => {
                format!("Invalid file path: {}", path)
            }
            UnlockError::Cancelled => "Operation was cancelled by user".to_string(),
            _ => self.to_string(),
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            UnlockError::NotFound { .. } => Some(
                "Check the install root (--root) or point to the file explicitly with --credentials / --input.".to_string()
            ),
            UnlockError::Parse { .. } => Some(
                "Make sure the credential table has a header row with the configured column names (shop_account, shop_name, Universal Password...).".to_string()
            ),
            UnlockError::Config { .. } => Some(
                "Check your configuration file syntax, or regenerate one with --generate-config.".to_string()
            ),
            UnlockError::Io(_) => Some(
                "Ensure you have read/write permissions for the input, output and log directories.".to_string()
            ),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, UnlockError>;
