pub mod office;

pub use office::OfficeDecryptor;

use std::path::Path;
use thiserror::Error;

/// Result of one decryption attempt.
#[derive(Debug)]
pub enum DecryptOutcome {
    /// Plaintext was written to the output path.
    Decrypted,
    /// The input is not encrypted. The output path is left untouched.
    AlreadyPlaintext,
    PasswordRejected,
    Failed(DecryptFailure),
}

/// Conditions that no other password can fix.
#[derive(Error, Debug)]
pub enum DecryptFailure {
    #[error("unsupported encryption: {0}")]
    Unsupported(String),

    #[error("corrupt or unrecognized file: {0}")]
    Corrupt(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Single-file decryption primitive.
pub trait Decryptor: Send + Sync {
    fn decrypt(&self, input: &Path, output: &Path, password: &str) -> DecryptOutcome;
}
