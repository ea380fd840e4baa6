mod rar_archive;
mod zip_archive;

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("wrong or missing password")]
    PasswordRejected,

    #[error("corrupt archive: {0}")]
    CorruptArchive(String),

    #[error("unsupported archive format: {0}")]
    UnsupportedFormat(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Archive extraction primitive. Returns the extracted member files, all inside `dest`.
pub trait Extractor: Send + Sync {
    fn extract(
        &self,
        archive: &Path,
        dest: &Path,
        password: Option<&str>,
    ) -> Result<Vec<PathBuf>, ExtractError>;
}

/// Dispatches on the archive extension to the ZIP or RAR backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct ArchiveExtractor;

impl ArchiveExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for ArchiveExtractor {
    fn extract(
        &self,
        archive: &Path,
        dest: &Path,
        password: Option<&str>,
    ) -> Result<Vec<PathBuf>, ExtractError> {
        let extension = archive
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        std::fs::create_dir_all(dest)?;

        match extension.as_str() {
            "zip" => zip_archive::extract(archive, dest, password),
            "rar" => rar_archive::extract(archive, dest, password),
            other => Err(ExtractError::UnsupportedFormat(format!(".{}", other))),
        }
    }
}

/// Joins a member path onto `dest`, refusing absolute paths and parent components.
fn confined_path(dest: &Path, member: &Path) -> Option<PathBuf> {
    use std::path::Component;

    let mut out = dest.to_path_buf();
    for component in member.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    if out == dest {
        None
    } else {
        Some(out)
    }
}
