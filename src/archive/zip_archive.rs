use super::{confined_path, ExtractError};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use zip::result::ZipError;
use zip::ZipArchive;

pub(super) fn extract(
    archive_path: &Path,
    dest: &Path,
    password: Option<&str>,
) -> Result<Vec<PathBuf>, ExtractError> {
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file).map_err(map_zip_error)?;
    let mut extracted = Vec::new();

    for i in 0..archive.len() {
        let mut entry = match password {
            Some(password) => archive.by_index_decrypt(i, password.as_bytes()),
            None => archive.by_index(i),
        }
        .map_err(map_zip_error)?;

        if entry.is_dir() {
            continue;
        }

        let Some(target) = entry
            .enclosed_name()
            .and_then(|name| confined_path(dest, &name))
        else {
            warn!(member = entry.name(), "skipping archive member outside destination");
            continue;
        };

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let encrypted = entry.encrypted();
        let mut out = File::create(&target)?;
        if let Err(e) = io::copy(&mut entry, &mut out) {
            // ZipCrypto lets roughly one wrong key in 256 past the header check; the CRC
            // catches it while reading.
            if encrypted {
                debug!(member = entry.name(), error = %e, "member failed to decrypt");
                return Err(ExtractError::PasswordRejected);
            }
            return Err(ExtractError::Io(e));
        }

        extracted.push(target);
    }

    Ok(extracted)
}

fn map_zip_error(error: ZipError) -> ExtractError {
    match error {
        ZipError::InvalidPassword => ExtractError::PasswordRejected,
        ZipError::UnsupportedArchive(message) if message == ZipError::PASSWORD_REQUIRED => {
            ExtractError::PasswordRejected
        }
        ZipError::UnsupportedArchive(message) => {
            ExtractError::UnsupportedFormat(message.to_string())
        }
        ZipError::Io(e) => ExtractError::Io(e),
        other => ExtractError::CorruptArchive(other.to_string()),
    }
}
