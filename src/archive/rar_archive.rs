use super::{confined_path, ExtractError};
use std::path::{Path, PathBuf};
use tracing::warn;
use unrar::error::{Code, UnrarError};
use unrar::Archive;

pub(super) fn extract(
    archive_path: &Path,
    dest: &Path,
    password: Option<&str>,
) -> Result<Vec<PathBuf>, ExtractError> {
    let archive = match password {
        Some(password) => Archive::with_password(archive_path, password.as_bytes()),
        None => Archive::new(archive_path),
    };

    let mut cursor = archive
        .open_for_processing()
        .map_err(|e| map_unrar_error(e, password.is_some()))?;
    let mut extracted = Vec::new();

    while let Some(header) = cursor
        .read_header()
        .map_err(|e| map_unrar_error(e, password.is_some()))?
    {
        let entry = header.entry();
        let member = entry.filename.clone();

        if entry.is_directory() {
            cursor = header
                .skip()
                .map_err(|e| map_unrar_error(e, password.is_some()))?;
            continue;
        }

        match confined_path(dest, &member) {
            Some(target) => {
                cursor = header
                    .extract_with_base(dest)
                    .map_err(|e| map_unrar_error(e, password.is_some()))?;
                extracted.push(target);
            }
            None => {
                warn!(member = %member.display(), "skipping archive member outside destination");
                cursor = header
                    .skip()
                    .map_err(|e| map_unrar_error(e, password.is_some()))?;
            }
        }
    }

    Ok(extracted)
}

fn map_unrar_error(error: UnrarError, with_password: bool) -> ExtractError {
    match error.code {
        Code::MissingPassword | Code::BadPassword => ExtractError::PasswordRejected,
        // Older RAR formats only notice a wrong key through the CRC.
        Code::BadData if with_password => ExtractError::PasswordRejected,
        Code::UnknownFormat => ExtractError::UnsupportedFormat(error.to_string()),
        Code::EOpen | Code::ECreate | Code::EClose | Code::ERead | Code::EWrite => {
            ExtractError::Io(std::io::Error::new(std::io::ErrorKind::Other, error.to_string()))
        }
        _ => ExtractError::CorruptArchive(error.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use unrar::error::When;

    fn error(code: Code) -> UnrarError {
        UnrarError::from(code, When::Process)
    }

    #[test]
    fn test_bad_data_depends_on_password() {
        assert!(matches!(
            map_unrar_error(error(Code::BadData), true),
            ExtractError::PasswordRejected
        ));
        assert!(matches!(
            map_unrar_error(error(Code::BadData), false),
            ExtractError::CorruptArchive(_)
        ));
    }

    #[test]
    fn test_password_codes_are_rejections() {
        for code in [Code::MissingPassword, Code::BadPassword] {
            assert!(matches!(
                map_unrar_error(error(code), false),
                ExtractError::PasswordRejected
            ));
        }
    }

    #[test]
    fn test_format_and_io_codes() {
        assert!(matches!(
            map_unrar_error(UnrarError::from(Code::UnknownFormat, When::Open), false),
            ExtractError::UnsupportedFormat(_)
        ));
        assert!(matches!(
            map_unrar_error(error(Code::EWrite), true),
            ExtractError::Io(_)
        ));
        assert!(matches!(
            map_unrar_error(error(Code::BadArchive), false),
            ExtractError::CorruptArchive(_)
        ));
    }

    #[test]
    fn test_missing_archive_fails_without_members() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = extract(&dir.path().join("missing.rar"), dir.path(), None);
        assert!(result.is_err());
    }
}
