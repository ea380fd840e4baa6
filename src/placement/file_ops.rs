use crate::error::{Result, UnlockError};
use std::fs;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::debug;

const BUFFER_SIZE: usize = 64 * 1024;

/// Copies `source` to `dest` byte for byte and carries the modification time over.
pub fn copy_preserving_mtime(source: &Path, dest: &Path) -> Result<u64> {
    if !source.is_file() {
        return Err(UnlockError::InvalidPath {
            path: format!("Source is not a file: {}", source.display()),
        });
    }

    let mut reader = BufReader::with_capacity(BUFFER_SIZE, fs::File::open(source)?);
    let mut writer = BufWriter::with_capacity(BUFFER_SIZE, fs::File::create(dest)?);

    let mut total_bytes = 0u64;
    let mut buffer = vec![0u8; 8192];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        writer.write_all(&buffer[..bytes_read])?;
        total_bytes += bytes_read as u64;
    }

    writer.flush()?;
    drop(writer);

    if let Ok(modified_time) = fs::metadata(source).and_then(|m| m.modified()) {
        let _ = filetime::set_file_mtime(dest, filetime::FileTime::from_system_time(modified_time));
    }

    Ok(total_bytes)
}

/// Moves a file, falling back to copy and delete when a rename cannot cross devices.
pub fn move_file(source: &Path, dest: &Path) -> Result<()> {
    check_path_length(dest)?;

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }

    match fs::rename(source, dest) {
        Ok(()) => Ok(()),
        Err(e) => {
            debug!(
                source = %source.display(),
                dest = %dest.display(),
                error = %e,
                "rename failed, copying instead"
            );
            copy_preserving_mtime(source, dest)?;
            fs::remove_file(source)?;
            Ok(())
        }
    }
}

/// Makes one name component safe for a filename: whitespace, path separators, reserved
/// characters and control characters all become `_`.
pub fn sanitize_component(name: &str) -> String {
    name.trim()
        .chars()
        .map(|ch| match ch {
            '<' | '>' | ':' | '"' | '|' | '?' | '*' => '_',
            '/' | '\\' => '_',
            c if c.is_whitespace() || c.is_control() => '_',
            c => c,
        })
        .collect()
}

pub fn check_path_length(path: &Path) -> Result<()> {
    let path_str = path.to_string_lossy();

    #[cfg(windows)]
    const MAX_PATH: usize = 260;

    #[cfg(not(windows))]
    const MAX_PATH: usize = 4096;

    if path_str.len() > MAX_PATH {
        Err(UnlockError::InvalidPath {
            path: format!("Path too long: {} characters (max: {})", path_str.len(), MAX_PATH),
        })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    #[test]
    fn test_copy_is_byte_identical_and_keeps_mtime() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("source.xlsx");
        let dest = dir.path().join("dest.xlsx");
        let content: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
        fs::write(&source, &content).unwrap();

        let stamp = SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000);
        filetime::set_file_mtime(&source, filetime::FileTime::from_system_time(stamp)).unwrap();

        let copied = copy_preserving_mtime(&source, &dest).unwrap();

        assert_eq!(copied, content.len() as u64);
        assert_eq!(fs::read(&dest).unwrap(), content);
        assert_eq!(fs::metadata(&dest).unwrap().modified().unwrap(), stamp);
    }

    #[test]
    fn test_move_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("a.xlsx");
        fs::write(&source, b"data").unwrap();

        let dest = dir.path().join("nested").join("b.xlsx");
        move_file(&source, &dest).unwrap();

        assert!(!source.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"data");
    }

    #[test]
    fn test_sanitize_component() {
        assert_eq!(sanitize_component("Acme Shop"), "Acme_Shop");
        assert_eq!(sanitize_component("A/B\\C"), "A_B_C");
        assert_eq!(sanitize_component("a<b>:c\"d|e?f*"), "a_b__c_d_e_f_");
        assert_eq!(sanitize_component("Tab\there"), "Tab_here");
        assert_eq!(sanitize_component("Acme & Co. (TW)"), "Acme_&_Co._(TW)");
    }

    #[test]
    fn test_path_length_limit() {
        assert!(check_path_length(Path::new("short.xlsx")).is_ok());
        let long = "a".repeat(5000);
        assert!(check_path_length(Path::new(&long)).is_err());
    }
}
