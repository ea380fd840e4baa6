use super::{DecryptFailure, DecryptOutcome, Decryptor};
use std::io::{Cursor, Read};
use std::path::Path;
use tracing::{debug, trace};

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const ZIP_EMPTY_MAGIC: &[u8] = b"PK\x05\x06";
const CFB_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

const RECORD_BOF_BIFF8: u16 = 0x0809;
const RECORD_BOF_BIFF5: u16 = 0x0009;
const RECORD_EOF: u16 = 0x000A;
const RECORD_FILEPASS: u16 = 0x002F;

/// Decrypts Office workbooks: encrypted OOXML packages through `office-crypto`, with
/// plain OOXML and unprotected legacy workbooks passed through.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfficeDecryptor;

impl OfficeDecryptor {
    pub fn new() -> Self {
        Self
    }

    fn decrypt_bytes(&self, bytes: Vec<u8>, output: &Path, password: &str) -> DecryptOutcome {
        if is_zip(&bytes) {
            return DecryptOutcome::AlreadyPlaintext;
        }

        if !bytes.starts_with(CFB_MAGIC) {
            return DecryptOutcome::Failed(DecryptFailure::Corrupt(
                "unrecognized file signature".to_string(),
            ));
        }

        let mut container = match cfb::CompoundFile::open(Cursor::new(bytes.as_slice())) {
            Ok(container) => container,
            Err(e) => return DecryptOutcome::Failed(DecryptFailure::Corrupt(e.to_string())),
        };

        if container.is_stream("EncryptionInfo") && container.is_stream("EncryptedPackage") {
            let mut version = [0u8; 4];
            let read = container
                .open_stream("EncryptionInfo")
                .and_then(|mut s| s.read_exact(&mut version));
            drop(container);

            return match read {
                Ok(()) if is_known_encryption_version(version) => {
                    decrypt_package(bytes, output, password)
                }
                Ok(()) => DecryptOutcome::Failed(DecryptFailure::Unsupported(format!(
                    "encryption version {}.{}",
                    u16::from_le_bytes([version[0], version[1]]),
                    u16::from_le_bytes([version[2], version[3]])
                ))),
                Err(e) => DecryptOutcome::Failed(DecryptFailure::Corrupt(format!(
                    "unreadable EncryptionInfo: {}",
                    e
                ))),
            };
        }

        for name in ["Workbook", "Book"] {
            if !container.is_stream(name) {
                continue;
            }

            let mut stream = Vec::new();
            if let Err(e) = container
                .open_stream(name)
                .and_then(|mut s| s.read_to_end(&mut stream))
            {
                return DecryptOutcome::Failed(DecryptFailure::Corrupt(e.to_string()));
            }

            return if has_filepass_record(&stream) {
                DecryptOutcome::Failed(DecryptFailure::Unsupported(
                    "legacy .xls workbook encryption".to_string(),
                ))
            } else {
                DecryptOutcome::AlreadyPlaintext
            };
        }

        DecryptOutcome::Failed(DecryptFailure::Corrupt(
            "compound file holds no workbook".to_string(),
        ))
    }
}

impl Decryptor for OfficeDecryptor {
    fn decrypt(&self, input: &Path, output: &Path, password: &str) -> DecryptOutcome {
        trace!(input = %input.display(), "decrypt attempt");
        match std::fs::read(input) {
            Ok(bytes) => self.decrypt_bytes(bytes, output, password),
            Err(e) => DecryptOutcome::Failed(DecryptFailure::Io(e)),
        }
    }
}

fn is_zip(bytes: &[u8]) -> bool {
    bytes.starts_with(ZIP_MAGIC) || bytes.starts_with(ZIP_EMPTY_MAGIC)
}

/// Agile (4.4) and standard (2.2, 3.2, 4.2) encryption. Anything else cannot be
/// opened with any password.
fn is_known_encryption_version(version: [u8; 4]) -> bool {
    matches!(version, [4, 0, 4, 0] | [2..=4, 0, 2, 0])
}

fn decrypt_package(bytes: Vec<u8>, output: &Path, password: &str) -> DecryptOutcome {
    use office_crypto::DecryptError;

    match office_crypto::decrypt_from_bytes(bytes, password) {
        // A wrong key still "decrypts", so only a ZIP package counts as success.
        Ok(plain) if is_zip(&plain) => match std::fs::write(output, plain) {
            Ok(()) => DecryptOutcome::Decrypted,
            Err(e) => DecryptOutcome::Failed(DecryptFailure::Io(e)),
        },
        Ok(_) => DecryptOutcome::PasswordRejected,
        Err(DecryptError::Unimplemented(what)) => {
            DecryptOutcome::Failed(DecryptFailure::Unsupported(what))
        }
        Err(DecryptError::IoError(e)) => DecryptOutcome::Failed(DecryptFailure::Io(e)),
        Err(DecryptError::InvalidHeader) => DecryptOutcome::Failed(DecryptFailure::Corrupt(
            "invalid compound file header".to_string(),
        )),
        Err(e) => {
            debug!(error = ?e, "package rejected password");
            DecryptOutcome::PasswordRejected
        }
    }
}

/// Whether the workbook globals substream of a BIFF stream carries a FILEPASS record.
/// Truncated or non-BIFF streams report false.
fn has_filepass_record(stream: &[u8]) -> bool {
    let mut offset = 0;
    let mut first = true;

    while offset + 4 <= stream.len() {
        let id = u16::from_le_bytes([stream[offset], stream[offset + 1]]);
        let len = u16::from_le_bytes([stream[offset + 2], stream[offset + 3]]) as usize;

        if first {
            if id != RECORD_BOF_BIFF8 && id != RECORD_BOF_BIFF5 {
                return false;
            }
            first = false;
        } else if id == RECORD_FILEPASS {
            return true;
        } else if id == RECORD_EOF {
            return false;
        }

        offset += 4 + len;
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn record(id: u16, payload: &[u8]) -> Vec<u8> {
        let mut bytes = id.to_le_bytes().to_vec();
        bytes.extend_from_slice(&(payload.len() as u16).to_le_bytes());
        bytes.extend_from_slice(payload);
        bytes
    }

    fn compound_file(streams: &[(&str, Vec<u8>)]) -> Vec<u8> {
        let mut container = cfb::CompoundFile::create(Cursor::new(Vec::new())).unwrap();
        for (name, content) in streams {
            let mut stream = container.create_stream(name).unwrap();
            stream.write_all(content).unwrap();
        }
        container.flush().unwrap();
        container.into_inner().into_inner()
    }

    fn biff_workbook(encrypted: bool) -> Vec<u8> {
        let mut stream = record(RECORD_BOF_BIFF8, &[0u8; 16]);
        if encrypted {
            stream.extend(record(RECORD_FILEPASS, &[0u8; 6]));
        }
        stream.extend(record(0x0042, &[0xE4, 0x04]));
        stream.extend(record(RECORD_EOF, &[]));
        stream
    }

    fn run(bytes: &[u8]) -> (DecryptOutcome, TempDir) {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("input.xlsx");
        std::fs::write(&input, bytes).unwrap();
        let outcome = OfficeDecryptor::new().decrypt(&input, &dir.path().join("out.xlsx"), "pw");
        (outcome, dir)
    }

    #[test]
    fn test_zip_package_is_plaintext() {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("[Content_Types].xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"<Types/>").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let (outcome, dir) = run(&bytes);
        assert!(matches!(outcome, DecryptOutcome::AlreadyPlaintext));
        assert!(!dir.path().join("out.xlsx").exists());
    }

    #[test]
    fn test_unknown_signature_is_corrupt() {
        let (outcome, _dir) = run(b"definitely not a spreadsheet");
        assert!(matches!(
            outcome,
            DecryptOutcome::Failed(DecryptFailure::Corrupt(_))
        ));
    }

    #[test]
    fn test_legacy_workbook_without_filepass_is_plaintext() {
        let bytes = compound_file(&[("Workbook", biff_workbook(false))]);
        let (outcome, _dir) = run(&bytes);
        assert!(matches!(outcome, DecryptOutcome::AlreadyPlaintext));
    }

    #[test]
    fn test_legacy_workbook_with_filepass_is_unsupported() {
        let bytes = compound_file(&[("Workbook", biff_workbook(true))]);
        let (outcome, _dir) = run(&bytes);
        assert!(matches!(
            outcome,
            DecryptOutcome::Failed(DecryptFailure::Unsupported(_))
        ));
    }

    #[test]
    fn test_compound_file_without_workbook_is_corrupt() {
        let bytes = compound_file(&[("WordDocument", vec![0u8; 32])]);
        let (outcome, _dir) = run(&bytes);
        assert!(matches!(
            outcome,
            DecryptOutcome::Failed(DecryptFailure::Corrupt(_))
        ));
    }

    fn encrypted_package(info: Vec<u8>) -> Vec<u8> {
        compound_file(&[
            ("EncryptionInfo", info),
            ("EncryptedPackage", vec![0u8; 64]),
        ])
    }

    #[test]
    fn test_unknown_encryption_version_is_unsupported() {
        let (outcome, dir) = run(&encrypted_package(vec![9, 9, 9, 9, 0, 0]));
        assert!(matches!(
            outcome,
            DecryptOutcome::Failed(DecryptFailure::Unsupported(_))
        ));
        assert!(!dir.path().join("out.xlsx").exists());
    }

    #[test]
    fn test_truncated_encryption_info_is_corrupt() {
        let (outcome, _dir) = run(&encrypted_package(vec![4, 0]));
        assert!(matches!(
            outcome,
            DecryptOutcome::Failed(DecryptFailure::Corrupt(_))
        ));
    }

    #[test]
    fn test_known_encryption_versions() {
        assert!(is_known_encryption_version([4, 0, 4, 0]));
        assert!(is_known_encryption_version([2, 0, 2, 0]));
        assert!(is_known_encryption_version([3, 0, 2, 0]));
        assert!(is_known_encryption_version([4, 0, 2, 0]));
        assert!(!is_known_encryption_version([9, 9, 9, 9]));
        assert!(!is_known_encryption_version([4, 0, 3, 0]));
        assert!(!is_known_encryption_version([1, 0, 2, 0]));
    }

    #[test]
    fn test_missing_input_is_io_failure() {
        let dir = TempDir::new().unwrap();
        let outcome = OfficeDecryptor::new().decrypt(
            &dir.path().join("missing.xlsx"),
            &dir.path().join("out.xlsx"),
            "pw",
        );
        assert!(matches!(outcome, DecryptOutcome::Failed(DecryptFailure::Io(_))));
    }

    #[test]
    fn test_filepass_scan_stops_at_globals_eof() {
        let mut stream = biff_workbook(false);
        stream.extend(record(RECORD_BOF_BIFF8, &[0u8; 16]));
        stream.extend(record(RECORD_FILEPASS, &[0u8; 6]));
        assert!(!has_filepass_record(&stream));
        assert!(!has_filepass_record(&record(RECORD_FILEPASS, &[])));
        assert!(has_filepass_record(&biff_workbook(true)));
    }
}
