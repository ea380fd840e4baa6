pub mod loader;
pub mod table;

pub use loader::load_credentials;
pub use table::{ArchiveCredential, CredentialRecord, CredentialTable, SharedPassword};
