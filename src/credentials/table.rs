use serde::Serialize;
use std::collections::HashMap;
use tracing::warn;

/// One merchant account and the passwords known to unlock its reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CredentialRecord {
    pub account_token: String,
    pub display_name: String,
    pub account_id: Option<String>,
    pub platform: Option<String>,
    pub status: Option<String>,
    pub passwords: Vec<String>,
}

impl CredentialRecord {
    pub fn new<T: Into<String>, N: Into<String>>(account_token: T, display_name: N) -> Self {
        Self {
            account_token: account_token.into(),
            display_name: display_name.into(),
            account_id: None,
            platform: None,
            status: None,
            passwords: Vec::new(),
        }
    }

    pub fn with_platform<S: Into<String>>(mut self, platform: S) -> Self {
        self.platform = Some(platform.into());
        self
    }

    pub fn with_account_id<S: Into<String>>(mut self, account_id: S) -> Self {
        self.account_id = Some(account_id.into());
        self
    }

    pub fn with_password<S: Into<String>>(mut self, password: S) -> Self {
        self.passwords.push(password.into());
        self
    }

    pub fn label(&self) -> String {
        format!("{} ({})", self.display_name, self.account_token)
    }
}

/// Password for archives, optionally tied to the account whose reports it wraps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveCredential {
    pub display_name: String,
    pub account_token: Option<String>,
    pub password: String,
}

/// Two records of different platforms declaring the same password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedPassword {
    pub password: String,
    pub first: String,
    pub second: String,
}

/// Immutable credential index: insertion-ordered records, a token index and the
/// per-platform password index.
#[derive(Debug, Default)]
pub struct CredentialTable {
    records: Vec<CredentialRecord>,
    by_token: HashMap<String, usize>,
    by_platform: HashMap<String, Vec<usize>>,
    platform_index: HashMap<String, HashMap<String, usize>>,
    archive_credentials: Vec<ArchiveCredential>,
    duplicate_tokens: Vec<String>,
    shared_passwords: Vec<SharedPassword>,
}

impl CredentialTable {
    pub fn new(records: Vec<CredentialRecord>, archive_credentials: Vec<ArchiveCredential>) -> Self {
        let mut table = Self {
            archive_credentials,
            ..Self::default()
        };

        for record in records {
            if table.by_token.contains_key(&record.account_token) {
                warn!(
                    account = %record.account_token,
                    "duplicate account token, keeping the first record"
                );
                table.duplicate_tokens.push(record.account_token);
                continue;
            }

            let idx = table.records.len();
            table.by_token.insert(record.account_token.clone(), idx);
            if let Some(ref platform) = record.platform {
                table.by_platform.entry(platform.clone()).or_default().push(idx);
            }
            table.records.push(record);
        }

        table.build_platform_index();
        table
    }

    fn build_platform_index(&mut self) {
        let mut owner_of: HashMap<&str, usize> = HashMap::new();

        for (idx, record) in self.records.iter().enumerate() {
            let platform = record.platform.clone().unwrap_or_default();
            for password in &record.passwords {
                if let Some(&other) = owner_of.get(password.as_str()) {
                    let other_record = &self.records[other];
                    if other_record.platform != record.platform {
                        warn!(
                            first = %other_record.account_token,
                            second = %record.account_token,
                            "password shared across platforms"
                        );
                        self.shared_passwords.push(SharedPassword {
                            password: password.clone(),
                            first: other_record.account_token.clone(),
                            second: record.account_token.clone(),
                        });
                    }
                } else {
                    owner_of.insert(password, idx);
                }

                self.platform_index
                    .entry(platform.clone())
                    .or_default()
                    .entry(password.clone())
                    .or_insert(idx);
            }
        }
    }

    pub fn records(&self) -> &[CredentialRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, account_token: &str) -> Option<&CredentialRecord> {
        self.by_token.get(account_token).map(|&idx| &self.records[idx])
    }

    /// Records of one platform, in table order.
    pub fn platform_records<'a>(&'a self, platform: &str) -> impl Iterator<Item = &'a CredentialRecord> + 'a {
        self.by_platform
            .get(platform)
            .into_iter()
            .flatten()
            .map(move |&idx| &self.records[idx])
    }

    /// The record a password unlocks within one platform.
    pub fn record_for_password(&self, platform: &str, password: &str) -> Option<&CredentialRecord> {
        self.platform_index
            .get(platform)
            .and_then(|passwords| passwords.get(password))
            .map(|&idx| &self.records[idx])
    }

    /// Every (password, record) pair of a platform, ordered by record then password order.
    pub fn platform_passwords(&self, platform: &str) -> Vec<(&str, &CredentialRecord)> {
        let mut pairs: Vec<(&str, &CredentialRecord)> = self
            .platform_index
            .get(platform)
            .map(|passwords| {
                passwords
                    .iter()
                    .map(|(password, &idx)| (password.as_str(), &self.records[idx]))
                    .collect()
            })
            .unwrap_or_default();

        pairs.sort_by_key(|(password, record)| {
            let idx = self.by_token[&record.account_token];
            let position = record
                .passwords
                .iter()
                .position(|p| p.as_str() == *password)
                .unwrap_or(usize::MAX);
            (idx, position)
        });
        pairs
    }

    pub fn platforms(&self) -> Vec<&str> {
        let mut platforms: Vec<&str> = self
            .platform_index
            .keys()
            .map(String::as_str)
            .filter(|platform| !platform.is_empty())
            .collect();
        platforms.sort_unstable();
        platforms
    }

    pub fn archive_credentials(&self) -> &[ArchiveCredential] {
        &self.archive_credentials
    }

    pub fn duplicate_tokens(&self) -> &[String] {
        &self.duplicate_tokens
    }

    pub fn cross_platform_passwords(&self) -> &[SharedPassword] {
        &self.shared_passwords
    }
}
