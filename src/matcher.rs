use crate::credentials::{CredentialRecord, CredentialTable};
use crate::policy::PolicyTable;
use serde::Serialize;
use std::fmt;
use tracing::debug;

/// Which records a file may belong to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Scope {
    All,
    Platform(String),
}

impl Scope {
    pub fn platform(&self) -> Option<&str> {
        match self {
            Scope::All => None,
            Scope::Platform(name) => Some(name),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::All => write!(f, "all"),
            Scope::Platform(name) => write!(f, "{}", name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MatchedBy {
    AccountToken,
    DisplayName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchResult<'a> {
    pub candidate: &'a CredentialRecord,
    pub matched_by: MatchedBy,
}

/// Finds the credential records a filename belongs to.
pub struct CandidateMatcher<'a> {
    table: &'a CredentialTable,
    policy: &'a PolicyTable,
}

impl<'a> CandidateMatcher<'a> {
    pub fn new(table: &'a CredentialTable, policy: &'a PolicyTable) -> Self {
        Self { table, policy }
    }

    /// The scope after marker redirects. A marker overrides whatever the caller passed.
    pub fn effective_scope(&self, filename: &str, scope: &Scope) -> Scope {
        match self.policy.redirect_for(filename) {
            Some(platform) => {
                debug!(file = filename, platform, "marker redirect");
                Scope::Platform(platform.to_string())
            }
            None => scope.clone(),
        }
    }

    pub fn find_candidates(&self, filename: &str, scope: &Scope) -> Vec<MatchResult<'a>> {
        let scope = self.effective_scope(filename, scope);
        let table = self.table;

        let scoped: Vec<&'a CredentialRecord> = match scope {
            Scope::All => table.records().iter().collect(),
            Scope::Platform(ref platform) => table.platform_records(platform).collect(),
        };

        let by_token = scoped
            .iter()
            .filter(|record| token_hit(record, filename))
            .map(|record| MatchResult {
                candidate: *record,
                matched_by: MatchedBy::AccountToken,
            });

        let by_name = scoped
            .iter()
            .filter(|record| !token_hit(record, filename) && name_hit(record, filename))
            .map(|record| MatchResult {
                candidate: *record,
                matched_by: MatchedBy::DisplayName,
            });

        let candidates: Vec<MatchResult<'a>> = by_token.chain(by_name).collect();
        debug!(
            file = filename,
            scope = %scope,
            candidates = candidates.len(),
            "candidate search"
        );
        candidates
    }
}

fn token_hit(record: &CredentialRecord, filename: &str) -> bool {
    !record.account_token.is_empty() && filename.contains(record.account_token.as_str())
}

fn name_hit(record: &CredentialRecord, filename: &str) -> bool {
    !record.display_name.is_empty() && filename.contains(record.display_name.as_str())
}

/// Moves the candidate with `account_token` to the front, keeping the others in order.
pub fn prefer_account(candidates: &mut [MatchResult<'_>], account_token: &str) {
    if let Some(pos) = candidates
        .iter()
        .position(|m| m.candidate.account_token == account_token)
    {
        candidates[..=pos].rotate_right(1);
    }
}
