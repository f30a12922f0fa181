use std::fmt;

use serde::{Deserialize, Serialize};

/// The two identifier namespaces that receive pseudonyms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierKind {
    Team,
    Run,
}

impl IdentifierKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Team => "team",
            Self::Run => "run",
        }
    }
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counts reported by the mapping store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingStats {
    pub teams: usize,
    pub runs: usize,
    pub fingerprints: usize,
    pub invalidated_names: usize,
    pub teams_remaining: usize,
    pub runs_remaining: usize,
}

/// A content fingerprint tied to the identities it was observed under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintRecord {
    pub fingerprint: String,
    pub original_team: String,
    pub original_run: String,
    pub topic_id: String,
    pub anon_team: String,
    pub anon_run: String,
}
