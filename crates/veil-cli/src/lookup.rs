//! Reverse lookups and mapping exports.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::Serialize;
use veil_map::{MappingStore, is_fingerprint};
use veil_model::{FingerprintRecord, IdentifierKind, MappingStats};

/// Separators tried, in order, when a value looks like `team<sep>run`.
const COMPOUND_SEPARATORS: [char; 3] = ['-', '_', '.'];

/// Placeholder for the unresolved half of a compound value.
pub const UNKNOWN_PART: &str = "???";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReverseMatch {
    Fingerprint(FingerprintRecord),
    Exact { kind: IdentifierKind, original: String },
    Compound {
        separator: char,
        team: Option<String>,
        run: Option<String>,
    },
}

impl ReverseMatch {
    /// One-line answer as printed by `reverse-lookup`.
    pub fn render(&self, value: &str) -> String {
        match self {
            Self::Fingerprint(record) => format!(
                "{value} (fingerprint) -> team {}, run {}, topic {}",
                record.original_team, record.original_run, record.topic_id
            ),
            Self::Exact { kind, original } => format!("{value} ({kind}) -> {original}"),
            Self::Compound { separator, team, run } => format!(
                "{value} -> {}{separator}{}",
                team.as_deref().unwrap_or(UNKNOWN_PART),
                run.as_deref().unwrap_or(UNKNOWN_PART)
            ),
        }
    }
}

/// Finds the original behind an anonymized value.
///
/// Fingerprints are looked up first, then exact team and run pseudonyms.
/// Anything else containing a separator is split once and resolved as a
/// team and a run.
///
/// # Errors
///
/// Fails on database errors.
pub fn reverse_lookup(store: &MappingStore, value: &str) -> Result<Option<ReverseMatch>> {
    if is_fingerprint(value)
        && let Some(record) = store.lookup_fingerprint(value)?
    {
        return Ok(Some(ReverseMatch::Fingerprint(record)));
    }
    for kind in [IdentifierKind::Team, IdentifierKind::Run] {
        if let Some(original) = store.reverse(kind, value)? {
            return Ok(Some(ReverseMatch::Exact { kind, original }));
        }
    }
    for separator in COMPOUND_SEPARATORS {
        if let Some((team, run)) = value.split_once(separator) {
            return Ok(Some(ReverseMatch::Compound {
                separator,
                team: store.reverse(IdentifierKind::Team, team)?,
                run: store.reverse(IdentifierKind::Run, run)?,
            }));
        }
    }
    Ok(None)
}

/// Everything `show-mapping` prints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappingDump {
    pub teams: BTreeMap<String, String>,
    pub runs: BTreeMap<String, String>,
    pub stats: MappingStats,
}

impl MappingDump {
    /// # Errors
    ///
    /// Fails on database errors.
    pub fn load(store: &MappingStore) -> Result<Self> {
        Ok(Self {
            teams: store.get_all_team_mappings()?,
            runs: store.get_all_run_mappings()?,
            stats: store.stats()?,
        })
    }

    /// # Errors
    ///
    /// Fails if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("serialize mappings")
    }

    /// `type,original,anonymized` rows, teams first.
    ///
    /// # Errors
    ///
    /// Fails if a row cannot be encoded.
    pub fn to_csv(&self) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(["type", "original", "anonymized"])?;
        let tables = [
            (IdentifierKind::Team, &self.teams),
            (IdentifierKind::Run, &self.runs),
        ];
        for (kind, mappings) in tables {
            for (original, pseudonym) in mappings {
                writer.write_record([kind.as_str(), original.as_str(), pseudonym.as_str()])?;
            }
        }
        let bytes = writer.into_inner().context("flush csv")?;
        String::from_utf8(bytes).context("csv output is not utf-8")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MappingStore {
        let mut store = MappingStore::open_in_memory(Some(3)).expect("store");
        store.get_or_create_team("Team, Inc").expect("team");
        store.get_or_create_run("bm25").expect("run");
        store
    }

    #[test]
    fn exact_and_compound_lookups() {
        let store = store();
        let team = store.get_team("Team, Inc").expect("lookup").expect("team");
        let run = store.get_run("bm25").expect("lookup").expect("run");

        let found = reverse_lookup(&store, &run).expect("lookup").expect("match");
        assert_eq!(found.render(&run), format!("{run} (run) -> bm25"));

        let compound = format!("{team}-{run}");
        let found = reverse_lookup(&store, &compound).expect("lookup").expect("match");
        assert_eq!(found.render(&compound), format!("{compound} -> Team, Inc-bm25"));

        let found = reverse_lookup(&store, "T000_zzz").expect("lookup").expect("match");
        insta::assert_snapshot!(found.render("T000_zzz"), @"T000_zzz -> ???_???");

        assert_eq!(reverse_lookup(&store, "nothing").expect("lookup"), None);
    }

    #[test]
    fn csv_quotes_fields_with_commas() {
        let dump = MappingDump::load(&store()).expect("dump");
        let csv = dump.to_csv().expect("csv");
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "type,original,anonymized");
        assert!(lines[1].starts_with("team,\"Team, Inc\",T"));
        assert!(lines[2].starts_with("run,bm25,"));
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn json_contains_stats() {
        let dump = MappingDump::load(&store()).expect("dump");
        let json = dump.to_json().expect("json");
        let value: serde_json::Value = serde_json::from_str(&json).expect("parse");
        assert_eq!(value["stats"]["teams"], 1);
        assert_eq!(value["stats"]["runs"], 1);
        assert_eq!(value["runs"].as_object().map(serde_json::Map::len), Some(1));
    }
}
