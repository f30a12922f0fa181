//! Persisted repair rules for malformed fields.

use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;
use tracing::debug;
use veil_model::{ExpectedType, RepairAction, RepairRule, json_type_name};

use crate::error::Result;
use crate::hash::pattern_hash;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS repair_rules (
    pattern_hash TEXT NOT NULL,
    team_scope TEXT NOT NULL DEFAULT '',
    field_path TEXT NOT NULL,
    original_type TEXT NOT NULL,
    expected_type TEXT NOT NULL,
    action TEXT NOT NULL,
    params TEXT NOT NULL,
    sample_value TEXT,
    created_at TEXT NOT NULL,
    PRIMARY KEY (pattern_hash, team_scope)
);
";

/// Longest stored sample value, in characters.
const SAMPLE_CHARS: usize = 200;

/// Repair rules keyed by pattern hash and team scope.
///
/// Global rules use an empty scope. Lookups prefer a team-scoped rule over
/// the global one.
pub struct RepairStore {
    conn: Connection,
}

impl RepairStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn get_rule(
        &self,
        field_path: &str,
        value: &Value,
        team_id: Option<&str>,
    ) -> Result<Option<RepairRule>> {
        let hash = pattern_hash(field_path, value);
        if let Some(team) = team_id.filter(|team| !team.is_empty())
            && let Some(rule) = self.rule_for_scope(&hash, team)?
        {
            return Ok(Some(rule));
        }
        self.rule_for_scope(&hash, "")
    }

    fn rule_for_scope(&self, hash: &str, scope: &str) -> Result<Option<RepairRule>> {
        let params_json: Option<String> = self
            .conn
            .query_row(
                "SELECT params FROM repair_rules WHERE pattern_hash = ?1 AND team_scope = ?2",
                params![hash, scope],
                |row| row.get(0),
            )
            .optional()?;
        match params_json {
            Some(json) => {
                let rule: RepairRule = serde_json::from_str(&json)?;
                debug!(pattern = hash, action = rule.action.name(), "matched repair rule");
                Ok(Some(rule))
            }
            None => Ok(None),
        }
    }

    /// Saves (or replaces) a rule, keeping a truncated sample of the value.
    pub fn save_rule(&self, rule: &RepairRule, sample: Option<&Value>) -> Result<()> {
        let sample = sample.map(|value| {
            value
                .to_string()
                .chars()
                .take(SAMPLE_CHARS)
                .collect::<String>()
        });
        self.conn.execute(
            "INSERT OR REPLACE INTO repair_rules
             (pattern_hash, team_scope, field_path, original_type, expected_type,
              action, params, sample_value, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                rule.pattern_hash,
                rule.team_id.as_deref().unwrap_or(""),
                rule.field_path,
                rule.original_type,
                rule.expected_type.as_str(),
                rule.action.name(),
                serde_json::to_string(rule)?,
                sample,
                chrono::Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }

    pub fn all_rules(&self) -> Result<Vec<RepairRule>> {
        let mut stmt = self
            .conn
            .prepare("SELECT params FROM repair_rules ORDER BY field_path, team_scope")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut rules = Vec::new();
        for row in rows {
            rules.push(serde_json::from_str(&row?)?);
        }
        Ok(rules)
    }
}

/// A candidate repair offered to the decision callback.
#[derive(Debug, Clone, PartialEq)]
pub struct RepairOption {
    pub description: String,
    pub rule: RepairRule,
}

/// Candidate repairs for a value at `field_path`, most specific first.
///
/// Objects offer one extraction per string-valued key, then stringify.
/// Every value also offers dropping the field and skipping the record.
pub fn suggest_repair_options(
    field_path: &str,
    value: &Value,
    expected: ExpectedType,
) -> Vec<RepairOption> {
    let hash = pattern_hash(field_path, value);
    let original_type = json_type_name(value);
    let rule = |action: RepairAction| RepairRule {
        pattern_hash: hash.clone(),
        field_path: field_path.to_string(),
        original_type: original_type.to_string(),
        expected_type: expected,
        action,
        team_id: None,
    };

    let mut actions = Vec::new();
    if let Value::Object(object) = value {
        for (key, member) in object {
            if member.is_string() {
                actions.push(RepairAction::ExtractKey { key: key.clone() });
            }
        }
    }
    if matches!(value, Value::Object(_) | Value::Array(_)) && expected == ExpectedType::Str {
        actions.push(RepairAction::Stringify);
    }
    actions.push(RepairAction::DropField);
    actions.push(RepairAction::SkipRecord);

    actions
        .into_iter()
        .map(|action| {
            let rule = rule(action);
            RepairOption {
                description: rule.describe(),
                rule,
            }
        })
        .collect()
}
