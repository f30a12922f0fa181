//! Type checks on record fields with remembered repairs.

use serde_json::{Map, Value};
use tracing::info;
use veil_map::suggest_repair_options;
use veil_model::{DataIssue, ExpectedType, IssueType, RepairOutcome, RepairRule, json_type_name};

use crate::error::Result;
use crate::session::{Location, Session};

/// Result of checking one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldCheck {
    /// Absent or already of the expected type.
    Valid,
    Repaired,
    Dropped,
    /// Left as-is and reported.
    Unrepaired,
    /// The whole record should be dropped.
    SkipRecord,
}

impl Session {
    /// Checks `parent[key]` against `expected`, repairing it in place.
    ///
    /// A stored rule (team-scoped first, then global) is applied when one
    /// matches the value's shape. Without a rule, interactive sessions ask
    /// the decision callback and may remember the answer; other sessions
    /// record a `malformed_field` issue and leave the value unchanged.
    pub fn check_field(
        &mut self,
        parent: &mut Map<String, Value>,
        key: &str,
        field_path: &str,
        expected: ExpectedType,
        team: Option<&str>,
        location: Location<'_>,
    ) -> Result<FieldCheck> {
        let value = match parent.get(key) {
            Some(value) if !expected.matches(value) => value.clone(),
            _ => return Ok(FieldCheck::Valid),
        };

        let rule = match self.repairs.get_rule(field_path, &value, team)? {
            Some(rule) => Some(rule),
            None if self.interactive() => {
                Some(self.ask_repair(field_path, &value, expected, team)?)
            }
            None => None,
        };
        let Some(rule) = rule else {
            self.report_malformed(
                field_path,
                &value,
                format!("expected {}, got {}", expected.as_str(), json_type_name(&value)),
                location,
            );
            return Ok(FieldCheck::Unrepaired);
        };

        match rule.apply(&value) {
            Ok(RepairOutcome::Replace(repaired)) => {
                parent.insert(key.to_string(), repaired);
                Ok(FieldCheck::Repaired)
            }
            Ok(RepairOutcome::DropField) => {
                parent.shift_remove(key);
                Ok(FieldCheck::Dropped)
            }
            Ok(RepairOutcome::SkipRecord) => Ok(FieldCheck::SkipRecord),
            Err(error) => {
                self.report_malformed(field_path, &value, error.to_string(), location);
                Ok(FieldCheck::Unrepaired)
            }
        }
    }

    fn report_malformed(
        &mut self,
        field_path: &str,
        value: &Value,
        message: String,
        location: Location<'_>,
    ) {
        self.issues.add(
            DataIssue::new(IssueType::MalformedField, location.file, message)
                .with_line(location.line)
                .with_field(field_path)
                .with_value(value),
        );
    }

    fn ask_repair(
        &mut self,
        field_path: &str,
        value: &Value,
        expected: ExpectedType,
        team: Option<&str>,
    ) -> Result<RepairRule> {
        let options = suggest_repair_options(field_path, value, expected);
        let labels: Vec<String> = options.iter().map(|option| option.description.clone()).collect();
        let prompt = format!(
            "Field '{field_path}' should be {} but is {}. How should it be fixed?",
            expected.as_str(),
            json_type_name(value)
        );
        let choice = self.decide(&prompt, &labels);
        let rule = options[choice].rule.clone();

        let team = team.filter(|team| !team.is_empty());
        let mut scopes: Vec<(String, Option<Option<String>>)> =
            vec![("Remember for all teams".to_string(), Some(None))];
        if let Some(team) = team {
            scopes.push((format!("Remember for team {team} only"), Some(Some(team.to_string()))));
        }
        scopes.push(("Do not remember".to_string(), None));
        let scope_labels: Vec<String> = scopes.iter().map(|(label, _)| label.clone()).collect();
        let scope_choice = self.decide("Remember this fix?", &scope_labels);

        if let Some(team_id) = scopes[scope_choice].1.clone() {
            let scoped = rule.clone().for_team(team_id);
            self.repairs.save_rule(&scoped, Some(value))?;
            info!(
                field = field_path,
                action = scoped.action.name(),
                scope = scoped.team_id.as_deref().unwrap_or("global"),
                "remembered repair rule"
            );
        }
        Ok(rule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decide::ScriptedDecider;
    use serde_json::json;
    use veil_map::{MappingStore, RepairStore};
    use veil_model::RepairAction;

    fn session(answers: Vec<usize>, interactive: bool) -> Session {
        let mapping = MappingStore::open_in_memory(Some(1)).expect("mapping");
        let repairs = RepairStore::open_in_memory().expect("repairs");
        let decider = Box::new(ScriptedDecider::new(answers));
        Session::new(mapping, repairs).with_decider(decider, interactive)
    }

    fn check_narrative(
        session: &mut Session,
        parent: &mut Map<String, Value>,
        team: Option<&str>,
    ) -> FieldCheck {
        session
            .check_field(parent, "narrative", "metadata.narrative", ExpectedType::Str, team, LOC)
            .expect("check")
    }

    fn metadata(value: Value) -> Map<String, Value> {
        match json!({"narrative": value}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    const LOC: Location<'static> = Location {
        task: "task",
        file: "runs/task/r1",
        line: Some(1),
    };

    #[test]
    fn non_interactive_reports_and_keeps_value() {
        let mut session = session(vec![], false);
        let mut parent = metadata(json!({"text": "x"}));
        let check = check_narrative(&mut session, &mut parent, None);
        assert_eq!(check, FieldCheck::Unrepaired);
        assert_eq!(parent["narrative"], json!({"text": "x"}));
        assert_eq!(session.issues().error_count(), 1);
    }

    #[test]
    fn interactive_choice_is_applied_and_remembered() {
        // extract "text", remember globally
        let mut session = session(vec![0, 0], true);
        let mut parent = metadata(json!({"text": "hello"}));
        let check = check_narrative(&mut session, &mut parent, Some("teamA"));
        assert_eq!(check, FieldCheck::Repaired);
        assert_eq!(parent["narrative"], "hello");

        let rule = session
            .repairs()
            .get_rule("metadata.narrative", &json!({"text": "other"}), Some("teamB"))
            .expect("lookup")
            .expect("remembered");
        assert_eq!(rule.action, RepairAction::ExtractKey { key: "text".into() });
        assert_eq!(rule.team_id, None);
    }

    #[test]
    fn stored_rule_applies_without_asking() {
        let mut session = session(vec![], false);
        let value = json!({"text": "a"});
        let skip = suggest_repair_options("metadata.narrative", &value, ExpectedType::Str)
            .into_iter()
            .find(|option| option.rule.action == RepairAction::SkipRecord)
            .expect("skip option");
        session.repairs().save_rule(&skip.rule, None).expect("save");

        let mut parent = metadata(value);
        let check = check_narrative(&mut session, &mut parent, None);
        assert_eq!(check, FieldCheck::SkipRecord);
        assert!(session.issues().is_empty());
    }

    #[test]
    fn matching_type_is_valid() {
        let mut session = session(vec![], true);
        let mut parent = metadata(json!("plain"));
        let check = check_narrative(&mut session, &mut parent, None);
        assert_eq!(check, FieldCheck::Valid);
    }
}
