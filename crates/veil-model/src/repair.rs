//! Repair rules for fields whose JSON type does not match expectations.
//!
//! A rule pairs a structural pattern (field path plus value shape) with an
//! action. Rules are evaluated by [`RepairRule::apply`]; custom transforms
//! use the closed [`RepairExpr`] language instead of arbitrary code.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ModelError, Result};

/// JSON type names used in rule descriptions and pattern shapes.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(number) if number.is_i64() || number.is_u64() => "int",
        Value::Number(_) => "float",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

/// Expected type of a checked field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpectedType {
    Str,
    Int,
    List,
    Dict,
}

impl ExpectedType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Str => "str",
            Self::Int => "int",
            Self::List => "list",
            Self::Dict => "dict",
        }
    }

    pub fn matches(self, value: &Value) -> bool {
        match self {
            Self::Str => value.is_string(),
            Self::Int => value.is_i64() || value.is_u64(),
            Self::List => value.is_array(),
            Self::Dict => value.is_object(),
        }
    }
}

/// A restricted transformation language for custom repairs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RepairExpr {
    /// Member of an object.
    Field { key: String },
    /// Element of an array.
    Index { index: usize },
    /// Join the string elements of an array.
    JoinStrings { separator: String },
    /// Compact JSON rendering (strings pass through).
    Stringify,
    Trim,
    Lowercase,
    Literal { text: String },
    /// Apply each step to the previous result.
    Chain { steps: Vec<RepairExpr> },
}

impl RepairExpr {
    pub fn eval(&self, value: &Value) -> Result<Value> {
        match self {
            Self::Field { key } => value
                .as_object()
                .and_then(|object| object.get(key))
                .cloned()
                .ok_or_else(|| {
                    ModelError::Repair(format!("no key '{key}' in {}", json_type_name(value)))
                }),
            Self::Index { index } => value
                .as_array()
                .and_then(|items| items.get(*index))
                .cloned()
                .ok_or_else(|| {
                    let kind = json_type_name(value);
                    ModelError::Repair(format!("no element {index} in {kind}"))
                }),
            Self::JoinStrings { separator } => {
                let items = value.as_array().ok_or_else(|| {
                    ModelError::Repair(format!("cannot join {}", json_type_name(value)))
                })?;
                let parts: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
                Ok(Value::String(parts.join(separator)))
            }
            Self::Stringify => Ok(Value::String(stringify(value))),
            Self::Trim => Ok(map_str(value, |text| text.trim().to_string())),
            Self::Lowercase => Ok(map_str(value, str::to_lowercase)),
            Self::Literal { text } => Ok(Value::String(text.clone())),
            Self::Chain { steps } => steps
                .iter()
                .try_fold(value.clone(), |current, step| step.eval(&current)),
        }
    }
}

fn map_str(value: &Value, apply: impl Fn(&str) -> String) -> Value {
    match value {
        Value::String(text) => Value::String(apply(text)),
        other => Value::String(apply(&stringify(other))),
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// The action a repair rule takes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RepairAction {
    /// Replace an object with the string value of one of its keys.
    ExtractKey { key: String },
    /// Replace the value with its compact JSON rendering.
    Stringify,
    /// Drop the whole record.
    SkipRecord,
    /// Remove the field from its parent.
    DropField,
    CustomExpression { expr: RepairExpr },
}

impl RepairAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ExtractKey { .. } => "extract_key",
            Self::Stringify => "stringify",
            Self::SkipRecord => "skip_record",
            Self::DropField => "drop_field",
            Self::CustomExpression { .. } => "custom_expression",
        }
    }
}

/// What applying a rule means for the containing record.
#[derive(Debug, Clone, PartialEq)]
pub enum RepairOutcome {
    Replace(Value),
    DropField,
    SkipRecord,
}

/// A persisted repair decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairRule {
    pub pattern_hash: String,
    pub field_path: String,
    pub original_type: String,
    pub expected_type: ExpectedType,
    pub action: RepairAction,
    /// `None` applies to every team.
    pub team_id: Option<String>,
}

impl RepairRule {
    pub fn apply(&self, value: &Value) -> Result<RepairOutcome> {
        match &self.action {
            RepairAction::ExtractKey { key } => {
                let extracted = value
                    .as_object()
                    .and_then(|object| object.get(key))
                    .ok_or_else(|| {
                        let field = &self.field_path;
                        ModelError::Repair(format!("key '{key}' missing from {field}"))
                    })?;
                Ok(RepairOutcome::Replace(Value::String(stringify(extracted))))
            }
            RepairAction::Stringify => Ok(RepairOutcome::Replace(Value::String(stringify(value)))),
            RepairAction::SkipRecord => Ok(RepairOutcome::SkipRecord),
            RepairAction::DropField => Ok(RepairOutcome::DropField),
            RepairAction::CustomExpression { expr } => {
                let result = expr.eval(value)?;
                if self.expected_type.matches(&result) {
                    Ok(RepairOutcome::Replace(result))
                } else {
                    Err(ModelError::Repair(format!(
                        "expression produced {} for {}, expected {}",
                        json_type_name(&result),
                        self.field_path,
                        self.expected_type.as_str()
                    )))
                }
            }
        }
    }

    #[must_use]
    pub fn for_team(mut self, team_id: Option<String>) -> Self {
        self.team_id = team_id;
        self
    }

    pub fn describe(&self) -> String {
        match &self.action {
            RepairAction::ExtractKey { key } => {
                format!("Extract '{key}' from {}", self.original_type)
            }
            RepairAction::Stringify => format!("Convert {} to JSON string", self.original_type),
            RepairAction::SkipRecord => "Skip this record".to_string(),
            RepairAction::DropField => format!("Drop {}", self.field_path),
            RepairAction::CustomExpression { expr } => {
                let rendered = serde_json::to_string(expr).unwrap_or_default();
                format!("Apply expression {rendered}")
            }
        }
    }
}

/// Structural shape of a value: object key sets, first-element type of
/// arrays, and plain type names otherwise.
pub fn value_shape(value: &Value) -> String {
    match value {
        Value::Object(object) => format!("dict:{}", sorted_keys(object)),
        Value::Array(items) => match items.first() {
            Some(first) => format!("list:{}", json_type_name(first)),
            None => "list".to_string(),
        },
        other => json_type_name(other).to_string(),
    }
}

fn sorted_keys(object: &Map<String, Value>) -> String {
    let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
    keys.sort_unstable();
    format!("[{}]", keys.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rule(action: RepairAction) -> RepairRule {
        RepairRule {
            pattern_hash: "0123456789abcdef".to_string(),
            field_path: "metadata.narrative".to_string(),
            original_type: "dict".to_string(),
            expected_type: ExpectedType::Str,
            action,
            team_id: None,
        }
    }

    #[test]
    fn extract_key_pulls_string() {
        let outcome = rule(RepairAction::ExtractKey { key: "text".into() })
            .apply(&json!({"text": "hello", "lang": "en"}))
            .expect("apply");
        assert_eq!(outcome, RepairOutcome::Replace(json!("hello")));
    }

    #[test]
    fn extract_key_missing_is_error() {
        let extract = rule(RepairAction::ExtractKey { key: "body".into() });
        let result = extract.apply(&json!({"text": "x"}));
        assert!(result.is_err());
    }

    #[test]
    fn stringify_renders_compact_json() {
        let outcome = rule(RepairAction::Stringify).apply(&json!({"a": 1})).expect("apply");
        assert_eq!(outcome, RepairOutcome::Replace(json!("{\"a\":1}")));
    }

    #[test]
    fn expression_chain_joins_and_lowercases() {
        let expr = RepairExpr::Chain {
            steps: vec![
                RepairExpr::Field { key: "parts".into() },
                RepairExpr::JoinStrings { separator: " ".into() },
                RepairExpr::Lowercase,
            ],
        };
        let outcome = rule(RepairAction::CustomExpression { expr })
            .apply(&json!({"parts": ["A", "Tale", 3]}))
            .expect("apply");
        assert_eq!(outcome, RepairOutcome::Replace(json!("a tale")));
    }

    #[test]
    fn expression_must_yield_expected_type() {
        let expr = RepairExpr::Field { key: "n".into() };
        let result = rule(RepairAction::CustomExpression { expr }).apply(&json!({"n": 4}));
        assert!(result.is_err());
    }

    #[test]
    fn shapes_ignore_key_order() {
        assert_eq!(value_shape(&json!({"b": 1, "a": 2})), "dict:[a,b]");
        assert_eq!(value_shape(&json!(["x"])), "list:str");
        assert_eq!(value_shape(&json!([])), "list");
        assert_eq!(value_shape(&json!(2.5)), "float");
    }

    #[test]
    fn action_serializes_with_tag() {
        let action = RepairAction::ExtractKey { key: "text".into() };
        let json = serde_json::to_value(action).expect("serialize");
        insta::assert_json_snapshot!(json, @r###"
        {
          "action": "extract_key",
          "key": "text"
        }
        "###);
    }
}
