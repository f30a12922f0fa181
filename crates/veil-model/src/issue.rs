use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Longest stored `original_value` text, in characters.
pub const MAX_ORIGINAL_VALUE_CHARS: usize = 500;

/// Classification of a data-quality finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    MalformedField,
    EmailFound,
    ParseError,
    UnknownFormat,
    SkippedRecord,
    UnmatchedIdentifier,
}

impl IssueType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MalformedField => "malformed_field",
            Self::EmailFound => "email_found",
            Self::ParseError => "parse_error",
            Self::UnknownFormat => "unknown_format",
            Self::SkippedRecord => "skipped_record",
            Self::UnmatchedIdentifier => "unmatched_identifier",
        }
    }

    /// Error-class issues fail the run unless the caller allows them.
    pub fn is_error(self) -> bool {
        matches!(self, Self::MalformedField | Self::ParseError)
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single finding recorded while transforming a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataIssue {
    pub issue_type: IssueType,
    pub file_path: String,
    pub line_number: Option<usize>,
    pub field_path: Option<String>,
    pub message: String,
    pub original_value: Option<Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, Value>,
    pub timestamp: String,
}

impl DataIssue {
    pub fn new(
        issue_type: IssueType,
        file_path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            issue_type,
            file_path: file_path.into(),
            line_number: None,
            field_path: None,
            message: message.into(),
            original_value: None,
            context: BTreeMap::new(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    #[must_use]
    pub fn with_line(mut self, line_number: Option<usize>) -> Self {
        self.line_number = line_number;
        self
    }

    #[must_use]
    pub fn with_field(mut self, field_path: impl Into<String>) -> Self {
        self.field_path = Some(field_path.into());
        self
    }

    /// Attach the offending value, truncating long renderings.
    #[must_use]
    pub fn with_value(mut self, value: &Value) -> Self {
        self.original_value = Some(truncate_value(value));
        self
    }

    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.issue_type.is_error()
    }
}

/// Strings and structures whose rendering exceeds the cap are replaced by
/// a truncated string with a `...` suffix.
fn truncate_value(value: &Value) -> Value {
    let rendered = match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    };
    if rendered.chars().count() <= MAX_ORIGINAL_VALUE_CHARS {
        return value.clone();
    }
    let mut cut: String = rendered.chars().take(MAX_ORIGINAL_VALUE_CHARS).collect();
    cut.push_str("...");
    Value::String(cut)
}

/// What to do with a string value that contains an email address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailAction {
    /// Replace every address in the value with the redaction marker.
    Redact,
    /// Remove the containing field or sequence element.
    DropField,
    /// Leave the value as it is.
    Keep,
}

impl EmailAction {
    /// Choices offered to a decision callback, recommended first.
    pub const CHOICES: [EmailAction; 3] = [Self::Redact, Self::DropField, Self::Keep];

    pub fn label(self) -> &'static str {
        match self {
            Self::Redact => "Redact the address",
            Self::DropField => "Drop the field",
            Self::Keep => "Keep as-is",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn issue_type_error_classes() {
        assert!(IssueType::MalformedField.is_error());
        assert!(IssueType::ParseError.is_error());
        assert!(!IssueType::EmailFound.is_error());
        assert!(!IssueType::UnknownFormat.is_error());
        assert!(!IssueType::SkippedRecord.is_error());
        assert!(!IssueType::UnmatchedIdentifier.is_error());
    }

    #[test]
    fn long_values_are_truncated() {
        let long = "x".repeat(MAX_ORIGINAL_VALUE_CHARS + 20);
        let issue =
            DataIssue::new(IssueType::ParseError, "runs/t/a", "bad").with_value(&json!(long));
        let Some(Value::String(text)) = issue.original_value else {
            panic!("expected truncated string");
        };
        assert_eq!(text.chars().count(), MAX_ORIGINAL_VALUE_CHARS + 3);
        assert!(text.ends_with("..."));
    }

    #[test]
    fn short_structures_are_kept() {
        let value = json!({"a": [1, 2]});
        let issue = DataIssue::new(IssueType::MalformedField, "f", "m").with_value(&value);
        assert_eq!(issue.original_value, Some(value));
    }

    #[test]
    fn issue_serializes_snake_case_type() {
        let issue = DataIssue::new(IssueType::UnmatchedIdentifier, "eval/t/x", "no run")
            .with_line(Some(3))
            .with_field("metadata.run_id");
        let json = serde_json::to_value(&issue).expect("serialize issue");
        assert_eq!(json["issue_type"], "unmatched_identifier");
        assert_eq!(json["line_number"], 3);
        assert!(json.get("context").is_none());
    }
}
