//! Email address detection in nested record values.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use veil_model::{EmailAction, REDACTION_MARKER};

use crate::issues::EmailFinding;
use crate::session::{Location, Session};

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").expect("Invalid email regex")
});

pub fn find_emails(text: &str) -> Vec<&str> {
    EMAIL_REGEX.find_iter(text).map(|found| found.as_str()).collect()
}

pub fn redact_emails(text: &str) -> String {
    EMAIL_REGEX.replace_all(text, REDACTION_MARKER).into_owned()
}

fn child_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

impl Session {
    /// Walks `value`, recording every email address and applying the
    /// decided action. Returns `true` when the value itself should be
    /// removed from its container.
    pub fn scan_emails(&mut self, value: &mut Value, path: &str, location: Location<'_>) -> bool {
        match value {
            Value::String(text) => {
                let found: Vec<String> =
                    find_emails(text).into_iter().map(str::to_string).collect();
                if found.is_empty() {
                    return false;
                }
                for email in found {
                    self.issues.add_email(EmailFinding {
                        file_path: location.file.to_string(),
                        line_number: location.line,
                        field_path: path.to_string(),
                        email,
                    });
                }
                match self.email_action(location.task, path) {
                    EmailAction::Redact => {
                        *text = redact_emails(text);
                        false
                    }
                    EmailAction::DropField => true,
                    EmailAction::Keep => false,
                }
            }
            Value::Object(object) => {
                self.scan_email_fields(object, path, location);
                false
            }
            Value::Array(items) => {
                let mut index = 0;
                items.retain_mut(|item| {
                    let drop = self.scan_emails(item, &format!("{path}[{index}]"), location);
                    index += 1;
                    !drop
                });
                false
            }
            Value::Null | Value::Bool(_) | Value::Number(_) => false,
        }
    }

    /// Scans the members of an object whose own path is `path`.
    pub fn scan_email_fields(
        &mut self,
        object: &mut Map<String, Value>,
        path: &str,
        location: Location<'_>,
    ) {
        let mut dropped = Vec::new();
        for (key, child) in object.iter_mut() {
            if self.scan_emails(child, &child_path(path, key), location) {
                dropped.push(key.clone());
            }
        }
        for key in dropped {
            object.shift_remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decide::ScriptedDecider;
    use serde_json::json;
    use veil_map::{MappingStore, RepairStore};

    fn session(answers: Vec<usize>) -> Session {
        let mapping = MappingStore::open_in_memory(Some(1)).expect("mapping");
        let repairs = RepairStore::open_in_memory().expect("repairs");
        Session::new(mapping, repairs).with_decider(Box::new(ScriptedDecider::new(answers)), false)
    }

    #[test]
    fn finds_all_addresses() {
        assert_eq!(
            find_emails("write a.b@x.org or c+d@y.co.uk"),
            vec!["a.b@x.org", "c+d@y.co.uk"]
        );
        assert!(find_emails("no at-sign here @ all").is_empty());
    }

    #[test]
    fn redacts_in_place_by_default() {
        let mut session = session(vec![]);
        let mut value = json!({"contact": "mail me at a@b.org", "notes": ["x", "c@d.net"]});
        let location = Location::new("task", "metadata/task/m.jsonl", Some(1));
        assert!(!session.scan_emails(&mut value, "", location));
        assert_eq!(value["contact"], "mail me at [REDACTED]");
        assert_eq!(value["notes"][1], "[REDACTED]");
        assert_eq!(session.issues().emails().len(), 2);
        assert_eq!(session.issues().emails()[1].field_path, "notes[1]");
    }

    #[test]
    fn drop_removes_fields_and_elements() {
        let mut session = session(vec![1, 1]);
        let mut value = json!({"email": "a@b.org", "keep": 1, "list": ["ok", "z@y.io"]});
        let location = Location::new("task", "f", None);
        session.scan_emails(&mut value, "", location);
        assert_eq!(value, json!({"keep": 1, "list": ["ok"]}));
    }
}
