//! Run metadata records: `org`, `runtag` and free-form fields.

use std::collections::HashSet;

use serde_json::Value;
use tracing::warn;
use veil_model::{DataIssue, IssueType};

use crate::error::Result;
use crate::session::{Location, Session};

#[derive(Debug, Default)]
pub struct MetadataTransformer {
    warned_team_mismatch: HashSet<(String, String)>,
    warned_new_runs: HashSet<String>,
}

impl MetadataTransformer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transforms one metadata line; `Ok(None)` when it could not be parsed.
    pub fn transform_line(
        &mut self,
        session: &mut Session,
        line: &str,
        location: Location<'_>,
    ) -> Result<Option<String>> {
        let mut record: Value = match serde_json::from_str(line) {
            Ok(record) => record,
            Err(error) => {
                let message = format!("JSON parse error: {error}");
                session.issues.add(
                    DataIssue::new(IssueType::ParseError, location.file, message)
                        .with_line(location.line),
                );
                return Ok(None);
            }
        };
        let Some(fields) = record.as_object_mut() else {
            let message = "Metadata line is not a JSON object";
            session.issues.add(
                DataIssue::new(IssueType::ParseError, location.file, message)
                    .with_line(location.line),
            );
            return Ok(None);
        };

        let org = text_field(fields.get("org"));
        let runtag = text_field(fields.get("runtag"));

        if let Some(org) = org {
            if let Some(runtag) = runtag.as_deref() {
                let mismatch = session
                    .mapping
                    .get_run_team(runtag)
                    .is_some_and(|team| team != org);
                if mismatch
                    && self
                        .warned_team_mismatch
                        .insert((org.clone(), location.task.to_string()))
                {
                    warn!(task = location.task, "metadata org differs from the team seen in runs");
                }
            }
            let pseudonym = session.mapping.get_or_create_team(&org)?;
            fields.insert("org".to_string(), Value::String(pseudonym));
        }

        if let Some(runtag) = runtag {
            if session.mapping.get_run(&runtag)?.is_none()
                && self.warned_new_runs.insert(runtag.clone())
            {
                warn!(
                    task = location.task,
                    file = location.file,
                    "Creating run mapping from metadata (not seen in runs/)"
                );
            }
            let pseudonym = session.mapping.get_or_create_run(&runtag)?;
            fields.insert("runtag".to_string(), Value::String(pseudonym));
        }

        session.scan_email_fields(fields, "", location);
        Ok(Some(serde_json::to_string(&record)?))
    }
}

/// Run tag of a metadata line, used for priority filtering.
pub fn metadata_runtag(line: &str) -> Option<String> {
    let record: Value = serde_json::from_str(line).ok()?;
    text_field(record.get("runtag"))
}

fn text_field(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}
