//! Report records: one JSON object per line.

use std::collections::HashSet;

use serde_json::Value;
use tracing::warn;
use veil_model::{DataIssue, ExpectedType, FingerprintRecord, IssueType};

use crate::error::Result;
use crate::repair::FieldCheck;
use crate::session::{Location, Session};

/// Longest raw line kept in a parse-error issue, in characters.
const PARSE_ERROR_EXCERPT: usize = 200;

/// A transformed record line plus the fingerprint observed for it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordOutput {
    pub line: String,
    pub fingerprint: Option<FingerprintRecord>,
}

/// Rewrites team and run identifiers in report records.
///
/// When the caller knows the record's run from its filename, that run is
/// authoritative: content disagreeing with it is replaced and logged once
/// per `(file, content run, expected run)`.
#[derive(Debug, Default)]
pub struct RecordTransformer {
    warned_mismatches: HashSet<(String, String, String)>,
}

impl RecordTransformer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transforms one line. `Ok(None)` means the record was dropped and the
    /// reason recorded as an issue.
    pub fn transform_line(
        &mut self,
        session: &mut Session,
        line: &str,
        location: Location<'_>,
        expected_run: Option<&str>,
    ) -> Result<Option<RecordOutput>> {
        let mut record: Value = match serde_json::from_str(line) {
            Ok(record) => record,
            Err(error) => {
                let message = format!("JSON parse error: {error}");
                let excerpt: String = line.chars().take(PARSE_ERROR_EXCERPT).collect();
                session.issues.add(
                    DataIssue::new(IssueType::ParseError, location.file, message)
                        .with_line(location.line)
                        .with_value(&Value::String(excerpt)),
                );
                return Ok(None);
            }
        };
        let Some(fields) = record.as_object_mut() else {
            session.issues.add(
                DataIssue::new(IssueType::ParseError, location.file, "Record is not a JSON object")
                    .with_line(location.line),
            );
            return Ok(None);
        };

        let mut fingerprint = None;
        if let Some(Value::Object(metadata)) = fields.get_mut("metadata") {
            metadata.shift_remove("creator");
            let team = scalar(metadata.get("team_id")).unwrap_or_default();

            let check = session.check_field(
                metadata,
                "narrative",
                "metadata.narrative",
                ExpectedType::Str,
                Some(team.as_str()),
                location,
            )?;
            if check == FieldCheck::SkipRecord {
                session.issues.add_skipped_record(
                    location.file,
                    location.line,
                    "Skipped due to malformed narrative",
                );
                return Ok(None);
            }
        }

        let (team, run) = match record.get("metadata").and_then(Value::as_object) {
            Some(metadata) => (
                scalar(metadata.get("team_id")).unwrap_or_default(),
                scalar(metadata.get("run_id")).unwrap_or_default(),
            ),
            None => (String::new(), String::new()),
        };
        let run = match expected_run {
            Some(expected) => {
                if !run.is_empty() && run != expected {
                    self.warn_mismatch(location.file, &run, expected);
                }
                expected.to_string()
            }
            None => run,
        };
        let content = session.report_reader.read(&record).ok();

        if let Some(Value::Object(metadata)) = record.get_mut("metadata") {
            let anon_team = if team.is_empty() {
                String::new()
            } else {
                let pseudonym = session.mapping.get_or_create_team(&team)?;
                metadata.insert("team_id".to_string(), Value::String(pseudonym.clone()));
                pseudonym
            };
            let anon_run = if run.is_empty() {
                String::new()
            } else {
                let pseudonym = session.mapping.get_or_create_run(&run)?;
                metadata.insert("run_id".to_string(), Value::String(pseudonym.clone()));
                pseudonym
            };
            if !team.is_empty() && !run.is_empty() {
                session.mapping.store_run_team(&run, &team);
            }

            if let Some(content) = content
                && !anon_team.is_empty()
                && !anon_run.is_empty()
                && !content.topic_id.is_empty()
                && !content.text.is_empty()
            {
                fingerprint = Some(FingerprintRecord {
                    fingerprint: veil_map::fingerprint(&content.topic_id, &content.text),
                    original_team: team,
                    original_run: run,
                    topic_id: content.topic_id,
                    anon_team,
                    anon_run,
                });
            }

            session.scan_email_fields(metadata, "metadata", location);
        }

        Ok(Some(RecordOutput {
            line: serde_json::to_string(&record)?,
            fingerprint,
        }))
    }

    fn warn_mismatch(&mut self, file: &str, content_run: &str, expected: &str) {
        let key = (file.to_string(), content_run.to_string(), expected.to_string());
        if self.warned_mismatches.insert(key) {
            warn!(file, "run_id in content differs from filename; using filename");
        }
    }
}

fn scalar(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}
