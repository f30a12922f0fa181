//! Collection and reporting of data-quality findings.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use tracing::warn;
use veil_model::{DataIssue, IssueType};

use crate::error::{Result, TransformError};

/// An email address seen in the data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailFinding {
    pub file_path: String,
    pub line_number: Option<usize>,
    pub field_path: String,
    pub email: String,
}

#[derive(Debug, Default)]
pub struct IssueCollector {
    issues: Vec<DataIssue>,
    emails: Vec<EmailFinding>,
}

impl IssueCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, issue: DataIssue) {
        warn!(
            issue_type = issue.issue_type.as_str(),
            file = %issue.file_path,
            line = issue.line_number,
            field = issue.field_path.as_deref(),
            "{}",
            issue.message
        );
        self.issues.push(issue);
    }

    /// Records an email address as both a finding and a warning issue.
    pub fn add_email(&mut self, finding: EmailFinding) {
        let issue = DataIssue::new(
            IssueType::EmailFound,
            finding.file_path.clone(),
            "Email address found",
        )
        .with_line(finding.line_number)
        .with_field(finding.field_path.clone());
        self.add(issue);
        self.emails.push(finding);
    }

    pub fn add_skipped_record(
        &mut self,
        file_path: &str,
        line_number: Option<usize>,
        reason: &str,
    ) {
        let issue = DataIssue::new(IssueType::SkippedRecord, file_path, reason);
        self.add(issue.with_line(line_number));
    }

    pub fn issues(&self) -> &[DataIssue] {
        &self.issues
    }

    pub fn emails(&self) -> &[EmailFinding] {
        &self.emails
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn summary(&self) -> BTreeMap<IssueType, usize> {
        let mut counts = BTreeMap::new();
        for issue in &self.issues {
            *counts.entry(issue.issue_type).or_insert(0) += 1;
        }
        counts
    }

    pub fn error_count(&self) -> usize {
        self.issues.iter().filter(|issue| issue.is_error()).count()
    }

    pub fn warning_count(&self) -> usize {
        self.issues.len() - self.error_count()
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    /// Writes one JSON object per issue.
    pub fn write_report(&self, path: &Path) -> Result<()> {
        let io_err = |source: std::io::Error| TransformError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let mut writer = BufWriter::new(File::create(path).map_err(io_err)?);
        for issue in &self.issues {
            serde_json::to_writer(&mut writer, issue)?;
            writer.write_all(b"\n").map_err(io_err)?;
        }
        writer.flush().map_err(io_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn counts_errors_and_warnings() {
        let mut issues = IssueCollector::new();
        issues.add(DataIssue::new(IssueType::ParseError, "runs/t/a", "bad json"));
        issues.add_skipped_record("runs/t/a", Some(2), "Skipped due to malformed narrative");
        issues.add_email(EmailFinding {
            file_path: "metadata/t/m.jsonl".into(),
            line_number: Some(1),
            field_path: "email".into(),
            email: "a@b.org".into(),
        });
        assert_eq!(issues.error_count(), 1);
        assert_eq!(issues.warning_count(), 2);
        assert_eq!(issues.emails().len(), 1);
        assert_eq!(issues.summary().get(&IssueType::EmailFound), Some(&1));
        assert!(issues.has_errors());
    }

    #[test]
    fn report_is_json_lines() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("out").join("errors.jsonl");
        let mut issues = IssueCollector::new();
        issues.add(DataIssue::new(IssueType::UnknownFormat, "eval/t/x", "Unusual column count: 2"));
        issues.add(
            DataIssue::new(IssueType::ParseError, "runs/t/y", "JSON parse error")
                .with_line(Some(4)),
        );
        issues.write_report(&path).expect("write report");

        let text = std::fs::read_to_string(&path).expect("read report");
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|line| serde_json::from_str(line).expect("json line"))
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["issue_type"], "parse_error");
        assert_eq!(lines[1]["line_number"], 4);
    }
}
