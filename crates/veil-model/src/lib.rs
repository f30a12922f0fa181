//! Core types shared by the anonymization crates.

pub mod error;
pub mod format;
pub mod issue;
pub mod mapping;
pub mod repair;
pub mod report;

pub use error::{ModelError, Result};
pub use format::{Confidence, FormatHint, TableFormat};
pub use issue::{DataIssue, EmailAction, IssueType, MAX_ORIGINAL_VALUE_CHARS};
pub use mapping::{FingerprintRecord, IdentifierKind, MappingStats};
pub use repair::{
    ExpectedType, RepairAction, RepairExpr, RepairOutcome, RepairRule, json_type_name, value_shape,
};
pub use report::{JsonReportReader, ReportContent, ReportReader};

/// Marker written in place of redacted email addresses.
pub const REDACTION_MARKER: &str = "[REDACTED]";
