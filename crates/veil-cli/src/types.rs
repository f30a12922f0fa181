use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;
use veil_model::IssueType;

/// Counters for one anonymization run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub files_processed: usize,
    pub lines_processed: usize,
    /// Skipped because of the priority filter.
    pub files_filtered: usize,
    /// Skipped because of an unknown format or unmatched identifier.
    pub files_skipped: usize,
    pub teams: usize,
    pub runs: usize,
    pub fingerprints: usize,
    pub errors: usize,
    pub warnings: usize,
}

#[derive(Debug)]
pub struct AnonymizeResult {
    pub output_dir: PathBuf,
    pub mapping_db: PathBuf,
    pub dry_run: bool,
    pub stats: PipelineStats,
    pub issue_counts: BTreeMap<IssueType, usize>,
    pub emails_found: usize,
    pub error_report: Option<PathBuf>,
    /// Error-class issues were recorded and not allowed.
    pub has_errors: bool,
}
