//! Tabular evaluation file formats and classification hints.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Known layouts of whitespace-delimited evaluation files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableFormat {
    /// `run topic metric value`
    Tot,
    /// `run topic metric value` with an integer topic in column 1.
    IrMeasures,
    /// `metric topic value`, no run column.
    TrecEval,
    /// `topic Q0 doc rank score run`
    Ranking,
    Unknown,
}

impl TableFormat {
    pub const KNOWN: [TableFormat; 4] = [
        Self::Tot,
        Self::IrMeasures,
        Self::TrecEval,
        Self::Ranking,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tot => "tot",
            Self::IrMeasures => "ir_measures",
            Self::TrecEval => "trec_eval",
            Self::Ranking => "ranking",
            Self::Unknown => "unknown",
        }
    }

    /// Zero-based columns holding run identifiers.
    pub fn run_id_columns(self) -> &'static [usize] {
        match self {
            Self::Tot | Self::IrMeasures => &[0],
            Self::Ranking => &[5],
            Self::TrecEval | Self::Unknown => &[],
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Tot => "run metric topic value",
            Self::IrMeasures => "run topic metric value (integer topics)",
            Self::TrecEval => "metric topic value",
            Self::Ranking => "topic Q0 doc rank score run",
            Self::Unknown => "unrecognized layout",
        }
    }
}

impl fmt::Display for TableFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TableFormat {
    type Err = ModelError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "tot" => Ok(Self::Tot),
            "ir_measures" => Ok(Self::IrMeasures),
            "trec_eval" => Ok(Self::TrecEval),
            "ranking" => Ok(Self::Ranking),
            "unknown" => Ok(Self::Unknown),
            _ => Err(ModelError::UnknownFormat(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Result of sniffing a tabular file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatHint {
    pub format: TableFormat,
    pub confidence: Confidence,
    pub reason: String,
    pub run_id_columns: Vec<usize>,
    /// The first data row names the columns.
    #[serde(default)]
    pub header: bool,
}

impl FormatHint {
    pub fn new(format: TableFormat, confidence: Confidence, reason: impl Into<String>) -> Self {
        Self {
            format,
            confidence,
            reason: reason.into(),
            run_id_columns: format.run_id_columns().to_vec(),
            header: false,
        }
    }

    #[must_use]
    pub fn with_header(mut self, header: bool) -> Self {
        self.header = header;
        self
    }

    #[must_use]
    pub fn with_columns(mut self, columns: Vec<usize>) -> Self {
        self.run_id_columns = columns;
        self
    }

    /// A hint for a format fixed by configuration rather than sniffing.
    ///
    /// Header detection is separate from the format; callers carry over
    /// the sniffed flag with [`FormatHint::with_header`].
    pub fn declared(format: TableFormat) -> Self {
        Self::new(format, Confidence::High, "declared in configuration")
    }
}
