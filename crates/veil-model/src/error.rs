use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("unknown table format: {0}")]
    UnknownFormat(String),
    #[error("report content unavailable: {0}")]
    ReportContent(String),
    #[error("repair failed: {0}")]
    Repair(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;
