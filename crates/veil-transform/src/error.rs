use std::path::PathBuf;

use thiserror::Error;
use veil_map::MapError;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error(transparent)]
    Map(#[from] MapError),

    #[error("failed to encode record: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to write {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, TransformError>;
