//! Model error types.

use thiserror::Error;

use crate::timestamp::TimestampError;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Video source (file path or URL) not provided.")]
    MissingSource,

    #[error("Invalid timestamp: {0}")]
    Timestamp(#[from] TimestampError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
