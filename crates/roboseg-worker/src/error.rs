//! Pipeline and worker error types.
//!
//! [`PipelineError`]'s `Display` text is exactly the `error` string of a
//! failed task outcome.

use thiserror::Error;

use roboseg_gemini::{AssetState, PromptFeedback, ProviderError, SafetyRating};

pub type PipelineResult<T> = Result<T, PipelineError>;
pub type WorkerResult<T> = Result<T, WorkerError>;

/// No usable video source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("Video source (file path or URL) not provided.")]
    Missing,

    #[error("Video file not found at {0}")]
    FileNotFound(String),

    #[error("Video file {0} is outside the upload directory")]
    OutsideStorage(String),
}

/// Fetching a URL source failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DownloadError {
    #[error("Failed to download video from URL: {0}")]
    Transport(String),

    #[error("URL does not point to a video file. Content-Type: {0}")]
    NotVideo(String),
}

fn reported_error(detail: &Option<String>) -> String {
    detail
        .as_ref()
        .map(|d| format!(" Reported API Error: {}", d))
        .unwrap_or_default()
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0}")]
    NoSource(#[from] SourceError),

    #[error("{0}")]
    Download(#[from] DownloadError),

    #[error("File upload to Gemini failed to become ACTIVE. Final state: {}{}", .state, reported_error(.detail))]
    AssetActivation {
        state: AssetState,
        detail: Option<String>,
    },

    #[error("Gemini response had no candidates.")]
    EmptyResponse,

    #[error("Gemini API response was blocked or did not return text. Finish Reason: {finish_reason}")]
    BlockedResponse {
        finish_reason: String,
        safety_ratings: Vec<SafetyRating>,
        prompt_feedback: Option<PromptFeedback>,
    },

    #[error("Error processing video (API Error): {0}")]
    ProviderApi(String),

    #[error("Failed to parse Gemini response as JSON: {message}")]
    MalformedJson { message: String, raw: String },

    #[error("Gemini response did not match the expected schema: {0}")]
    SchemaValidation(String),

    #[error("Error processing video: {0}")]
    Unexpected(String),
}

impl PipelineError {
    pub fn provider_api(msg: impl Into<String>) -> Self {
        Self::ProviderApi(msg.into())
    }

    pub fn schema_validation(msg: impl Into<String>) -> Self {
        Self::SchemaValidation(msg.into())
    }

    pub fn unexpected(msg: impl Into<String>) -> Self {
        Self::Unexpected(msg.into())
    }

    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::NoSource(_) => "no_source",
            PipelineError::Download(_) => "download",
            PipelineError::AssetActivation { .. } => "asset_activation",
            PipelineError::EmptyResponse => "empty_response",
            PipelineError::BlockedResponse { .. } => "blocked_response",
            PipelineError::ProviderApi(_) => "provider_api",
            PipelineError::MalformedJson { .. } => "malformed_json",
            PipelineError::SchemaValidation(_) => "schema_validation",
            PipelineError::Unexpected(_) => "unexpected",
        }
    }
}

impl From<ProviderError> for PipelineError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Io(e) => PipelineError::Unexpected(e.to_string()),
            other => PipelineError::ProviderApi(other.to_string()),
        }
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Unexpected(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Task failed: {0}")]
    TaskFailed(String),

    #[error("Queue error: {0}")]
    Queue(#[from] roboseg_queue::QueueError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn task_failed(msg: impl Into<String>) -> Self {
        Self::TaskFailed(msg.into())
    }
}
