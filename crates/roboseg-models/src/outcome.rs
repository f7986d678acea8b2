//! Task outcome persisted for result retrieval.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::segment::SegmentationResult;

/// Result of one segmentation task.
///
/// Serializes to exactly one of
/// `{"action_segments": [...], "downloaded_video_path"?: "..."}` or
/// `{"error": "..."}`; the result-retrieval layer depends on this shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum TaskOutcome {
    Success(SegmentationResult),
    Failure { error: String },
}

impl TaskOutcome {
    pub fn failure(error: impl Into<String>) -> Self {
        Self::Failure {
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success(_))
    }

    /// Segmentation result, if the task succeeded.
    pub fn result(&self) -> Option<&SegmentationResult> {
        match self {
            TaskOutcome::Success(result) => Some(result),
            TaskOutcome::Failure { .. } => None,
        }
    }

    /// Error message, if the task failed.
    pub fn error(&self) -> Option<&str> {
        match self {
            TaskOutcome::Success(_) => None,
            TaskOutcome::Failure { error } => Some(error),
        }
    }
}

impl From<SegmentationResult> for TaskOutcome {
    fn from(result: SegmentationResult) -> Self {
        TaskOutcome::Success(result)
    }
}
