//! Segmentation task definitions.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{ModelError, ModelResult};

/// Unique identifier for a segmentation task.
///
/// Also names the files a task writes to the shared storage directory,
/// which keeps concurrent tasks collision-free without locking.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    /// Generate a new random task ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A request to segment one video.
///
/// Either `video_path` (an uploaded local file) or `video_url` must be set.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SegmentationTask {
    /// Unique task ID
    pub task_id: TaskId,
    /// Local path of an uploaded video
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_path: Option<String>,
    /// Remote URL of the video
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    /// When the task was created
    pub created_at: DateTime<Utc>,
}

impl SegmentationTask {
    /// Create a task for an uploaded local file.
    pub fn from_upload(task_id: TaskId, video_path: impl Into<String>) -> Self {
        Self {
            task_id,
            video_path: Some(video_path.into()),
            video_url: None,
            created_at: Utc::now(),
        }
    }

    /// Create a task for a remote video URL.
    pub fn from_url(task_id: TaskId, video_url: impl Into<String>) -> Self {
        Self {
            task_id,
            video_path: None,
            video_url: Some(video_url.into()),
            created_at: Utc::now(),
        }
    }

    /// Uploaded path, ignoring blank values.
    pub fn video_path(&self) -> Option<&str> {
        self.video_path.as_deref().filter(|p| !p.trim().is_empty())
    }

    /// Source URL, ignoring blank values.
    pub fn video_url(&self) -> Option<&str> {
        self.video_url.as_deref().filter(|u| !u.trim().is_empty())
    }

    /// Check that at least one video source is present.
    pub fn validate(&self) -> ModelResult<()> {
        if self.video_path().is_none() && self.video_url().is_none() {
            return Err(ModelError::MissingSource);
        }
        Ok(())
    }
}
