//! Action segment models.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One labeled time interval of robot activity.
///
/// Times are `HH:MM:SS.mmm` strings and stay opaque to the backend;
/// format checks happen only at the validation boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ActionSegment {
    /// Start of the action (e.g. `00:01:12.345`)
    pub start_time: String,
    /// End of the action (e.g. `00:01:15.678`)
    pub end_time: String,
    /// Description of the robot action
    pub action: String,
}

impl ActionSegment {
    pub fn new(
        start_time: impl Into<String>,
        end_time: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            start_time: start_time.into(),
            end_time: end_time.into(),
            action: action.into(),
        }
    }
}

/// Ordered action segments for one video.
///
/// Segment order is the order the model returned them in; it is never
/// re-sorted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(deny_unknown_fields)]
pub struct SegmentationResult {
    pub action_segments: Vec<ActionSegment>,
    /// Server-relative path of a video downloaded from a URL source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloaded_video_path: Option<String>,
}

impl SegmentationResult {
    pub fn new(action_segments: Vec<ActionSegment>) -> Self {
        Self {
            action_segments,
            downloaded_video_path: None,
        }
    }

    /// Attach the path of the locally downloaded source video.
    pub fn with_downloaded_video_path(mut self, path: impl Into<String>) -> Self {
        self.downloaded_video_path = Some(path.into());
        self
    }

    pub fn len(&self) -> usize {
        self.action_segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.action_segments.is_empty()
    }
}
