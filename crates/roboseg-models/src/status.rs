//! Pipeline stages and status events.
//!
//! The pipeline publishes a [`StatusEvent`] at every stage transition so the
//! task-execution layer can report progress without polling the result
//! backend for a result it cannot see yet.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::task::TaskId;

/// Stage of one pipeline invocation.
///
/// Success moves strictly forward through
/// `Resolving → Uploading → Polling → Generating → Validating`, then
/// `Cleanup → Done`. Any failure jumps straight to `Cleanup → Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Task is waiting for a worker
    #[default]
    Queued,
    Resolving,
    Uploading,
    Polling,
    Generating,
    Validating,
    /// Releasing the remote asset and local files
    Cleanup,
    Done,
    Failed,
}

impl PipelineStage {
    /// Get string representation of the stage.
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Queued => "queued",
            PipelineStage::Resolving => "resolving",
            PipelineStage::Uploading => "uploading",
            PipelineStage::Polling => "polling",
            PipelineStage::Generating => "generating",
            PipelineStage::Validating => "validating",
            PipelineStage::Cleanup => "cleanup",
            PipelineStage::Done => "done",
            PipelineStage::Failed => "failed",
        }
    }

    /// Check if this is a terminal stage (no more transitions expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineStage::Done | PipelineStage::Failed)
    }

    fn forward_rank(&self) -> Option<u8> {
        match self {
            PipelineStage::Queued => Some(0),
            PipelineStage::Resolving => Some(1),
            PipelineStage::Uploading => Some(2),
            PipelineStage::Polling => Some(3),
            PipelineStage::Generating => Some(4),
            PipelineStage::Validating => Some(5),
            _ => None,
        }
    }

    /// Check whether `next` is a legal transition from this stage.
    ///
    /// Forward stages may be skipped (a direct-ingestion URL never uploads),
    /// but never revisited. `Cleanup` is reachable from every non-terminal
    /// stage and is the only way into `Done` or `Failed`.
    pub fn can_transition_to(&self, next: PipelineStage) -> bool {
        match (self, next) {
            (current, _) if current.is_terminal() => false,
            (PipelineStage::Cleanup, PipelineStage::Done | PipelineStage::Failed) => true,
            (PipelineStage::Cleanup, _) => false,
            (_, PipelineStage::Cleanup) => true,
            (current, next) => match (current.forward_rank(), next.forward_rank()) {
                (Some(from), Some(to)) => to > from,
                _ => false,
            },
        }
    }

    /// Coarse task status implied by this stage.
    pub fn task_status(&self) -> TaskStatus {
        match self {
            PipelineStage::Queued => TaskStatus::Pending,
            PipelineStage::Done => TaskStatus::Success,
            PipelineStage::Failed => TaskStatus::Failure,
            _ => TaskStatus::Processing,
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Coarse task status reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    Processing,
    Success,
    Failure,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Success => "success",
            TaskStatus::Failure => "failure",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Success | TaskStatus::Failure)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status transition published by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StatusEvent {
    pub task_id: TaskId,
    pub stage: PipelineStage,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl StatusEvent {
    pub fn new(task_id: TaskId, stage: PipelineStage) -> Self {
        Self {
            task_id,
            stage,
            status: stage.task_status(),
            message: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Event for a freshly enqueued task.
    pub fn queued(task_id: TaskId) -> Self {
        Self::new(task_id, PipelineStage::Queued)
    }
}
