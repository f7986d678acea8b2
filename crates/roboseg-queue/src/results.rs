//! Task outcome storage.

use std::time::Duration;

use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use tracing::debug;

use roboseg_models::{PipelineStage, StatusEvent, TaskId, TaskOutcome, TaskStatus};

use crate::error::QueueResult;
use crate::status::StatusChannel;

/// Stores each task's outcome as the JSON the result-retrieval layer reads.
pub struct ResultStore {
    client: redis::Client,
    ttl: Duration,
}

impl ResultStore {
    pub fn new(redis_url: &str, ttl: Duration) -> QueueResult<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client, ttl })
    }

    pub fn result_key(task_id: &TaskId) -> String {
        format!("roboseg:result:{}", task_id)
    }

    /// Store an outcome, replacing any previous one for the task.
    pub async fn store(&self, task_id: &TaskId, outcome: &TaskOutcome) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload = serde_json::to_string(outcome)?;

        conn.set_ex::<_, _, ()>(Self::result_key(task_id), payload, self.ttl.as_secs())
            .await?;

        debug!(task_id = %task_id, success = outcome.is_success(), "Stored task outcome");
        Ok(())
    }

    pub async fn get(&self, task_id: &TaskId) -> QueueResult<Option<TaskOutcome>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload: Option<String> = conn.get(Self::result_key(task_id)).await?;

        match payload {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    /// Build the status report for a task from its stored outcome and the
    /// latest status event.
    pub async fn report(&self, task_id: &TaskId, status: &StatusChannel) -> QueueResult<TaskReport> {
        let outcome = self.get(task_id).await?;
        let snapshot = status.latest(task_id).await?;
        Ok(TaskReport::from_parts(task_id.clone(), snapshot, outcome))
    }
}

/// What a status query reports for one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskReport {
    pub task_id: TaskId,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<PipelineStage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<TaskOutcome>,
}

impl TaskReport {
    /// Combine the stored outcome and the latest status event.
    ///
    /// A stored outcome is authoritative. A terminal status event without a
    /// stored outcome means the worker has not persisted it yet, so the
    /// task is still reported as processing.
    pub fn from_parts(
        task_id: TaskId,
        snapshot: Option<StatusEvent>,
        outcome: Option<TaskOutcome>,
    ) -> Self {
        let stage = snapshot.as_ref().map(|event| event.stage);

        let status = match (&outcome, &snapshot) {
            (Some(outcome), _) if outcome.is_success() => TaskStatus::Success,
            (Some(_), _) => TaskStatus::Failure,
            (None, Some(event)) if event.status.is_terminal() => TaskStatus::Processing,
            (None, Some(event)) => event.status,
            (None, None) => TaskStatus::Pending,
        };

        Self {
            task_id,
            status,
            stage,
            outcome,
        }
    }
}
