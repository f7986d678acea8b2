//! Status events via Redis Pub/Sub.
//!
//! Every publish also overwrites the task's status snapshot, so a status
//! query reads the last transition instead of probing for a result.

use std::time::Duration;

use redis::AsyncCommands;
use tracing::debug;

use roboseg_models::{StatusEvent, TaskId};

use crate::error::QueueResult;

/// Channel for publishing/subscribing to pipeline status events.
pub struct StatusChannel {
    client: redis::Client,
    snapshot_ttl: Duration,
}

impl StatusChannel {
    /// Create a new status channel.
    pub fn new(redis_url: &str, snapshot_ttl: Duration) -> QueueResult<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self {
            client,
            snapshot_ttl,
        })
    }

    /// Pub/Sub channel name for a task.
    pub fn channel_name(task_id: &TaskId) -> String {
        format!("roboseg:status:{}", task_id)
    }

    /// Key holding the latest status event for a task.
    pub fn snapshot_key(task_id: &TaskId) -> String {
        format!("roboseg:status-snapshot:{}", task_id)
    }

    /// Publish a status event and record it as the latest snapshot.
    pub async fn publish(&self, event: &StatusEvent) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload = serde_json::to_string(event)?;

        conn.set_ex::<_, _, ()>(
            Self::snapshot_key(&event.task_id),
            &payload,
            self.snapshot_ttl.as_secs(),
        )
        .await?;

        let channel = Self::channel_name(&event.task_id);
        debug!(stage = %event.stage, "Publishing status event to {}", channel);
        conn.publish::<_, _, ()>(channel, payload).await?;

        Ok(())
    }

    /// Latest status event for a task, if any.
    pub async fn latest(&self, task_id: &TaskId) -> QueueResult<Option<StatusEvent>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload: Option<String> = conn.get(Self::snapshot_key(task_id)).await?;

        match payload {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    /// Subscribe to status events for a task.
    /// Returns a pinned stream that can be polled with `.next()`.
    pub async fn subscribe(
        &self,
        task_id: &TaskId,
    ) -> QueueResult<std::pin::Pin<Box<dyn futures_util::Stream<Item = StatusEvent> + Send>>> {
        use futures_util::StreamExt;

        let mut pubsub = self.client.get_async_pubsub().await?;
        let channel = Self::channel_name(task_id);

        pubsub.subscribe(&channel).await?;

        let stream = pubsub.into_on_message().filter_map(|msg| async move {
            let payload: String = msg.get_payload().ok()?;
            serde_json::from_str(&payload).ok()
        });

        Ok(Box::pin(stream))
    }
}
