//! Where the pipeline reports stage transitions.

use async_trait::async_trait;
use tracing::warn;

use roboseg_models::StatusEvent;
use roboseg_queue::StatusChannel;

/// Receives a [`StatusEvent`] at every pipeline stage transition.
///
/// Publishing is best-effort: a sink must never fail the pipeline.
#[async_trait]
pub trait StatusSink: Send + Sync {
    async fn publish(&self, event: StatusEvent);
}

/// Publishes events on the task's Redis status channel.
pub struct RedisStatusSink {
    channel: StatusChannel,
}

impl RedisStatusSink {
    pub fn new(channel: StatusChannel) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl StatusSink for RedisStatusSink {
    async fn publish(&self, event: StatusEvent) {
        if let Err(e) = self.channel.publish(&event).await {
            warn!(
                task_id = %event.task_id,
                stage = %event.stage,
                "Failed to publish status event: {}", e
            );
        }
    }
}
