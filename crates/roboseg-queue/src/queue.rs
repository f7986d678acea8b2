//! Task queue using Redis Streams.

use std::time::Duration;

use redis::AsyncCommands;
use tracing::{debug, info, warn};

use roboseg_models::SegmentationTask;

use crate::error::{QueueError, QueueResult};

/// Stream entry field holding the task JSON.
const TASK_FIELD: &str = "task";

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Redis URL
    pub redis_url: String,
    /// Stream name for tasks
    pub stream_name: String,
    /// Consumer group name
    pub consumer_group: String,
    /// How long stored outcomes and status snapshots live
    pub result_ttl: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            stream_name: "roboseg:tasks".to_string(),
            consumer_group: "roboseg:workers".to_string(),
            result_ttl: Duration::from_secs(86400),
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            stream_name: std::env::var("QUEUE_STREAM")
                .unwrap_or_else(|_| "roboseg:tasks".to_string()),
            consumer_group: std::env::var("QUEUE_CONSUMER_GROUP")
                .unwrap_or_else(|_| "roboseg:workers".to_string()),
            result_ttl: Duration::from_secs(
                std::env::var("RESULT_TTL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(86400),
            ),
        }
    }
}

/// Segmentation task queue client.
pub struct TaskQueue {
    client: redis::Client,
    config: QueueConfig,
}

impl TaskQueue {
    /// Create a new task queue.
    pub fn new(config: QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> QueueResult<Self> {
        Self::new(QueueConfig::from_env())
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Initialize the queue (create consumer group if not exists).
    pub async fn init(&self) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        // Create consumer group (ignore error if already exists)
        let result: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(_) => info!("Created consumer group: {}", self.config.consumer_group),
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!("Consumer group already exists: {}", self.config.consumer_group);
            }
            Err(e) => return Err(QueueError::Redis(e)),
        }

        Ok(())
    }

    /// Enqueue a task. Tasks without a usable source are rejected here
    /// rather than by a worker.
    pub async fn enqueue(&self, task: &SegmentationTask) -> QueueResult<String> {
        task.validate()
            .map_err(|e| QueueError::InvalidTask(e.to_string()))?;

        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload = serde_json::to_string(task)?;

        let message_id: String = redis::cmd("XADD")
            .arg(&self.config.stream_name)
            .arg("*")
            .arg(TASK_FIELD)
            .arg(&payload)
            .query_async(&mut conn)
            .await
            .map_err(|e| QueueError::enqueue_failed(e.to_string()))?;

        info!(task_id = %task.task_id, message_id = %message_id, "Enqueued segmentation task");
        Ok(message_id)
    }

    /// Acknowledge a task (its outcome has been stored).
    pub async fn ack(&self, message_id: &str) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        redis::cmd("XACK")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        // Delete the message from the stream
        redis::cmd("XDEL")
            .arg(&self.config.stream_name)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        debug!("Acknowledged task message: {}", message_id);
        Ok(())
    }

    /// Get queue length.
    pub async fn len(&self) -> QueueResult<u64> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let len: u64 = conn.xlen(&self.config.stream_name).await?;
        Ok(len)
    }

    /// Consume new tasks from the queue as `(message_id, task)` pairs.
    pub async fn consume(
        &self,
        consumer_name: &str,
        block_ms: u64,
        count: usize,
    ) -> QueueResult<Vec<(String, SegmentationTask)>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let result: redis::streams::StreamReadReply = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.config.consumer_group)
            .arg(consumer_name)
            .arg("COUNT")
            .arg(count)
            .arg("BLOCK")
            .arg(block_ms)
            .arg("STREAMS")
            .arg(&self.config.stream_name)
            .arg(">") // Only new messages
            .query_async(&mut conn)
            .await?;

        let mut tasks = Vec::new();
        for stream_key in result.keys {
            for entry in stream_key.ids {
                if let Some(task) = self.decode_entry(&entry).await {
                    debug!(task_id = %task.task_id, "Consumed task from stream");
                    tasks.push((entry.id.clone(), task));
                }
            }
        }

        Ok(tasks)
    }

    /// Claim pending tasks that have been idle for too long.
    /// This recovers tasks from crashed workers.
    pub async fn claim_pending(
        &self,
        consumer_name: &str,
        min_idle_ms: u64,
        count: usize,
    ) -> QueueResult<Vec<(String, SegmentationTask)>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let pending: redis::streams::StreamPendingReply = redis::cmd("XPENDING")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .query_async(&mut conn)
            .await?;

        if pending.count() == 0 {
            return Ok(Vec::new());
        }

        let idle: redis::streams::StreamPendingCountReply = conn
            .xpending_count(
                &self.config.stream_name,
                &self.config.consumer_group,
                "-",
                "+",
                count,
            )
            .await?;

        let stale_ids: Vec<String> = idle
            .ids
            .into_iter()
            .filter(|p| p.last_delivered_ms as u64 >= min_idle_ms)
            .map(|p| p.id)
            .collect();

        if stale_ids.is_empty() {
            return Ok(Vec::new());
        }

        let result: redis::streams::StreamClaimReply = conn
            .xclaim(
                &self.config.stream_name,
                &self.config.consumer_group,
                consumer_name,
                min_idle_ms,
                &stale_ids,
            )
            .await?;

        let mut tasks = Vec::new();
        for entry in result.ids {
            if let Some(task) = self.decode_entry(&entry).await {
                info!(task_id = %task.task_id, "Claimed pending task from stream");
                tasks.push((entry.id.clone(), task));
            }
        }

        Ok(tasks)
    }

    /// Decode a stream entry. Malformed entries are acked so they are
    /// not redelivered forever.
    async fn decode_entry(&self, entry: &redis::streams::StreamId) -> Option<SegmentationTask> {
        let decoded = match entry.map.get(TASK_FIELD) {
            Some(redis::Value::BulkString(payload)) => decode_task(payload),
            _ => Err(QueueError::InvalidTask("missing task field".to_string())),
        };

        match decoded {
            Ok(task) => Some(task),
            Err(e) => {
                warn!(message_id = %entry.id, "Dropping malformed task entry: {}", e);
                self.ack(&entry.id).await.ok();
                None
            }
        }
    }
}

/// Parse a task payload from a stream entry.
pub fn decode_task(payload: &[u8]) -> QueueResult<SegmentationTask> {
    let task: SegmentationTask = serde_json::from_slice(payload)?;
    task.validate()
        .map_err(|e| QueueError::InvalidTask(e.to_string()))?;
    Ok(task)
}
