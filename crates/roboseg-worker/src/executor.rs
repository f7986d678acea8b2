//! Task executor.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use roboseg_models::{SegmentationTask, TaskId, TaskOutcome};
use roboseg_queue::{QueueResult, ResultStore, TaskQueue};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::pipeline::SegmentationPipeline;

/// Where finished task outcomes are persisted.
#[async_trait]
pub trait OutcomeStore: Send + Sync {
    async fn store(&self, task_id: &TaskId, outcome: &TaskOutcome) -> QueueResult<()>;
}

#[async_trait]
impl OutcomeStore for ResultStore {
    async fn store(&self, task_id: &TaskId, outcome: &TaskOutcome) -> QueueResult<()> {
        ResultStore::store(self, task_id, outcome).await
    }
}

/// Acknowledges a delivered queue entry.
#[async_trait]
pub trait Acknowledger: Send + Sync {
    async fn ack(&self, message_id: &str) -> QueueResult<()>;
}

#[async_trait]
impl Acknowledger for TaskQueue {
    async fn ack(&self, message_id: &str) -> QueueResult<()> {
        TaskQueue::ack(self, message_id).await
    }
}

/// Run one task, persist its outcome, then ack. Returns whether the entry
/// was acked.
///
/// An entry whose outcome could not be stored is left pending so another
/// worker reclaims it.
pub async fn settle_task(
    pipeline: &SegmentationPipeline,
    store: &dyn OutcomeStore,
    acker: &dyn Acknowledger,
    task_timeout: Duration,
    message_id: &str,
    task: &SegmentationTask,
) -> bool {
    let task_id = &task.task_id;
    info!(task_id = %task_id, "Executing task");

    let outcome = pipeline.run_with_timeout(task, task_timeout).await;
    if outcome.is_success() {
        info!(task_id = %task_id, "Task completed successfully");
    } else {
        warn!(task_id = %task_id, error = ?outcome.error(), "Task failed");
    }

    if let Err(e) = store.store(task_id, &outcome).await {
        error!(task_id = %task_id, "Failed to store task outcome: {}", e);
        return false;
    }

    match acker.ack(message_id).await {
        Ok(()) => true,
        Err(e) => {
            error!(task_id = %task_id, "Failed to ack task: {}", e);
            false
        }
    }
}

/// Shared state handed to every spawned task.
struct TaskContext {
    pipeline: Arc<SegmentationPipeline>,
    queue: Arc<TaskQueue>,
    results: Arc<ResultStore>,
    task_timeout: Duration,
}

/// Task executor that runs segmentation tasks from the queue.
pub struct TaskExecutor {
    config: WorkerConfig,
    ctx: Arc<TaskContext>,
    task_semaphore: Arc<Semaphore>,
    shutdown: tokio::sync::watch::Sender<bool>,
    consumer_name: String,
}

impl TaskExecutor {
    /// Create a new task executor.
    pub fn new(
        config: WorkerConfig,
        queue: TaskQueue,
        results: ResultStore,
        pipeline: SegmentationPipeline,
    ) -> Self {
        let task_semaphore = Arc::new(Semaphore::new(config.max_concurrent_tasks));
        let (shutdown, _) = tokio::sync::watch::channel(false);
        let consumer_name = format!("worker-{}", Uuid::new_v4());

        let ctx = Arc::new(TaskContext {
            pipeline: Arc::new(pipeline),
            queue: Arc::new(queue),
            results: Arc::new(results),
            task_timeout: config.task_timeout,
        });

        Self {
            config,
            ctx,
            task_semaphore,
            shutdown,
            consumer_name,
        }
    }

    pub fn consumer_name(&self) -> &str {
        &self.consumer_name
    }

    /// Start the executor. Returns after shutdown once in-flight tasks have
    /// finished or `shutdown_timeout` has passed.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            "Starting task executor '{}' with {} max concurrent tasks",
            self.consumer_name, self.config.max_concurrent_tasks
        );

        self.ctx.queue.init().await?;

        let mut shutdown_rx = self.shutdown.subscribe();
        let claim_task = self.spawn_claim_loop();

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping executor");
                        break;
                    }
                }
                result = self.consume_tasks() => {
                    if let Err(e) = result {
                        error!("Error consuming tasks: {}", e);
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        }

        claim_task.abort();

        info!("Waiting for in-flight tasks to complete...");
        if tokio::time::timeout(self.config.shutdown_timeout, self.wait_for_tasks())
            .await
            .is_err()
        {
            warn!(
                "In-flight tasks still running after {}s, leaving them for reclaim",
                self.config.shutdown_timeout.as_secs()
            );
        }

        info!("Task executor stopped");
        Ok(())
    }

    /// Periodically claim entries left pending by crashed workers.
    fn spawn_claim_loop(&self) -> tokio::task::JoinHandle<()> {
        let ctx = Arc::clone(&self.ctx);
        let consumer_name = self.consumer_name.clone();
        let semaphore = Arc::clone(&self.task_semaphore);
        let mut shutdown_rx = self.shutdown.subscribe();
        let claim_interval = self.config.claim_interval;
        let min_idle_ms = self.config.claim_min_idle.as_millis() as u64;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(claim_interval);
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        let available = semaphore.available_permits();
                        if available == 0 {
                            continue;
                        }

                        match ctx.queue.claim_pending(&consumer_name, min_idle_ms, available).await {
                            Ok(tasks) if !tasks.is_empty() => {
                                info!("Claimed {} pending tasks", tasks.len());
                                for (message_id, task) in tasks {
                                    let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                                        break;
                                    };
                                    let ctx = Arc::clone(&ctx);

                                    tokio::spawn(async move {
                                        let _permit = permit;
                                        Self::execute_task(ctx, message_id, task).await;
                                    });
                                }
                            }
                            Ok(_) => {}
                            Err(e) => {
                                warn!("Failed to claim pending tasks: {}", e);
                            }
                        }
                    }
                }
            }
        })
    }

    /// Consume and run tasks from the queue.
    async fn consume_tasks(&self) -> WorkerResult<()> {
        let available = self.task_semaphore.available_permits();
        if available == 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            return Ok(());
        }

        let tasks = self
            .ctx
            .queue
            .consume(&self.consumer_name, 1000, available.min(5))
            .await?;

        if tasks.is_empty() {
            return Ok(());
        }

        debug!("Consumed {} tasks from queue", tasks.len());

        for (message_id, task) in tasks {
            let ctx = Arc::clone(&self.ctx);
            let permit = Arc::clone(&self.task_semaphore)
                .acquire_owned()
                .await
                .map_err(|_| WorkerError::task_failed("Semaphore closed"))?;

            tokio::spawn(async move {
                let _permit = permit;
                Self::execute_task(ctx, message_id, task).await;
            });
        }

        Ok(())
    }

    async fn execute_task(ctx: Arc<TaskContext>, message_id: String, task: SegmentationTask) {
        settle_task(
            &ctx.pipeline,
            ctx.results.as_ref(),
            ctx.queue.as_ref(),
            ctx.task_timeout,
            &message_id,
            &task,
        )
        .await;
    }

    /// Wait for all in-flight tasks to complete.
    async fn wait_for_tasks(&self) {
        loop {
            let available = self.task_semaphore.available_permits();
            if available == self.config.max_concurrent_tasks {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Handle that can signal shutdown from another task.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            sender: self.shutdown.clone(),
        }
    }
}

/// Cloneable shutdown trigger for a running [`TaskExecutor`].
#[derive(Clone)]
pub struct ShutdownHandle {
    sender: tokio::sync::watch::Sender<bool>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        let _ = self.sender.send(true);
    }
}
