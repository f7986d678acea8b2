//! The video segmentation pipeline.
//!
//! One [`SegmentationPipeline::run`] call takes a task from source
//! resolution through upload, activation, generation and validation, then
//! always runs cleanup. Every failure becomes a `{error}` outcome; nothing
//! escapes the call.

use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use tracing::{debug, error, info, info_span, warn, Instrument, Span};

use roboseg_gemini::{GenerationRequest, InferenceProvider, VideoReference};
use roboseg_models::{
    PipelineStage, SegmentationResult, SegmentationTask, StatusEvent, TaskId, TaskOutcome,
};

use crate::activation::wait_until_active;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::lease::AssetLease;
use crate::metrics;
use crate::prompt::{response_schema, SEGMENTATION_PROMPT};
use crate::source::{is_within_storage, BlobDownloader, ResolvedSource, SourceResolver};
use crate::status::StatusSink;
use crate::validate::parse_segmentation;

/// Span every line of one invocation is logged under.
fn task_span(task_id: &TaskId) -> Span {
    info_span!("task", task_id = %task_id, operation = "segmentation")
}

/// Tracks the current stage and publishes each transition.
struct StageTracker<'a> {
    task_id: &'a TaskId,
    stage: PipelineStage,
    sink: &'a dyn StatusSink,
}

impl<'a> StageTracker<'a> {
    fn new(task_id: &'a TaskId, sink: &'a dyn StatusSink) -> Self {
        Self {
            task_id,
            stage: PipelineStage::Queued,
            sink,
        }
    }

    async fn enter(&mut self, next: PipelineStage, message: Option<String>) {
        debug_assert!(
            self.stage.can_transition_to(next),
            "illegal stage transition {} -> {}",
            self.stage,
            next
        );
        self.stage = next;

        let mut event = StatusEvent::new(self.task_id.clone(), next);
        event.message = message;
        self.sink.publish(event).await;
    }
}

/// The video segmentation pipeline.
pub struct SegmentationPipeline {
    provider: Arc<dyn InferenceProvider>,
    resolver: SourceResolver,
    status: Arc<dyn StatusSink>,
    config: PipelineConfig,
}

impl SegmentationPipeline {
    pub fn new(
        provider: Arc<dyn InferenceProvider>,
        downloader: Arc<dyn BlobDownloader>,
        status: Arc<dyn StatusSink>,
        config: PipelineConfig,
    ) -> Self {
        let resolver = SourceResolver::new(downloader, config.storage_dir.clone());
        Self {
            provider,
            resolver,
            status,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run one task to its outcome.
    pub async fn run(&self, task: &SegmentationTask) -> TaskOutcome {
        let run = AssertUnwindSafe(self.run_inner(task))
            .catch_unwind()
            .instrument(task_span(&task.task_id))
            .await;

        match run {
            Ok(outcome) => outcome,
            Err(panic) => {
                let detail = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "pipeline panicked".to_string());
                let err = PipelineError::unexpected(detail);
                self.abandoned(task, err.kind(), err.to_string()).await
            }
        }
    }

    /// Run one task, giving up after `limit`.
    ///
    /// The timed-out invocation is dropped mid-flight; its asset lease
    /// deletes the remote asset in the background.
    pub async fn run_with_timeout(&self, task: &SegmentationTask, limit: Duration) -> TaskOutcome {
        match tokio::time::timeout(limit, self.run(task)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                let message = format!("Task timed out after {}s", limit.as_secs());
                self.abandoned(task, "timeout", message).await
            }
        }
    }

    /// Finish an invocation that never reached its own cleanup.
    async fn abandoned(&self, task: &SegmentationTask, kind: &'static str, message: String) -> TaskOutcome {
        error!(task_id = %task.task_id, kind, "Task abandoned: {}", message);
        metrics::record_task_failed(kind, 0.0);

        self.remove_uploaded_source(task)
            .instrument(task_span(&task.task_id))
            .await;
        self.status
            .publish(
                StatusEvent::new(task.task_id.clone(), PipelineStage::Failed)
                    .with_message(message.clone()),
            )
            .await;

        TaskOutcome::failure(message)
    }

    async fn run_inner(&self, task: &SegmentationTask) -> TaskOutcome {
        let started = Instant::now();
        info!(source = %describe_source(task), "Task started");

        let mut stages = StageTracker::new(&task.task_id, self.status.as_ref());
        let mut lease: Option<AssetLease> = None;

        let result = self.execute(task, &mut stages, &mut lease).await;

        stages.enter(PipelineStage::Cleanup, None).await;
        if let Some(lease) = lease {
            lease.release().await;
        }
        self.remove_uploaded_source(task).await;

        let elapsed = started.elapsed().as_secs_f64();
        match result {
            Ok((result, source)) => {
                let result = annotate_download(result, &source, &self.config).await;
                stages.enter(PipelineStage::Done, None).await;

                metrics::record_task_completed(elapsed);
                info!(segments = result.len(), "Task completed in {:.1}s", elapsed);
                TaskOutcome::Success(result)
            }
            Err(err) => {
                let message = err.to_string();
                stages
                    .enter(PipelineStage::Failed, Some(message.clone()))
                    .await;

                metrics::record_task_failed(err.kind(), elapsed);
                error!(kind = err.kind(), "Task failed: {}", message);
                TaskOutcome::failure(message)
            }
        }
    }

    async fn execute(
        &self,
        task: &SegmentationTask,
        stages: &mut StageTracker<'_>,
        lease: &mut Option<AssetLease>,
    ) -> PipelineResult<(SegmentationResult, ResolvedSource)> {
        stages.enter(PipelineStage::Resolving, None).await;
        let source = self.resolver.resolve(task).await?;

        let video = match &source {
            ResolvedSource::Direct { url } => VideoReference::direct(url.clone()),
            ResolvedSource::Local { path, .. } => {
                stages.enter(PipelineStage::Uploading, None).await;
                let asset = self.provider.upload(path).await?;
                metrics::record_asset_uploaded();
                *lease = Some(AssetLease::new(Arc::clone(&self.provider), asset.name.clone()));
                info!(asset = %asset.name, state = %asset.state, "Video uploaded");

                stages
                    .enter(PipelineStage::Polling, Some(asset.name.clone()))
                    .await;
                let active =
                    wait_until_active(self.provider.as_ref(), asset, &self.config.activation)
                        .await?;
                active.video_reference()
            }
        };

        stages.enter(PipelineStage::Generating, None).await;
        let request = GenerationRequest::json(video, SEGMENTATION_PROMPT, response_schema());

        let generation_started = Instant::now();
        let response = self.provider.generate(&request).await?;
        metrics::record_generation_duration(generation_started.elapsed().as_secs_f64());

        if response.candidates.is_empty() {
            return Err(PipelineError::EmptyResponse);
        }

        let text = response.text().map_err(|missing| {
            let finish_reason = missing
                .finish_reason
                .unwrap_or_else(|| "UNKNOWN".to_string());
            let ratings: Vec<String> = missing.safety_ratings.iter().map(|r| r.to_string()).collect();
            warn!(
                finish_reason = %finish_reason,
                safety_ratings = %ratings.join(", "),
                prompt_feedback = ?response.prompt_feedback,
                "Model response was blocked or did not return text"
            );

            PipelineError::BlockedResponse {
                finish_reason,
                safety_ratings: missing.safety_ratings,
                prompt_feedback: response.prompt_feedback.clone(),
            }
        })?;
        debug!(raw_response = %text, "Model response received");

        stages.enter(PipelineStage::Validating, None).await;
        let result = parse_segmentation(&text, self.config.strict_timestamps)?;

        Ok((result, source))
    }

    /// Delete the caller-uploaded source file, if any. Best-effort, and
    /// only for files inside the storage directory.
    async fn remove_uploaded_source(&self, task: &SegmentationTask) {
        let Some(path) = task.video_path() else {
            return;
        };

        match is_within_storage(&self.config.storage_dir, Path::new(path)).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(path, "Not deleting video file outside the storage directory");
                return;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return,
            Err(e) => {
                warn!(path, "Failed to inspect uploaded video file: {}", e);
                return;
            }
        }

        match tokio::fs::remove_file(path).await {
            Ok(()) => debug!(path, "Deleted uploaded video file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path, "Failed to delete uploaded video file: {}", e),
        }
    }
}

fn describe_source(task: &SegmentationTask) -> String {
    match (task.video_path(), task.video_url()) {
        (Some(path), Some(url)) => format!("path={} url={}", path, url),
        (Some(path), None) => format!("path={}", path),
        (None, Some(url)) => format!("url={}", url),
        (None, None) => "no source".to_string(),
    }
}

/// Attach `downloaded_video_path` when the source was downloaded and the
/// file is still on disk.
async fn annotate_download(
    result: SegmentationResult,
    source: &ResolvedSource,
    config: &PipelineConfig,
) -> SegmentationResult {
    let ResolvedSource::Local {
        path,
        downloaded: true,
    } = source
    else {
        return result;
    };

    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return result;
    }

    match file_name(path) {
        Some(name) => result.with_downloaded_video_path(config.public_path(&name)),
        None => result,
    }
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
}

impl std::fmt::Debug for SegmentationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentationPipeline")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
