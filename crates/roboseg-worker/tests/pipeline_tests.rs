//! End-to-end pipeline tests against a scripted provider.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mockall::mock;

use roboseg_gemini::{
    AssetState, Candidate, GenerationRequest, GenerationResponse, InferenceProvider,
    ProviderError, ProviderResult, RemoteAsset, SafetyRating, VideoReference,
};
use roboseg_models::{PipelineStage, SegmentationTask, StatusEvent, TaskId, TaskOutcome};
use roboseg_worker::{
    ActivationPolicy, BlobDownloader, DownloadError, PipelineConfig, SegmentationPipeline,
    StatusSink,
};

mock! {
    pub Downloader {}

    #[async_trait]
    impl BlobDownloader for Downloader {
        async fn download(&self, url: &str, dest: &Path) -> Result<u64, DownloadError>;
    }
}

const TWO_SEGMENTS: &str = r#"{"action_segments": [
    {"action": "robot gripper picks up red block", "start_time": "00:00:01.000", "end_time": "00:00:03.500"},
    {"action": "robot arm places block in bin", "start_time": "00:00:04.000", "end_time": "00:00:06.250"}
]}"#;

enum Generation {
    Respond(GenerationResponse),
    ApiError,
    Hang,
    Panic,
}

#[derive(Clone, Copy)]
enum DeleteResult {
    Ok,
    NotFound,
    Fail,
}

/// Provider whose asset states and generation result are scripted.
struct ScriptedProvider {
    states: Mutex<Vec<AssetState>>,
    generation: Generation,
    fail_upload: bool,
    fail_get: bool,
    delete_result: DeleteResult,
    uploads: AtomicU32,
    gets: AtomicU32,
    deletes: AtomicU32,
    generations: AtomicU32,
    last_request: Mutex<Option<GenerationRequest>>,
}

impl ScriptedProvider {
    /// `states[0]` is the state returned by upload; each get pops the next.
    fn new(states: &[AssetState], generation: Generation) -> Self {
        Self {
            states: Mutex::new(states.iter().rev().copied().collect()),
            generation,
            fail_upload: false,
            fail_get: false,
            delete_result: DeleteResult::Ok,
            uploads: AtomicU32::new(0),
            gets: AtomicU32::new(0),
            deletes: AtomicU32::new(0),
            generations: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    fn responding(text: &str) -> Self {
        Self::new(
            &[AssetState::Processing, AssetState::Active],
            Generation::Respond(GenerationResponse::from_text(text)),
        )
    }

    fn next_state(&self) -> AssetState {
        let mut states = self.states.lock().unwrap();
        if states.len() > 1 {
            states.pop().unwrap()
        } else {
            states[0]
        }
    }

    fn asset(state: AssetState) -> RemoteAsset {
        RemoteAsset {
            name: "files/robot-clip".to_string(),
            uri: "https://generativelanguage.googleapis.com/v1beta/files/robot-clip".to_string(),
            mime_type: "video/mp4".to_string(),
            state,
            error: None,
        }
    }

    fn uploads(&self) -> u32 {
        self.uploads.load(Ordering::SeqCst)
    }

    fn deletes(&self) -> u32 {
        self.deletes.load(Ordering::SeqCst)
    }

    fn generations(&self) -> u32 {
        self.generations.load(Ordering::SeqCst)
    }

    fn gets(&self) -> u32 {
        self.gets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InferenceProvider for ScriptedProvider {
    async fn upload(&self, path: &Path) -> ProviderResult<RemoteAsset> {
        if self.fail_upload {
            return Err(ProviderError::Api {
                status: 503,
                message: "upload unavailable".to_string(),
            });
        }
        assert!(path.exists(), "uploaded file must exist");
        self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(Self::asset(self.next_state()))
    }

    async fn get(&self, _name: &str) -> ProviderResult<RemoteAsset> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.fail_get {
            return Err(ProviderError::Api {
                status: 500,
                message: "status lookup failed".to_string(),
            });
        }
        Ok(Self::asset(self.next_state()))
    }

    async fn delete(&self, name: &str) -> ProviderResult<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        match self.delete_result {
            DeleteResult::Ok => Ok(()),
            DeleteResult::NotFound => Err(ProviderError::NotFound(name.to_string())),
            DeleteResult::Fail => Err(ProviderError::Api {
                status: 500,
                message: "delete unavailable".to_string(),
            }),
        }
    }

    async fn generate(&self, request: &GenerationRequest) -> ProviderResult<GenerationResponse> {
        self.generations.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());

        match &self.generation {
            Generation::Respond(response) => Ok(response.clone()),
            Generation::ApiError => Err(ProviderError::Api {
                status: 500,
                message: "internal error".to_string(),
            }),
            Generation::Hang => std::future::pending().await,
            Generation::Panic => panic!("provider blew up"),
        }
    }
}

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<StatusEvent>>,
}

impl RecordingSink {
    fn stages(&self) -> Vec<PipelineStage> {
        self.events.lock().unwrap().iter().map(|e| e.stage).collect()
    }
}

#[async_trait]
impl StatusSink for RecordingSink {
    async fn publish(&self, event: StatusEvent) {
        self.events.lock().unwrap().push(event);
    }
}

struct Harness {
    provider: Arc<ScriptedProvider>,
    sink: Arc<RecordingSink>,
    pipeline: SegmentationPipeline,
    storage: tempfile::TempDir,
}

fn harness(provider: ScriptedProvider, downloader: MockDownloader) -> Harness {
    let storage = tempfile::tempdir().unwrap();
    let provider = Arc::new(provider);
    let sink = Arc::new(RecordingSink::default());

    let config = PipelineConfig {
        storage_dir: storage.path().to_path_buf(),
        activation: ActivationPolicy {
            interval: Duration::from_millis(5),
            max_attempts: 3,
        },
        ..PipelineConfig::default()
    };

    let pipeline = SegmentationPipeline::new(
        provider.clone(),
        Arc::new(downloader),
        sink.clone(),
        config,
    );

    Harness {
        provider,
        sink,
        pipeline,
        storage,
    }
}

fn no_downloads() -> MockDownloader {
    let mut downloader = MockDownloader::new();
    downloader.expect_download().times(0);
    downloader
}

fn uploaded_file(harness: &Harness, name: &str) -> PathBuf {
    let path = harness.storage.path().join(name);
    std::fs::write(&path, b"fake video bytes").unwrap();
    path
}

fn error_of(outcome: &TaskOutcome) -> &str {
    outcome.error().expect("expected a failed outcome")
}

/// Background deletes are spawned; give them a chance to run.
async fn wait_for_deletes(provider: &ScriptedProvider, expected: u32) {
    for _ in 0..20 {
        if provider.deletes() == expected {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn test_uploaded_file_success() {
    let h = harness(ScriptedProvider::responding(TWO_SEGMENTS), no_downloads());
    let path = uploaded_file(&h, "clip.mp4");
    let task = SegmentationTask::from_upload(TaskId::new(), path.to_string_lossy());

    let outcome = h.pipeline.run(&task).await;

    let result = outcome.result().expect("expected success");
    assert_eq!(result.len(), 2);
    assert_eq!(result.action_segments[0].action, "robot gripper picks up red block");
    assert!(result.downloaded_video_path.is_none());

    assert_eq!(h.provider.uploads(), 1);
    assert_eq!(h.provider.deletes(), 1);
    assert!(!path.exists(), "uploaded file is removed after the run");

    assert_eq!(
        h.sink.stages(),
        vec![
            PipelineStage::Resolving,
            PipelineStage::Uploading,
            PipelineStage::Polling,
            PipelineStage::Generating,
            PipelineStage::Validating,
            PipelineStage::Cleanup,
            PipelineStage::Done,
        ]
    );

    let request = h.provider.last_request.lock().unwrap().clone().unwrap();
    assert!(matches!(request.video, VideoReference::RemoteAsset { .. }));
    assert_eq!(request.response_mime_type, "application/json");
}

#[tokio::test]
async fn test_direct_url_skips_upload() {
    let h = harness(ScriptedProvider::responding(TWO_SEGMENTS), no_downloads());
    let url = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";
    let task = SegmentationTask::from_url(TaskId::new(), url);

    let outcome = h.pipeline.run(&task).await;

    assert!(outcome.is_success());
    assert_eq!(h.provider.uploads(), 0);
    assert_eq!(h.provider.deletes(), 0);

    let request = h.provider.last_request.lock().unwrap().clone().unwrap();
    assert_eq!(request.video, VideoReference::direct(url));
    assert!(!h.sink.stages().contains(&PipelineStage::Uploading));
}

#[tokio::test]
async fn test_direct_url_wins_over_local_path() {
    let h = harness(ScriptedProvider::responding(TWO_SEGMENTS), no_downloads());
    let path = uploaded_file(&h, "clip.mp4");
    let mut task = SegmentationTask::from_upload(TaskId::new(), path.to_string_lossy());
    task.video_url = Some("https://youtu.be/dQw4w9WgXcQ".to_string());

    let outcome = h.pipeline.run(&task).await;

    assert!(outcome.is_success());
    assert_eq!(h.provider.uploads(), 0);
    assert!(!path.exists(), "local path is still removed");
}

#[tokio::test]
async fn test_url_download_sets_downloaded_path() {
    let mut downloader = MockDownloader::new();
    downloader
        .expect_download()
        .withf(|url, _| url == "https://cdn.example.com/robots/run.mov?sig=abc")
        .times(1)
        .returning(|_, dest| {
            std::fs::write(dest, b"video").unwrap();
            Ok(5)
        });

    let h = harness(ScriptedProvider::responding(TWO_SEGMENTS), downloader);
    let task = SegmentationTask::from_url(
        TaskId::from_string("task-42"),
        "https://cdn.example.com/robots/run.mov?sig=abc",
    );

    let outcome = h.pipeline.run(&task).await;

    let result = outcome.result().expect("expected success");
    assert_eq!(result.downloaded_video_path.as_deref(), Some("uploads/task-42.mov"));
    assert!(h.storage.path().join("task-42.mov").exists());
    assert_eq!(h.provider.uploads(), 1);
    assert_eq!(h.provider.deletes(), 1);
}

#[tokio::test]
async fn test_local_path_wins_over_download() {
    let h = harness(ScriptedProvider::responding(TWO_SEGMENTS), no_downloads());
    let path = uploaded_file(&h, "clip.mp4");
    let mut task = SegmentationTask::from_upload(TaskId::new(), path.to_string_lossy());
    task.video_url = Some("https://cdn.example.com/run.mp4".to_string());

    let outcome = h.pipeline.run(&task).await;

    assert!(outcome.result().unwrap().downloaded_video_path.is_none());
}

#[tokio::test]
async fn test_download_rejects_non_video() {
    let mut downloader = MockDownloader::new();
    downloader
        .expect_download()
        .times(1)
        .returning(|_, _| Err(DownloadError::NotVideo("text/html".to_string())));

    let h = harness(ScriptedProvider::responding(TWO_SEGMENTS), downloader);
    let task = SegmentationTask::from_url(TaskId::new(), "https://example.com/page");

    let outcome = h.pipeline.run(&task).await;

    assert_eq!(
        error_of(&outcome),
        "URL does not point to a video file. Content-Type: text/html"
    );
    assert_eq!(h.provider.uploads(), 0);
    assert_eq!(h.provider.generations(), 0);
}

#[tokio::test]
async fn test_missing_source() {
    let h = harness(ScriptedProvider::responding(TWO_SEGMENTS), no_downloads());
    let mut task = SegmentationTask::from_url(TaskId::new(), "");
    task.video_url = None;

    let outcome = h.pipeline.run(&task).await;

    assert_eq!(error_of(&outcome), "Video source (file path or URL) not provided.");
    assert_eq!(
        h.sink.stages(),
        vec![
            PipelineStage::Resolving,
            PipelineStage::Cleanup,
            PipelineStage::Failed
        ]
    );

    let events = h.sink.events.lock().unwrap();
    assert_eq!(
        events.last().unwrap().message.as_deref(),
        Some("Video source (file path or URL) not provided.")
    );
}

#[tokio::test]
async fn test_local_file_not_found() {
    let h = harness(ScriptedProvider::responding(TWO_SEGMENTS), no_downloads());
    let task = SegmentationTask::from_upload(TaskId::new(), "uploads/nowhere.mp4");

    let outcome = h.pipeline.run(&task).await;

    assert_eq!(error_of(&outcome), "Video file not found at uploads/nowhere.mp4");
    assert_eq!(h.provider.uploads(), 0);
}

#[tokio::test]
async fn test_asset_never_active_is_deleted() {
    let provider = ScriptedProvider::new(
        &[AssetState::Processing],
        Generation::Respond(GenerationResponse::from_text(TWO_SEGMENTS)),
    );
    let h = harness(provider, no_downloads());
    let path = uploaded_file(&h, "clip.mp4");
    let task = SegmentationTask::from_upload(TaskId::new(), path.to_string_lossy());

    let outcome = h.pipeline.run(&task).await;

    assert_eq!(
        error_of(&outcome),
        "File upload to Gemini failed to become ACTIVE. Final state: PROCESSING"
    );
    assert_eq!(h.provider.gets(), 3);
    assert_eq!(h.provider.generations(), 0);
    assert_eq!(h.provider.deletes(), 1);
    assert!(!path.exists());
}

#[tokio::test]
async fn test_blocked_response() {
    let blocked = GenerationResponse {
        candidates: vec![Candidate {
            content: None,
            finish_reason: Some("SAFETY".to_string()),
            safety_ratings: vec![SafetyRating {
                category: "HARM_CATEGORY_DANGEROUS_CONTENT".to_string(),
                probability: "HIGH".to_string(),
                blocked: true,
            }],
        }],
        prompt_feedback: None,
    };
    let provider = ScriptedProvider::new(&[AssetState::Active], Generation::Respond(blocked));
    let h = harness(provider, no_downloads());
    let path = uploaded_file(&h, "clip.mp4");
    let task = SegmentationTask::from_upload(TaskId::new(), path.to_string_lossy());

    let outcome = h.pipeline.run(&task).await;

    assert_eq!(
        error_of(&outcome),
        "Gemini API response was blocked or did not return text. Finish Reason: SAFETY"
    );
    assert_eq!(h.provider.deletes(), 1);
}

#[tokio::test]
async fn test_no_candidates() {
    let provider = ScriptedProvider::new(
        &[AssetState::Active],
        Generation::Respond(GenerationResponse::default()),
    );
    let h = harness(provider, no_downloads());
    let path = uploaded_file(&h, "clip.mp4");
    let task = SegmentationTask::from_upload(TaskId::new(), path.to_string_lossy());

    let outcome = h.pipeline.run(&task).await;

    assert_eq!(error_of(&outcome), "Gemini response had no candidates.");
    assert_eq!(h.provider.deletes(), 1);
}

#[tokio::test]
async fn test_malformed_model_output() {
    let h = harness(
        ScriptedProvider::responding("I found three actions in this video."),
        no_downloads(),
    );
    let path = uploaded_file(&h, "clip.mp4");
    let task = SegmentationTask::from_upload(TaskId::new(), path.to_string_lossy());

    let outcome = h.pipeline.run(&task).await;

    assert!(error_of(&outcome).starts_with("Failed to parse Gemini response as JSON: "));
    assert_eq!(h.provider.deletes(), 1);
}

#[tokio::test]
async fn test_schema_mismatch() {
    let h = harness(
        ScriptedProvider::responding(r#"{"segments": []}"#),
        no_downloads(),
    );
    let path = uploaded_file(&h, "clip.mp4");
    let task = SegmentationTask::from_upload(TaskId::new(), path.to_string_lossy());

    let outcome = h.pipeline.run(&task).await;

    assert!(error_of(&outcome).starts_with("Gemini response did not match the expected schema: "));
}

#[tokio::test]
async fn test_generation_api_error() {
    let provider = ScriptedProvider::new(&[AssetState::Active], Generation::ApiError);
    let h = harness(provider, no_downloads());
    let path = uploaded_file(&h, "clip.mp4");
    let task = SegmentationTask::from_upload(TaskId::new(), path.to_string_lossy());

    let outcome = h.pipeline.run(&task).await;

    let error = error_of(&outcome);
    assert!(error.starts_with("Error processing video (API Error): "), "{}", error);
    assert!(error.contains("internal error"));
    assert_eq!(h.provider.deletes(), 1);
}

#[tokio::test]
async fn test_failed_upload_has_nothing_to_delete() {
    let mut provider = ScriptedProvider::responding(TWO_SEGMENTS);
    provider.fail_upload = true;
    let h = harness(provider, no_downloads());
    let path = uploaded_file(&h, "clip.mp4");
    let task = SegmentationTask::from_upload(TaskId::new(), path.to_string_lossy());

    let outcome = h.pipeline.run(&task).await;

    assert!(error_of(&outcome).contains("upload unavailable"));
    assert_eq!(h.provider.deletes(), 0);
    assert!(!path.exists());
}

#[tokio::test]
async fn test_outcome_shape() {
    let h = harness(ScriptedProvider::responding(TWO_SEGMENTS), no_downloads());
    let path = uploaded_file(&h, "clip.mp4");
    let task = SegmentationTask::from_upload(TaskId::new(), path.to_string_lossy());

    let outcome = h.pipeline.run(&task).await;
    let json = serde_json::to_value(&outcome).unwrap();

    assert_eq!(json.as_object().unwrap().len(), 1);
    assert_eq!(json["action_segments"].as_array().unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_abandons_and_releases_asset() {
    let provider = ScriptedProvider::new(&[AssetState::Active], Generation::Hang);
    let h = harness(provider, no_downloads());
    let path = uploaded_file(&h, "clip.mp4");
    let task = SegmentationTask::from_upload(TaskId::new(), path.to_string_lossy());

    let outcome = h
        .pipeline
        .run_with_timeout(&task, Duration::from_secs(30))
        .await;

    assert_eq!(error_of(&outcome), "Task timed out after 30s");
    assert_eq!(h.sink.stages().last(), Some(&PipelineStage::Failed));
    assert!(!path.exists());

    wait_for_deletes(&h.provider, 1).await;
    assert_eq!(h.provider.uploads(), 1);
    assert_eq!(h.provider.deletes(), 1);
}

#[tokio::test]
async fn test_local_path_outside_storage_is_rejected() {
    let h = harness(ScriptedProvider::responding(TWO_SEGMENTS), no_downloads());
    let elsewhere = tempfile::tempdir().unwrap();
    let path = elsewhere.path().join("keep.mp4");
    std::fs::write(&path, b"not ours").unwrap();
    let task = SegmentationTask::from_upload(TaskId::new(), path.to_string_lossy());

    let outcome = h.pipeline.run(&task).await;

    assert!(
        error_of(&outcome).ends_with("is outside the upload directory"),
        "{}",
        error_of(&outcome)
    );
    assert_eq!(h.provider.uploads(), 0);
    assert!(path.exists(), "files outside storage are never deleted");
}

#[tokio::test]
async fn test_already_deleted_asset_counts_as_released() {
    let mut provider = ScriptedProvider::responding(TWO_SEGMENTS);
    provider.delete_result = DeleteResult::NotFound;
    let h = harness(provider, no_downloads());
    let path = uploaded_file(&h, "clip.mp4");
    let task = SegmentationTask::from_upload(TaskId::new(), path.to_string_lossy());

    let outcome = h.pipeline.run(&task).await;

    assert_eq!(outcome.result().expect("expected success").len(), 2);
    assert_eq!(h.provider.deletes(), 1);
    assert_eq!(h.sink.stages().last(), Some(&PipelineStage::Done));
}

#[tokio::test]
async fn test_failed_delete_keeps_original_error() {
    let mut provider = ScriptedProvider::new(&[AssetState::Active], Generation::ApiError);
    provider.delete_result = DeleteResult::Fail;
    let h = harness(provider, no_downloads());
    let path = uploaded_file(&h, "clip.mp4");
    let task = SegmentationTask::from_upload(TaskId::new(), path.to_string_lossy());

    let outcome = h.pipeline.run(&task).await;

    let error = error_of(&outcome);
    assert!(error.starts_with("Error processing video (API Error): "), "{}", error);
    assert!(error.contains("internal error"));
    assert!(!error.contains("delete unavailable"));
    assert_eq!(h.provider.deletes(), 1);
    assert!(!path.exists());
}

#[tokio::test]
async fn test_panic_releases_asset() {
    let provider = ScriptedProvider::new(&[AssetState::Active], Generation::Panic);
    let h = harness(provider, no_downloads());
    let path = uploaded_file(&h, "clip.mp4");
    let task = SegmentationTask::from_upload(TaskId::new(), path.to_string_lossy());

    let outcome = h.pipeline.run(&task).await;

    assert_eq!(error_of(&outcome), "Error processing video: provider blew up");
    assert_eq!(h.sink.stages().last(), Some(&PipelineStage::Failed));
    assert!(!path.exists());

    wait_for_deletes(&h.provider, 1).await;
    assert_eq!(h.provider.uploads(), 1);
    assert_eq!(h.provider.deletes(), 1);
}

#[tokio::test]
async fn test_status_lookup_error_deletes_once() {
    let mut provider = ScriptedProvider::responding(TWO_SEGMENTS);
    provider.fail_get = true;
    let h = harness(provider, no_downloads());
    let path = uploaded_file(&h, "clip.mp4");
    let task = SegmentationTask::from_upload(TaskId::new(), path.to_string_lossy());

    let outcome = h.pipeline.run(&task).await;

    let error = error_of(&outcome);
    assert!(error.starts_with("Error processing video (API Error): "), "{}", error);
    assert!(error.contains("status lookup failed"));
    assert_eq!(h.provider.gets(), 1);
    assert_eq!(h.provider.generations(), 0);

    wait_for_deletes(&h.provider, 1).await;
    assert_eq!(h.provider.deletes(), 1);
}

#[tokio::test]
async fn test_asset_active_on_second_poll() {
    let provider = ScriptedProvider::new(
        &[AssetState::Processing, AssetState::Processing, AssetState::Active],
        Generation::Respond(GenerationResponse::from_text(TWO_SEGMENTS)),
    );
    let h = harness(provider, no_downloads());
    let path = uploaded_file(&h, "clip.mp4");
    let task = SegmentationTask::from_upload(TaskId::new(), path.to_string_lossy());

    let outcome = h.pipeline.run(&task).await;

    assert!(outcome.is_success());
    assert_eq!(h.provider.gets(), 2);
    assert_eq!(h.provider.generations(), 1);
    assert_eq!(h.provider.deletes(), 1);
}
