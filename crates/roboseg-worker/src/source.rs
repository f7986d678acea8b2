//! Video source resolution.
//!
//! Turns a task's `video_path` / `video_url` into either a direct-ingestion
//! reference or a local file, downloading URL sources into the managed
//! storage directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use roboseg_models::{is_direct_ingestion_url, SegmentationTask, TaskId};

use crate::error::{DownloadError, PipelineResult, SourceError};
use crate::metrics;

const DEFAULT_EXTENSION: &str = "mp4";

/// Where the pipeline reads the video from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedSource {
    /// URL the provider fetches itself; nothing to upload
    Direct { url: String },
    /// Local file to upload; `downloaded` when fetched from a URL by us
    Local { path: PathBuf, downloaded: bool },
}

impl ResolvedSource {
    pub fn is_direct(&self) -> bool {
        matches!(self, ResolvedSource::Direct { .. })
    }
}

/// Streaming blob download.
#[async_trait]
pub trait BlobDownloader: Send + Sync {
    /// Stream `url` into `dest`, returning the number of bytes written.
    /// On failure no file is left at `dest`.
    async fn download(&self, url: &str, dest: &Path) -> Result<u64, DownloadError>;
}

/// [`BlobDownloader`] over plain HTTP(S).
pub struct HttpDownloader {
    http: Client,
}

impl HttpDownloader {
    /// `timeout` bounds the whole transfer, body included.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }

    async fn write_body(&self, response: reqwest::Response, dest: &Path) -> Result<u64, DownloadError> {
        let mut file = tokio::fs::File::create(dest).await.map_err(write_error)?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| DownloadError::Transport(e.to_string()))?;
            file.write_all(&chunk).await.map_err(write_error)?;
            written += chunk.len() as u64;
        }

        file.flush().await.map_err(write_error)?;
        Ok(written)
    }
}

fn write_error(err: std::io::Error) -> DownloadError {
    DownloadError::Transport(format!("could not write video file: {}", err))
}

async fn remove_partial(dest: &Path) {
    match tokio::fs::remove_file(dest).await {
        Ok(()) => debug!(path = %dest.display(), "Removed partial download"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %dest.display(), "Failed to remove partial download: {}", e),
    }
}

#[async_trait]
impl BlobDownloader for HttpDownloader {
    async fn download(&self, url: &str, dest: &Path) -> Result<u64, DownloadError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| DownloadError::Transport(e.to_string()))?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if !content_type.starts_with("video/") {
            remove_partial(dest).await;
            return Err(DownloadError::NotVideo(content_type));
        }

        match self.write_body(response, dest).await {
            Ok(written) => Ok(written),
            Err(e) => {
                remove_partial(dest).await;
                Err(e)
            }
        }
    }
}

/// File name for a downloaded source: `<task_id>.<ext>`, with the extension
/// taken from the URL path (query ignored) and defaulting to `mp4`.
pub fn download_file_name(task_id: &TaskId, url: &str) -> String {
    let stem = task_file_stem(task_id).unwrap_or_else(|| "video".to_string());

    let ext = url::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .and_then(|last| {
            Path::new(&last)
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_ascii_lowercase)
        })
        .filter(|e| !e.is_empty() && e.len() <= 8 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());

    format!("{}.{}", stem, ext)
}

/// `task_id` reduced to `[A-Za-z0-9_-]`; `None` when nothing is left.
fn task_file_stem(task_id: &TaskId) -> Option<String> {
    let stem: String = task_id
        .as_str()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    (!stem.is_empty()).then_some(stem)
}

/// Whether `path` resolves to a location inside `storage_dir`.
///
/// Both are canonicalized, so `path` must exist.
pub async fn is_within_storage(storage_dir: &Path, path: &Path) -> std::io::Result<bool> {
    let path = tokio::fs::canonicalize(path).await?;
    let storage_dir = tokio::fs::canonicalize(storage_dir).await?;
    Ok(path.starts_with(storage_dir))
}

/// Remove every stored file of a task (`<stem>` or `<stem>.<ext>`) from
/// `storage_dir`, returning how many were deleted.
///
/// Downloaded videos are kept after a successful run so they can be
/// served; this is how they are released.
pub async fn cleanup_task_files(storage_dir: &Path, task_id: &TaskId) -> std::io::Result<usize> {
    let Some(stem) = task_file_stem(task_id) else {
        return Ok(0);
    };

    let mut entries = match tokio::fs::read_dir(storage_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let mut removed = 0;
    while let Some(entry) = entries.next_entry().await? {
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };

        let belongs_to_task = name == stem
            || name
                .strip_prefix(stem.as_str())
                .is_some_and(|rest| rest.starts_with('.'));
        if !belongs_to_task || !entry.file_type().await?.is_file() {
            continue;
        }

        match tokio::fs::remove_file(entry.path()).await {
            Ok(()) => {
                debug!(path = %entry.path().display(), "Removed task file");
                removed += 1;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }

    info!(task_id = %task_id, removed, "Cleaned up task files");
    Ok(removed)
}

/// Resolves a task's video source.
pub struct SourceResolver {
    downloader: Arc<dyn BlobDownloader>,
    storage_dir: PathBuf,
}

impl SourceResolver {
    pub fn new(downloader: Arc<dyn BlobDownloader>, storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            downloader,
            storage_dir: storage_dir.into(),
        }
    }

    /// Resolve the source.
    ///
    /// A direct-ingestion URL wins over everything. Otherwise a local path
    /// wins over a URL, and a URL alone is downloaded. A local path must
    /// exist and live inside the storage directory.
    pub async fn resolve(&self, task: &SegmentationTask) -> PipelineResult<ResolvedSource> {
        if let Some(url) = task.video_url().filter(|u| is_direct_ingestion_url(u)) {
            info!(url, "Using direct-ingestion URL");
            return Ok(ResolvedSource::Direct {
                url: url.to_string(),
            });
        }

        if let Some(path) = task.video_path() {
            let path = PathBuf::from(path);
            if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
                return Err(SourceError::FileNotFound(path.display().to_string()).into());
            }
            if !is_within_storage(&self.storage_dir, &path).await.unwrap_or(false) {
                return Err(SourceError::OutsideStorage(path.display().to_string()).into());
            }
            return Ok(ResolvedSource::Local {
                path,
                downloaded: false,
            });
        }

        if let Some(url) = task.video_url() {
            let path = self.download(&task.task_id, url).await?;
            return Ok(ResolvedSource::Local {
                path,
                downloaded: true,
            });
        }

        Err(SourceError::Missing.into())
    }

    async fn download(&self, task_id: &TaskId, url: &str) -> PipelineResult<PathBuf> {
        tokio::fs::create_dir_all(&self.storage_dir)
            .await
            .map_err(write_error)?;

        let dest = self.storage_dir.join(download_file_name(task_id, url));
        info!(url, dest = %dest.display(), "Downloading video");

        let started = Instant::now();
        let bytes = self.downloader.download(url, &dest).await?;
        metrics::record_download_duration(started.elapsed().as_secs_f64());

        if !tokio::fs::try_exists(&dest).await.unwrap_or(false) {
            return Err(SourceError::FileNotFound(dest.display().to_string()).into());
        }

        info!(bytes, dest = %dest.display(), "Video downloaded");
        Ok(dest)
    }
}
