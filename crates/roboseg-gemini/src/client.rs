//! Gemini REST client.

use std::path::Path;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

use crate::config::GeminiConfig;
use crate::error::{ProviderError, ProviderResult};
use crate::provider::InferenceProvider;
use crate::types::{GenerationRequest, GenerationResponse, RemoteAsset};
use crate::wire::{
    Content, ErrorEnvelope, FileResource, GenerateContentRequest, GenerationConfig, Part,
    StartUploadRequest, UploadMetadata, UploadResponse,
};

const API_KEY_HEADER: &str = "x-goog-api-key";
const UPLOAD_URL_HEADER: &str = "x-goog-upload-url";

/// Client for Google's Generative Language API.
pub struct GeminiClient {
    http: Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> ProviderResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(ProviderError::MissingApiKey);
        }

        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(ProviderError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> ProviderResult<Self> {
        Self::new(GeminiConfig::from_env()?)
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn resource_url(&self, name: &str) -> String {
        format!("{}/v1beta/{}", self.config.api_base_url, name)
    }

    /// Start a resumable upload session and return its URL.
    async fn start_upload(
        &self,
        display_name: &str,
        mime_type: &str,
        length: u64,
    ) -> ProviderResult<String> {
        let url = format!("{}/upload/v1beta/files", self.config.api_base_url);

        let response = self
            .http
            .post(&url)
            .header(API_KEY_HEADER, &self.config.api_key)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", length)
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&StartUploadRequest {
                file: UploadMetadata { display_name },
            })
            .send()
            .await?;

        let response = error_for_status(response).await?;

        response
            .headers()
            .get(UPLOAD_URL_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| ProviderError::invalid_response("upload session URL missing"))
    }
}

#[async_trait]
impl InferenceProvider for GeminiClient {
    async fn upload(&self, path: &Path) -> ProviderResult<RemoteAsset> {
        let length = tokio::fs::metadata(path).await?.len();
        let mime_type = guess_mime_type(path);
        let display_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("video");

        debug!(path = %path.display(), mime_type, length, "Starting Gemini upload");
        let session_url = self.start_upload(display_name, mime_type, length).await?;

        let file = tokio::fs::File::open(path).await?;
        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));

        let response = self
            .http
            .post(&session_url)
            .header(reqwest::header::CONTENT_LENGTH, length)
            .header("X-Goog-Upload-Offset", 0)
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(body)
            .send()
            .await?;

        let response = error_for_status(response).await?;
        let uploaded: UploadResponse = response.json().await?;
        let asset = RemoteAsset::from(uploaded.file);

        info!(asset = %asset.name, state = %asset.state, "Uploaded video to Gemini");
        Ok(asset)
    }

    async fn get(&self, name: &str) -> ProviderResult<RemoteAsset> {
        let response = self
            .http
            .get(self.resource_url(name))
            .header(API_KEY_HEADER, &self.config.api_key)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound(name.to_string()));
        }

        let response = error_for_status(response).await?;
        let file: FileResource = response.json().await?;
        Ok(file.into())
    }

    async fn delete(&self, name: &str) -> ProviderResult<()> {
        let response = self
            .http
            .delete(self.resource_url(name))
            .header(API_KEY_HEADER, &self.config.api_key)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound(name.to_string()));
        }

        error_for_status(response).await?;
        debug!(asset = %name, "Deleted Gemini file");
        Ok(())
    }

    async fn generate(&self, request: &GenerationRequest) -> ProviderResult<GenerationResponse> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.api_base_url, self.config.model
        );

        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![
                    Part::from(&request.video),
                    Part::Text {
                        text: request.prompt.clone(),
                    },
                ],
            }],
            generation_config: GenerationConfig {
                response_mime_type: request.response_mime_type.clone(),
                response_schema: request.response_schema.clone(),
            },
        };

        debug!(model = %self.config.model, direct = request.video.is_direct(), "Calling generateContent");

        let response = self
            .http
            .post(&url)
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let response = error_for_status(response).await?;
        Ok(response.json().await?)
    }
}

/// Turn a non-2xx response into [`ProviderError::Api`], preferring the
/// message from Google's error envelope.
async fn error_for_status(response: Response) -> ProviderResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorEnvelope>(&body)
        .ok()
        .and_then(|envelope| envelope.error.message)
        .unwrap_or(body);

    warn!(status = status.as_u16(), %message, "Gemini API request failed");
    Err(ProviderError::Api {
        status: status.as_u16(),
        message,
    })
}

/// Guess a video MIME type from the file extension.
pub fn guess_mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("mov") => "video/quicktime",
        Some("avi") => "video/x-msvideo",
        Some("mkv") => "video/x-matroska",
        Some("webm") => "video/webm",
        Some("mpeg") | Some("mpg") => "video/mpeg",
        Some("flv") => "video/x-flv",
        Some("wmv") => "video/x-ms-wmv",
        Some("3gp") => "video/3gpp",
        _ => "video/mp4",
    }
}
