//! Gemini REST payloads that never leave the client.

use serde::{Deserialize, Serialize};

use crate::types::{AssetState, RemoteAsset, VideoReference};

#[derive(Debug, Serialize)]
pub(crate) struct StartUploadRequest<'a> {
    pub file: UploadMetadata<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct UploadMetadata<'a> {
    pub display_name: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UploadResponse {
    pub file: FileResource,
}

/// `File` resource of the Files API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FileResource {
    pub name: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub error: Option<Status>,
}

/// `google.rpc.Status`
#[derive(Debug, Deserialize)]
pub(crate) struct Status {
    #[serde(default)]
    pub code: Option<i32>,
    #[serde(default)]
    pub message: Option<String>,
}

impl From<FileResource> for RemoteAsset {
    fn from(file: FileResource) -> Self {
        let error = file.error.map(|status| match (status.code, status.message) {
            (Some(code), Some(message)) => format!("{} (code {})", message, code),
            (None, Some(message)) => message,
            (Some(code), None) => format!("code {}", code),
            (None, None) => "unknown error".to_string(),
        });

        RemoteAsset {
            state: AssetState::from_api(file.state.as_deref()),
            name: file.name,
            uri: file.uri,
            mime_type: file.mime_type,
            error,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
pub(crate) struct Content {
    pub role: &'static str,
    pub parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub(crate) enum Part {
    File {
        #[serde(rename = "fileData")]
        file_data: FileData,
    },
    Text {
        text: String,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FileData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    pub file_uri: String,
}

impl From<&VideoReference> for Part {
    fn from(video: &VideoReference) -> Self {
        let file_data = match video {
            VideoReference::RemoteAsset { uri, mime_type } => FileData {
                mime_type: Some(mime_type.clone()),
                file_uri: uri.clone(),
            },
            VideoReference::DirectUrl { url } => FileData {
                mime_type: None,
                file_uri: url.clone(),
            },
        };
        Part::File { file_data }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    pub response_mime_type: String,
    #[serde(rename = "responseSchema")]
    pub response_schema: serde_json::Value,
}

/// Error body returned on non-2xx responses.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: Status,
}
