//! Provider-neutral request and response types.
//!
//! Response types deserialize straight from Gemini's camelCase JSON.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle state of a remote video asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetState {
    Uploading,
    Processing,
    Active,
    Failed,
}

impl AssetState {
    /// Map Gemini's `File.state` value. Unknown and unspecified states
    /// count as still uploading.
    pub fn from_api(state: Option<&str>) -> Self {
        match state {
            Some("PROCESSING") => AssetState::Processing,
            Some("ACTIVE") => AssetState::Active,
            Some("FAILED") => AssetState::Failed,
            _ => AssetState::Uploading,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetState::Uploading => "UPLOADING",
            AssetState::Processing => "PROCESSING",
            AssetState::Active => "ACTIVE",
            AssetState::Failed => "FAILED",
        }
    }

    /// Active or failed; polling stops here.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AssetState::Active | AssetState::Failed)
    }
}

impl std::fmt::Display for AssetState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A video registered with the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAsset {
    /// Opaque handle, e.g. `files/abc123`
    pub name: String,
    pub uri: String,
    pub mime_type: String,
    pub state: AssetState,
    /// Provider-reported processing error
    pub error: Option<String>,
}

impl RemoteAsset {
    pub fn is_active(&self) -> bool {
        self.state == AssetState::Active
    }

    /// Reference usable in a generation request.
    pub fn video_reference(&self) -> VideoReference {
        VideoReference::RemoteAsset {
            uri: self.uri.clone(),
            mime_type: self.mime_type.clone(),
        }
    }
}

/// Video part of a generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoReference {
    /// An uploaded, active asset
    RemoteAsset { uri: String, mime_type: String },
    /// A URL the provider fetches itself
    DirectUrl { url: String },
}

impl VideoReference {
    pub fn direct(url: impl Into<String>) -> Self {
        VideoReference::DirectUrl { url: url.into() }
    }

    pub fn is_direct(&self) -> bool {
        matches!(self, VideoReference::DirectUrl { .. })
    }
}

/// One schema-constrained generation call: `[video, prompt]`.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub video: VideoReference,
    pub prompt: String,
    pub response_mime_type: String,
    pub response_schema: serde_json::Value,
}

impl GenerationRequest {
    /// Request JSON output constrained by `schema`.
    pub fn json(video: VideoReference, prompt: impl Into<String>, schema: serde_json::Value) -> Self {
        Self {
            video,
            prompt: prompt.into(),
            response_mime_type: "application/json".to_string(),
            response_schema: schema,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<CandidateContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    #[serde(default)]
    pub safety_ratings: Vec<SafetyRating>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ContentPart>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafetyRating {
    pub category: String,
    pub probability: String,
    #[serde(default)]
    pub blocked: bool,
}

impl std::fmt::Display for SafetyRating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.category, self.probability)?;
        if self.blocked {
            write!(f, " (blocked)")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_reason: Option<String>,
    #[serde(default)]
    pub safety_ratings: Vec<SafetyRating>,
}

/// The first candidate carried no text; the response was blocked or empty.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("response did not return text (finish reason: {})", .finish_reason.as_deref().unwrap_or("UNKNOWN"))]
pub struct MissingText {
    pub finish_reason: Option<String>,
    pub safety_ratings: Vec<SafetyRating>,
}

impl GenerationResponse {
    /// Text of the first candidate, concatenated across its parts.
    pub fn text(&self) -> Result<String, MissingText> {
        let candidate = self.candidates.first();

        let text: String = candidate
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|part| part.text.as_deref())
                    .collect()
            })
            .unwrap_or_default();

        let has_text_part = candidate
            .and_then(|c| c.content.as_ref())
            .map(|content| content.parts.iter().any(|part| part.text.is_some()))
            .unwrap_or(false);

        if has_text_part {
            Ok(text)
        } else {
            Err(MissingText {
                finish_reason: candidate.and_then(|c| c.finish_reason.clone()),
                safety_ratings: candidate
                    .map(|c| c.safety_ratings.clone())
                    .unwrap_or_default(),
            })
        }
    }

    /// Response with a single text candidate.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            candidates: vec![Candidate {
                content: Some(CandidateContent {
                    parts: vec![ContentPart {
                        text: Some(text.into()),
                    }],
                }),
                finish_reason: Some("STOP".to_string()),
                safety_ratings: Vec::new(),
            }],
            prompt_feedback: None,
        }
    }
}
