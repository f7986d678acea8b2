//! Inference provider seam and Gemini REST client.
//!
//! The pipeline talks to the model only through [`InferenceProvider`]:
//! register a video, poll its activation state, delete it and run one
//! schema-constrained generation. [`GeminiClient`] implements it against
//! Google's Generative Language API.

pub mod client;
pub mod config;
pub mod error;
pub mod provider;
pub mod types;

mod wire;

pub use client::{guess_mime_type, GeminiClient};
pub use config::GeminiConfig;
pub use error::{ProviderError, ProviderResult};
pub use provider::InferenceProvider;
pub use types::{
    AssetState, Candidate, CandidateContent, ContentPart, GenerationRequest, GenerationResponse,
    MissingText, PromptFeedback, RemoteAsset, SafetyRating, VideoReference,
};
