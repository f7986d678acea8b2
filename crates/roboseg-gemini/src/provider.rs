//! The inference provider seam.

use std::path::Path;

use async_trait::async_trait;

use crate::error::ProviderResult;
use crate::types::{GenerationRequest, GenerationResponse, RemoteAsset};

/// Remote multimodal model with a file-asset lifecycle.
///
/// Implementations must be safe to share across concurrent pipeline
/// invocations; each invocation owns the assets it uploads.
#[async_trait]
pub trait InferenceProvider: Send + Sync {
    /// Register a local video file. The returned asset may not be active yet.
    async fn upload(&self, path: &Path) -> ProviderResult<RemoteAsset>;

    /// Re-fetch an asset's current state.
    async fn get(&self, name: &str) -> ProviderResult<RemoteAsset>;

    /// Delete an asset. Returns [`ProviderError::NotFound`](crate::ProviderError::NotFound)
    /// when it is already gone.
    async fn delete(&self, name: &str) -> ProviderResult<()>;

    /// Run one generation call.
    async fn generate(&self, request: &GenerationRequest) -> ProviderResult<GenerationResponse>;
}
