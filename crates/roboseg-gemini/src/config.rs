//! Gemini client configuration.

use std::time::Duration;

use crate::error::{ProviderError, ProviderResult};

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_API_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Configuration for [`GeminiClient`](crate::GeminiClient).
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    /// Model used for `generateContent`
    pub model: String,
    /// API root, without a trailing slash
    pub api_base_url: String,
    /// Per-request timeout (uploads and generation can be slow)
    pub request_timeout: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(300),
        }
    }
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    /// Load from environment variables. `GEMINI_API_KEY` is required.
    pub fn from_env() -> ProviderResult<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or(ProviderError::MissingApiKey)?;

        Ok(Self {
            api_key,
            model: std::env::var("GEMINI_MODEL_NAME").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            api_base_url: std::env::var("GEMINI_API_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string()),
            request_timeout: Duration::from_secs(
                std::env::var("GEMINI_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(300),
            ),
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = GeminiConfig::default();
        assert_eq!(config.model, "gemini-2.0-flash");
        assert_eq!(config.api_base_url, "https://generativelanguage.googleapis.com");
        assert_eq!(config.request_timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_builder_trims_base_url() {
        let config = GeminiConfig::new("key")
            .with_base_url("http://127.0.0.1:9000/")
            .with_model("gemini-1.5-pro");
        assert_eq!(config.api_base_url, "http://127.0.0.1:9000");
        assert_eq!(config.model, "gemini-1.5-pro");
        assert_eq!(config.api_key, "key");
    }
}
