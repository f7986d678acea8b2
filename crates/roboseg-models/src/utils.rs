//! Utility functions for URL classification.
//!
//! Gemini can fetch YouTube videos itself, so those URLs are passed to the
//! model verbatim instead of being downloaded and uploaded.

use std::sync::LazyLock;

use regex::Regex;

/// YouTube URL shapes the model ingests directly: `watch?v=`, `embed/`,
/// `v/`, `youtu.be/<id>` and `...?v=`, followed by an 11-character id token.
static DIRECT_INGESTION_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(https?://)?(www\.)?(youtube|youtu|youtube-nocookie)\.(com|be)/(watch\?v=|embed/|v/|.+\?v=)?([^&=%\?]{11})",
    )
    .expect("direct ingestion pattern is valid")
});

/// Check whether the inference provider can ingest this URL directly.
pub fn is_direct_ingestion_url(url: &str) -> bool {
    DIRECT_INGESTION_URL.is_match(url.trim())
}
