//! Ownership of one uploaded remote asset.
//!
//! An [`AssetLease`] issues exactly one delete for its asset: explicitly via
//! [`AssetLease::release`], or from `Drop` when the owning invocation is
//! abandoned (timeout, cancellation, panic).

use std::sync::Arc;

use tracing::{debug, info, warn};

use roboseg_gemini::InferenceProvider;

use crate::metrics;

pub struct AssetLease {
    provider: Arc<dyn InferenceProvider>,
    name: String,
    released: bool,
}

impl AssetLease {
    pub fn new(provider: Arc<dyn InferenceProvider>, name: impl Into<String>) -> Self {
        Self {
            provider,
            name: name.into(),
            released: false,
        }
    }

    /// Delete the asset. Failures are logged, never returned.
    pub async fn release(mut self) {
        self.released = true;
        delete_asset(self.provider.as_ref(), &self.name).await;
    }
}

impl Drop for AssetLease {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        let provider = Arc::clone(&self.provider);
        let name = std::mem::take(&mut self.name);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!(asset = %name, "Invocation abandoned, deleting remote asset in background");
                handle.spawn(async move {
                    delete_asset(provider.as_ref(), &name).await;
                });
            }
            Err(_) => warn!(asset = %name, "No runtime available, remote asset left behind"),
        }
    }
}

/// Best-effort delete; a missing asset counts as deleted.
async fn delete_asset(provider: &dyn InferenceProvider, name: &str) {
    match provider.delete(name).await {
        Ok(()) => {
            metrics::record_asset_deleted("ok");
            info!(asset = %name, "Deleted remote asset");
        }
        Err(e) if e.is_not_found() => {
            metrics::record_asset_deleted("not_found");
            debug!(asset = %name, "Remote asset already deleted");
        }
        Err(e) => {
            metrics::record_asset_deleted("error");
            warn!(asset = %name, "Failed to delete remote asset: {}", e);
        }
    }
}
