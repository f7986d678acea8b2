//! Remote asset activation polling.
//!
//! The poll is an explicit `(asset, attempt)` state advanced by
//! [`PollState::decide`], so the decision logic is testable on its own and
//! the loop only sleeps and re-fetches. Only the attempt count ends the
//! loop; the overall wall-clock bound is the executor's task timeout.

use tokio::time::Duration;
use tracing::{debug, warn};

use roboseg_gemini::{AssetState, InferenceProvider, RemoteAsset};

use crate::config::ActivationPolicy;
use crate::error::{PipelineError, PipelineResult};
use crate::metrics;

/// What the poll loop does next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollDecision {
    Active,
    /// Provider reported a terminal failure
    Failed,
    /// Every re-fetch used up while still not active
    Exhausted,
    Wait(Duration),
}

/// Poll progress for one asset.
#[derive(Debug, Clone)]
pub struct PollState {
    pub asset: RemoteAsset,
    /// Status re-fetches performed so far
    pub attempt: u32,
}

impl PollState {
    pub fn new(asset: RemoteAsset) -> Self {
        Self { asset, attempt: 0 }
    }

    pub fn decide(&self, policy: &ActivationPolicy) -> PollDecision {
        match self.asset.state {
            AssetState::Active => PollDecision::Active,
            AssetState::Failed => PollDecision::Failed,
            _ if self.attempt >= policy.max_attempts => PollDecision::Exhausted,
            _ => PollDecision::Wait(policy.interval),
        }
    }

    /// Record a freshly fetched asset.
    pub fn advance(&mut self, asset: RemoteAsset) {
        self.asset = asset;
        self.attempt += 1;
    }

    fn into_error(self) -> PipelineError {
        PipelineError::AssetActivation {
            state: self.asset.state,
            detail: self.asset.error,
        }
    }
}

/// Wait until `asset` becomes active.
///
/// Fails with [`PipelineError::AssetActivation`] carrying the last known
/// state when the asset fails or the budget runs out. The caller owns the
/// asset and is responsible for deleting it.
pub async fn wait_until_active(
    provider: &dyn InferenceProvider,
    asset: RemoteAsset,
    policy: &ActivationPolicy,
) -> PipelineResult<RemoteAsset> {
    let mut poll = PollState::new(asset);

    loop {
        match poll.decide(policy) {
            PollDecision::Active => {
                debug!(asset = %poll.asset.name, attempts = poll.attempt, "Asset is active");
                return Ok(poll.asset);
            }
            PollDecision::Failed | PollDecision::Exhausted => {
                warn!(
                    asset = %poll.asset.name,
                    state = %poll.asset.state,
                    attempts = poll.attempt,
                    error = poll.asset.error.as_deref().unwrap_or(""),
                    "Asset did not become active"
                );
                return Err(poll.into_error());
            }
            PollDecision::Wait(delay) => {
                debug!(
                    asset = %poll.asset.name,
                    state = %poll.asset.state,
                    "Asset not active, retrying {}/{} in {:?}",
                    poll.attempt + 1,
                    policy.max_attempts,
                    delay
                );
                tokio::time::sleep(delay).await;

                let refreshed = provider.get(&poll.asset.name).await?;
                metrics::record_activation_poll();
                if let Some(err) = &refreshed.error {
                    warn!(asset = %refreshed.name, "Provider reported asset error: {}", err);
                }
                poll.advance(refreshed);
            }
        }
    }
}
