//! # Detail Fetcher
//!
//! Fetches one species detail record with a jittered pre-fetch delay and
//! exponential backoff. The fetcher only reports outcomes; callers decide
//! what to write.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::api::CatalogApi;
use super::errors::CatalogError;
use super::retry::RetryPolicy;
use crate::domain::{SpeciesDetail, SpeciesStub};

/// Result of one resolution, including every retry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Resolved(SpeciesDetail),
    /// Every attempt failed; `attempts` counts the first try as well
    Failed { attempts: u32, error: CatalogError },
    /// The owning context was torn down before a result was produced
    Cancelled,
}

#[derive(Clone)]
pub struct DetailFetcher {
    api: Arc<dyn CatalogApi>,
    policy: RetryPolicy,
}

impl DetailFetcher {
    pub fn new(api: Arc<dyn CatalogApi>, policy: RetryPolicy) -> Self {
        Self { api, policy }
    }

    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Resolves `stub` into its detail record.
    ///
    /// The token is checked before every attempt and every wait; once it is
    /// cancelled the outcome is `Cancelled` no matter what the transport
    /// returns.
    pub async fn resolve(&self, stub: &SpeciesStub, token: &CancellationToken) -> FetchOutcome {
        if !pause(self.policy.prefetch_delay(), token).await {
            return FetchOutcome::Cancelled;
        }

        let mut retries_done = 0;
        loop {
            let result = tokio::select! {
                result = self.api.fetch_detail(&stub.locator) => result,
                () = token.cancelled() => return FetchOutcome::Cancelled,
            };

            if token.is_cancelled() {
                return FetchOutcome::Cancelled;
            }

            match result {
                Ok(detail) => {
                    if retries_done > 0 {
                        info!(
                            identifier = %stub.identifier,
                            attempt = retries_done + 1,
                            "Resolved detail after retry"
                        );
                    } else {
                        debug!(identifier = %stub.identifier, "Resolved detail");
                    }
                    return FetchOutcome::Resolved(detail);
                }
                Err(CatalogError::Cancelled) => return FetchOutcome::Cancelled,
                Err(error) => {
                    if !self.policy.should_retry(retries_done) {
                        warn!(
                            identifier = %stub.identifier,
                            attempts = retries_done + 1,
                            %error,
                            "Giving up on detail fetch"
                        );
                        return FetchOutcome::Failed {
                            attempts: retries_done + 1,
                            error,
                        };
                    }

                    retries_done += 1;
                    let delay = self.policy.retry_delay(retries_done);
                    warn!(
                        identifier = %stub.identifier,
                        retry = retries_done,
                        max_retries = self.policy.max_retries,
                        ?delay,
                        %error,
                        "Detail fetch failed, retrying"
                    );
                    if !pause(delay, token).await {
                        return FetchOutcome::Cancelled;
                    }
                }
            }
        }
    }
}

/// Sleeps for `delay` unless `token` is cancelled first.
/// Returns `false` when cancelled.
pub(crate) async fn pause(delay: Duration, token: &CancellationToken) -> bool {
    if token.is_cancelled() {
        return false;
    }
    if delay.is_zero() {
        return true;
    }
    tokio::select! {
        () = sleep(delay) => !token.is_cancelled(),
        () = token.cancelled() => false,
    }
}
