//! Bounded retry loop for upstream attempts
//!
//! 503 specifically signals a cold-starting model that will become ready;
//! treating it like a genuine error would produce spurious failures on
//! first use. Transport failures are indistinguishable from transient
//! network blips and are retried optimistically. Every other status aborts
//! immediately with the upstream status and body intact.
//!
//! Backoff intervals are fixed constants per attempt class, not
//! exponential; see the retry section of the config.

use std::sync::Arc;

use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::RetryConfig;
use crate::upstream::{RenderedRequest, UpstreamCaller, UpstreamOutcome};
use crate::{Error, Result};

/// Drives the bounded retry loop over an [`UpstreamCaller`]
pub struct RetryOrchestrator {
    caller: Arc<dyn UpstreamCaller>,
    config: RetryConfig,
}

impl RetryOrchestrator {
    /// Create the orchestrator over a caller.
    #[must_use]
    pub fn new(caller: Arc<dyn UpstreamCaller>, config: RetryConfig) -> Self {
        Self { caller, config }
    }

    /// Send the request, retrying through transient failures.
    ///
    /// Returns the decoded success body, or:
    ///
    /// # Errors
    ///
    /// - [`Error::UpstreamFatal`] for any non-200, non-503 status, with the
    ///   upstream status code and body verbatim; no retry is attempted.
    /// - [`Error::RetryExhausted`] once `max_attempts` is spent.
    ///
    /// Cancellation: both suspension points (the outbound call and the
    /// backoff sleep) are plain awaits, so dropping this future abandons
    /// the in-flight work promptly.
    pub async fn send(&self, request: &RenderedRequest) -> Result<Value> {
        for attempt in 1..=self.config.max_attempts {
            match self.caller.call(request).await {
                UpstreamOutcome::Success { status, body } => {
                    debug!(attempt, status, "Upstream call succeeded");
                    return Ok(body);
                }
                UpstreamOutcome::RetryableUnavailable { status } => {
                    if attempt < self.config.max_attempts {
                        debug!(
                            attempt,
                            status,
                            delay_ms = self.config.unavailable_backoff.as_millis(),
                            "Model unavailable, retrying after backoff"
                        );
                        sleep(self.config.unavailable_backoff).await;
                    }
                }
                UpstreamOutcome::TransportError { cause } => {
                    if attempt < self.config.max_attempts {
                        debug!(
                            attempt,
                            error = %cause,
                            delay_ms = self.config.transport_backoff.as_millis(),
                            "Transport failure, retrying after backoff"
                        );
                        sleep(self.config.transport_backoff).await;
                    } else {
                        warn!(attempt, error = %cause, "Transport failure on final attempt");
                    }
                }
                UpstreamOutcome::FatalHttpError { status, body } => {
                    warn!(attempt, status, "Fatal upstream status, aborting");
                    return Err(Error::UpstreamFatal { status, body });
                }
            }
        }

        warn!(
            attempts = self.config.max_attempts,
            "Retry budget exhausted without a successful response"
        );
        Err(Error::RetryExhausted)
    }
}
