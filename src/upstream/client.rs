//! Stateless upstream HTTP caller
//!
//! One HTTPS POST per attempt against the configured inference endpoint.
//! Each attempt yields an [`UpstreamOutcome`] classifying what happened;
//! the retry loop decides what to do with it.
//!
//! # Security
//!
//! The bearer token is injected at request time and is never logged or
//! included in error messages.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::debug;

use crate::config::UpstreamConfig;
use crate::upstream::RenderedRequest;
use crate::{Error, Result};

/// Result of one upstream attempt, consumed exactly once by the retry loop
#[derive(Debug, Clone)]
pub enum UpstreamOutcome {
    /// HTTP 200 with a decoded JSON body
    Success {
        /// Status code (always 200 today; kept for diagnostics)
        status: u16,
        /// Decoded response body
        body: Value,
    },
    /// HTTP 503 - model unavailable / cold start, worth waiting for
    RetryableUnavailable {
        /// Status code
        status: u16,
    },
    /// Connection failure or timeout, retried optimistically
    TransportError {
        /// Human-readable cause, stripped of any credential material
        cause: String,
    },
    /// Any other HTTP status - will not self-resolve, aborts the loop
    FatalHttpError {
        /// Status code
        status: u16,
        /// Raw response body, surfaced verbatim to the caller
        body: String,
    },
}

/// Seam between the retry loop and the actual HTTP transport.
///
/// The production implementation is [`UpstreamClient`]; tests substitute
/// scripted outcome sequences.
#[async_trait]
pub trait UpstreamCaller: Send + Sync {
    /// Perform one attempt for the given rendered request.
    async fn call(&self, request: &RenderedRequest) -> UpstreamOutcome;
}

/// Production caller backed by a shared `reqwest` client
pub struct UpstreamClient {
    client: Client,
    config: UpstreamConfig,
}

impl UpstreamClient {
    /// Build the caller, constructing the HTTP client with the configured
    /// per-call timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend fails to initialize.
    pub fn new(config: UpstreamConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl UpstreamCaller for UpstreamClient {
    async fn call(&self, request: &RenderedRequest) -> UpstreamOutcome {
        let body = request.to_body(&self.config);

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_token)
            .json(&body)
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                // reqwest errors can embed the URL but never the auth header
                return UpstreamOutcome::TransportError {
                    cause: e.without_url().to_string(),
                };
            }
        };

        let status = response.status();
        debug!(status = status.as_u16(), "Upstream attempt completed");

        if status == StatusCode::OK {
            match response.json::<Value>().await {
                Ok(body) => UpstreamOutcome::Success {
                    status: status.as_u16(),
                    body,
                },
                // A 200 with an undecodable body is a transport-level
                // failure (truncated stream), not a fatal upstream error.
                Err(e) => UpstreamOutcome::TransportError {
                    cause: e.without_url().to_string(),
                },
            }
        } else if status == StatusCode::SERVICE_UNAVAILABLE {
            UpstreamOutcome::RetryableUnavailable {
                status: status.as_u16(),
            }
        } else {
            UpstreamOutcome::FatalHttpError {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }
        }
    }
}
