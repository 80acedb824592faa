//! Error types for the inference gateway

use thiserror::Error;

/// Result type alias for the inference gateway
pub type Result<T> = std::result::Result<T, Error>;

/// Gateway errors
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Upstream returned a non-retryable HTTP status
    ///
    /// Status code and body are surfaced verbatim to the caller; auth
    /// failures, malformed payloads and rate limits will not self-resolve
    /// by waiting, so no retry is attempted.
    #[error("Upstream error {status}: {body}")]
    UpstreamFatal {
        /// HTTP status code from the backend
        status: u16,
        /// Raw response body
        body: String,
    },

    /// Retry budget exhausted without a successful response
    #[error("Model did not respond in time")]
    RetryExhausted,

    /// Transport error
    #[error("Transport error: {0}")]
    Transport(String),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// HTTP status code to surface at the gateway boundary.
    ///
    /// Fatal upstream errors keep their original status; exhausted retries
    /// map to 504 Gateway Timeout.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::UpstreamFatal { status, .. } => *status,
            Self::RetryExhausted => 504,
            Self::Transport(_) | Self::Http(_) => 502,
            Self::Config(_) | Self::Json(_) | Self::Io(_) | Self::Internal(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_fatal_preserves_status() {
        let err = Error::UpstreamFatal {
            status: 429,
            body: "rate limited".to_string(),
        };
        assert_eq!(err.status_code(), 429);
        assert!(err.to_string().contains("rate limited"));
    }

    #[test]
    fn retry_exhausted_maps_to_gateway_timeout() {
        assert_eq!(Error::RetryExhausted.status_code(), 504);
    }

    #[test]
    fn transport_maps_to_bad_gateway() {
        assert_eq!(
            Error::Transport("connection refused".to_string()).status_code(),
            502
        );
    }
}
