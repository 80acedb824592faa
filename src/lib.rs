//! Inference Gateway Library
//!
//! A gateway that accepts a text prompt, runs it through a pre-call policy
//! filter, forwards it to a hosted language-model inference endpoint with
//! bounded retry, and normalizes the backend's response envelope into one
//! stable output contract.
//!
//! # Pipeline
//!
//! inbound prompt → [`policy::PolicyFilter`] (may answer locally) →
//! [`upstream::RetryOrchestrator`] (loops over [`upstream::UpstreamClient`])
//! → [`normalize::normalize`] → output text.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod config;
pub mod error;
pub mod gateway;
pub mod normalize;
pub mod pipeline;
pub mod policy;
pub mod upstream;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => {
            subscriber.with(fmt::layer().json()).init();
        }
        _ => {
            subscriber.with(fmt::layer()).init();
        }
    }

    Ok(())
}
