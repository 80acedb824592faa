//! Upstream inference backend plumbing
//!
//! The call pipeline against the hosted inference endpoint: rendering the
//! backend-bound payload, performing individual HTTP attempts, and driving
//! the bounded retry loop.

pub mod client;
pub mod request;
pub mod retry;

pub use client::{UpstreamCaller, UpstreamClient, UpstreamOutcome};
pub use request::{ChatMessage, RenderedRequest};
pub use retry::RetryOrchestrator;
