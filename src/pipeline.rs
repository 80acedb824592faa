//! End-to-end prompt pipeline
//!
//! Per inbound request the flow is strictly sequential: policy evaluation,
//! request rendering, the retry loop, normalization. All state here is
//! immutable after construction, so one pipeline instance serves concurrent
//! requests without locking.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::Config;
use crate::normalize::{self, NormalizedAnswer};
use crate::policy::{PolicyDecision, PolicyFilter};
use crate::upstream::{RenderedRequest, RetryOrchestrator, UpstreamCaller, UpstreamClient};
use crate::Result;

/// Final answer returned by the pipeline
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GenerateResponse {
    /// The normalized output text (or a canned policy answer / sentinel)
    pub output: String,
    /// Raw upstream body, present only when normalization missed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
}

impl GenerateResponse {
    fn text(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            raw: None,
        }
    }
}

/// The assembled prompt pipeline
pub struct Pipeline {
    policy: PolicyFilter,
    orchestrator: RetryOrchestrator,
    config: Config,
}

impl Pipeline {
    /// Assemble the pipeline from configuration, constructing the real
    /// upstream client.
    ///
    /// # Errors
    ///
    /// Returns an error if the policy pattern does not compile or the HTTP
    /// client fails to initialize.
    pub fn new(config: Config) -> Result<Self> {
        let client = Arc::new(UpstreamClient::new(config.upstream.clone())?);
        Self::with_caller(config, client)
    }

    /// Assemble the pipeline over an arbitrary caller. Used by tests to
    /// substitute a scripted upstream.
    ///
    /// # Errors
    ///
    /// Returns an error if the policy pattern does not compile.
    pub fn with_caller(config: Config, caller: Arc<dyn UpstreamCaller>) -> Result<Self> {
        let policy = PolicyFilter::new(&config.policy)?;
        let orchestrator = RetryOrchestrator::new(caller, config.retry.clone());
        Ok(Self {
            policy,
            orchestrator,
            config,
        })
    }

    /// Run one prompt through policy, upstream call and normalization.
    ///
    /// Policy interceptions and rejections resolve here without an
    /// outbound call. A normalization miss still resolves successfully,
    /// with the sentinel output and the raw body attached; only fatal
    /// upstream errors and retry exhaustion surface as errors.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::UpstreamFatal`] for non-retryable upstream statuses.
    /// - [`crate::Error::RetryExhausted`] when the retry budget is spent.
    pub async fn generate(&self, prompt: &str) -> Result<GenerateResponse> {
        let system_instruction = match self.policy.evaluate(prompt) {
            PolicyDecision::Intercepted { answer } => {
                info!("Prompt intercepted by identity policy");
                return Ok(GenerateResponse::text(answer));
            }
            PolicyDecision::Rejected { answer } => {
                info!("Prompt rejected by topic policy");
                return Ok(GenerateResponse::text(answer));
            }
            PolicyDecision::Forward { system_instruction } => system_instruction,
        };

        let request = RenderedRequest::render(
            prompt,
            system_instruction.as_deref(),
            self.config.upstream.profile,
        );

        let body = self.orchestrator.send(&request).await?;

        match normalize::normalize(&body, request.echo_text()) {
            NormalizedAnswer::Text(output) => {
                debug!(chars = output.len(), "Normalized upstream answer");
                Ok(GenerateResponse::text(output))
            }
            NormalizedAnswer::Miss { raw } => {
                // Never silently drop the body; callers may need it for
                // support and debugging.
                info!("No known response shape matched, returning sentinel");
                Ok(GenerateResponse {
                    output: normalize::NO_ANSWER.to_string(),
                    raw: Some(raw),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::UpstreamOutcome;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Caller that always returns the same body and counts invocations
    struct FixedCaller {
        body: Value,
        calls: AtomicU32,
    }

    impl FixedCaller {
        fn new(body: Value) -> Self {
            Self {
                body,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl UpstreamCaller for FixedCaller {
        async fn call(&self, _request: &RenderedRequest) -> UpstreamOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            UpstreamOutcome::Success {
                status: 200,
                body: self.body.clone(),
            }
        }
    }

    #[tokio::test]
    async fn identity_prompt_is_answered_without_an_outbound_call() {
        // GIVEN: a pipeline whose upstream would answer if called
        let config = Config::default();
        let caller = Arc::new(FixedCaller::new(json!({"output_text": "never seen"})));
        let caller_dyn: Arc<dyn UpstreamCaller> = caller.clone();
        let pipeline = Pipeline::with_caller(config.clone(), caller_dyn).unwrap();

        // WHEN: an identity question arrives
        let response = pipeline.generate("what is your creator").await.unwrap();

        // THEN: the configured attribution, zero upstream calls
        assert_eq!(response.output, config.policy.identity_answer);
        assert_eq!(caller.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn forwarded_prompt_is_normalized() {
        let mut config = Config::default();
        config.policy.topic_filter = true;
        config.policy.inject_system_instruction = true;
        let caller = Arc::new(FixedCaller::new(json!({"output_text": "Quicksort is..."})));
        let caller_dyn: Arc<dyn UpstreamCaller> = caller.clone();
        let pipeline = Pipeline::with_caller(config, caller_dyn).unwrap();

        let response = pipeline
            .generate("explain quicksort in python")
            .await
            .unwrap();

        assert_eq!(response.output, "Quicksort is...");
        assert_eq!(response.raw, None);
        assert_eq!(caller.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn chat_answer_opening_with_the_prompt_is_kept_whole() {
        // GIVEN: a messages-profile backend whose answer begins with the
        // exact user prompt
        let mut config = Config::default();
        config.upstream.profile = crate::config::PromptProfile::Messages;
        let caller = Arc::new(FixedCaller::new(
            json!({"generated_text": "sorting is ordering items; quicksort does it recursively"}),
        ));
        let caller_dyn: Arc<dyn UpstreamCaller> = caller.clone();
        let pipeline = Pipeline::with_caller(config, caller_dyn).unwrap();

        // WHEN: the prompt coincides with the answer's opening words
        let response = pipeline.generate("sorting is ordering items").await.unwrap();

        // THEN: nothing is stripped from the front of the answer
        assert_eq!(
            response.output,
            "sorting is ordering items; quicksort does it recursively"
        );
    }

    #[tokio::test]
    async fn off_topic_prompt_is_refused_locally() {
        let mut config = Config::default();
        config.policy.topic_filter = true;
        let caller = Arc::new(FixedCaller::new(json!({"output_text": "never"})));
        let caller_dyn: Arc<dyn UpstreamCaller> = caller.clone();
        let pipeline = Pipeline::with_caller(config.clone(), caller_dyn).unwrap();

        let response = pipeline.generate("best pasta recipe").await.unwrap();

        assert_eq!(response.output, config.policy.refusal_message);
        assert_eq!(caller.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn normalization_miss_returns_sentinel_with_raw_body() {
        let body = json!({"surprise": ["new", "envelope"]});
        let caller = Arc::new(FixedCaller::new(body.clone()));
        let pipeline = Pipeline::with_caller(Config::default(), caller).unwrap();

        let response = pipeline.generate("hello").await.unwrap();

        assert_eq!(response.output, normalize::NO_ANSWER);
        assert_eq!(response.raw, Some(body));
    }
}
