//! Pre-call policy filter
//!
//! Classifies an inbound prompt before any upstream call is made:
//!
//! - **Identity interception**: questions about who created/built/trained
//!   the assistant are answered locally with the configured attribution,
//!   taking precedence over everything else.
//! - **Topic gating** (optional): prompts with no allow-listed keyword are
//!   refused with a canned message.
//! - **Pass-through**: everything else is forwarded, optionally with a
//!   constructed system instruction.
//!
//! The filter is a pure function over tables built once at startup; it does
//! no I/O and holds no mutable state, so concurrent requests share one
//! instance freely.

use regex::Regex;

use crate::config::PolicyConfig;
use crate::{Error, Result};

/// Outcome of policy evaluation for one inbound prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyDecision {
    /// Answer locally with the configured identity attribution
    Intercepted {
        /// Canned answer text
        answer: String,
    },
    /// Refuse: no allow-listed topic present
    Rejected {
        /// Canned refusal text
        answer: String,
    },
    /// Forward to the upstream backend
    Forward {
        /// System instruction to accompany the prompt, if configured
        system_instruction: Option<String>,
    },
}

/// Policy filter built from static configuration
pub struct PolicyFilter {
    identity_pattern: Regex,
    identity_answer: String,
    topic_filter: bool,
    /// Pre-lowercased keyword table
    allowed_topics: Vec<String>,
    refusal_message: String,
    system_instruction: Option<String>,
}

impl PolicyFilter {
    /// Build the filter, compiling the identity pattern and lowering the
    /// keyword table once.
    ///
    /// # Errors
    ///
    /// Returns a config error if the identity pattern is not a valid regex.
    pub fn new(config: &PolicyConfig) -> Result<Self> {
        let identity_pattern = Regex::new(&config.identity_pattern)
            .map_err(|e| Error::Config(format!("Invalid identity pattern: {e}")))?;

        let system_instruction = config
            .inject_system_instruction
            .then(|| build_system_instruction(config));

        Ok(Self {
            identity_pattern,
            identity_answer: config.identity_answer.clone(),
            topic_filter: config.topic_filter,
            allowed_topics: config
                .allowed_topics
                .iter()
                .map(|k| k.to_lowercase())
                .collect(),
            refusal_message: config.refusal_message.clone(),
            system_instruction,
        })
    }

    /// Classify a prompt.
    ///
    /// Keyword matching is substring-based and case-insensitive, without
    /// stemming or tokenization: a keyword embedded in an unrelated word
    /// still counts. That false-positive source is accepted rather than
    /// corrected.
    #[must_use]
    pub fn evaluate(&self, prompt: &str) -> PolicyDecision {
        let prompt = prompt.trim();

        // Identity check takes precedence over the topic filter.
        if self.identity_pattern.is_match(prompt) {
            return PolicyDecision::Intercepted {
                answer: self.identity_answer.clone(),
            };
        }

        if self.topic_filter {
            let lowered = prompt.to_lowercase();
            let on_topic = self.allowed_topics.iter().any(|k| lowered.contains(k));
            if !on_topic {
                return PolicyDecision::Rejected {
                    answer: self.refusal_message.clone(),
                };
            }
        }

        PolicyDecision::Forward {
            system_instruction: self.system_instruction.clone(),
        }
    }
}

/// Construct the system instruction attached to forwarded prompts.
///
/// Restates the identity answer even though the filter already intercepts
/// identity questions; the model sees it for phrasings the pattern misses.
fn build_system_instruction(config: &PolicyConfig) -> String {
    format!(
        "You are {persona}, an assistant built by {owner}. \
         Answer in well-formatted markdown only. \
         Never mention the model provider or the underlying model. \
         If asked who created you, answer: {identity}",
        persona = config.persona,
        owner = config.owner,
        identity = config.identity_answer,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(config: &PolicyConfig) -> PolicyFilter {
        PolicyFilter::new(config).expect("default pattern compiles")
    }

    fn restricted() -> PolicyConfig {
        PolicyConfig {
            topic_filter: true,
            ..PolicyConfig::default()
        }
    }

    // ── Identity interception ──────────────────────────────────────────

    #[test]
    fn identity_questions_are_intercepted() {
        let config = PolicyConfig::default();
        let filter = filter(&config);

        for prompt in [
            "who created you",
            "Who Created You?",
            "what is your creator",
            "who built you exactly",
            "what are you",
            "where are you from",
            "tell me, who trained you?",
        ] {
            let decision = filter.evaluate(prompt);
            assert_eq!(
                decision,
                PolicyDecision::Intercepted {
                    answer: config.identity_answer.clone()
                },
                "expected interception for {prompt:?}"
            );
        }
    }

    #[test]
    fn identity_check_precedes_topic_filter() {
        // GIVEN: topic filtering enabled and an identity question with no
        // allow-listed keyword
        let config = restricted();
        let filter = filter(&config);

        // THEN: intercepted, never rejected
        let decision = filter.evaluate("who made you");
        assert!(matches!(decision, PolicyDecision::Intercepted { .. }));
    }

    // ── Topic gating ───────────────────────────────────────────────────

    #[test]
    fn off_topic_prompt_is_rejected() {
        let config = restricted();
        let filter = filter(&config);

        let decision = filter.evaluate("what is the best pasta recipe");
        assert_eq!(
            decision,
            PolicyDecision::Rejected {
                answer: config.refusal_message.clone()
            }
        );
    }

    #[test]
    fn on_topic_prompt_is_forwarded() {
        let filter = filter(&restricted());
        let decision = filter.evaluate("explain quicksort in python code");
        assert!(matches!(decision, PolicyDecision::Forward { .. }));
    }

    #[test]
    fn keyword_match_is_case_insensitive_substring() {
        let filter = filter(&restricted());

        // "tech" inside "TECHNIQUE" counts - documented false positive
        let decision = filter.evaluate("describe a knitting TECHNIQUE");
        assert!(matches!(decision, PolicyDecision::Forward { .. }));
    }

    #[test]
    fn topic_filter_disabled_forwards_everything() {
        let filter = filter(&PolicyConfig::default());
        let decision = filter.evaluate("what is the best pasta recipe");
        assert!(matches!(decision, PolicyDecision::Forward { .. }));
    }

    // ── System instruction ─────────────────────────────────────────────

    #[test]
    fn forward_carries_system_instruction_when_configured() {
        let config = PolicyConfig {
            inject_system_instruction: true,
            ..PolicyConfig::default()
        };
        let filter = filter(&config);

        match filter.evaluate("summarize this article") {
            PolicyDecision::Forward {
                system_instruction: Some(instruction),
            } => {
                assert!(instruction.contains(&config.persona));
                assert!(instruction.contains(&config.owner));
                assert!(instruction.contains(&config.identity_answer));
                assert!(instruction.contains("markdown"));
            }
            other => panic!("expected Forward with instruction, got {other:?}"),
        }
    }

    #[test]
    fn forward_has_no_instruction_by_default() {
        let filter = filter(&PolicyConfig::default());
        assert_eq!(
            filter.evaluate("summarize this article"),
            PolicyDecision::Forward {
                system_instruction: None
            }
        );
    }

    #[test]
    fn invalid_pattern_is_a_config_error() {
        let config = PolicyConfig {
            identity_pattern: "(unclosed".to_string(),
            ..PolicyConfig::default()
        };
        assert!(matches!(PolicyFilter::new(&config), Err(Error::Config(_))));
    }
}
