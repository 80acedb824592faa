//! Backend-bound request rendering
//!
//! A [`RenderedRequest`] is built from exactly one prompt plus at most one
//! system instruction, and is immutable once built for a given call.

use serde::Serialize;
use serde_json::{Value, json};

use crate::config::{PromptProfile, UpstreamConfig};

/// Instruction template used by the `instruct` profile.
const INSTRUCT_TEMPLATE: (&str, &str) = ("### Instruction:\n", "\n\n### Response:\n");

/// One role-tagged message for the `messages` shape
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ChatMessage {
    /// `system` or `user`
    pub role: String,
    /// Message text
    pub content: String,
}

/// The payload bound for the inference backend
#[derive(Debug, Clone, PartialEq)]
pub enum RenderedRequest {
    /// Bare prompt string
    Raw(String),
    /// Instruction-template wrapped prompt
    Instruct(String),
    /// Role-tagged message list
    Messages(Vec<ChatMessage>),
}

impl RenderedRequest {
    /// Render a prompt per the configured profile.
    ///
    /// A system instruction forces the messages shape regardless of
    /// profile; the raw and instruct shapes have nowhere to carry it.
    #[must_use]
    pub fn render(
        prompt: &str,
        system_instruction: Option<&str>,
        profile: PromptProfile,
    ) -> Self {
        let prompt = prompt.trim();

        if let Some(instruction) = system_instruction {
            return Self::Messages(vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: instruction.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ]);
        }

        match profile {
            PromptProfile::Raw => Self::Raw(prompt.to_string()),
            PromptProfile::Instruct => Self::Instruct(format!(
                "{}{prompt}{}",
                INSTRUCT_TEMPLATE.0, INSTRUCT_TEMPLATE.1
            )),
            PromptProfile::Messages => Self::Messages(vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }]),
        }
    }

    /// The rendered prompt text as the backend will echo it.
    ///
    /// Used by the normalizer for template-echo removal. The messages shape
    /// returns an empty string: chat backends answer without echoing, and an
    /// answer that happens to open with the user's words must survive intact.
    #[must_use]
    pub fn echo_text(&self) -> &str {
        match self {
            Self::Raw(text) | Self::Instruct(text) => text,
            Self::Messages(_) => "",
        }
    }

    /// Serialize into the JSON body for the inference API, attaching
    /// generation parameters and the cold-start wait hint.
    #[must_use]
    pub fn to_body(&self, config: &UpstreamConfig) -> Value {
        let inputs = match self {
            Self::Raw(text) | Self::Instruct(text) => json!(text),
            Self::Messages(messages) => json!(messages),
        };

        json!({
            "inputs": inputs,
            "parameters": {
                "max_new_tokens": config.max_new_tokens,
                "temperature": config.temperature,
            },
            "options": {
                "wait_for_model": config.wait_for_model,
            },
        })
    }
}
