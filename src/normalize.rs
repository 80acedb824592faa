//! Response envelope normalization
//!
//! The inference API family evolved several success-body shapes across
//! backend versions, and the gateway cannot control which variant serves a
//! given request. Extraction is attempted in fixed priority order, most
//! specific first, falling through to an explicit miss that carries the raw
//! body for diagnostics. A miss is not a call failure; the caller still
//! gets an answer, just an unhelpful one.
//!
//! Known shapes, in order:
//!
//! 1. `[{"generated_text": ...}, ...]` - classic text-generation array
//! 2. `{"generated_text": ...}` - same, unwrapped
//! 3. `{"output_text": ...}` - already-clean single field
//! 4. `{"output": [{"type": "message", "role": "assistant",
//!    "content": [{"type": "output_text", "text": ...}]}]}` - responses API
//! 5. `{"outputs": [{"type": "generated_text", "text": ...}]}` - batched
//!
//! Shapes 1 and 2 may echo the rendered prompt at the front of the text
//! (template echo); that echo is stripped by exact-prefix match before
//! trimming.

use serde_json::Value;

/// Sentinel output when no known shape matched
pub const NO_ANSWER: &str = "No response generated.";

/// A single extracted answer, or an explicit miss with the raw body
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedAnswer {
    /// Extracted and cleaned output text
    Text(String),
    /// No known envelope shape matched
    Miss {
        /// The full response body, kept for diagnostics
        raw: Value,
    },
}

impl NormalizedAnswer {
    /// The user-facing output string, sentinel on a miss.
    #[must_use]
    pub fn output(&self) -> &str {
        match self {
            Self::Text(text) => text,
            Self::Miss { .. } => NO_ANSWER,
        }
    }
}

/// Extract the canonical answer text from a raw success body.
///
/// `rendered_prompt` is the text the backend may have echoed; it is
/// stripped from `generated_text` shapes by exact-prefix match.
#[must_use]
pub fn normalize(body: &Value, rendered_prompt: &str) -> NormalizedAnswer {
    // 1. array whose first element carries generated_text
    if let Some(text) = body
        .as_array()
        .and_then(|items| items.first())
        .and_then(|first| first.get("generated_text"))
        .and_then(Value::as_str)
    {
        return NormalizedAnswer::Text(strip_echo(text, rendered_prompt));
    }

    // 2. object carrying generated_text directly
    if let Some(text) = body.get("generated_text").and_then(Value::as_str) {
        return NormalizedAnswer::Text(strip_echo(text, rendered_prompt));
    }

    // 3. object carrying output_text - already clean, no echo to strip
    if let Some(text) = body.get("output_text").and_then(Value::as_str) {
        return NormalizedAnswer::Text(text.to_string());
    }

    // 4. responses-API shape: output[] -> assistant message -> content[]
    if let Some(text) = assistant_message_text(body) {
        return NormalizedAnswer::Text(text.trim().to_string());
    }

    // 5. batched shape: outputs[] -> generated_text item
    if let Some(text) = body
        .get("outputs")
        .and_then(Value::as_array)
        .and_then(|items| {
            items
                .iter()
                .find(|item| item.get("type").and_then(Value::as_str) == Some("generated_text"))
        })
        .and_then(|item| item.get("text"))
        .and_then(Value::as_str)
    {
        return NormalizedAnswer::Text(text.trim().to_string());
    }

    NormalizedAnswer::Miss { raw: body.clone() }
}

/// Walk `output[]` for an assistant message and pull its `output_text` block.
fn assistant_message_text(body: &Value) -> Option<&str> {
    let message = body
        .get("output")?
        .as_array()?
        .iter()
        .find(|item| {
            item.get("type").and_then(Value::as_str) == Some("message")
                && item.get("role").and_then(Value::as_str) == Some("assistant")
        })?;

    message
        .get("content")?
        .as_array()?
        .iter()
        .find(|block| block.get("type").and_then(Value::as_str) == Some("output_text"))?
        .get("text")?
        .as_str()
}

/// Remove the template echo by exact-prefix match, then trim.
///
/// Prefix match only: instruct-style backends echo the rendered prompt
/// verbatim at the front of the continuation. Substring removal would risk
/// eating a legitimate restatement of the prompt inside the answer.
fn strip_echo(text: &str, rendered_prompt: &str) -> String {
    let stripped = if rendered_prompt.is_empty() {
        text
    } else {
        text.strip_prefix(rendered_prompt).unwrap_or(text)
    };
    stripped.trim().to_string()
}
