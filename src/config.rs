//! Configuration management

use std::{env, path::Path, time::Duration};

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Error, Result};

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Environment files to load before credential resolution.
    /// Loaded in order, later files override earlier. Files that don't
    /// exist are silently skipped.
    #[serde(default)]
    pub env_files: Vec<String>,
    /// Server configuration
    pub server: ServerConfig,
    /// Upstream inference backend configuration
    pub upstream: UpstreamConfig,
    /// Retry configuration
    pub retry: RetryConfig,
    /// Policy filter configuration
    pub policy: PolicyConfig,
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// # Errors
    ///
    /// Returns an error if the config file does not exist, cannot be
    /// parsed, or an `env:` credential reference cannot be resolved.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        // Merge environment variables (INFERGATE_ prefix)
        figment = figment.merge(Env::prefixed("INFERGATE_").split("__"));

        let mut config: Self = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;

        // Load env files into the process environment before resolving
        // `env:` credential references.
        config.load_env_files();
        config.upstream.resolve_token()?;
        config.upstream.validate()?;

        Ok(config)
    }

    /// Load environment files into the process environment.
    fn load_env_files(&self) {
        for path_str in &self.env_files {
            let path = Path::new(path_str);
            if path.exists() {
                match dotenvy::from_path(path) {
                    Ok(()) => {
                        tracing::info!("Loaded env file: {path_str}");
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load env file {path_str}: {e}");
                    }
                }
            } else {
                tracing::debug!("Env file not found (skipped): {path_str}");
            }
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Prompt rendering profile, selected per backend family.
///
/// A static configuration property, never a per-request decision:
/// - `raw` sends the bare prompt string (chat-completion style backends);
/// - `instruct` wraps the prompt in an instruction template (encoder models
///   expecting few-shot style prompting);
/// - `messages` sends role-tagged system/user messages.
///
/// A policy-injected system instruction always forces the messages shape
/// regardless of profile, since the other two have nowhere to carry it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PromptProfile {
    /// Bare prompt string
    #[default]
    Raw,
    /// Instruction-template wrapped string
    Instruct,
    /// Role-tagged message list
    Messages,
}

/// Upstream inference backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Inference endpoint URL
    pub endpoint: String,
    /// API token. Supports a literal value or an `env:VAR_NAME` reference
    /// resolved at startup. Never logged.
    pub api_token: String,
    /// Prompt rendering profile
    pub profile: PromptProfile,
    /// Per-call request timeout
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Maximum new tokens to generate
    pub max_new_tokens: u32,
    /// Sampling temperature
    pub temperature: f64,
    /// Ask the backend to hold the request while a cold model loads
    pub wait_for_model: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api-inference.huggingface.co/models/google/gemma-2-2b-it"
                .to_string(),
            api_token: "env:HF_API_TOKEN".to_string(),
            profile: PromptProfile::Raw,
            request_timeout: Duration::from_secs(120),
            max_new_tokens: 256,
            temperature: 0.7,
            wait_for_model: true,
        }
    }
}

impl UpstreamConfig {
    /// Resolve an `env:VAR_NAME` token reference to its actual value.
    ///
    /// # Errors
    ///
    /// Returns an error if the referenced variable is not set. The error
    /// names the variable, never the value.
    pub fn resolve_token(&mut self) -> Result<()> {
        if let Some(var_name) = self.api_token.strip_prefix("env:") {
            self.api_token = env::var(var_name).map_err(|_| {
                Error::Config(format!(
                    "Environment variable '{var_name}' not set (required for upstream auth)"
                ))
            })?;
        }
        Ok(())
    }

    /// Validate the endpoint URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is not a valid absolute URL.
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.endpoint)
            .map_err(|e| Error::Config(format!("Invalid upstream endpoint: {e}")))?;
        Ok(())
    }
}

/// Retry configuration for the upstream call loop
///
/// Both backoff intervals are fixed constants per attempt; the observed
/// backend behavior does not reward exponential growth. 503 gets the longer
/// interval because it signals a cold-starting model that needs real time
/// to load, while transport blips usually clear faster.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum attempts before giving up
    pub max_attempts: u32,
    /// Backoff after a 503 (model unavailable / cold start)
    #[serde(with = "humantime_serde")]
    pub unavailable_backoff: Duration,
    /// Backoff after a transport-level failure
    #[serde(with = "humantime_serde")]
    pub transport_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            unavailable_backoff: Duration::from_secs(3),
            transport_backoff: Duration::from_secs(2),
        }
    }
}

/// Policy filter configuration
///
/// These tables are read once at startup and never mutated; the filter
/// itself is a pure function over them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Persona name the assistant presents as
    pub persona: String,
    /// Owner identity used in the attribution answer
    pub owner: String,
    /// Canned answer for identity questions
    pub identity_answer: String,
    /// Case-insensitive pattern matching identity questions
    pub identity_pattern: String,
    /// Enable the allowed-topic keyword filter
    pub topic_filter: bool,
    /// Keywords that mark a prompt as on-topic (substring match, lowercase)
    pub allowed_topics: Vec<String>,
    /// Canned refusal for off-topic prompts
    pub refusal_message: String,
    /// Attach a system instruction to forwarded prompts
    pub inject_system_instruction: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            persona: "Aria".to_string(),
            owner: "the Aria team".to_string(),
            identity_answer: "I was created by the Aria team.".to_string(),
            identity_pattern: r"(?i)\b(?:who|what)\s+(?:created|built|made|trained|developed|designed)\s+you\b|\b(?:who|what)\s+is\s+your\s+(?:creator|maker|developer|owner)\b|\bwhat\s+are\s+you\b|\bwhere\s+are\s+you\s+from\b".to_string(),
            topic_filter: false,
            allowed_topics: vec![
                "program".to_string(),
                "code".to_string(),
                "software".to_string(),
                "web".to_string(),
                "tech".to_string(),
                "computer".to_string(),
                "data".to_string(),
                "api".to_string(),
                "python".to_string(),
                "javascript".to_string(),
                "rust".to_string(),
            ],
            refusal_message: "I can only help with programming and technology topics."
                .to_string(),
            inject_system_instruction: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_sane() {
        let config = Config::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.unavailable_backoff, Duration::from_secs(3));
        assert_eq!(config.retry.transport_backoff, Duration::from_secs(2));
        assert_eq!(config.upstream.profile, PromptProfile::Raw);
        assert!(!config.policy.topic_filter);
    }

    #[test]
    fn profile_deserializes_lowercase() {
        let profile: PromptProfile = serde_json::from_str("\"instruct\"").unwrap();
        assert_eq!(profile, PromptProfile::Instruct);
        let profile: PromptProfile = serde_json::from_str("\"messages\"").unwrap();
        assert_eq!(profile, PromptProfile::Messages);
    }

    #[test]
    fn load_missing_file_fails() {
        let result = Config::load(Some(Path::new("/nonexistent/gateway.yaml")));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn load_yaml_overrides_defaults() {
        let mut file = tempfile::Builder::new()
            .suffix(".yaml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            "server:\n  port: 9000\nupstream:\n  api_token: literal-token\n  profile: instruct\nretry:\n  max_attempts: 2\npolicy:\n  topic_filter: true"
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.upstream.profile, PromptProfile::Instruct);
        assert_eq!(config.retry.max_attempts, 2);
        assert!(config.policy.topic_filter);
        // literal token passes through untouched
        assert_eq!(config.upstream.api_token, "literal-token");
    }

    #[test]
    fn invalid_endpoint_is_a_config_error() {
        let upstream = UpstreamConfig {
            endpoint: "not a url".to_string(),
            ..UpstreamConfig::default()
        };
        assert!(matches!(upstream.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn env_token_reference_missing_var_fails() {
        let mut upstream = UpstreamConfig {
            api_token: "env:INFERGATE_TEST_NO_SUCH_VAR".to_string(),
            ..UpstreamConfig::default()
        };
        let err = upstream.resolve_token().unwrap_err();
        // error names the variable, never a value
        assert!(err.to_string().contains("INFERGATE_TEST_NO_SUCH_VAR"));
    }
}
