//! Configuration management for quiz-chain.
//!
//! Configuration can be set via environment variables:
//! - `EMAIL` - Trusted email injected into every submission.
//! - `SECRET` - Trusted secret injected into every submission; also the value
//!   callers of `/solve` must present.
//! - `OPENROUTER_API_KEY` - Required. API key for the chat-completions endpoint.
//! - `LLM_BASE_URL` - Optional. Chat-completions URL. Defaults to OpenRouter.
//! - `DEFAULT_MODEL` - Optional. Model identifier. Defaults to `openai/gpt-4o-mini`.
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `7860`.
//! - `WATCHDOG_SECONDS` - Optional. Whole-run deadline. Defaults to `180`.
//! - `RETRY_LIMIT` - Optional. Attempts before abandoning a task. Defaults to `4`.
//! - `SLOW_THRESHOLD_SECONDS` - Optional. Per-task time budget. Defaults to `180`.
//! - `NEXT_STALE_THRESHOLD_SECONDS` - Optional. Budget for an already-proposed next task. Defaults to `90`.
//! - `SUBMIT_TIMEOUT_SECONDS` - Optional. Timeout of one submission request. Defaults to `20`.
//! - `MAX_ITERATIONS` - Optional. Hard cap on chain iterations. Defaults to `120`.
//! - `MAX_CONTEXT_TOKENS` - Optional. Conversation trim budget. Defaults to `3500`.
//! - `MAX_OUTPUT_TOKENS` - Optional. Model output cap. Defaults to `512`.
//! - `MAX_MODEL_STEPS` - Optional. Model turns allowed per submission. Defaults to `12`.
//! - `WORKSPACE_PATH` - Optional. Downloads and scripts directory. Defaults to `./workspace`.
//! - `OCR_COMMAND` - Optional. OCR program. Defaults to `tesseract`.
//! - `TRANSCRIBE_COMMAND` - Optional. Audio transcription program. Defaults to `whisper-cli`.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::chain::PolicyThresholds;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Trusted identity injected into every outbound submission.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Chain loop settings.
#[derive(Debug, Clone)]
pub struct ChainConfig {
    /// Whole-run deadline.
    pub watchdog: Duration,
    /// Retry/advance thresholds.
    pub thresholds: PolicyThresholds,
    /// Timeout of a single submission request.
    pub submit_timeout: Duration,
    /// Hard cap on driver iterations.
    pub max_iterations: usize,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            watchdog: Duration::from_secs(180),
            thresholds: PolicyThresholds::default(),
            submit_timeout: Duration::from_secs(20),
            max_iterations: 120,
        }
    }
}

/// Model and tool settings.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Conversation budget in (estimated) tokens.
    pub max_context_tokens: usize,
    /// Output tokens requested per model call.
    pub max_output_tokens: u64,
    /// Model turns allowed before a submission must be produced.
    pub max_model_steps: usize,
    /// Directory for downloads and scripts.
    pub workspace_path: PathBuf,
    pub ocr_command: String,
    pub transcribe_command: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_context_tokens: 3500,
            max_output_tokens: 512,
            max_model_steps: 12,
            workspace_path: PathBuf::from("workspace"),
            ocr_command: "tesseract".to_string(),
            transcribe_command: "whisper-cli".to_string(),
        }
    }
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Trusted submission email
    pub email: Option<String>,

    /// Trusted submission secret
    pub secret: Option<String>,

    /// Model API key
    pub api_key: String,

    /// Chat-completions endpoint
    pub llm_base_url: String,

    /// Model identifier
    pub default_model: String,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    pub chain: ChainConfig,

    pub agent: AgentConfig,
}

pub const DEFAULT_LLM_BASE_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `OPENROUTER_API_KEY` is not set,
    /// and `ConfigError::InvalidValue` for unparseable numbers.
    ///
    /// A missing `EMAIL`/`SECRET` is not an error here; requests are rejected
    /// later by [`Config::credentials`].
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("OPENROUTER_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("OPENROUTER_API_KEY".to_string()))?;

        let chain = ChainConfig {
            watchdog: Duration::from_secs(env_parse("WATCHDOG_SECONDS", 180)?),
            thresholds: PolicyThresholds {
                retry_limit: env_parse("RETRY_LIMIT", 4)?,
                slow_threshold: Duration::from_secs(env_parse("SLOW_THRESHOLD_SECONDS", 180)?),
                next_stale_threshold: Duration::from_secs(env_parse(
                    "NEXT_STALE_THRESHOLD_SECONDS",
                    90,
                )?),
            },
            submit_timeout: Duration::from_secs(env_parse("SUBMIT_TIMEOUT_SECONDS", 20)?),
            max_iterations: env_parse("MAX_ITERATIONS", 120)?,
        };

        let defaults = AgentConfig::default();
        let agent = AgentConfig {
            max_context_tokens: env_parse("MAX_CONTEXT_TOKENS", defaults.max_context_tokens)?,
            max_output_tokens: env_parse("MAX_OUTPUT_TOKENS", defaults.max_output_tokens)?,
            max_model_steps: env_parse("MAX_MODEL_STEPS", defaults.max_model_steps)?,
            workspace_path: std::env::var("WORKSPACE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.workspace_path),
            ocr_command: env_string("OCR_COMMAND").unwrap_or(defaults.ocr_command),
            transcribe_command: env_string("TRANSCRIBE_COMMAND")
                .unwrap_or(defaults.transcribe_command),
        };

        Ok(Self {
            email: env_string("EMAIL"),
            secret: env_string("SECRET"),
            api_key,
            llm_base_url: env_string("LLM_BASE_URL")
                .unwrap_or_else(|| DEFAULT_LLM_BASE_URL.to_string()),
            default_model: env_string("DEFAULT_MODEL")
                .unwrap_or_else(|| "openai/gpt-4o-mini".to_string()),
            host: env_string("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: env_parse("PORT", 7860)?,
            chain,
            agent,
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(api_key: String, default_model: String, workspace_path: PathBuf) -> Self {
        Self {
            email: None,
            secret: None,
            api_key,
            llm_base_url: DEFAULT_LLM_BASE_URL.to_string(),
            default_model,
            host: "127.0.0.1".to_string(),
            port: 7860,
            chain: ChainConfig::default(),
            agent: AgentConfig {
                workspace_path,
                ..AgentConfig::default()
            },
        }
    }

    /// Set the trusted submission identity.
    pub fn with_credentials(mut self, email: impl Into<String>, secret: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self.secret = Some(secret.into());
        self
    }

    /// Trusted identity for outbound submissions.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if either `EMAIL` or `SECRET` is unset.
    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        let secret = self
            .secret
            .clone()
            .ok_or_else(|| ConfigError::MissingEnvVar("SECRET".to_string()))?;
        let email = self
            .email
            .clone()
            .ok_or_else(|| ConfigError::MissingEnvVar("EMAIL".to_string()))?;
        Ok(Credentials { email, secret })
    }
}

/// Non-empty, trimmed environment variable.
fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match env_string(name) {
        Some(raw) => raw
            .parse()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), format!("{}", e))),
        None => Ok(default),
    }
}
