//! Configuration types for quiz generation.
//!
//! All generation behaviour is controlled through [`QuizConfig`], built via
//! its [`QuizConfigBuilder`]. One struct holds the endpoint, the sampling
//! knobs, the retry policy and the batch fan-out width, so a config can be
//! shared across concurrent calls and logged as a whole.

use crate::error::QuizError;
use crate::pipeline::llm::CompletionTransport;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Groq's OpenAI-compatible chat completion endpoint.
pub const DEFAULT_CHAT_ENDPOINT: &str = "https://api.groq.com/openai/v1/chat/completions";

/// Local Ollama generate endpoint.
pub const OLLAMA_GENERATE_ENDPOINT: &str = "http://localhost:11434/api/generate";

pub const DEFAULT_MODEL: &str = "mistral-saba-24b";

/// Largest quiz a single request may ask for.
pub const MAX_QUESTIONS: usize = 20;

/// Environment variables consulted for the API key, in order.
pub const API_KEY_ENV_VARS: [&str; 2] = ["NEPHROQUIZ_API_KEY", "GROQ_API_KEY"];

/// Configuration for quiz generation.
///
/// Built via [`QuizConfig::builder()`] or using [`QuizConfig::default()`].
///
/// # Example
/// ```rust
/// use nephroquiz::{ApiStyle, QuizConfig};
///
/// let config = QuizConfig::builder()
///     .model("llama3-70b-8192")
///     .question_count(8)
///     .max_retries(4)
///     .build()
///     .unwrap();
/// assert_eq!(config.api_style, ApiStyle::Chat);
/// assert_eq!(config.question_count, 8);
/// ```
#[derive(Clone)]
pub struct QuizConfig {
    /// Completion endpoint URL. Default: Groq chat completions.
    pub endpoint: String,

    /// Request body / envelope dialect spoken by `endpoint`. Default: [`ApiStyle::Chat`].
    pub api_style: ApiStyle,

    /// Bearer token. If None, read from [`API_KEY_ENV_VARS`]; if still
    /// absent, requests are sent without authorisation (local Ollama).
    pub api_key: Option<String>,

    /// Model identifier. Default: `mistral-saba-24b`.
    pub model: String,

    /// Sampling temperature. Default: 0.7.
    ///
    /// Quiz writing benefits from some variety between runs on the same
    /// topic; JSON validity is handled by the extractor, not by sampling.
    pub temperature: f32,

    /// Nucleus sampling cut-off (generate style only). Default: 0.95.
    pub top_p: f32,

    /// Maximum tokens the model may generate. Default: 1024.
    ///
    /// Five questions with explanations fit comfortably; twenty do not, and
    /// a truncated completion ends mid-object (the brace-balancing repair
    /// can only rescue so much).
    pub max_tokens: usize,

    /// Stop sequences (generate style only). Default: three newlines.
    pub stop: Vec<String>,

    /// Total attempts per LLM call (≥ 1). Default: 3.
    pub max_retries: u32,

    /// Fixed wait between attempts in milliseconds. Default: 5000.
    ///
    /// A 503 from Groq or Ollama usually means the model is still loading;
    /// a flat pause gives it time without exponential blow-up.
    pub retry_wait_ms: u64,

    /// Per-request HTTP timeout in seconds. Default: 30.
    pub request_timeout_secs: u64,

    /// Number of concurrent LLM calls in batch mode. Default: 5.
    pub concurrency: usize,

    /// Questions per quiz (1–20) for callers that do not pick a count
    /// themselves, such as the CLI. Default: 5.
    pub question_count: usize,

    /// Prompt wording. Default: English.
    pub language: PromptLanguage,

    /// Custom prompt template with `{topic}`, `{number}` and `{difficulty}`
    /// placeholders. If None, uses the built-in prompt.
    pub prompt_template: Option<String>,

    /// Pre-constructed transport. Takes precedence over `endpoint`/`api_key`.
    pub transport: Option<Arc<dyn CompletionTransport>>,

    /// Per-source progress events for batch runs.
    pub progress_callback: Option<ProgressCallback>,

    /// Download timeout for URL sources in seconds. Default: 120.
    pub download_timeout_secs: u64,
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_CHAT_ENDPOINT.to_string(),
            api_style: ApiStyle::default(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.7,
            top_p: 0.95,
            max_tokens: 1024,
            stop: vec!["\n\n\n".to_string()],
            max_retries: 3,
            retry_wait_ms: 5000,
            request_timeout_secs: 30,
            concurrency: 5,
            question_count: 5,
            language: PromptLanguage::default(),
            prompt_template: None,
            transport: None,
            progress_callback: None,
            download_timeout_secs: 120,
        }
    }
}

impl fmt::Debug for QuizConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuizConfig")
            .field("endpoint", &self.endpoint)
            .field("api_style", &self.api_style)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("top_p", &self.top_p)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("retry_wait_ms", &self.retry_wait_ms)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("concurrency", &self.concurrency)
            .field("question_count", &self.question_count)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("language", &self.language)
            .field("prompt_template", &self.prompt_template.as_ref().map(|t| t.len()))
            .field("transport", &self.transport.as_ref().map(|_| "<dyn CompletionTransport>"))
            .finish()
    }
}

impl QuizConfig {
    /// Create a new builder for `QuizConfig`.
    pub fn builder() -> QuizConfigBuilder {
        QuizConfigBuilder {
            config: Self::default(),
        }
    }

    /// The wait between two attempts.
    pub fn retry_wait(&self) -> Duration {
        Duration::from_millis(self.retry_wait_ms)
    }

    /// API key from the config, falling back to the environment.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }
        API_KEY_ENV_VARS
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .find(|v| !v.trim().is_empty())
    }
}

/// Builder for [`QuizConfig`].
#[derive(Debug)]
pub struct QuizConfigBuilder {
    config: QuizConfig,
}

impl QuizConfigBuilder {
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint = url.into();
        self
    }

    pub fn api_style(mut self, style: ApiStyle) -> Self {
        self.config.api_style = style;
        self
    }

    /// Point at a local Ollama server with its generate dialect.
    pub fn ollama(mut self) -> Self {
        self.config.endpoint = OLLAMA_GENERATE_ENDPOINT.to_string();
        self.config.api_style = ApiStyle::Generate;
        self.config.model = "mistral".to_string();
        self.config.temperature = 0.1;
        self.config.max_tokens = 2000;
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn top_p(mut self, p: f32) -> Self {
        self.config.top_p = p.clamp(0.0, 1.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn stop(mut self, stop: Vec<String>) -> Self {
        self.config.stop = stop;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n.max(1);
        self
    }

    pub fn retry_wait_ms(mut self, ms: u64) -> Self {
        self.config.retry_wait_ms = ms;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs.max(1);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn question_count(mut self, n: usize) -> Self {
        self.config.question_count = n;
        self
    }

    pub fn language(mut self, language: PromptLanguage) -> Self {
        self.config.language = language;
        self
    }

    pub fn prompt_template(mut self, template: impl Into<String>) -> Self {
        self.config.prompt_template = Some(template.into());
        self
    }

    pub fn transport(mut self, transport: Arc<dyn CompletionTransport>) -> Self {
        self.config.transport = Some(transport);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs.max(1);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<QuizConfig, QuizError> {
        let c = &self.config;
        validate_question_count(c.question_count)?;
        if c.endpoint.trim().is_empty() && c.transport.is_none() {
            return Err(QuizError::InvalidConfig("Endpoint URL must not be empty".into()));
        }
        if c.model.trim().is_empty() {
            return Err(QuizError::InvalidConfig("Model must not be empty".into()));
        }
        if c.max_tokens == 0 {
            return Err(QuizError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if let Some(ref t) = c.prompt_template {
            if !t.contains("{number}") {
                return Err(QuizError::InvalidConfig(
                    "Prompt template must contain the {number} placeholder".into(),
                ));
            }
        }
        Ok(self.config)
    }
}

/// Check a requested question count against `1..=MAX_QUESTIONS`.
pub fn validate_question_count(count: usize) -> Result<(), QuizError> {
    if count == 0 || count > MAX_QUESTIONS {
        return Err(QuizError::InvalidConfig(format!(
            "Question count must be 1–{MAX_QUESTIONS}, got {count}"
        )));
    }
    Ok(())
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Wire dialect of the completion endpoint.
///
/// | Style | Request | Completion field |
/// |-------|---------|------------------|
/// | `Chat` | `{model, messages, temperature, max_tokens}` | `choices[0].message.content` |
/// | `Generate` | `{model, prompt, options, stream: false}` | `response` |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ApiStyle {
    /// OpenAI-compatible chat completions (Groq, vLLM, LiteLLM). (default)
    #[default]
    Chat,
    /// Ollama-style single-prompt generation.
    Generate,
}

/// Language of the built-in prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PromptLanguage {
    #[default]
    English,
    French,
}
