//! LLM interaction: build the request body and drive the completion call.
//!
//! This module turns a prompt into completion text. It is intentionally
//! thin: prompt wording lives in [`crate::prompts`] and output parsing in
//! [`crate::pipeline::extract`].
//!
//! ## Retry Strategy
//!
//! `max_retries` is the total number of attempts. Each attempt ends in one
//! of three ways:
//!
//! | Outcome | Cause | Action |
//! |---------|-------|--------|
//! | done | 2xx with a completion in the envelope | return the text |
//! | fatal | 401 / 404, or 2xx without a completion field | return the error now |
//! | retry | 503, timeout, connection error, any other status | wait, try again |
//!
//! The wait is fixed (`retry_wait_ms`), not exponential: a 503 from Groq or
//! Ollama means "model loading", and it loads in roughly constant time. No
//! wait follows the last attempt.
//!
//! ## Transport
//!
//! The HTTP call sits behind [`CompletionTransport`] so tests and embedding
//! applications can substitute their own backend via
//! [`crate::config::QuizConfig::transport`].

use crate::config::{ApiStyle, QuizConfig};
use crate::error::QuizError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, warn};

/// Status and body of one HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawReply {
    pub status: u16,
    pub body: String,
}

impl RawReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Failure before any HTTP status was received.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("request failed: {0}")]
    Request(String),
}

/// Sends one JSON request body to the completion endpoint.
///
/// Implementations report what the server said; they do not interpret
/// status codes. Classification and retries happen in [`complete`].
#[async_trait]
pub trait CompletionTransport: Send + Sync {
    async fn send(&self, body: &Value) -> Result<RawReply, TransportError>;
}

/// [`CompletionTransport`] over `reqwest`.
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpTransport {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self, QuizError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| QuizError::Internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
        })
    }

    /// Build from the endpoint, key and timeout in `config`.
    pub fn from_config(config: &QuizConfig) -> Result<Self, QuizError> {
        Self::new(
            config.endpoint.clone(),
            config.resolve_api_key(),
            config.request_timeout_secs,
        )
    }
}

#[async_trait]
impl CompletionTransport for HttpTransport {
    async fn send(&self, body: &Value) -> Result<RawReply, TransportError> {
        let mut request = self.client.post(&self.endpoint).json(body);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(transport_error)?;
        Ok(RawReply { status, body })
    }
}

fn transport_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Request(e.to_string())
    }
}

// ── Request bodies ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: usize,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    options: GenerateOptions<'a>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct GenerateOptions<'a> {
    temperature: f32,
    top_p: f32,
    max_tokens: usize,
    stop: &'a [String],
}

/// Build the JSON request body for the configured [`ApiStyle`].
pub fn build_request_body(prompt: &str, config: &QuizConfig) -> Value {
    let body = match config.api_style {
        ApiStyle::Chat => serde_json::to_value(ChatRequest {
            model: &config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }),
        ApiStyle::Generate => serde_json::to_value(GenerateRequest {
            model: &config.model,
            prompt,
            options: GenerateOptions {
                temperature: config.temperature,
                top_p: config.top_p,
                max_tokens: config.max_tokens,
                stop: &config.stop,
            },
            stream: false,
        }),
    };
    // Plain structs of strings and numbers always serialise.
    body.unwrap_or(Value::Null)
}

// ── Response envelopes ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    choices: Vec<Choice>,
    response: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Pull the completion text out of a 2xx body.
///
/// Accepts `{"choices": [{"message": {"content": …}}]}` and
/// `{"response": …}` whatever style was requested.
pub fn completion_text(body: &str) -> Result<String, QuizError> {
    let envelope: Envelope =
        serde_json::from_str(body).map_err(|e| QuizError::UnexpectedFormat {
            detail: format!("response body is not JSON ({e})"),
            body: body.to_string(),
        })?;

    let chat = envelope
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content);

    chat.or(envelope.response)
        .ok_or_else(|| QuizError::UnexpectedFormat {
            detail: "no `choices[0].message.content` or `response` field".to_string(),
            body: body.to_string(),
        })
}

/// What one attempt amounted to.
#[derive(Debug)]
pub(crate) enum Attempt {
    Done(String),
    Retry(String),
    Fatal(QuizError),
}

pub(crate) fn classify_reply(reply: RawReply) -> Attempt {
    match reply.status {
        401 | 404 => Attempt::Fatal(QuizError::AuthOrEndpoint {
            status: reply.status,
            body: reply.body,
        }),
        503 => Attempt::Retry("HTTP 503: server busy or model loading".to_string()),
        200..=299 => match completion_text(&reply.body) {
            Ok(text) => Attempt::Done(text),
            Err(e) => Attempt::Fatal(e),
        },
        status => Attempt::Retry(format!("HTTP {status}: {}", snippet(&reply.body))),
    }
}

fn snippet(body: &str) -> String {
    const MAX: usize = 200;
    let trimmed = body.trim();
    match trimmed.char_indices().nth(MAX) {
        Some((cut, _)) => format!("{}…", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}

/// Send `prompt` and return the completion text.
///
/// Makes at most `config.max_retries` attempts with `config.retry_wait_ms`
/// between them. See the module docs for which failures are retried.
pub async fn complete(
    transport: &dyn CompletionTransport,
    prompt: &str,
    config: &QuizConfig,
) -> Result<String, QuizError> {
    let start = Instant::now();
    let body = build_request_body(prompt, config);
    let attempts = config.max_retries.max(1);
    let wait = config.retry_wait();
    let mut last_error = String::from("no attempt made");

    for attempt in 0..attempts {
        if attempt > 0 {
            warn!(
                "LLM retry {}/{} after {}ms",
                attempt + 1,
                attempts,
                wait.as_millis()
            );
            sleep(wait).await;
        }

        let outcome = match transport.send(&body).await {
            Ok(reply) => classify_reply(reply),
            Err(e) => Attempt::Retry(e.to_string()),
        };

        match outcome {
            Attempt::Done(text) => {
                debug!(
                    "Completion: {} chars after {} attempt(s), {:?}",
                    text.len(),
                    attempt + 1,
                    start.elapsed()
                );
                return Ok(text);
            }
            Attempt::Fatal(e) => {
                warn!("LLM attempt {} failed permanently: {}", attempt + 1, e);
                return Err(e);
            }
            Attempt::Retry(reason) => {
                warn!("LLM attempt {}/{} failed: {}", attempt + 1, attempts, reason);
                last_error = reason;
            }
        }
    }

    Err(QuizError::Exhausted {
        attempts,
        last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays a fixed list of replies, one per call.
    struct Scripted {
        replies: Mutex<VecDeque<Result<RawReply, TransportError>>>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(replies: Vec<Result<RawReply, TransportError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CompletionTransport for Scripted {
        async fn send(&self, _body: &Value) -> Result<RawReply, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Request("script exhausted".into())))
        }
    }

    fn config(max_retries: u32) -> QuizConfig {
        QuizConfig::builder()
            .max_retries(max_retries)
            .retry_wait_ms(5000)
            .build()
            .unwrap()
    }

    #[test]
    fn chat_body_shape() {
        let body = build_request_body("hello", &QuizConfig::default());
        assert_eq!(body["model"], "mistral-saba-24b");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "hello");
        assert_eq!(body["max_tokens"], 1024);
        assert!(body.get("stream").is_none());
    }

    #[test]
    fn generate_body_shape() {
        let cfg = QuizConfig::builder().ollama().build().unwrap();
        let body = build_request_body("hello", &cfg);
        assert_eq!(body["prompt"], "hello");
        assert_eq!(body["stream"], false);
        assert_eq!(body["options"]["max_tokens"], 2000);
        assert_eq!(body["options"]["stop"][0], "\n\n\n");
        assert!(body.get("messages").is_none());
    }

    #[test]
    fn both_envelopes_are_accepted() {
        let chat = r#"{"choices":[{"message":{"role":"assistant","content":"{\"1\":{}}"}}]}"#;
        assert_eq!(completion_text(chat).unwrap(), "{\"1\":{}}");
        assert_eq!(completion_text(r#"{"response":"ok","done":true}"#).unwrap(), "ok");
    }

    #[test]
    fn envelope_without_completion_is_unexpected_format() {
        let err = completion_text(r#"{"error":"quota"}"#).unwrap_err();
        assert_eq!(err.kind(), FailureKind::UnexpectedFormat);
        assert_eq!(err.raw_text(), Some(r#"{"error":"quota"}"#));

        let err = completion_text("<html>gateway</html>").unwrap_err();
        assert_eq!(err.kind(), FailureKind::UnexpectedFormat);
    }

    #[test]
    fn status_classification() {
        assert!(matches!(classify_reply(RawReply::new(401, "")), Attempt::Fatal(_)));
        assert!(matches!(classify_reply(RawReply::new(404, "")), Attempt::Fatal(_)));
        assert!(matches!(classify_reply(RawReply::new(503, "")), Attempt::Retry(_)));
        assert!(matches!(classify_reply(RawReply::new(500, "boom")), Attempt::Retry(r) if r.contains("500")));
        assert!(matches!(classify_reply(RawReply::new(429, "")), Attempt::Retry(_)));
        assert!(matches!(
            classify_reply(RawReply::new(200, r#"{"response":"x"}"#)),
            Attempt::Done(t) if t == "x"
        ));
        assert!(matches!(classify_reply(RawReply::new(200, "{}")), Attempt::Fatal(_)));
    }

    #[test]
    fn snippet_truncates_long_bodies() {
        let long = "x".repeat(500);
        let s = snippet(&long);
        assert!(s.ends_with('…'));
        assert_eq!(s.chars().count(), 201);
    }

    #[tokio::test(start_paused = true)]
    async fn three_503_then_success() {
        let t = Scripted::new(vec![
            Ok(RawReply::new(503, "")),
            Ok(RawReply::new(503, "")),
            Ok(RawReply::new(503, "")),
            Ok(RawReply::new(200, r#"{"response":"ok"}"#)),
        ]);
        let started = tokio::time::Instant::now();
        let text = complete(&t, "p", &config(4)).await.unwrap();
        assert_eq!(text, "ok");
        assert_eq!(t.calls(), 4);
        assert_eq!(started.elapsed(), Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn auth_failure_is_immediate() {
        let t = Scripted::new(vec![Ok(RawReply::new(401, "bad key"))]);
        let started = tokio::time::Instant::now();
        let err = complete(&t, "p", &config(4)).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::AuthOrEndpoint);
        assert_eq!(t.calls(), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn timeouts_are_retried_until_exhausted() {
        let t = Scripted::new(vec![
            Err(TransportError::Timeout),
            Err(TransportError::Timeout),
            Err(TransportError::Timeout),
        ]);
        let started = tokio::time::Instant::now();
        let err = complete(&t, "p", &config(3)).await.unwrap_err();
        match err {
            QuizError::Exhausted {
                attempts,
                last_error,
            } => {
                assert_eq!(attempts, 3);
                assert!(last_error.contains("timed out"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(t.calls(), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(10));
    }

    #[test]
    fn malformed_success_is_not_retried() {
        let t = Scripted::new(vec![
            Ok(RawReply::new(200, r#"{"id":"x"}"#)),
            Ok(RawReply::new(200, r#"{"response":"never reached"}"#)),
        ]);
        let cfg = QuizConfig::builder().retry_wait_ms(0).build().unwrap();
        let err = tokio_test::block_on(complete(&t, "p", &cfg)).unwrap_err();
        assert_eq!(err.kind(), FailureKind::UnexpectedFormat);
        assert_eq!(t.calls(), 1);
    }

    #[test]
    fn other_statuses_are_retried() {
        let t = Scripted::new(vec![
            Ok(RawReply::new(500, "internal")),
            Err(TransportError::Request("connection reset".into())),
            Ok(RawReply::new(200, r#"{"choices":[{"message":{"content":"done"}}]}"#)),
        ]);
        let cfg = QuizConfig::builder().retry_wait_ms(0).build().unwrap();
        let text = tokio_test::block_on(complete(&t, "p", &cfg)).unwrap();
        assert_eq!(text, "done");
        assert_eq!(t.calls(), 3);
    }
}
