//! Error types for the nephroquiz library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`QuizError`]: **Fatal**. The request cannot produce a quiz at all
//!   (bad API key, completion with no JSON in it, every source failed).
//!   Returned as `Err(QuizError)` from the top-level `generate*` functions
//!   and from [`crate::session::record_result`].
//!
//! * [`SourceError`]: **Non-fatal**. One abstract of a batch failed but the
//!   others are fine. Stored inside [`crate::output::SourceResult`] so callers
//!   can keep the quizzes that did come back.
//!
//! Every fatal variant maps to a [`FailureKind`] tag so a UI can branch on
//! the category without matching on message text, and [`QuizError::raw_text`]
//! hands back the offending completion (or body) for inspection.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the nephroquiz library.
#[derive(Debug, Error)]
pub enum QuizError {
    // ── LLM client ────────────────────────────────────────────────────────
    /// HTTP 401 or 404: wrong key or wrong URL. Never retried.
    #[error("LLM endpoint rejected the request with HTTP {status}\nCheck the API key and the endpoint URL.")]
    AuthOrEndpoint { status: u16, body: String },

    /// Every attempt failed with a transient error.
    #[error("LLM call failed after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },

    /// 2xx response whose envelope carries no completion text.
    #[error("Unexpected response format from the LLM endpoint: {detail}")]
    UnexpectedFormat { detail: String, body: String },

    // ── Extraction ────────────────────────────────────────────────────────
    /// No `{ … }` candidate anywhere in the completion.
    #[error("No JSON object found in the model response")]
    NoJson { raw: String },

    /// A candidate was found but stayed unparseable after repairs.
    #[error("Invalid JSON in the model response: {message}")]
    InvalidJson { message: String, raw: String },

    // ── Normalisation ─────────────────────────────────────────────────────
    /// The parsed object matched neither the ordinal nor the flat quiz shape.
    #[error("Quiz schema mismatch: {detail}")]
    SchemaMismatch { detail: String, raw: String },

    // ── Scoring ───────────────────────────────────────────────────────────
    /// At least one question has no resolvable correct answer.
    #[error("Quiz cannot be scored: no correct answer for question(s) {}", .question_ids.join(", "))]
    Unscoreable { question_ids: Vec<String> },

    /// `SessionState::submit` called without a complete set of answers.
    #[error("Quiz cannot be submitted yet: {reason}")]
    SubmitRejected { reason: String },

    // ── Batch ─────────────────────────────────────────────────────────────
    /// Every source was empty after cleaning.
    #[error("No usable source text (all {total} inputs were empty after cleaning)")]
    NoSources { total: usize },

    /// Every source of a batch failed; output would be empty.
    #[error("All {total} sources failed.\nFirst error: {first_error}")]
    AllSourcesFailed { total: usize, first_error: String },

    // ── Input / output ────────────────────────────────────────────────────
    /// Source file was not found or not readable.
    #[error("Source file not found: '{path}'")]
    InputNotFound { path: PathBuf },

    /// HTTP source download failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Could not create or write the output JSON file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Category tag for a failure, stable across message wording changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    AuthOrEndpoint,
    Exhausted,
    UnexpectedFormat,
    NoJson,
    InvalidJson,
    SchemaMismatch,
    Unscoreable,
    SubmitRejected,
    NoSources,
    AllSourcesFailed,
    Io,
    InvalidConfig,
    Internal,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl QuizError {
    /// The category of this failure.
    pub fn kind(&self) -> FailureKind {
        match self {
            QuizError::AuthOrEndpoint { .. } => FailureKind::AuthOrEndpoint,
            QuizError::Exhausted { .. } => FailureKind::Exhausted,
            QuizError::UnexpectedFormat { .. } => FailureKind::UnexpectedFormat,
            QuizError::NoJson { .. } => FailureKind::NoJson,
            QuizError::InvalidJson { .. } => FailureKind::InvalidJson,
            QuizError::SchemaMismatch { .. } => FailureKind::SchemaMismatch,
            QuizError::Unscoreable { .. } => FailureKind::Unscoreable,
            QuizError::SubmitRejected { .. } => FailureKind::SubmitRejected,
            QuizError::NoSources { .. } => FailureKind::NoSources,
            QuizError::AllSourcesFailed { .. } => FailureKind::AllSourcesFailed,
            QuizError::InputNotFound { .. }
            | QuizError::DownloadFailed { .. }
            | QuizError::OutputWriteFailed { .. } => FailureKind::Io,
            QuizError::InvalidConfig(_) => FailureKind::InvalidConfig,
            QuizError::Internal(_) => FailureKind::Internal,
        }
    }

    /// The raw text that caused the failure, when there is one.
    ///
    /// For client errors this is the response body; for extraction and
    /// normalisation errors it is the completion (or repaired candidate).
    pub fn raw_text(&self) -> Option<&str> {
        match self {
            QuizError::AuthOrEndpoint { body, .. } | QuizError::UnexpectedFormat { body, .. } => {
                Some(body)
            }
            QuizError::NoJson { raw }
            | QuizError::InvalidJson { raw, .. }
            | QuizError::SchemaMismatch { raw, .. } => Some(raw),
            _ => None,
        }
    }

    /// Whether a fresh request could plausibly succeed.
    ///
    /// Bad credentials and scoring failures will not fix themselves; an
    /// exhausted retry budget or an unparseable completion might.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind(),
            FailureKind::Exhausted
                | FailureKind::NoJson
                | FailureKind::InvalidJson
                | FailureKind::SchemaMismatch
        )
    }
}

/// A non-fatal error for a single source of a batch.
///
/// Stored alongside [`crate::output::SourceResult`] when one abstract fails.
/// The batch continues unless ALL sources fail.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("Source {index}: {kind}: {detail}")]
pub struct SourceError {
    /// 0-indexed position of the source in the cleaned batch.
    pub index: usize,
    pub kind: FailureKind,
    pub detail: String,
}

impl SourceError {
    pub fn from_quiz_error(index: usize, err: &QuizError) -> Self {
        Self {
            index,
            kind: err.kind(),
            detail: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_error_display() {
        let e = QuizError::AuthOrEndpoint {
            status: 401,
            body: "invalid key".into(),
        };
        assert!(e.to_string().contains("401"));
        assert_eq!(e.kind(), FailureKind::AuthOrEndpoint);
        assert_eq!(e.raw_text(), Some("invalid key"));
    }

    #[test]
    fn exhausted_display() {
        let e = QuizError::Exhausted {
            attempts: 3,
            last_error: "HTTP 503".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("3 attempts"), "got: {msg}");
        assert!(msg.contains("503"));
        assert!(e.is_transient());
    }

    #[test]
    fn unscoreable_lists_ids() {
        let e = QuizError::Unscoreable {
            question_ids: vec!["2".into(), "4".into()],
        };
        assert!(e.to_string().contains("2, 4"));
        assert!(!e.is_transient());
    }

    #[test]
    fn invalid_json_keeps_raw() {
        let e = QuizError::InvalidJson {
            message: "EOF while parsing".into(),
            raw: "{\"1\":".into(),
        };
        assert_eq!(e.kind(), FailureKind::InvalidJson);
        assert_eq!(e.raw_text(), Some("{\"1\":"));
    }

    #[test]
    fn io_variants_share_kind() {
        let e = QuizError::InputNotFound {
            path: PathBuf::from("abstracts.txt"),
        };
        assert_eq!(e.kind(), FailureKind::Io);
        assert!(e.raw_text().is_none());
    }

    #[test]
    fn source_error_from_quiz_error() {
        let e = QuizError::NoJson { raw: "nope".into() };
        let s = SourceError::from_quiz_error(2, &e);
        assert_eq!(s.index, 2);
        assert_eq!(s.kind, FailureKind::NoJson);
        assert!(s.to_string().starts_with("Source 2: NoJson"));
    }
}
