//! # nephroquiz
//!
//! Generate adaptive multiple-choice quizzes on kidney disease with a
//! Large Language Model.
//!
//! ## Why this crate?
//!
//! Asking a model for "a quiz as JSON" is easy; getting something a learner
//! can be scored on is not. Models wrap the JSON in prose, break escapes,
//! run out of tokens mid-object, and answer with `"B) Stage 5"` instead of
//! `"b"`. This crate drives the request, salvages the JSON, normalises both
//! shapes the prompts produce, and keeps the next quiz at the right level
//! for the learner.
//!
//! ## Pipeline Overview
//!
//! ```text
//! topic / abstracts
//!  │
//!  ├─ 1. Clean      normalise abstract text (batch only)
//!  ├─ 2. Prompt     topic, count, difficulty → prompt text
//!  ├─ 3. LLM        HTTP call with fixed-wait retries
//!  ├─ 4. Extract    first {…} block, repaired if needed
//!  ├─ 5. Normalize  ordinal or flat JSON → Quiz
//!  └─ 6. Score      answers → QuizResult + next difficulty
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nephroquiz::{generate_quiz, record_result, DifficultyState, QuizConfig};
//! use std::collections::BTreeMap;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // API key from NEPHROQUIZ_API_KEY or GROQ_API_KEY
//!     let config = QuizConfig::default();
//!     let state = DifficultyState::new();
//!     let quiz = generate_quiz("Chronic kidney disease staging", 5, &state, &config).await?;
//!
//!     let answers: BTreeMap<String, String> = quiz
//!         .questions
//!         .iter()
//!         .map(|q| (q.id.clone(), "a".to_string()))
//!         .collect();
//!     let result = record_result(&quiz, &answers, &state)?;
//!     println!("{}/{}: {}", result.score, result.total, result.band);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `nephroquiz` binary (clap + indicatif + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! nephroquiz = { version = "0.1", default-features = false }
//! ```
//!
//! ## Endpoints
//!
//! | Backend | Builder | Dialect |
//! |---------|---------|---------|
//! | Groq (default) | `QuizConfig::builder()` | chat completions |
//! | Any OpenAI-compatible server | `.endpoint(url)` | chat completions |
//! | Local Ollama | `.ollama()` | generate |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod difficulty;
pub mod error;
pub mod generate;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod quiz;
pub mod session;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ApiStyle, PromptLanguage, QuizConfig, QuizConfigBuilder};
pub use difficulty::{next_difficulty, Difficulty, DifficultyState};
pub use error::{FailureKind, QuizError, SourceError};
pub use generate::{generate_from_sources, generate_quiz, generate_sync, generate_to_file};
pub use output::{BatchOutput, BatchStats, SourceResult};
pub use pipeline::clean::clean;
pub use pipeline::extract::extract;
pub use pipeline::input::load_sources;
pub use pipeline::llm::{CompletionTransport, HttpTransport, RawReply, TransportError};
pub use pipeline::normalize::normalize;
pub use progress::{GenerationProgressCallback, NoopProgressCallback, ProgressCallback};
pub use prompts::build_prompt;
pub use quiz::{OptionMap, Quiz, QuizQuestion};
pub use session::{record_result, QuestionGrade, QuizResult, ScoreBand, SessionState};
pub use stream::{generate_stream, SourceStream};
