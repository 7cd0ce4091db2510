//! Eager generation entry points.
//!
//! [`generate_quiz`] produces one quiz on a topic; [`generate_from_sources`]
//! produces one quiz per abstract and waits for all of them. Use
//! [`crate::stream::generate_stream`] instead to receive batch results as
//! they become available.

use crate::config::{validate_question_count, QuizConfig};
use crate::difficulty::{Difficulty, DifficultyState};
use crate::error::{QuizError, SourceError};
use crate::output::{BatchOutput, BatchStats, SourceResult};
use crate::pipeline::llm::{CompletionTransport, HttpTransport};
use crate::pipeline::{clean, extract, llm, normalize};
use crate::prompts;
use crate::quiz::Quiz;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Generate a quiz of `count` questions on `topic`.
///
/// The level comes from `state.current_level`. The prompt is the configured
/// template if any, otherwise the built-in prompt in `config.language`.
///
/// # Errors
/// Any client, extraction or normalisation failure, see [`QuizError`].
pub async fn generate_quiz(
    topic: &str,
    count: usize,
    state: &DifficultyState,
    config: &QuizConfig,
) -> Result<Quiz, QuizError> {
    validate_question_count(count)?;
    let topic = topic.trim();
    if topic.is_empty() {
        return Err(QuizError::InvalidConfig("Topic must not be empty".into()));
    }

    let start = Instant::now();
    let level = state.current_level;
    info!("Generating {} {} question(s) on '{}'", count, level, topic);

    let prompt = match config.prompt_template {
        Some(ref template) => prompts::render_template(template, topic, count, level),
        None => prompts::build_prompt_in(config.language, topic, count, level),
    };

    let transport = resolve_transport(config)?;
    let mut quiz = quiz_from_prompt(transport.as_ref(), &prompt, count, config).await?;
    quiz.topic = topic.to_string();
    quiz.difficulty = level;

    info!(
        "Quiz ready: {} question(s) in {}ms",
        quiz.len(),
        start.elapsed().as_millis()
    );
    Ok(quiz)
}

/// Generate one quiz per source abstract.
///
/// Sources are cleaned first and empty ones dropped. Remaining sources are
/// sent concurrently (at most `config.concurrency` in flight) and the
/// results come back in input order.
///
/// # Returns
/// `Ok(BatchOutput)` as long as at least one source produced a quiz; the
/// failures are listed as [`SourceError`]s inside it.
///
/// # Errors
/// - [`QuizError::NoSources`] when every source is empty after cleaning
/// - [`QuizError::AllSourcesFailed`] when no source produced a quiz
pub async fn generate_from_sources<I, S>(
    texts: I,
    count: usize,
    state: &DifficultyState,
    config: &QuizConfig,
) -> Result<BatchOutput, QuizError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let total_start = Instant::now();
    let (sources, input_sources) = prepare_sources(texts, count)?;
    let total = sources.len();
    info!(
        "Starting batch: {} source(s), {} dropped as empty",
        total,
        input_sources - total
    );

    let transport = resolve_transport(config)?;
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }

    let level = state.current_level;
    let results: Vec<SourceResult> = stream::iter(sources.into_iter().enumerate().map(
        |(index, text)| {
            let transport = Arc::clone(&transport);
            let config = config.clone();
            async move {
                process_source(transport.as_ref(), index, total, &text, count, level, &config)
                    .await
            }
        },
    ))
    .buffered(config.concurrency)
    .collect()
    .await;

    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    if succeeded == 0 {
        let first_error = results
            .iter()
            .find_map(|r| r.error.as_ref())
            .map(|e| e.to_string())
            .unwrap_or_else(|| "Unknown error".to_string());
        return Err(QuizError::AllSourcesFailed { total, first_error });
    }

    let stats = BatchStats {
        input_sources,
        dropped_sources: input_sources - total,
        succeeded,
        failed: total - succeeded,
        total_questions: results
            .iter()
            .filter_map(|r| r.quiz.as_ref())
            .map(Quiz::len)
            .sum(),
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Batch complete: {}/{} sources, {} questions, {}ms total",
        succeeded, total, stats.total_questions, stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(total, succeeded);
    }

    Ok(BatchOutput { results, stats })
}

/// Generate a quiz and write it to `output_path` as pretty JSON.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn generate_to_file(
    topic: &str,
    count: usize,
    state: &DifficultyState,
    output_path: impl AsRef<Path>,
    config: &QuizConfig,
) -> Result<Quiz, QuizError> {
    let quiz = generate_quiz(topic, count, state, config).await?;
    write_json(output_path.as_ref(), &quiz).await?;
    Ok(quiz)
}

/// Synchronous wrapper around [`generate_quiz`].
///
/// Creates a temporary tokio runtime internally.
pub fn generate_sync(
    topic: &str,
    count: usize,
    state: &DifficultyState,
    config: &QuizConfig,
) -> Result<Quiz, QuizError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| QuizError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(generate_quiz(topic, count, state, config))
}

/// Serialise `value` as pretty JSON and write it atomically to `path`.
pub async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), QuizError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| QuizError::Internal(format!("Failed to serialise output: {}", e)))?;

    let write_failed = |source| QuizError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(write_failed)?;
    }

    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(write_failed)?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(write_failed)?;

    debug!("Wrote {} bytes to {}", json.len(), path.display());
    Ok(())
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Use the configured transport, or build an HTTP one from the endpoint settings.
pub(crate) fn resolve_transport(
    config: &QuizConfig,
) -> Result<Arc<dyn CompletionTransport>, QuizError> {
    if let Some(ref transport) = config.transport {
        return Ok(Arc::clone(transport));
    }
    let transport = HttpTransport::from_config(config)?;
    Ok(Arc::new(transport))
}

/// Clean `texts` and drop the empty ones.
///
/// Returns the usable sources and the number of inputs before cleaning.
pub(crate) fn prepare_sources<I, S>(texts: I, count: usize) -> Result<(Vec<String>, usize), QuizError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    validate_question_count(count)?;
    let texts: Vec<S> = texts.into_iter().collect();
    let input_sources = texts.len();
    let sources = clean::clean_all(texts);
    if sources.is_empty() {
        return Err(QuizError::NoSources {
            total: input_sources,
        });
    }
    Ok((sources, input_sources))
}

/// Completion → extraction → normalisation, capped at `count` questions.
async fn quiz_from_prompt(
    transport: &dyn CompletionTransport,
    prompt: &str,
    count: usize,
    config: &QuizConfig,
) -> Result<Quiz, QuizError> {
    let raw = llm::complete(transport, prompt, config).await?;
    let parsed = extract::extract(&raw)?;
    let mut quiz = normalize::normalize(&parsed)?;

    if quiz.len() > count {
        debug!("Model returned {} questions, keeping {}", quiz.len(), count);
        quiz.truncate(count);
    } else if quiz.len() < count {
        warn!("Model returned {} of {} requested questions", quiz.len(), count);
    }
    Ok(quiz)
}

/// Run one source of a batch, reporting to the progress callback.
pub(crate) async fn process_source(
    transport: &dyn CompletionTransport,
    index: usize,
    total: usize,
    text: &str,
    count: usize,
    level: Difficulty,
    config: &QuizConfig,
) -> SourceResult {
    let start = Instant::now();
    if let Some(ref cb) = config.progress_callback {
        cb.on_source_start(index, total);
    }

    let prompt = prompts::source_prompt(config.language, text, count, level);
    let outcome = quiz_from_prompt(transport, &prompt, count, config).await;
    let duration_ms = start.elapsed().as_millis() as u64;

    match outcome {
        Ok(mut quiz) => {
            quiz.topic = excerpt(text);
            quiz.difficulty = level;
            if let Some(ref cb) = config.progress_callback {
                cb.on_source_complete(index, total, quiz.len());
            }
            SourceResult {
                index,
                source_len: text.len(),
                quiz: Some(quiz),
                duration_ms,
                error: None,
            }
        }
        Err(e) => {
            warn!("Source {} failed: {}", index, e);
            let error = SourceError::from_quiz_error(index, &e);
            if let Some(ref cb) = config.progress_callback {
                cb.on_source_error(index, total, &error.detail);
            }
            SourceResult {
                index,
                source_len: text.len(),
                quiz: None,
                duration_ms,
                error: Some(error),
            }
        }
    }
}

/// First few words of a cleaned abstract, used as the quiz topic.
fn excerpt(text: &str) -> String {
    const WORDS: usize = 8;
    let mut words = text.split_whitespace();
    let head: Vec<&str> = words.by_ref().take(WORDS).collect();
    if words.next().is_some() {
        format!("{}…", head.join(" "))
    } else {
        head.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excerpt_shortens_long_text() {
        assert_eq!(excerpt("short abstract"), "short abstract");
        assert_eq!(
            excerpt("one two three four five six seven eight nine ten"),
            "one two three four five six seven eight…"
        );
    }

    #[test]
    fn prepare_drops_empty_sources() {
        let (sources, input) = prepare_sources(["Alpha.", "  ", "Beta."], 5).unwrap();
        assert_eq!(input, 3);
        assert_eq!(sources, vec!["alpha.", "beta."]);
    }

    #[test]
    fn prepare_rejects_all_empty() {
        let err = prepare_sources(["", "***"], 5).unwrap_err();
        assert!(matches!(err, QuizError::NoSources { total: 2 }));
    }

    #[test]
    fn prepare_rejects_bad_count() {
        assert!(matches!(
            prepare_sources(["Alpha."], 0),
            Err(QuizError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn write_json_is_atomic_and_pretty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("quiz.json");
        let quiz = Quiz::new("CKD", Difficulty::Hard, Vec::new());
        write_json(&path, &quiz).await.unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("\n  \"topic\": \"CKD\""));
        assert!(!path.with_extension("json.tmp").exists());
        let back: Quiz = serde_json::from_str(&written).unwrap();
        assert_eq!(back, quiz);
    }

    #[tokio::test]
    async fn empty_topic_is_rejected() {
        let err = generate_quiz("  ", 5, &DifficultyState::new(), &QuizConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, QuizError::InvalidConfig(_)));
    }
}
