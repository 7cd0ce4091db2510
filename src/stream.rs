//! Streaming batch API: emit per-source results as the batch progresses.
//!
//! Unlike the eager [`crate::generate::generate_from_sources`], which
//! returns only after every source finished, [`generate_stream`] yields a
//! [`SourceResult`] per source. Requests still run concurrently (bounded by
//! `config.concurrency`) but items are emitted in input order, so a slow
//! early source holds back faster later ones.

use crate::config::QuizConfig;
use crate::difficulty::DifficultyState;
use crate::error::QuizError;
use crate::generate::{prepare_sources, process_source, resolve_transport};
use crate::output::SourceResult;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of per-source results.
pub type SourceStream = Pin<Box<dyn Stream<Item = SourceResult> + Send>>;

/// Generate one quiz per source, streaming results in input order.
///
/// Failed sources are yielded as results carrying a
/// [`crate::error::SourceError`]; the stream itself never fails.
///
/// # Errors
/// Only setup failures: an invalid count, [`QuizError::NoSources`], or a
/// transport that cannot be built.
///
/// # Example
/// ```rust,no_run
/// use futures::StreamExt;
/// use nephroquiz::{generate_stream, DifficultyState, QuizConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let abstracts = vec!["Chronic kidney disease affects ...".to_string()];
/// let config = QuizConfig::default();
/// let mut stream = generate_stream(abstracts, 5, &DifficultyState::new(), &config)?;
/// while let Some(result) = stream.next().await {
///     match (result.quiz, result.error) {
///         (Some(quiz), _) => println!("Source {}: {} questions", result.index, quiz.len()),
///         (_, Some(e)) => eprintln!("{e}"),
///         _ => {}
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub fn generate_stream<I, S>(
    texts: I,
    count: usize,
    state: &DifficultyState,
    config: &QuizConfig,
) -> Result<SourceStream, QuizError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let (sources, input_sources) = prepare_sources(texts, count)?;
    let transport = resolve_transport(config)?;
    let total = sources.len();
    info!(
        "Starting streaming batch: {} source(s), {} dropped as empty",
        total,
        input_sources - total
    );

    let level = state.current_level;
    let concurrency = config.concurrency;
    let config = config.clone();

    let s = stream::iter(sources.into_iter().enumerate().map(move |(index, text)| {
        let transport = Arc::clone(&transport);
        let cfg = config.clone();
        async move {
            process_source(transport.as_ref(), index, total, &text, count, level, &cfg).await
        }
    }))
    .buffered(concurrency);

    Ok(Box::pin(s))
}
