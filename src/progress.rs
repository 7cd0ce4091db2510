//! Progress-callback trait for per-source batch events.
//!
//! Inject an [`Arc<dyn GenerationProgressCallback>`] via
//! [`crate::config::QuizConfigBuilder::progress_callback`] to receive
//! events as [`crate::generate_from_sources`] works through its sources.
//!
//! Callers can forward events to a channel, a log, or a terminal progress
//! bar; the library does not care. The trait is `Send + Sync` because
//! sources are generated concurrently.
//!
//! # Example
//!
//! ```rust
//! use nephroquiz::{GenerationProgressCallback, QuizConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl GenerationProgressCallback for CountingCallback {
//!     fn on_source_complete(&self, index: usize, total: usize, questions: usize) {
//!         let done = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("Source {}/{} done ({} questions, {} so far)", index + 1, total, questions, done);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { completed: AtomicUsize::new(0) });
//!
//! let config = QuizConfig::builder()
//!     .progress_callback(counter as Arc<dyn GenerationProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the batch generator as it processes each source.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. `on_source_start`, `on_source_complete` and
/// `on_source_error` may be called concurrently from different tasks;
/// indices are 0-based positions in the input.
pub trait GenerationProgressCallback: Send + Sync {
    /// Called once before any request is sent.
    fn on_batch_start(&self, total: usize) {
        let _ = total;
    }

    /// Called just before the LLM request for a source is sent.
    fn on_source_start(&self, index: usize, total: usize) {
        let _ = (index, total);
    }

    /// Called when a source produced a quiz with `questions` questions.
    fn on_source_complete(&self, index: usize, total: usize, questions: usize) {
        let _ = (index, total, questions);
    }

    /// Called when a source failed after all retries.
    fn on_source_error(&self, index: usize, total: usize, error: &str) {
        let _ = (index, total, error);
    }

    /// Called once after every source has been attempted.
    fn on_batch_complete(&self, total: usize, success_count: usize) {
        let _ = (total, success_count);
    }
}

/// Callback that ignores every event.
pub struct NoopProgressCallback;

impl GenerationProgressCallback for NoopProgressCallback {}

/// The type stored in [`crate::config::QuizConfig`].
pub type ProgressCallback = Arc<dyn GenerationProgressCallback>;
