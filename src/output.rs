//! Result types for batch generation.

use crate::error::SourceError;
use crate::quiz::Quiz;
use serde::{Deserialize, Serialize};

/// Outcome of one source in a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceResult {
    /// 0-indexed position among the cleaned, non-empty sources.
    pub index: usize,
    /// Byte length of the cleaned source text.
    pub source_len: usize,
    pub quiz: Option<Quiz>,
    pub duration_ms: u64,
    pub error: Option<SourceError>,
}

impl SourceResult {
    pub fn is_ok(&self) -> bool {
        self.error.is_none() && self.quiz.is_some()
    }
}

/// Aggregate numbers for a batch run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchStats {
    /// Sources passed in, before cleaning.
    pub input_sources: usize,
    /// Sources dropped because they were empty after cleaning.
    pub dropped_sources: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub total_questions: usize,
    pub total_duration_ms: u64,
}

/// Everything a batch run produced, in input order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutput {
    pub results: Vec<SourceResult>,
    pub stats: BatchStats,
}

impl BatchOutput {
    /// Quizzes of the successful sources, in input order.
    pub fn quizzes(&self) -> impl Iterator<Item = &Quiz> {
        self.results.iter().filter_map(|r| r.quiz.as_ref())
    }

    pub fn errors(&self) -> impl Iterator<Item = &SourceError> {
        self.results.iter().filter_map(|r| r.error.as_ref())
    }
}
