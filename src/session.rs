//! Scoring and the interactive quiz session.
//!
//! [`record_result`] is the pure scoring function: quiz + answers + prior
//! difficulty state in, [`QuizResult`] out. [`SessionState`] wraps it with
//! the bookkeeping an interactive front end needs (current quiz, pending
//! answers, whether the quiz was already submitted).

use crate::difficulty::DifficultyState;
use crate::error::QuizError;
use crate::quiz::Quiz;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::info;

/// Feedback band for a percentage score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoreBand {
    /// 80 % and above.
    Excellent,
    /// 60 % and above.
    Good,
    /// 40 % and above.
    Fair,
    NeedsReview,
}

impl ScoreBand {
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage >= 80.0 {
            ScoreBand::Excellent
        } else if percentage >= 60.0 {
            ScoreBand::Good
        } else if percentage >= 40.0 {
            ScoreBand::Fair
        } else {
            ScoreBand::NeedsReview
        }
    }

    /// One-line feedback shown under the score.
    pub fn message(self) -> &'static str {
        match self {
            ScoreBand::Excellent => "Excellent! You master this topic.",
            ScoreBand::Good => "Good work! Keep it up.",
            ScoreBand::Fair => "Fair. Review the explanations below.",
            ScoreBand::NeedsReview => "This topic needs more review.",
        }
    }
}

impl fmt::Display for ScoreBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// How one question was answered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionGrade {
    pub id: String,
    /// Key the learner picked, if any.
    pub chosen: Option<String>,
    pub correct_key: String,
    pub is_correct: bool,
    pub explanation: String,
}

/// Outcome of one submitted quiz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizResult {
    pub score: u32,
    pub total: u32,
    /// `score / total * 100`.
    pub percentage: f64,
    pub band: ScoreBand,
    /// One entry per question, in quiz order.
    pub grades: Vec<QuestionGrade>,
    /// Difficulty state after this quiz.
    pub difficulty: DifficultyState,
}

/// Score `answers` against `quiz` and fold the result into `state`.
///
/// Unanswered questions and keys that are not an option count as wrong.
/// A quiz with any unresolved correct key, or with no questions at all, is
/// rejected with [`QuizError::Unscoreable`] and `state` is not advanced.
pub fn record_result(
    quiz: &Quiz,
    answers: &BTreeMap<String, String>,
    state: &DifficultyState,
) -> Result<QuizResult, QuizError> {
    let unscoreable = quiz.unscoreable_ids();
    if quiz.is_empty() || !unscoreable.is_empty() {
        return Err(QuizError::Unscoreable {
            question_ids: unscoreable,
        });
    }

    let grades: Vec<QuestionGrade> = quiz
        .questions
        .iter()
        .map(|q| {
            let chosen = answers.get(&q.id).cloned();
            QuestionGrade {
                id: q.id.clone(),
                is_correct: chosen.as_deref().is_some_and(|k| q.is_correct(k)),
                chosen,
                correct_key: q.correct_key.clone().unwrap_or_default(),
                explanation: q.explanation.clone(),
            }
        })
        .collect();

    let score = grades.iter().filter(|g| g.is_correct).count() as u32;
    let total = grades.len() as u32;
    let percentage = f64::from(score) * 100.0 / f64::from(total);
    let difficulty = state.record(score, total);

    info!(
        "Quiz scored {}/{} ({:.0}%), next level {}",
        score, total, percentage, difficulty.current_level
    );

    Ok(QuizResult {
        score,
        total,
        percentage,
        band: ScoreBand::from_percentage(percentage),
        grades,
        difficulty,
    })
}

/// State of one learner's interactive session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionState {
    pub difficulty: DifficultyState,
    pub quiz: Option<Quiz>,
    /// Question id to chosen key.
    pub answers: BTreeMap<String, String>,
    pub submitted: bool,
    pub last_result: Option<QuizResult>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new quiz, discarding any pending answers.
    pub fn begin(&mut self, quiz: Quiz) {
        self.quiz = Some(quiz);
        self.answers.clear();
        self.submitted = false;
        self.last_result = None;
    }

    /// Record `key` for question `id`.
    ///
    /// Returns false (and changes nothing) when there is no open quiz, the
    /// question does not exist, or `key` is not one of its options.
    pub fn answer(&mut self, id: &str, key: &str) -> bool {
        if self.submitted {
            return false;
        }
        let valid = self
            .quiz
            .as_ref()
            .and_then(|quiz| quiz.question(id))
            .is_some_and(|q| q.options.contains_key(key));
        if valid {
            self.answers.insert(id.to_string(), key.to_string());
        }
        valid
    }

    /// Ids of open-quiz questions still without an answer.
    pub fn unanswered(&self) -> Vec<String> {
        self.quiz
            .iter()
            .flat_map(|quiz| quiz.questions.iter())
            .filter(|q| !self.answers.contains_key(&q.id))
            .map(|q| q.id.clone())
            .collect()
    }

    /// True when a quiz is open, not yet submitted, and every question has an answer.
    pub fn can_submit(&self) -> bool {
        !self.submitted
            && self.quiz.as_ref().is_some_and(|q| !q.is_empty())
            && self.unanswered().is_empty()
    }

    /// Score the open quiz and advance the difficulty state.
    pub fn submit(&mut self) -> Result<QuizResult, QuizError> {
        let Some(quiz) = self.quiz.as_ref() else {
            return Err(QuizError::SubmitRejected {
                reason: "no quiz in progress".into(),
            });
        };
        if self.submitted {
            return Err(QuizError::SubmitRejected {
                reason: "already submitted".into(),
            });
        }
        let missing = self.unanswered();
        if !missing.is_empty() {
            return Err(QuizError::SubmitRejected {
                reason: format!("unanswered question(s) {}", missing.join(", ")),
            });
        }

        let result = record_result(quiz, &self.answers, &self.difficulty)?;
        self.difficulty = result.difficulty.clone();
        self.submitted = true;
        self.last_result = Some(result.clone());
        Ok(result)
    }

    /// Close the current quiz. Difficulty history is kept.
    pub fn reset(&mut self) {
        self.quiz = None;
        self.answers.clear();
        self.submitted = false;
        self.last_result = None;
    }
}
