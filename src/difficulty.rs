//! Adaptive difficulty.
//!
//! The level of the next quiz follows the learner's cumulative hit rate:
//! above 80 % the questions get harder, at or below 40 % they get easier.
//! Until there is enough history the level stays at [`Difficulty::Medium`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Minimum history before the hit rate is trusted.
pub const MIN_HISTORY: u32 = 3;

/// Hit rate at or above which the next quiz is [`Difficulty::Hard`].
pub const HARD_THRESHOLD: f64 = 0.8;

/// Hit rate at or below which the next quiz is [`Difficulty::Easy`].
pub const EASY_THRESHOLD: f64 = 0.4;

/// Difficulty level requested from the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    /// English label, as inserted in prompts.
    pub fn label(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    /// French label ("Facile", "Moyen", "Difficile").
    pub fn label_fr(self) -> &'static str {
        match self {
            Difficulty::Easy => "Facile",
            Difficulty::Medium => "Moyen",
            Difficulty::Hard => "Difficile",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Derive the next level from cumulative counters.
///
/// `score` is the number of correct answers, `attempts` the number of
/// scored questions. Fewer than [`MIN_HISTORY`] attempts yields `Medium`.
pub fn next_difficulty(score: u32, attempts: u32) -> Difficulty {
    if attempts < MIN_HISTORY {
        return Difficulty::Medium;
    }
    let ratio = f64::from(score) / f64::from(attempts);
    if ratio >= HARD_THRESHOLD {
        Difficulty::Hard
    } else if ratio <= EASY_THRESHOLD {
        Difficulty::Easy
    } else {
        Difficulty::Medium
    }
}

/// Rolling performance of one learner for the lifetime of a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifficultyState {
    /// Correct answers across all completed quizzes.
    pub consecutive_score: u32,
    /// Scored questions across all completed quizzes.
    pub consecutive_count: u32,
    /// Number of submitted quizzes.
    pub quizzes_completed: u32,
    /// Level the next quiz is generated at.
    pub current_level: Difficulty,
}

impl DifficultyState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the state after one more completed quiz.
    ///
    /// Counters accumulate exactly once per quiz, whatever its length.
    pub fn record(&self, correct: u32, total: u32) -> Self {
        let consecutive_score = self.consecutive_score.saturating_add(correct.min(total));
        let consecutive_count = self.consecutive_count.saturating_add(total);
        let quizzes_completed = self.quizzes_completed.saturating_add(1);
        let current_level = if quizzes_completed < MIN_HISTORY {
            Difficulty::Medium
        } else {
            next_difficulty(consecutive_score, consecutive_count)
        };
        Self {
            consecutive_score,
            consecutive_count,
            quizzes_completed,
            current_level,
        }
    }

    /// Cumulative hit rate in `[0, 1]`, or `None` before any scored question.
    pub fn hit_rate(&self) -> Option<f64> {
        (self.consecutive_count > 0)
            .then(|| f64::from(self.consecutive_score) / f64::from(self.consecutive_count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_history_is_medium() {
        assert_eq!(next_difficulty(0, 0), Difficulty::Medium);
        assert_eq!(next_difficulty(2, 2), Difficulty::Medium);
    }

    #[test]
    fn thresholds() {
        assert_eq!(next_difficulty(9, 10), Difficulty::Hard);
        assert_eq!(next_difficulty(8, 10), Difficulty::Hard);
        assert_eq!(next_difficulty(2, 10), Difficulty::Easy);
        assert_eq!(next_difficulty(4, 10), Difficulty::Easy);
        assert_eq!(next_difficulty(5, 10), Difficulty::Medium);
        assert_eq!(next_difficulty(7, 10), Difficulty::Medium);
    }

    #[test]
    fn state_stays_medium_for_first_quizzes() {
        let s = DifficultyState::new().record(5, 5).record(5, 5);
        assert_eq!(s.quizzes_completed, 2);
        assert_eq!(s.current_level, Difficulty::Medium);
        let s = s.record(5, 5);
        assert_eq!(s.current_level, Difficulty::Hard);
    }

    #[test]
    fn state_accumulates_once_per_quiz() {
        let s = DifficultyState::new().record(3, 5);
        assert_eq!(s.consecutive_score, 3);
        assert_eq!(s.consecutive_count, 5);
        let s = s.record(1, 5).record(0, 5);
        assert_eq!(s.consecutive_score, 4);
        assert_eq!(s.consecutive_count, 15);
        assert_eq!(s.current_level, Difficulty::Easy);
    }

    #[test]
    fn correct_is_capped_by_total() {
        let s = DifficultyState::new().record(9, 5);
        assert_eq!(s.consecutive_score, 5);
        assert_eq!(s.hit_rate(), Some(1.0));
    }

    #[test]
    fn hit_rate_empty() {
        assert_eq!(DifficultyState::new().hit_rate(), None);
    }

    #[test]
    fn labels() {
        assert_eq!(Difficulty::Hard.to_string(), "hard");
        assert_eq!(Difficulty::Easy.label_fr(), "Facile");
    }
}
