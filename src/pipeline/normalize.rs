//! Normalisation: map a parsed completion onto [`Quiz`] records.
//!
//! Two shapes are accepted.
//!
//! **Ordinal** (what the topic prompt asks for):
//!
//! ```json
//! { "1": { "question": "…", "options": {"a": "…", "b": "…"}, "correct": "a", "explanation": "…" } }
//! ```
//!
//! **Flat** (what the per-abstract prompt asks for, and what older batch
//! runs produced):
//!
//! ```json
//! { "question1": "…", "A_1": "…", "B_1": "…", "C_1": "…", "D_1": "…", "reponse1": "A" }
//! ```
//!
//! Missing text fields become empty strings. A correct answer that cannot
//! be matched to an option is kept as `None` so scoring can refuse the
//! question instead of silently marking it.

use crate::difficulty::Difficulty;
use crate::error::QuizError;
use crate::pipeline::extract::ParsedObject;
use crate::quiz::{OptionMap, Quiz, QuizQuestion};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{debug, warn};

const QUESTION_FIELDS: &[&str] = &["question", "mcq", "prompt"];
const OPTION_FIELDS: &[&str] = &["options", "choices"];
const CORRECT_FIELDS: &[&str] = &["correct", "answer", "correct_answer", "reponse"];
const EXPLANATION_FIELDS: &[&str] = &["explanation", "explication"];

/// Flat keys: `question1`, `A_1`, `reponse1`, `explanation_2`, … (lower-cased).
static RE_FLAT_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(question|reponse|answer|explanation|explication|[a-d])_?(\d+)$").unwrap()
});

static RE_FLAT_QUESTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^question_?\d+$").unwrap());

/// Normalise a parsed completion into a quiz with no topic.
///
/// [`crate::generate`] fills in topic and difficulty; use
/// [`normalize_questions`] when only the records are needed.
pub fn normalize(parsed: &ParsedObject) -> Result<Quiz, QuizError> {
    Ok(Quiz::new(String::new(), Difficulty::default(), normalize_questions(parsed)?))
}

/// Normalise a parsed completion into ordered question records.
///
/// Ids are assigned by position ("1", "2", …) whatever the source keys were.
pub fn normalize_questions(parsed: &ParsedObject) -> Result<Vec<QuizQuestion>, QuizError> {
    let drafts = if is_flat(parsed) {
        debug!("Normalising flat key-per-field quiz ({} keys)", parsed.len());
        flat_drafts(parsed)
    } else {
        ordinal_drafts(parsed)
    };

    let total = drafts.len();
    let questions: Vec<QuizQuestion> = drafts
        .into_iter()
        .filter(|d| {
            if d.options.is_empty() {
                warn!("Dropping question without options: {:?}", d.prompt);
                false
            } else {
                true
            }
        })
        .enumerate()
        .map(|(i, d)| d.into_question(i + 1))
        .collect();

    if questions.is_empty() {
        return Err(QuizError::SchemaMismatch {
            detail: if total == 0 {
                "no question record in either the ordinal or the flat shape".to_string()
            } else {
                format!("none of the {total} question records has any option")
            },
            raw: Value::Object(parsed.clone()).to_string(),
        });
    }

    let unresolved = questions.iter().filter(|q| q.correct_key.is_none()).count();
    if unresolved > 0 {
        warn!("{} question(s) have no resolvable correct answer", unresolved);
    }
    Ok(questions)
}

/// Question fields before ids are assigned.
#[derive(Debug, Default)]
struct Draft {
    prompt: String,
    options: OptionMap,
    correct: String,
    explanation: String,
}

impl Draft {
    fn into_question(self, position: usize) -> QuizQuestion {
        let correct_key = resolve_correct_key(&self.correct, &self.options);
        QuizQuestion {
            id: position.to_string(),
            prompt: self.prompt,
            options: self.options,
            correct_key,
            explanation: self.explanation,
        }
    }
}

// ── Ordinal shape ────────────────────────────────────────────────────────────

fn ordinal_drafts(parsed: &ParsedObject) -> Vec<Draft> {
    // `{"questions": [...]}` / `{"quiz": {...}}` wrappers around the real list.
    for wrapper in ["questions", "quiz"] {
        if parsed.len() == 1 {
            match parsed.get(wrapper) {
                Some(Value::Array(items)) => {
                    return items.iter().filter_map(Value::as_object).map(object_draft).collect();
                }
                Some(Value::Object(inner)) => return ordinal_drafts(inner),
                _ => {}
            }
        }
    }
    parsed
        .values()
        .filter_map(Value::as_object)
        .map(object_draft)
        .collect()
}

fn object_draft(obj: &Map<String, Value>) -> Draft {
    Draft {
        prompt: first_text(obj, QUESTION_FIELDS),
        options: OPTION_FIELDS
            .iter()
            .find_map(|f| obj.get(*f))
            .map(options_from_value)
            .unwrap_or_default(),
        correct: first_text(obj, CORRECT_FIELDS),
        explanation: first_text(obj, EXPLANATION_FIELDS),
    }
}

fn options_from_value(v: &Value) -> OptionMap {
    match v {
        Value::Object(map) => map
            .iter()
            .filter_map(|(k, v)| Some((k.trim().to_lowercase(), scalar_text(v)?)))
            .collect(),
        // ["…", "…"] → a, b, c, …
        Value::Array(items) => items
            .iter()
            .filter_map(scalar_text)
            .zip('a'..='z')
            .map(|(text, key)| (key.to_string(), text))
            .collect(),
        _ => OptionMap::new(),
    }
}

// ── Flat shape ───────────────────────────────────────────────────────────────

fn is_flat(parsed: &ParsedObject) -> bool {
    parsed
        .keys()
        .any(|k| RE_FLAT_QUESTION.is_match(&k.to_lowercase()))
}

fn flat_drafts(parsed: &ParsedObject) -> Vec<Draft> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Draft> = HashMap::new();

    for (key, value) in parsed {
        let key = key.trim().to_lowercase();
        let Some(caps) = RE_FLAT_KEY.captures(&key) else {
            continue;
        };
        let Some(text) = scalar_text(value) else {
            continue;
        };
        // "01" and "1" are the same question.
        let number = caps[2].trim_start_matches('0').to_string();
        if !groups.contains_key(&number) {
            order.push(number.clone());
        }
        let draft = groups.entry(number).or_default();
        match &caps[1] {
            "question" => draft.prompt = text,
            "reponse" | "answer" => draft.correct = text,
            "explanation" | "explication" => draft.explanation = text,
            letter => {
                draft.options.insert(letter, text);
            }
        }
    }

    order
        .into_iter()
        .filter_map(|n| groups.remove(&n))
        .collect()
}

// ── Field helpers ────────────────────────────────────────────────────────────

fn first_text(obj: &Map<String, Value>, fields: &[&str]) -> String {
    fields
        .iter()
        .find_map(|f| obj.get(*f).and_then(scalar_text))
        .unwrap_or_default()
}

fn scalar_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Match the model's answer to an option key.
///
/// Accepts the key in any case (`"B"`), a leading letter with punctuation
/// (`"b) Stage 5"`, `"(c)"`), or the option text itself.
pub fn resolve_correct_key(raw: &str, options: &OptionMap) -> Option<String> {
    let answer = raw.trim();
    if answer.is_empty() {
        return None;
    }
    let lower = answer.to_lowercase();
    if options.contains_key(&lower) {
        return Some(lower);
    }

    let mut chars = lower.trim_start_matches('(').chars();
    if let Some(first) = chars.next() {
        let boundary = chars.next().is_none_or(|c| !c.is_alphanumeric());
        if boundary && options.contains_key(first.to_string().as_str()) {
            return Some(first.to_string());
        }
    }

    options
        .iter()
        .find(|(_, text)| text.trim().to_lowercase() == lower)
        .map(|(key, _)| key.to_string())
}

// ── Tests ────────────────────────────────────────────────────────────────────
