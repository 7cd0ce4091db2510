//! JSON extraction: salvage a JSON object from free-form model output.
//!
//! ## Why is this necessary?
//!
//! The prompt asks for "ONLY a valid JSON object", and models still answer
//! with things like:
//!
//! - `Sure! Here is your quiz: { … } Hope that helps!`
//! - a ` ```json ` fence around the object
//! - LaTeX-ish escapes such as `\%` or `\(` that JSON does not allow
//! - literal line breaks inside string values
//! - a trailing comma after the last option
//! - a completion cut off by `max_tokens` before the closing braces
//!
//! Extraction runs in a fixed order and the first success wins:
//!
//! 1. Parse the whole text.
//! 2. Take the slice from the first `{` to the last `}` and parse it.
//! 3. Apply every repair rule to that slice, then parse once more.
//!
//! Anything still unparseable is reported as [`QuizError::InvalidJson`]
//! with the repaired text attached, never guessed at.

use crate::error::QuizError;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// A parsed JSON object, keys in document order.
pub type ParsedObject = Map<String, Value>;

/// Locate, repair if needed, and parse the JSON object in `raw`.
pub fn extract(raw: &str) -> Result<ParsedObject, QuizError> {
    // ── Step 1: the whole completion ──────────────────────────────────────
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(raw.trim()) {
        return Ok(map);
    }

    // ── Step 2: outermost brace pair ─────────────────────────────────────
    let Some(candidate) = find_candidate(raw) else {
        return Err(QuizError::NoJson {
            raw: raw.to_string(),
        });
    };

    // ── Step 3: candidate as-is ──────────────────────────────────────────
    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(map)) => {
            debug!(
                "Extracted JSON object from {} surrounding bytes",
                raw.len() - candidate.len()
            );
            return Ok(map);
        }
        Ok(_) => {}
        Err(e) => debug!("Candidate JSON did not parse ({}), applying repairs", e),
    }

    // ── Step 4: repaired candidate ───────────────────────────────────────
    let repaired = repair(candidate);
    match serde_json::from_str::<Value>(&repaired) {
        Ok(Value::Object(map)) => {
            warn!("Model output needed JSON repairs to parse");
            Ok(map)
        }
        Ok(other) => Err(QuizError::InvalidJson {
            message: format!("expected a JSON object, found {}", json_type(&other)),
            raw: repaired,
        }),
        Err(e) => Err(QuizError::InvalidJson {
            message: e.to_string(),
            raw: repaired,
        }),
    }
}

/// Slice from the first `{` to the last `}`, if they appear in that order.
pub fn find_candidate(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (start < end).then(|| &raw[start..=end])
}

/// Apply all repair rules, in order.
///
/// 1. Drop backslashes that do not start a valid JSON escape
/// 2. Re-escape bare line breaks and tabs inside string literals
/// 3. Remove trailing commas before `}` or `]`
/// 4. Append missing closing braces
pub fn repair(candidate: &str) -> String {
    let s = strip_invalid_escapes(candidate);
    let s = escape_bare_control_chars(&s);
    let s = remove_trailing_commas(&s);
    balance_braces(&s)
}

// ── Rule 1: Invalid escapes ──────────────────────────────────────────────────

fn strip_invalid_escapes(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c != '\\' {
            out.push(c);
            i += 1;
            continue;
        }
        match chars.get(i + 1) {
            Some('"' | '\\' | '/' | 'b' | 'f' | 'n' | 'r' | 't') => {
                out.push(c);
                out.push(chars[i + 1]);
                i += 2;
            }
            Some('u') if is_unicode_escape(&chars[i + 2..]) => {
                out.push_str("\\u");
                i += 2;
            }
            // Invalid escape or trailing backslash: drop the backslash only.
            _ => i += 1,
        }
    }
    out
}

fn is_unicode_escape(rest: &[char]) -> bool {
    rest.len() >= 4 && rest[..4].iter().all(|c| c.is_ascii_hexdigit())
}

// ── Rule 2: Bare control characters in strings ───────────────────────────────

fn escape_bare_control_chars(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_string = false;
    let mut escaped = false;
    for c in input.chars() {
        if !in_string {
            if c == '"' {
                in_string = true;
            }
            out.push(c);
            continue;
        }
        if escaped {
            escaped = false;
            out.push(c);
            continue;
        }
        match c {
            '\\' => {
                escaped = true;
                out.push(c);
            }
            '"' => {
                in_string = false;
                out.push(c);
            }
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

// ── Rule 3: Trailing commas ──────────────────────────────────────────────────

/// Drop a `,` followed (after whitespace) by `}` or `]`. Commas inside
/// string literals are option text and stay.
fn remove_trailing_commas(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut in_string = false;
    let mut escaped = false;
    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
        } else if c == '"' {
            in_string = true;
        } else if c == ',' {
            let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
            if matches!(next, Some('}' | ']')) {
                continue;
            }
        }
        out.push(c);
    }
    out
}

// ── Rule 4: Missing closing braces ───────────────────────────────────────────

fn balance_braces(input: &str) -> String {
    let open = input.matches('{').count();
    let close = input.matches('}').count();
    if open > close {
        let mut out = String::with_capacity(input.len() + open - close);
        out.push_str(input);
        out.extend(std::iter::repeat_n('}', open - close));
        out
    } else {
        input.to_string()
    }
}

fn json_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
