//! Text cleaning for article abstracts before they go into a prompt.
//!
//! Scraped abstracts carry markup debris, odd quotes and line breaks from
//! the source page. The model does not need any of it, and every removed
//! character is a token saved.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Anything that is not a letter, digit, `_`, whitespace, or `,.?!`.
///
/// Spelled out instead of `\w`: Unicode `\w` also admits combining marks,
/// joiners and connector punctuation.
static RE_DISALLOWED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\p{L}\p{N}_\s,.?!]").unwrap());

/// Normalise one abstract.
///
/// Missing input yields an empty string. The text is lowercased first, then
/// characters outside letters/digits/`_`/whitespace/`,.?!` are removed,
/// whitespace runs become a single space and the result is trimmed.
pub fn clean(text: Option<&str>) -> String {
    let Some(text) = text else {
        return String::new();
    };
    // Lowercasing can emit combining marks (`İ` → `i\u{307}`), so it runs
    // before the filter.
    let lower = text.to_lowercase();
    let s = RE_DISALLOWED.replace_all(&lower, "");
    let s = RE_WHITESPACE.replace_all(&s, " ");
    s.trim().to_string()
}

/// Clean a batch of abstracts, dropping the ones that end up empty.
pub fn clean_all<I, S>(texts: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    texts
        .into_iter()
        .map(|t| clean(Some(t.as_ref())))
        .filter(|t| !t.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn only_allowed(s: &str) -> bool {
        s.chars()
            .all(|c| c.is_alphanumeric() || c == ' ' || c == '_' || ",.?!".contains(c))
    }

    #[test]
    fn none_is_empty() {
        assert_eq!(clean(None), "");
    }

    #[test]
    fn collapses_and_lowercases() {
        assert_eq!(
            clean(Some("  Chronic\tKidney\n\nDisease  ")),
            "chronic kidney disease"
        );
    }

    #[test]
    fn strips_symbols_and_keeps_punctuation() {
        assert_eq!(
            clean(Some("eGFR < 15 mL/min (stage 5)! Really?")),
            "egfr 15 mlmin stage 5! really?"
        );
    }

    #[test]
    fn keeps_accented_letters() {
        assert_eq!(clean(Some("Insuffisance Rénale — Chronique")), "insuffisance rénale chronique");
    }

    #[test]
    fn output_alphabet_and_spacing() {
        let samples = [
            "a - b",
            "«Quote» & co. @ 2024 #tag",
            "\u{200B}zero\u{00A0}width ; semi : colon",
            "***",
            "tabs\t\t and \r\n newlines",
            "Re\u{301}nale",
            "a\u{200D}b",
            "a\u{203F}b",
            "\u{130}ndice",
        ];
        for s in samples {
            let out = clean(Some(s));
            assert!(only_allowed(&out), "{s:?} → {out:?}");
            assert!(!out.contains("  "), "{s:?} → {out:?}");
            assert_eq!(out, out.trim());
        }
    }

    #[test]
    fn drops_marks_and_joiners() {
        assert_eq!(clean(Some("Re\u{301}nale")), "renale");
        assert_eq!(clean(Some("a\u{200D}b a\u{203F}b")), "ab ab");
        assert_eq!(clean(Some("\u{130}ndice")), "indice");
    }

    #[test]
    fn clean_all_drops_empty() {
        let out = clean_all(["First abstract.", "   ", "***", "Second."]);
        assert_eq!(out, vec!["first abstract.", "second."]);
    }
}
