//! Prompts for LLM-based quiz generation.
//!
//! Every instruction sent to the model lives here so wording changes touch
//! one file and tests can inspect prompts without a live endpoint.
//!
//! The prompt is the only thing constraining the model's output format. It
//! is advisory: [`crate::pipeline::extract`] still has to cope with prose
//! around the JSON, code fences and broken escapes.
//!
//! Callers can override the topic prompt via
//! [`crate::config::QuizConfig::prompt_template`].

use crate::config::PromptLanguage;
use crate::difficulty::Difficulty;

/// Topic prompt in English. Placeholders: `{topic}`, `{number}`, `{difficulty}`.
pub const TOPIC_PROMPT_EN: &str = r#"You are a medical expert in nephrology.
Generate EXACTLY {number} multiple-choice questions (no more, no less) of {difficulty} difficulty on the following topic: "{topic}".

VERY IMPORTANT:
1. Your answer must contain EXACTLY {number} questions numbered from 1 to {number}.
2. Your answer must be ONLY a valid JSON object, with no text before or after it.
3. Do not start with ```json or ``` and do not end with ```.

Exact format expected, with {number} questions:
{
    "1": {
        "question": "Question 1?",
        "options": {
            "a": "Option A",
            "b": "Option B",
            "c": "Option C",
            "d": "Option D"
        },
        "correct": "a",
        "explanation": "Detailed explanation."
    },
    ... repeat for all {number} questions ...
    "{number}": {
        "question": "Question {number}?",
        "options": {
            "a": "Option A",
            "b": "Option B",
            "c": "Option C",
            "d": "Option D"
        },
        "correct": "c",
        "explanation": "Detailed explanation."
    }
}"#;

/// Topic prompt in French.
pub const TOPIC_PROMPT_FR: &str = r#"Vous êtes un expert médical en néphrologie.
Générez EXACTEMENT {number} questions (ni plus, ni moins) de niveau {difficulty} sur le sujet suivant : "{topic}".

**TRÈS IMPORTANT**:
1. Votre réponse doit contenir EXACTEMENT {number} questions numérotées de 1 à {number}.
2. Votre réponse doit être UNIQUEMENT un objet JSON valide, sans aucun texte avant ou après.
3. Ne commencez pas par ```json ou ``` et ne terminez pas par ```.

Format exact attendu avec {number} questions:
{
    "1": {
        "question": "Question 1 ?",
        "options": {
            "a": "Option A",
            "b": "Option B",
            "c": "Option C",
            "d": "Option D"
        },
        "correct": "a",
        "explanation": "Explication détaillée."
    },
    ... répétez pour toutes les {number} questions ...
    "{number}": {
        "question": "Question {number} ?",
        "options": {
            "a": "Option A",
            "b": "Option B",
            "c": "Option C",
            "d": "Option D"
        },
        "correct": "c",
        "explanation": "Explication détaillée."
    }
}"#;

/// Per-abstract prompt (English). Asks for the flat key-per-field shape.
/// Placeholders: `{text}`, `{number}`, `{difficulty}`, `{schema}`.
pub const SOURCE_PROMPT_EN: &str = r#"You are a medical expert in nephrology.
Read the following article abstract and write EXACTLY {number} multiple-choice questions of {difficulty} difficulty that can be answered from it.

Abstract:
"""{text}"""

Answer with ONLY a flat JSON object, no text before or after it and no ``` fences, using these keys:
{schema}
Each reponseN value is the letter (A, B, C or D) of the right choice."#;

/// Per-abstract prompt (French).
pub const SOURCE_PROMPT_FR: &str = r#"Vous êtes un expert médical en néphrologie.
Lisez le résumé d'article suivant et rédigez EXACTEMENT {number} questions à choix multiples de niveau {difficulty} auxquelles il permet de répondre.

Résumé :
"""{text}"""

Répondez UNIQUEMENT par un objet JSON plat, sans texte avant ou après et sans ```, avec ces clés :
{schema}
Chaque valeur reponseN est la lettre (A, B, C ou D) du bon choix."#;

/// Build the topic prompt in English.
pub fn build_prompt(topic: &str, count: usize, difficulty: Difficulty) -> String {
    build_prompt_in(PromptLanguage::English, topic, count, difficulty)
}

/// Build the topic prompt in the given language.
pub fn build_prompt_in(
    language: PromptLanguage,
    topic: &str,
    count: usize,
    difficulty: Difficulty,
) -> String {
    let template = match language {
        PromptLanguage::English => TOPIC_PROMPT_EN,
        PromptLanguage::French => TOPIC_PROMPT_FR,
    };
    fill(template, topic, count, difficulty_label(language, difficulty))
}

/// Fill a caller-supplied template.
///
/// Unknown placeholders are left untouched. The difficulty is rendered with
/// its English label.
pub fn render_template(template: &str, topic: &str, count: usize, difficulty: Difficulty) -> String {
    fill(template, topic, count, difficulty.label())
}

/// Build the per-abstract prompt asking for the flat `question1`/`A_1`/`reponse1` shape.
pub fn source_prompt(
    language: PromptLanguage,
    text: &str,
    count: usize,
    difficulty: Difficulty,
) -> String {
    let template = match language {
        PromptLanguage::English => SOURCE_PROMPT_EN,
        PromptLanguage::French => SOURCE_PROMPT_FR,
    };
    template
        .replace("{schema}", &flat_schema(count))
        .replace("{number}", &count.to_string())
        .replace("{difficulty}", difficulty_label(language, difficulty))
        .replace("{text}", text)
}

fn fill(template: &str, topic: &str, count: usize, difficulty: &str) -> String {
    template
        .replace("{number}", &count.to_string())
        .replace("{difficulty}", difficulty)
        .replace("{topic}", topic)
}

fn difficulty_label(language: PromptLanguage, difficulty: Difficulty) -> &'static str {
    match language {
        PromptLanguage::English => difficulty.label(),
        PromptLanguage::French => difficulty.label_fr(),
    }
}

/// `{"question1": "...", "A_1": "...", …, "reponse1": "A", …}` skeleton.
fn flat_schema(count: usize) -> String {
    let fields: Vec<String> = (1..=count)
        .map(|n| {
            format!(
                "  \"question{n}\": \"...\", \"A_{n}\": \"...\", \"B_{n}\": \"...\", \
                 \"C_{n}\": \"...\", \"D_{n}\": \"...\", \"reponse{n}\": \"A\""
            )
        })
        .collect();
    format!("{{\n{}\n}}", fields.join(",\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_states_count_schema_and_no_fences() {
        let p = build_prompt("Chronic kidney disease", 7, Difficulty::Hard);
        assert!(p.contains("EXACTLY 7"));
        assert!(p.contains("numbered from 1 to 7"));
        assert!(p.contains("\"7\": {"));
        assert!(p.contains("hard difficulty"));
        assert!(p.contains("\"Chronic kidney disease\""));
        for field in ["\"question\"", "\"options\"", "\"correct\"", "\"explanation\""] {
            assert!(p.contains(field), "missing {field}");
        }
        assert!(p.contains("Do not start with ```json"));
        assert!(!p.contains("{number}"));
    }

    #[test]
    fn french_prompt_uses_french_levels() {
        let p = build_prompt_in(PromptLanguage::French, "Dialyse", 3, Difficulty::Easy);
        assert!(p.contains("EXACTEMENT 3"));
        assert!(p.contains("niveau Facile"));
    }

    #[test]
    fn custom_template() {
        let p = render_template(
            "{number} {difficulty} questions on {topic} {other}",
            "anemia",
            4,
            Difficulty::Medium,
        );
        assert_eq!(p, "4 medium questions on anemia {other}");
    }

    #[test]
    fn source_prompt_lists_flat_keys() {
        let p = source_prompt(
            PromptLanguage::English,
            "egfr below 15 defines stage 5.",
            2,
            Difficulty::Medium,
        );
        assert!(p.contains("\"question2\""));
        assert!(p.contains("\"D_2\""));
        assert!(p.contains("\"reponse1\""));
        assert!(!p.contains("\"question3\""));
        assert!(p.contains("egfr below 15"));
    }
}
