//! Heuristic signal extraction from raw request text.
//!
//! [`extract`] is deterministic and total: the same text always produces the
//! same fully populated [`Signals`], and there is no error path. Keyword
//! tables are bilingual (Spanish/English) to match the deployed user base.
//!
//! Code-generation intent deliberately requires an action verb AND a
//! code/algorithm noun — a verb alone ("mejora esto") or a noun alone
//! ("me gusta python") must not trigger it.

use crate::types::Signals;

/// Token count at or below which a message is classed as short.
const SHORT_MESSAGE_TOKENS: usize = 2;

/// Architecture / scaling / system-design vocabulary.
const ARCHITECTURE_KEYWORDS: &[&str] = &[
    "arquitect", "architect", "microserv", "monolit", "monolith", "escala",
    "scal", "usuarios", "users", "trade-off", "tradeoff", "trade offs",
    "diseño", "diseña", "system design",
];

/// General code vocabulary (languages, tooling, failure words).
const CODE_KEYWORDS: &[&str] = &[
    "codigo", "código", "code", "python", "javascript", "rust", "script",
    "programa", "función", "funcion", "function", "debug", "debuggea",
    "depura", "error", "traceback", "stacktrace", "stack trace", "bug",
    "git", "bash", "snippet", "implementa", "implementar", "implement",
];

/// Error/exception/fix vocabulary for debug intent.
const DEBUG_KEYWORDS: &[&str] = &[
    "error", "exception", "typeerror", "traceback", "stacktrace",
    "stack trace", "bug", "depura", "debug", "debuggea", "arregla", "fix",
];

/// Code/algorithm nouns for the generation co-occurrence check.
const CODEGEN_NOUNS: &[&str] = &[
    "funci", "function", "merge", "sort", "algoritm", "algorithm",
    "ejemplo", "ejemplos", "example",
];

/// Action verbs for the generation co-occurrence check.
const CODEGEN_VERBS: &[&str] = &[
    "escribe", "write", "genera", "generate", "implementa", "implementar",
    "implement", "dame", "crea", "create", "desarrolla", "programa",
    "optimiza", "optimizar", "optimize", "mejora", "mejorar", "improve",
];

/// Strategic / planning vocabulary.
const STRATEGY_KEYWORDS: &[&str] = &[
    "estrateg", "strategy", "strategic", "plan", "roadmap", "detall",
    "detallada", "detallado",
];

/// Deep-analysis / evaluation vocabulary.
const COMPLEX_KEYWORDS: &[&str] = &[
    "analiz", "análisis", "analisis", "analy", "explica", "explain",
    "concepto", "conceptos", "concept", "riesg", "risk", "evaluar",
    "evaluación", "evaluacion", "evaluat", "complet", "profund",
    "in depth", "resumen", "summary", "ejecutiv", "executive",
];

/// Explicit image references.
const IMAGE_KEYWORDS: &[&str] = &["imagen", "image", "foto", "photo", "mira", "describe"];

/// Documentation / tutorial / guide requests.
const DOCS_KEYWORDS: &[&str] = &[
    "document", "documenta", "documentación", "documentacion", "tutorial",
    "guía", "guia", "guide", "readme", "manual", "docs",
];

/// Interrogative openers that mark a question even without a `?`.
const QUESTION_OPENERS: &[&str] = &[
    "qué", "que", "como", "cómo", "cuál", "cual", "what", "how", "why",
    "which", "who", "where", "when",
];

/// Extract all routing signals from `text`.
///
/// Matching is case-insensitive substring membership over the lowercased
/// message, mirroring how the keyword tables were tuned in production.
pub fn extract(text: &str) -> Signals {
    let m = text.to_lowercase().trim().to_string();
    let token_count = m.split_whitespace().count();

    let mentions_code = contains_any(&m, CODE_KEYWORDS);

    Signals {
        is_question: text.contains('?')
            || QUESTION_OPENERS
                .iter()
                .any(|o| m.starts_with(o) && m[o.len()..].starts_with(|c| c == ' ' || c == '?')),
        is_short: token_count <= SHORT_MESSAGE_TOKENS,
        mentions_architecture: contains_any(&m, ARCHITECTURE_KEYWORDS),
        mentions_code,
        mentions_debug: contains_any(&m, DEBUG_KEYWORDS),
        // Verb AND noun must co-occur; a general code mention also satisfies
        // the noun side ("escribe el script" is generation intent).
        wants_code_generation: contains_any(&m, CODEGEN_VERBS)
            && (contains_any(&m, CODEGEN_NOUNS) || mentions_code),
        mentions_strategy: contains_any(&m, STRATEGY_KEYWORDS),
        mentions_complex: contains_any(&m, COMPLEX_KEYWORDS),
        mentions_image: contains_any(&m, IMAGE_KEYWORDS),
        mentions_docs: contains_any(&m, DOCS_KEYWORDS),
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn architecture_language_detected() {
        let s = extract("Diseña una arquitectura para escalar a 1M usuarios");
        assert!(s.mentions_architecture);
        assert!(!s.mentions_image);
    }

    #[test]
    fn codegen_requires_verb_and_noun() {
        // Verb + noun → generation intent.
        assert!(extract("escribe una función de merge sort").wants_code_generation);
        assert!(extract("write a function that sorts a list").wants_code_generation);

        // Noun alone → no generation intent.
        assert!(!extract("me gusta mucho python").wants_code_generation);

        // Verb alone → no generation intent.
        assert!(!extract("mejora la redacción de este párrafo").wants_code_generation);
    }

    #[test]
    fn debug_and_codegen_are_separate_signals() {
        let s = extract("arregla este error de mi script");
        assert!(s.mentions_debug);
        assert!(s.mentions_code);

        let s2 = extract("genera un ejemplo de algoritmo");
        assert!(s2.wants_code_generation);
        assert!(!s2.mentions_debug);
    }

    #[test]
    fn question_detection() {
        assert!(extract("¿Cómo funciona esto?").is_question);
        assert!(extract("what is a monad").is_question);
        assert!(extract("how do I deploy this").is_question);
        assert!(!extract("deploy the service now").is_question);
    }

    #[test]
    fn question_opener_must_be_a_whole_word() {
        // "whatever" starts with "what" but is not an interrogative opener.
        assert!(!extract("whatever you say").is_question);
    }

    #[test]
    fn short_message_class() {
        assert!(extract("hola").is_short);
        assert!(extract("hola mundo").is_short);
        assert!(!extract("hola mundo cruel hoy").is_short);
    }

    #[test]
    fn extraction_is_deterministic() {
        let text = "Explica los riesgos de esta estrategia";
        assert_eq!(extract(text), extract(text));
    }

    #[test]
    fn empty_input_yields_defaults_plus_short() {
        let s = extract("");
        assert!(s.is_short);
        assert!(!s.is_question);
        assert!(!s.mentions_code);
    }
}
