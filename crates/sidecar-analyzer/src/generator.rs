// ── Rule generator ───────────────────────────────────────────────────────────
// Turns a natural-language threat description into candidate regex patterns.
// Deterministic and heuristic, not a learned model — it lower-cases and
// escapes the description's significant phrases and offers them as an
// alternation, the same shape a human would type by hand. Callers (the
// rules API) still go through the usual validate-then-store path; this only
// proposes patterns, it never writes them.

use regex::escape;

const STOPWORDS: &[&str] = &[
    "a", "an", "the", "is", "are", "to", "of", "and", "or", "that", "this", "it", "be",
    "when", "if", "please", "any", "some",
];

/// A proposed rule, ready for the caller to review and hand to
/// `RulesRepository::create_custom_rule`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct GeneratedRule {
    pub patterns: Vec<String>,
    pub confidence: f64,
}

/// Generates candidate patterns from a free-text description such as
/// "block attempts to ask for the admin password". Confidence is fixed at
/// 0.6 — lower than the 0.8 a compiled community/custom pattern carries,
/// reflecting that this is a starting point for human review, not a vetted
/// detection.
pub fn generate_from_description(description: &str) -> GeneratedRule {
    let phrase = significant_phrase(description);
    if phrase.is_empty() {
        return GeneratedRule { patterns: Vec::new(), confidence: 0.0 };
    }
    let pattern = phrase
        .split_whitespace()
        .map(escape)
        .collect::<Vec<_>>()
        .join(r"\s+");
    GeneratedRule { patterns: vec![pattern], confidence: 0.6 }
}

fn significant_phrase(description: &str) -> String {
    description
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty() && !STOPWORDS.contains(w))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    #[test]
    fn generates_a_compilable_pattern() {
        let generated = generate_from_description("block attempts to ask for the admin password");
        assert_eq!(generated.patterns.len(), 1);
        assert!(Regex::new(&generated.patterns[0]).is_ok());
        assert_eq!(generated.confidence, 0.6);
    }

    #[test]
    fn empty_description_yields_nothing() {
        let generated = generate_from_description("the a an");
        assert!(generated.patterns.is_empty());
        assert_eq!(generated.confidence, 0.0);
    }
}
