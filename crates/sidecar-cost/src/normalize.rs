// ── Model id normalization ───────────────────────────────────────────────────
// Versioned / dated model identifiers get mapped to the canonical form the
// pricing table keys on, before any lookup happens. Unmapped identifiers
// pass through unchanged — the pricing cache's own suffix-scan fallback
// covers the rest.

use std::collections::HashMap;
use std::sync::LazyLock;

static ALIASES: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    HashMap::from([
        ("gpt-4o-2024-11-20", "gpt-4o"),
        ("gpt-4o-2024-08-06", "gpt-4o"),
        ("gpt-4o-2024-05-13", "gpt-4o"),
        ("gpt-4o-mini-2024-07-18", "gpt-4o-mini"),
        ("gpt-4-turbo-2024-04-09", "gpt-4-turbo"),
        ("gpt-4-0125-preview", "gpt-4-turbo"),
        ("claude-3-5-sonnet-20241022", "claude-3-5-sonnet"),
        ("claude-3-5-sonnet-20240620", "claude-3-5-sonnet"),
        ("claude-3-5-haiku-20241022", "claude-3-5-haiku"),
        ("claude-3-opus-20240229", "claude-3-opus"),
        ("mistral-large-2407", "mistral-large-latest"),
        ("mistral-large-2402", "mistral-large-latest"),
        ("mistral-small-2409", "mistral-small-latest"),
        ("gemini-1.5-pro-002", "gemini-1.5-pro"),
        ("gemini-1.5-flash-002", "gemini-1.5-flash"),
    ])
});

/// Maps a raw model id (as sent by the upstream response) to the pricing
/// table's canonical key. Unknown ids are returned unchanged.
pub fn canonicalize(raw_model_id: &str) -> String {
    ALIASES.get(raw_model_id).map(|s| s.to_string()).unwrap_or_else(|| raw_model_id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_dated_openai_model_to_canonical() {
        assert_eq!(canonicalize("gpt-4o-2024-11-20"), "gpt-4o");
    }

    #[test]
    fn maps_mistral_dated_alias() {
        assert_eq!(canonicalize("mistral-large-2407"), "mistral-large-latest");
    }

    #[test]
    fn unknown_model_passes_through_unchanged() {
        assert_eq!(canonicalize("some-brand-new-model"), "some-brand-new-model");
    }
}
