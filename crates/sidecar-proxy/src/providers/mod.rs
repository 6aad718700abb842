// ── Provider registry ─────────────────────────────────────────────────────────
// Declarative routing table: URL prefix → upstream base + auth header shape
// + response dialect. Adding a provider is adding a row, not a new code path.

use std::sync::LazyLock;

/// How the provider expects the forwarded request to carry credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthHeaderTemplate {
    /// `Authorization: Bearer {key}`
    BearerAuthorization,
    /// `x-api-key: {key}` (Anthropic's native header, kept alongside a
    /// `Authorization: Bearer` fallback some gateways also expect).
    XApiKey,
    /// Gemini's API-key-as-query-param convention (`?key={key}`).
    QueryParamKey,
    /// No credential substitution — local Ollama has no API key.
    None,
}

/// Which provider dialect the cost recorder / tool parser should expect in
/// the response body. Mirrors [`sidecar_tools::parser::ProviderFormat`] and
/// [`sidecar_cost::tokens`]'s dialect set, kept as its own enum here because
/// the proxy's routing concern is distinct from either crate's parsing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseDialect {
    OpenAi,
    Anthropic,
    Gemini,
    Ollama,
}

#[derive(Debug, Clone)]
pub struct ProviderRoute {
    pub id: &'static str,
    pub prefix: &'static str,
    pub upstream_base: &'static str,
    pub auth_header: AuthHeaderTemplate,
    pub dialect: ResponseDialect,
}

/// The minimum supported provider set. `upstream_base` values are the
/// well-known public API hosts; self-hosted / Azure-style deployments
/// override this via config rather than a registry edit.
pub static PROVIDERS: LazyLock<Vec<ProviderRoute>> = LazyLock::new(|| {
    vec![
        ProviderRoute { id: "openai", prefix: "openai", upstream_base: "https://api.openai.com", auth_header: AuthHeaderTemplate::BearerAuthorization, dialect: ResponseDialect::OpenAi },
        ProviderRoute { id: "anthropic", prefix: "anthropic", upstream_base: "https://api.anthropic.com", auth_header: AuthHeaderTemplate::XApiKey, dialect: ResponseDialect::Anthropic },
        ProviderRoute { id: "gemini", prefix: "gemini", upstream_base: "https://generativelanguage.googleapis.com", auth_header: AuthHeaderTemplate::QueryParamKey, dialect: ResponseDialect::Gemini },
        ProviderRoute { id: "ollama", prefix: "ollama", upstream_base: "http://localhost:11434", auth_header: AuthHeaderTemplate::None, dialect: ResponseDialect::Ollama },
        ProviderRoute { id: "groq", prefix: "groq", upstream_base: "https://api.groq.com/openai", auth_header: AuthHeaderTemplate::BearerAuthorization, dialect: ResponseDialect::OpenAi },
        ProviderRoute { id: "openrouter", prefix: "openrouter", upstream_base: "https://openrouter.ai/api", auth_header: AuthHeaderTemplate::BearerAuthorization, dialect: ResponseDialect::OpenAi },
        ProviderRoute { id: "deepseek", prefix: "deepseek", upstream_base: "https://api.deepseek.com", auth_header: AuthHeaderTemplate::BearerAuthorization, dialect: ResponseDialect::OpenAi },
        ProviderRoute { id: "mistral", prefix: "mistral", upstream_base: "https://api.mistral.ai", auth_header: AuthHeaderTemplate::BearerAuthorization, dialect: ResponseDialect::OpenAi },
        ProviderRoute { id: "azure", prefix: "azure", upstream_base: "https://api.openai.azure.com", auth_header: AuthHeaderTemplate::XApiKey, dialect: ResponseDialect::OpenAi },
        ProviderRoute { id: "together", prefix: "together", upstream_base: "https://api.together.xyz", auth_header: AuthHeaderTemplate::BearerAuthorization, dialect: ResponseDialect::OpenAi },
        ProviderRoute { id: "fireworks", prefix: "fireworks", upstream_base: "https://api.fireworks.ai/inference", auth_header: AuthHeaderTemplate::BearerAuthorization, dialect: ResponseDialect::OpenAi },
        ProviderRoute { id: "perplexity", prefix: "perplexity", upstream_base: "https://api.perplexity.ai", auth_header: AuthHeaderTemplate::BearerAuthorization, dialect: ResponseDialect::OpenAi },
        ProviderRoute { id: "cohere", prefix: "cohere", upstream_base: "https://api.cohere.com", auth_header: AuthHeaderTemplate::BearerAuthorization, dialect: ResponseDialect::OpenAi },
        ProviderRoute { id: "xai", prefix: "xai", upstream_base: "https://api.x.ai", auth_header: AuthHeaderTemplate::BearerAuthorization, dialect: ResponseDialect::OpenAi },
        ProviderRoute { id: "moonshot", prefix: "moonshot", upstream_base: "https://api.moonshot.cn", auth_header: AuthHeaderTemplate::BearerAuthorization, dialect: ResponseDialect::OpenAi },
        ProviderRoute { id: "minimax", prefix: "minimax", upstream_base: "https://api.minimax.chat", auth_header: AuthHeaderTemplate::BearerAuthorization, dialect: ResponseDialect::OpenAi },
        ProviderRoute { id: "cerebras", prefix: "cerebras", upstream_base: "https://api.cerebras.ai", auth_header: AuthHeaderTemplate::BearerAuthorization, dialect: ResponseDialect::OpenAi },
    ]
});

pub fn lookup(prefix: &str) -> Option<&'static ProviderRoute> {
    PROVIDERS.iter().find(|p| p.prefix == prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimum_provider_set_is_present() {
        for id in ["openai", "anthropic", "gemini", "ollama", "groq", "openrouter", "deepseek", "mistral", "azure", "together", "fireworks", "perplexity", "cohere", "xai", "moonshot", "minimax", "cerebras"] {
            assert!(lookup(id).is_some(), "missing provider {id}");
        }
    }

    #[test]
    fn unknown_prefix_returns_none() {
        assert!(lookup("not-a-provider").is_none());
    }
}
