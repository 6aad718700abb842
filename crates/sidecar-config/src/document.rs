// ── Config document ───────────────────────────────────────────────────────────
// The on-disk TOML shape. Every section is optional — a missing section
// just means "no override for this area", not a parse failure.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigDocument {
    #[serde(default)]
    pub server: Option<ServerSection>,
    #[serde(default)]
    pub security: Option<SecuritySection>,
    #[serde(default)]
    pub budget: Option<BudgetSection>,
    #[serde(default)]
    pub tools: Option<ToolsSection>,
    #[serde(default)]
    pub proxy: Option<ProxySection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecuritySection {
    /// Block matched threats outright rather than only annotate them.
    pub block_mode: Option<bool>,
    /// Scan upstream response bodies, not just outbound requests.
    pub output_scan: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetSection {
    pub daily_limit: Option<f64>,
    /// Warn rather than block once the limit is reached.
    pub warn: Option<bool>,
    /// Block outright once the limit is reached. Takes precedence over
    /// `warn` when both are set.
    pub block: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsSection {
    pub enforcement: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxySection {
    pub integration: Option<bool>,
    pub mode: Option<String>,
    pub provider: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_document_with_only_server_section() {
        let doc: ConfigDocument = toml::from_str("[server]\nhost = \"127.0.0.1\"\nport = 8741\n").unwrap();
        assert_eq!(doc.server.unwrap().port, Some(8741));
        assert!(doc.security.is_none());
    }

    #[test]
    fn parses_full_document() {
        let text = r#"
            [server]
            host = "0.0.0.0"
            port = 9000

            [security]
            block_mode = true
            output_scan = true

            [budget]
            daily_limit = 5.0
            block = true

            [tools]
            enforcement = true

            [proxy]
            integration = true
            mode = "multi-provider"
            host = "127.0.0.1"
            port = 8742
        "#;
        let doc: ConfigDocument = toml::from_str(text).unwrap();
        assert_eq!(doc.proxy.unwrap().mode.as_deref(), Some("multi-provider"));
        assert_eq!(doc.budget.unwrap().daily_limit, Some(5.0));
    }
}
