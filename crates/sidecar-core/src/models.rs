// ── Data model ──────────────────────────────────────────────────────────────
// Plain structs for every entity the store persists. Repositories translate
// between these and SQLite rows; nothing above the repository layer touches
// column names directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Severity of a rule, and the base risk score it contributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn base_risk_score(self) -> i64 {
        match self {
            Severity::Critical => 90,
            Severity::High => 75,
            Severity::Medium => 50,
            Severity::Low => 25,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }
}

/// Where a rule originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleSource {
    Community,
    Custom,
}

impl RuleSource {
    pub fn as_str(self) -> &'static str {
        match self {
            RuleSource::Community => "community",
            RuleSource::Custom => "custom",
        }
    }
}

/// A review left on an analyzed event by a secondary (e.g. LLM-backed) pass.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EventReview {
    pub agrees: bool,
    pub confidence: f64,
    pub explanation: Option<String>,
    pub risk_adjustment: i64,
    pub model_used: Option<String>,
}

/// One row of the matched-rules array stored alongside an analyzed event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchedRule {
    pub id: String,
    pub name: String,
    pub category: String,
    pub severity: String,
    pub source: String,
    pub matched_patterns: Vec<String>,
}

/// Where the analysis result came from — local pattern matching, the cloud
/// analyzer, or local analysis after a cloud attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisSource {
    Local,
    Cloud,
    LocalFallback,
}

/// One analyzed event — a call to the analyzer, persisted for later
/// inspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzedEvent {
    pub id: String,
    pub request_id: Option<String>,
    pub text_content: Option<String>,
    pub text_hash: String,
    pub text_length: i64,
    pub is_threat: bool,
    pub threat_type: Option<String>,
    pub risk_score: i64,
    pub confidence: f64,
    pub matched_rules: Vec<MatchedRule>,
    pub source_identifier: Option<String>,
    pub session_id: Option<String>,
    pub processing_time_ms: i64,
    pub created_at: DateTime<Utc>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub review: Option<EventReview>,
}

/// A community or custom detection rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub name: String,
    pub category: String,
    pub description: String,
    pub severity: Severity,
    pub patterns: Vec<String>,
    pub enabled: bool,
    pub source: RuleSource,
    pub source_file: Option<String>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user modification layered over a community rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleOverride {
    pub id: String,
    pub original_rule_id: String,
    pub enabled: Option<bool>,
    pub severity: Option<Severity>,
    pub patterns: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Risk tier of an essential tool (or custom tool).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Read,
    Write,
    Delete,
    Admin,
}

impl RiskTier {
    pub fn score(self) -> i64 {
        match self {
            RiskTier::Read => 20,
            RiskTier::Write => 50,
            RiskTier::Delete => 75,
            RiskTier::Admin => 90,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskTier::Read => "read",
            RiskTier::Write => "write",
            RiskTier::Delete => "delete",
            RiskTier::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "read" => Some(RiskTier::Read),
            "write" => Some(RiskTier::Write),
            "delete" => Some(RiskTier::Delete),
            "admin" => Some(RiskTier::Admin),
            _ => None,
        }
    }
}

/// Enforcement action the permission engine (or the proxy's threat/budget
/// checks) can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Block,
    Allow,
    LogOnly,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Block => "block",
            Action::Allow => "allow",
            Action::LogOnly => "log_only",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "block" => Some(Action::Block),
            "allow" => Some(Action::Allow),
            "log_only" => Some(Action::LogOnly),
            _ => None,
        }
    }
}

/// Declarative entry in the bundled essential-tool registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EssentialTool {
    pub id: String,
    pub label: String,
    pub risk: RiskTier,
    pub default_action: Action,
}

/// A user override for an essential (or custom) tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOverride {
    pub tool_id: String,
    pub action: Action,
    pub rate_limit_max_calls: Option<i64>,
    pub rate_limit_window_seconds: Option<i64>,
    pub updated_at: DateTime<Utc>,
}

/// Per provider+model pricing, dollars per million tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingEntry {
    pub provider: String,
    pub model_id: String,
    pub input_per_million: f64,
    pub output_per_million: f64,
}

/// One completed upstream call's cost.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostRecord {
    pub id: String,
    pub agent_id: String,
    pub provider: String,
    pub model_id: String,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub input_cached_tokens: i64,
    pub input_cost_usd: f64,
    pub output_cost_usd: f64,
    pub total_cost_usd: f64,
    pub rate_input: Option<f64>,
    pub rate_output: Option<f64>,
    pub pricing_known: bool,
    pub request_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Budget enforcement mode once a limit is exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetAction {
    Warn,
    Block,
}

impl BudgetAction {
    pub fn as_str(self) -> &'static str {
        match self {
            BudgetAction::Warn => "warn",
            BudgetAction::Block => "block",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "warn" => Some(BudgetAction::Warn),
            "block" => Some(BudgetAction::Block),
            _ => None,
        }
    }
}

/// A daily spend cap for a scope (global, or a single agent).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Budget {
    pub scope: String,
    pub daily_limit: Option<f64>,
    pub action: BudgetAction,
    pub updated_at: DateTime<Utc>,
}

/// The singleton application settings row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub theme: String,
    pub server_host: String,
    pub server_port: u16,
    pub retention_days: i64,
    pub store_text_content: bool,
    pub notifications_enabled: bool,
    pub launch_on_startup: bool,
    pub minimize_to_tray: bool,
    pub window_width: Option<i64>,
    pub window_height: Option<i64>,
    pub window_x: Option<i64>,
    pub window_y: Option<i64>,
    pub cloud_mode_enabled: bool,
    pub cloud_user_email: Option<String>,
    pub cloud_connected_at: Option<DateTime<Utc>>,
    pub block_threats: bool,
    pub updated_at: DateTime<Utc>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: "system".into(),
            server_host: "127.0.0.1".into(),
            server_port: 8741,
            retention_days: 30,
            store_text_content: true,
            notifications_enabled: true,
            launch_on_startup: false,
            minimize_to_tray: true,
            window_width: None,
            window_height: None,
            window_x: None,
            window_y: None,
            cloud_mode_enabled: false,
            cloud_user_email: None,
            cloud_connected_at: None,
            block_threats: false,
            updated_at: Utc::now(),
        }
    }
}

/// One row of the `schema_version` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaVersionRow {
    pub version: i64,
    pub description: String,
    pub applied_at: DateTime<Utc>,
}

/// The rule loader's staging row for a bundled community rule, before
/// overrides are applied. Distinct from [`Rule`], which is the analyzer's
/// post-merge view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunityRuleCacheEntry {
    pub rule_id: String,
    pub name: String,
    pub category: String,
    pub description: String,
    pub severity: Severity,
    pub patterns: Vec<String>,
    pub enabled: bool,
    pub source_file: Option<String>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub loaded_at: DateTime<Utc>,
}
