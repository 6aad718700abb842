// ── Permission engine ────────────────────────────────────────────────────────
// Resolves a block/allow/log_only decision for each parsed tool invocation.
// Precedence, in order: exact registry id → registry id by function-name
// suffix → a user-defined custom tool (an override whose tool_id matches
// nothing in the bundled registry) → a non-essential pass-through. A user
// override always wins over whatever default the matched step carries.

use sidecar_core::models::{Action, RiskTier, ToolOverride};
use sidecar_core::repo::ToolOverridesRepository;
use sidecar_core::{SidecarResult, Store};

use crate::registry;

/// The permission engine's verdict for a single tool invocation.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PermissionDecision {
    pub tool_id: String,
    pub function_name: String,
    pub action: Action,
    pub risk_tier: RiskTier,
    pub reason: String,
    pub is_essential: bool,
}

impl PermissionDecision {
    /// The numeric contribution this decision makes to downstream scoring.
    pub fn risk_score(&self) -> i64 {
        self.risk_tier.score()
    }
}

/// Evaluates one invocation's `function_name` against the bundled registry
/// and any user overrides stored in `store`.
pub fn evaluate(store: &Store, function_name: &str) -> SidecarResult<PermissionDecision> {
    let overrides = ToolOverridesRepository::new(store);

    if let Some(entry) = registry::ESSENTIAL_TOOLS.iter().find(|t| t.id == function_name) {
        return Ok(resolve_essential(entry.id.clone(), function_name, entry.default_action, entry.risk, &overrides)?);
    }

    if let Some(entry) = registry::lookup(function_name) {
        return Ok(resolve_essential(entry.id.clone(), function_name, entry.default_action, entry.risk, &overrides)?);
    }

    // Step 3: a custom tool is recognized purely by having an override row
    // whose tool_id is this function name and which matched nothing above.
    if let Some(custom) = overrides.get(function_name)? {
        return Ok(PermissionDecision {
            tool_id: function_name.to_string(),
            function_name: function_name.to_string(),
            action: custom.action,
            risk_tier: RiskTier::Write,
            reason: "custom tool override".to_string(),
            is_essential: false,
        });
    }

    Ok(PermissionDecision {
        tool_id: function_name.to_string(),
        function_name: function_name.to_string(),
        action: Action::LogOnly,
        risk_tier: RiskTier::Read,
        reason: "non-essential".to_string(),
        is_essential: false,
    })
}

fn resolve_essential(
    tool_id: String,
    function_name: &str,
    default_action: Action,
    risk: RiskTier,
    overrides: &ToolOverridesRepository,
) -> SidecarResult<PermissionDecision> {
    let override_row: Option<ToolOverride> = overrides.get(&tool_id)?;
    let (action, reason) = match &override_row {
        Some(o) => (o.action, "user override".to_string()),
        None => (default_action, "registry default".to_string()),
    };
    Ok(PermissionDecision {
        tool_id,
        function_name: function_name.to_string(),
        action,
        risk_tier: risk,
        reason,
        is_essential: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sidecar_core::models::Action;

    #[test]
    fn registry_default_applies_without_override() {
        let store = Store::open_in_memory().unwrap();
        let decision = evaluate(&store, "aws.iam_create_user").unwrap();
        assert_eq!(decision.action, Action::Block);
        assert!(decision.is_essential);
    }

    #[test]
    fn user_override_wins_over_registry_default() {
        let store = Store::open_in_memory().unwrap();
        ToolOverridesRepository::new(&store)
            .upsert("aws.iam_create_user", Action::Allow, None, None)
            .unwrap();
        let decision = evaluate(&store, "aws.iam_create_user").unwrap();
        assert_eq!(decision.action, Action::Allow);
        assert_eq!(decision.reason, "user override");
    }

    #[test]
    fn removed_override_reverts_to_default() {
        let store = Store::open_in_memory().unwrap();
        let overrides = ToolOverridesRepository::new(&store);
        overrides.upsert("aws.iam_create_user", Action::Allow, None, None).unwrap();
        overrides.delete("aws.iam_create_user").unwrap();
        let decision = evaluate(&store, "aws.iam_create_user").unwrap();
        assert_eq!(decision.action, Action::Block);
    }

    #[test]
    fn suffix_match_resolves_to_canonical_tool_id() {
        let store = Store::open_in_memory().unwrap();
        let decision = evaluate(&store, "send_email").unwrap();
        assert_eq!(decision.tool_id, "gmail.send_email");
        assert!(decision.is_essential);
    }

    #[test]
    fn unknown_tool_is_log_only_pass_through() {
        let store = Store::open_in_memory().unwrap();
        let decision = evaluate(&store, "some_custom_internal_tool").unwrap();
        assert_eq!(decision.action, Action::LogOnly);
        assert_eq!(decision.reason, "non-essential");
        assert!(!decision.is_essential);
    }

    #[test]
    fn custom_tool_override_is_honored() {
        let store = Store::open_in_memory().unwrap();
        ToolOverridesRepository::new(&store)
            .upsert("my_custom_tool", Action::Block, None, None)
            .unwrap();
        let decision = evaluate(&store, "my_custom_tool").unwrap();
        assert_eq!(decision.action, Action::Block);
        assert!(!decision.is_essential);
    }
}
