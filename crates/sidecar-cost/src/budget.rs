// ── Budget guardian ──────────────────────────────────────────────────────────
// Evaluates whether an agent's upstream call should proceed, given the
// global and per-agent daily spend caps. A deny on either scope denies the
// call — budgets are pessimistic, not additive.

use chrono::{Local, TimeZone, Utc};
use sidecar_core::models::BudgetAction;
use sidecar_core::repo::{BudgetsRepository, CostsRepository};
use sidecar_core::{SidecarResult, Store};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BudgetDecision {
    Allow,
    Warn,
    Deny { retry_after_seconds: i64 },
}

pub struct BudgetGuardian<'a> {
    store: &'a Store,
}

impl<'a> BudgetGuardian<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Checks both the `"global"` scope and `agent_id`'s own scope against
    /// today's spend (local calendar day). A breach of either scope wins;
    /// between two breaches, `Deny` outranks `Warn`.
    pub fn evaluate(&self, agent_id: &str) -> SidecarResult<BudgetDecision> {
        let day_start = local_midnight_utc();

        let global = self.evaluate_scope("global", day_start)?;
        let agent = self.evaluate_scope(agent_id, day_start)?;

        Ok(match (global, agent) {
            (BudgetDecision::Deny { retry_after_seconds }, _) | (_, BudgetDecision::Deny { retry_after_seconds }) => {
                BudgetDecision::Deny { retry_after_seconds }
            }
            (BudgetDecision::Warn, _) | (_, BudgetDecision::Warn) => BudgetDecision::Warn,
            _ => BudgetDecision::Allow,
        })
    }

    fn evaluate_scope(&self, scope: &str, day_start: chrono::DateTime<Utc>) -> SidecarResult<BudgetDecision> {
        let budgets = BudgetsRepository::new(self.store);
        let Some(budget) = budgets.get(scope)? else {
            return Ok(BudgetDecision::Allow);
        };
        let Some(limit) = budget.daily_limit else {
            return Ok(BudgetDecision::Allow);
        };

        let spent = CostsRepository::new(self.store).spent_since(scope, day_start)?;
        if spent < limit {
            return Ok(BudgetDecision::Allow);
        }

        Ok(match budget.action {
            BudgetAction::Warn => BudgetDecision::Warn,
            BudgetAction::Block => BudgetDecision::Deny { retry_after_seconds: seconds_until_local_midnight() },
        })
    }
}

/// The most recent local midnight, expressed as a UTC instant, for use as
/// the lower bound of "spent today".
fn local_midnight_utc() -> chrono::DateTime<Utc> {
    let now_local = Local::now();
    let midnight_naive = now_local.date_naive().and_hms_opt(0, 0, 0).expect("midnight is a valid time");
    Local
        .from_local_datetime(&midnight_naive)
        .single()
        .unwrap_or(now_local)
        .with_timezone(&Utc)
}

fn seconds_until_local_midnight() -> i64 {
    let now_local = Local::now();
    let tomorrow_midnight = (now_local.date_naive() + chrono::Duration::days(1))
        .and_hms_opt(0, 0, 0)
        .expect("midnight is a valid time");
    let next_midnight_local = Local
        .from_local_datetime(&tomorrow_midnight)
        .single()
        .unwrap_or(now_local);
    (next_midnight_local - now_local).num_seconds().max(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sidecar_core::models::CostRecord;
    use uuid::Uuid;

    fn insert_spend(store: &Store, agent_id: &str, cost: f64) {
        CostsRepository::new(store)
            .insert(&CostRecord {
                id: Uuid::new_v4().to_string(),
                agent_id: agent_id.to_string(),
                provider: "openai".into(),
                model_id: "gpt-4o".into(),
                input_tokens: 100,
                output_tokens: 50,
                input_cached_tokens: 0,
                input_cost_usd: cost / 2.0,
                output_cost_usd: cost / 2.0,
                total_cost_usd: cost,
                rate_input: Some(2.5),
                rate_output: Some(10.0),
                pricing_known: true,
                request_id: None,
                created_at: Utc::now(),
            })
            .unwrap();
    }

    #[test]
    fn no_budget_configured_allows() {
        let store = Store::open_in_memory().unwrap();
        let guardian = BudgetGuardian::new(&store);
        assert_eq!(guardian.evaluate("agent-a").unwrap(), BudgetDecision::Allow);
    }

    #[test]
    fn under_limit_allows() {
        let store = Store::open_in_memory().unwrap();
        BudgetsRepository::new(&store).upsert("agent-a", Some(10.0), BudgetAction::Block).unwrap();
        insert_spend(&store, "agent-a", 2.0);
        let guardian = BudgetGuardian::new(&store);
        assert_eq!(guardian.evaluate("agent-a").unwrap(), BudgetDecision::Allow);
    }

    #[test]
    fn over_limit_with_warn_action_warns() {
        let store = Store::open_in_memory().unwrap();
        BudgetsRepository::new(&store).upsert("agent-a", Some(1.0), BudgetAction::Warn).unwrap();
        insert_spend(&store, "agent-a", 5.0);
        let guardian = BudgetGuardian::new(&store);
        assert_eq!(guardian.evaluate("agent-a").unwrap(), BudgetDecision::Warn);
    }

    #[test]
    fn over_limit_with_block_action_denies() {
        let store = Store::open_in_memory().unwrap();
        BudgetsRepository::new(&store).upsert("agent-a", Some(1.0), BudgetAction::Block).unwrap();
        insert_spend(&store, "agent-a", 5.0);
        let guardian = BudgetGuardian::new(&store);
        match guardian.evaluate("agent-a").unwrap() {
            BudgetDecision::Deny { retry_after_seconds } => assert!(retry_after_seconds > 0),
            other => panic!("expected Deny, got {other:?}"),
        }
    }

    #[test]
    fn global_deny_overrides_agent_allow() {
        let store = Store::open_in_memory().unwrap();
        BudgetsRepository::new(&store).upsert("global", Some(1.0), BudgetAction::Block).unwrap();
        insert_spend(&store, "agent-a", 5.0);
        let guardian = BudgetGuardian::new(&store);
        match guardian.evaluate("agent-a").unwrap() {
            BudgetDecision::Deny { .. } => {}
            other => panic!("expected Deny, got {other:?}"),
        }
    }

    #[test]
    fn agent_scope_spend_does_not_leak_into_other_agents() {
        let store = Store::open_in_memory().unwrap();
        BudgetsRepository::new(&store).upsert("agent-b", Some(1.0), BudgetAction::Block).unwrap();
        insert_spend(&store, "agent-a", 5.0);
        let guardian = BudgetGuardian::new(&store);
        assert_eq!(guardian.evaluate("agent-b").unwrap(), BudgetDecision::Allow);
    }
}
