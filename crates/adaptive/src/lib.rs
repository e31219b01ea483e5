use ao_domain::config::AdaptiveConfig;
use ao_domain::outcome::KpiWindow;
use ao_domain::turn::{ExecutionAction, ToolFailureMode, ToolSelectionMode, TurnPlan};

/// Adjust a resolved `TurnPlan` in response to a scope's current KPI
/// snapshot. Pure and stateless: the same `(plan, kpi, config)` always
/// produces the same `(plan', actions)`, so callers can unit-test
/// degradation handling without touching the telemetry store.
pub fn adapt(plan: &TurnPlan, kpi: &KpiWindow, config: &AdaptiveConfig) -> (TurnPlan, Vec<ExecutionAction>) {
    let mut plan = plan.clone();
    let mut actions = Vec::new();

    if !config.enabled {
        return (plan, actions);
    }

    let degraded = kpi.sample_count >= config.min_samples.max(1)
        && kpi.weighted_success_rate < config.min_weighted_success_rate;
    if !degraded {
        return (plan, actions);
    }

    if config.force_all_tools_when_degraded && plan.policy.tool_selection_mode == ToolSelectionMode::Discovered {
        plan.policy.tool_selection_mode = ToolSelectionMode::All;
        actions.push(ExecutionAction::ForcedAllTools {
            scope_key: kpi.scope_key.clone(),
        });
    }

    if config.force_fail_open_when_degraded && plan.policy.tool_failure_mode == ToolFailureMode::FailClosed {
        if plan.policy.requested_fail_closed_explicitly {
            actions.push(ExecutionAction::PreservedRequestedFailClosed {
                scope_key: kpi.scope_key.clone(),
            });
        } else {
            plan.policy.tool_failure_mode = ToolFailureMode::FailOpen;
            actions.push(ExecutionAction::ForcedFailOpen {
                scope_key: kpi.scope_key.clone(),
            });
        }
    }

    (plan, actions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ao_domain::turn::{CapabilityPlan, PlanDiagnostics, TurnPolicy};

    fn plan_with(policy: TurnPolicy) -> TurnPlan {
        TurnPlan {
            policy,
            capability_plan: CapabilityPlan {
                tool_names: vec!["web-search".into()],
                diagnostics: PlanDiagnostics::default(),
                ..CapabilityPlan::default()
            },
        }
    }

    fn degraded_kpi() -> KpiWindow {
        KpiWindow {
            scope_key: "org:acme".into(),
            sample_count: 10,
            weighted_success_rate: 0.2,
            ..KpiWindow::default()
        }
    }

    #[test]
    fn disabled_config_never_adapts() {
        let plan = plan_with(TurnPolicy::default());
        let cfg = AdaptiveConfig::default();
        let (result, actions) = adapt(&plan, &degraded_kpi(), &cfg);
        assert_eq!(result.policy.tool_selection_mode, ToolSelectionMode::Discovered);
        assert!(actions.is_empty());
    }

    #[test]
    fn healthy_kpi_does_not_adapt() {
        let plan = plan_with(TurnPolicy::default());
        let cfg = AdaptiveConfig { enabled: true, ..AdaptiveConfig::default() };
        let healthy = KpiWindow {
            scope_key: "org:acme".into(),
            sample_count: 10,
            weighted_success_rate: 0.95,
            ..KpiWindow::default()
        };
        let (result, actions) = adapt(&plan, &healthy, &cfg);
        assert_eq!(result.policy.tool_selection_mode, ToolSelectionMode::Discovered);
        assert!(actions.is_empty());
    }

    #[test]
    fn degraded_kpi_forces_all_tools() {
        let plan = plan_with(TurnPolicy::default());
        let cfg = AdaptiveConfig { enabled: true, ..AdaptiveConfig::default() };
        let (result, actions) = adapt(&plan, &degraded_kpi(), &cfg);
        assert_eq!(result.policy.tool_selection_mode, ToolSelectionMode::All);
        assert_eq!(actions, vec![ExecutionAction::ForcedAllTools { scope_key: "org:acme".into() }]);
    }

    #[test]
    fn degraded_kpi_forces_fail_open_when_not_explicit() {
        let policy = TurnPolicy {
            tool_failure_mode: ToolFailureMode::FailClosed,
            requested_fail_closed_explicitly: false,
            ..TurnPolicy::default()
        };
        let plan = plan_with(policy);
        let cfg = AdaptiveConfig { enabled: true, ..AdaptiveConfig::default() };
        let (result, actions) = adapt(&plan, &degraded_kpi(), &cfg);
        assert_eq!(result.policy.tool_failure_mode, ToolFailureMode::FailOpen);
        assert!(actions.contains(&ExecutionAction::ForcedFailOpen { scope_key: "org:acme".into() }));
    }

    #[test]
    fn explicit_fail_closed_survives_degradation() {
        let policy = TurnPolicy {
            tool_failure_mode: ToolFailureMode::FailClosed,
            requested_fail_closed_explicitly: true,
            ..TurnPolicy::default()
        };
        let plan = plan_with(policy);
        let cfg = AdaptiveConfig { enabled: true, ..AdaptiveConfig::default() };
        let (result, actions) = adapt(&plan, &degraded_kpi(), &cfg);
        assert_eq!(result.policy.tool_failure_mode, ToolFailureMode::FailClosed);
        assert!(actions.contains(&ExecutionAction::PreservedRequestedFailClosed { scope_key: "org:acme".into() }));
    }

    #[test]
    fn insufficient_samples_does_not_adapt() {
        let plan = plan_with(TurnPolicy::default());
        let cfg = AdaptiveConfig { enabled: true, ..AdaptiveConfig::default() };
        let kpi = KpiWindow {
            scope_key: "org:acme".into(),
            sample_count: 2,
            weighted_success_rate: 0.1,
            ..KpiWindow::default()
        };
        let (result, actions) = adapt(&plan, &kpi, &cfg);
        assert_eq!(result.policy.tool_selection_mode, ToolSelectionMode::Discovered);
        assert!(actions.is_empty());
    }

    #[test]
    fn zero_samples_never_counts_as_degraded() {
        let plan = plan_with(TurnPolicy::default());
        let cfg = AdaptiveConfig {
            enabled: true,
            min_samples: 0,
            ..AdaptiveConfig::default()
        };
        let kpi = KpiWindow {
            scope_key: "org:acme".into(),
            sample_count: 0,
            weighted_success_rate: 0.0,
            ..KpiWindow::default()
        };
        let (result, actions) = adapt(&plan, &kpi, &cfg);
        assert_eq!(result.policy.tool_selection_mode, ToolSelectionMode::Discovered);
        assert!(actions.is_empty());
    }
}
