use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::capability::CapabilityKind;

/// Whether the planner resolves tools via discovery or exposes everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolSelectionMode {
    Discovered,
    All,
}

/// Policy applied when tool execution or discovery fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolFailureMode {
    /// Continue the turn, feeding the error back into generation.
    FailOpen,
    /// Terminate the turn with a processing error.
    FailClosed,
}

/// Resolved policy for a single turn, after request overrides, seed
/// defaults, and any adaptive-controller forcing have been applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnPolicy {
    pub tool_selection_mode: ToolSelectionMode,
    pub tool_failure_mode: ToolFailureMode,
    /// `true` if the caller's request explicitly set `fail_closed`, as
    /// opposed to it being the seed default. Consulted by the adaptive
    /// controller's `forceFailOpenWhenDegraded` guard.
    pub requested_fail_closed_explicitly: bool,
}

impl Default for TurnPolicy {
    fn default() -> Self {
        Self {
            tool_selection_mode: ToolSelectionMode::Discovered,
            tool_failure_mode: ToolFailureMode::FailOpen,
            requested_fail_closed_explicitly: false,
        }
    }
}

/// The set of tools selected for a turn, plus the request-scoped discovery
/// filter that produced it and the diagnostics explaining how.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityPlan {
    /// `false` when the request set `enableCapabilityDiscovery=false`;
    /// discovery is skipped entirely and the plan falls back to `all`.
    pub enabled: bool,
    /// Restricts discovery to one `CapabilityKind`, from the
    /// `capabilityDiscoveryKind` request override.
    pub kind_filter: Option<CapabilityKind>,
    /// Restricts discovery to one category, from the `capabilityCategory`
    /// request override.
    pub category_filter: Option<String>,
    pub tool_names: Vec<String>,
    /// The discovery engine's assembled Tier 0/1/2 text, injected into the
    /// prompt ahead of the persona/user messages. `None` when discovery
    /// never ran (explicit `all` mode or `enabled=false`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_context: Option<String>,
    pub diagnostics: PlanDiagnostics,
}

impl Default for CapabilityPlan {
    fn default() -> Self {
        Self {
            enabled: true,
            kind_filter: None,
            category_filter: None,
            tool_names: Vec::new(),
            prompt_context: None,
            diagnostics: PlanDiagnostics::default(),
        }
    }
}

/// Explains how a `CapabilityPlan` was produced, surfaced to callers via
/// the `turn_planning` metadata chunk and consumed by tests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanDiagnostics {
    pub discovery_attempts: u32,
    pub discovery_succeeded: bool,
    /// Set when discovery was requested but ultimately yielded zero tools
    /// and the planner fell back to exposing everything.
    pub fallback_to_all: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
    /// Set when the adaptive controller altered the resolved policy.
    pub actions_applied: Vec<ExecutionAction>,
}

/// A single modification the adaptive controller made to a turn's policy,
/// tagged by the reason it fired. Never a bare string — callers must be
/// able to match exhaustively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ExecutionAction {
    /// Degraded KPI forced `discovered` mode to `all`.
    ForcedAllTools { scope_key: String },
    /// Degraded KPI forced `fail_closed` to `fail_open`.
    ForcedFailOpen { scope_key: String },
    /// An explicitly-requested `fail_closed` survived degradation because
    /// the caller asked for it directly.
    PreservedRequestedFailClosed { scope_key: String },
}

/// The resolved plan for a turn: selected tools plus the policy under
/// which they'll be exercised.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnPlan {
    pub policy: TurnPolicy,
    pub capability_plan: CapabilityPlan,
}

/// Per-turn context threaded through the orchestrator's state machine.
/// Not serialized; lives only for the duration of one turn.
#[derive(Debug, Clone)]
pub struct TurnContext {
    pub user_id: String,
    pub organization_id: Option<String>,
    pub session_id: String,
    pub conversation_id: String,
    pub selected_persona_id: Option<String>,
    pub custom_flags: HashMap<String, String>,
}

impl TurnContext {
    /// `conversationId` defaults to `sessionId` when the caller omits it.
    pub fn conversation_key(&self) -> &str {
        &self.conversation_id
    }
}
