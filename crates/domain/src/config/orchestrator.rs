use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Turn orchestrator
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Tool-call round-trips allowed within one turn before it's cut short
    /// and reported as a `partial` outcome.
    #[serde(default = "d_max_iterations")]
    pub max_tool_call_iterations: u32,
    /// Whole-turn timeout, independent of per-call provider/tool timeouts.
    #[serde(default = "d_turn_timeout_ms")]
    pub default_agent_turn_timeout_ms: u64,
    /// Organization substituted when a request omits `organizationId`.
    #[serde(default = "d_default_org")]
    pub default_organization_id: String,
    #[serde(default)]
    pub long_term_memory: LongTermMemoryConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_tool_call_iterations: d_max_iterations(),
            default_agent_turn_timeout_ms: d_turn_timeout_ms(),
            default_organization_id: d_default_org(),
            long_term_memory: LongTermMemoryConfig::default(),
        }
    }
}

/// Long-term memory recall injected into the prompt, merged from the
/// scopes named in a request's `memoryControl.longTermMemory.scopes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LongTermMemoryConfig {
    #[serde(default = "d_max_context_chars")]
    pub max_context_chars: usize,
    #[serde(default = "d_top_k")]
    pub top_k: usize,
}

impl Default for LongTermMemoryConfig {
    fn default() -> Self {
        Self {
            max_context_chars: d_max_context_chars(),
            top_k: d_top_k(),
        }
    }
}

fn d_max_iterations() -> u32 {
    5
}
fn d_turn_timeout_ms() -> u64 {
    120_000
}
fn d_default_org() -> String {
    "default".into()
}
fn d_max_context_chars() -> usize {
    4_200
}
fn d_top_k() -> usize {
    8
}
