use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Context assembler tier budgets
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Character budget for the Tier 0 category summary.
    #[serde(default = "d_200")]
    pub tier0_max_chars: usize,
    /// Character budget for the Tier 1 slice.
    #[serde(default = "d_800")]
    pub tier1_max_chars: usize,
    /// Character budget for the Tier 2 slice.
    #[serde(default = "d_2000")]
    pub tier2_max_chars: usize,
    /// Max capabilities promoted into Tier 1.
    #[serde(default = "d_5")]
    pub tier1_top_k: usize,
    /// Minimum search score required to enter Tier 1.
    #[serde(default = "d_0_3")]
    pub tier1_min_relevance: f64,
    /// Max capabilities promoted into Tier 2, drawn from the Tier 1 subset.
    #[serde(default = "d_2")]
    pub tier2_top_k: usize,
    /// Boost applied to a rerank-inserted neighbor's effective score.
    #[serde(default = "d_0_15")]
    pub graph_boost_factor: f64,
    /// Whether discovery expands its seed match set through the capability
    /// graph before assembling tiers. Off by default so a fresh deployment
    /// with a sparse graph doesn't pull in noisy neighbors.
    #[serde(default)]
    pub enable_graph_rerank: bool,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            tier0_max_chars: 200,
            tier1_max_chars: 800,
            tier2_max_chars: 2_000,
            tier1_top_k: 5,
            tier1_min_relevance: 0.3,
            tier2_top_k: 2,
            graph_boost_factor: 0.15,
            enable_graph_rerank: false,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_200() -> usize {
    200
}
fn d_800() -> usize {
    800
}
fn d_2000() -> usize {
    2_000
}
fn d_5() -> usize {
    5
}
fn d_2() -> usize {
    2
}
fn d_0_3() -> f64 {
    0.3
}
fn d_0_15() -> f64 {
    0.15
}
