use serde::{Deserialize, Serialize};

/// Per-tier accounting, returned alongside the assembled prompt text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TierReport {
    pub included_count: usize,
    pub injected_chars: usize,
    pub estimated_tokens: usize,
    pub truncated_total_cap: bool,
}

/// Full report of a context pack build — surfaced in discovery timings
/// and consumable by tests asserting the token budget invariant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextReport {
    pub tier0: TierReport,
    pub tier1: TierReport,
    pub tier2: TierReport,
    pub total_injected_chars: usize,
    pub total_estimated_tokens: usize,
}
