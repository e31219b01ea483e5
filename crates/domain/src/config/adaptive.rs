use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adaptive controller
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiveConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Minimum sample count in a scope's window before adaptation engages.
    #[serde(default = "d_min_samples")]
    pub min_samples: usize,
    /// Weighted success rate below which a scope is considered degraded.
    #[serde(default = "d_min_weighted_success_rate")]
    pub min_weighted_success_rate: f64,
    /// When degraded, force `toolSelectionMode` from `discovered` to `all`.
    #[serde(default = "d_true")]
    pub force_all_tools_when_degraded: bool,
    /// When degraded, force `toolFailureMode` from `fail_closed` to
    /// `fail_open`, unless the caller explicitly requested `fail_closed`.
    #[serde(default = "d_true")]
    pub force_fail_open_when_degraded: bool,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_samples: d_min_samples(),
            min_weighted_success_rate: d_min_weighted_success_rate(),
            force_all_tools_when_degraded: true,
            force_fail_open_when_degraded: true,
        }
    }
}

fn d_true() -> bool {
    true
}
fn d_min_samples() -> usize {
    5
}
fn d_min_weighted_success_rate() -> f64 {
    0.5
}
