use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Outcome telemetry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Samples retained per scope's rolling window.
    #[serde(default = "d_window")]
    pub rolling_window_size: usize,
    /// Recency decay base for `weightedSuccessRate`. Sample `i` of `N`
    /// (0-indexed, newest last) is weighted `alpha^(N-1-i)`. At the
    /// default window size and alpha, the newest sample weighs roughly
    /// 2x a sample at the median age of the window.
    #[serde(default = "d_alpha")]
    pub recency_alpha: f64,
    /// Minimum sample count before an alert can fire for a scope.
    #[serde(default = "d_alert_min_samples")]
    pub alert_min_samples: usize,
    /// Weighted success rate threshold below which a scope alerts.
    #[serde(default = "d_alert_threshold")]
    pub alert_below_weighted_success_rate: f64,
    /// Minimum time between alerts for the same scope.
    #[serde(default = "d_cooldown_ms")]
    pub alert_cooldown_ms: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            rolling_window_size: d_window(),
            recency_alpha: d_alpha(),
            alert_min_samples: d_alert_min_samples(),
            alert_below_weighted_success_rate: d_alert_threshold(),
            alert_cooldown_ms: d_cooldown_ms(),
        }
    }
}

fn d_window() -> usize {
    20
}
fn d_alpha() -> f64 {
    0.9
}
fn d_alert_min_samples() -> usize {
    5
}
fn d_alert_threshold() -> f64 {
    0.5
}
fn d_cooldown_ms() -> u64 {
    300_000
}
