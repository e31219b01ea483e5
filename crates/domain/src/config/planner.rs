use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Turn planner
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Seed default for `toolSelectionMode` absent a request override.
    #[serde(default = "d_true")]
    pub default_discovered: bool,
    /// Seed default for `toolFailureMode` absent a request override.
    #[serde(default)]
    pub default_fail_open: bool,
    /// Discovery attempts before giving up (1 + retries).
    #[serde(default = "d_max_retries")]
    pub max_retries: u32,
    /// Backoff between discovery retry attempts.
    #[serde(default = "d_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            default_discovered: true,
            default_fail_open: true,
            max_retries: d_max_retries(),
            retry_backoff_ms: d_backoff_ms(),
        }
    }
}

fn d_true() -> bool {
    true
}
fn d_max_retries() -> u32 {
    2
}
fn d_backoff_ms() -> u64 {
    250
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_discovered_fail_open() {
        let c = PlannerConfig::default();
        assert!(c.default_discovered);
        assert!(c.default_fail_open);
        assert_eq!(c.max_retries, 2);
    }

    #[test]
    fn deserialize_empty_uses_defaults() {
        let c: PlannerConfig = toml::from_str("").unwrap();
        assert_eq!(c.retry_backoff_ms, 250);
    }
}
