use serde::{Deserialize, Serialize};

/// Classification of a single turn's result, used both for telemetry and
/// for the outbound `task_outcome` metadata chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Failed,
    Partial,
    Success,
}

/// One scored sample recorded against a telemetry scope's rolling window.
/// Tagged by status so callers can't construct an inconsistent
/// status/score pairing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeEntry {
    Failed { timestamp_ms: u64 },
    Partial { timestamp_ms: u64, score: f64 },
    Success { timestamp_ms: u64, score: f64 },
}

impl OutcomeEntry {
    pub fn timestamp_ms(&self) -> u64 {
        match self {
            OutcomeEntry::Failed { timestamp_ms } => *timestamp_ms,
            OutcomeEntry::Partial { timestamp_ms, .. } => *timestamp_ms,
            OutcomeEntry::Success { timestamp_ms, .. } => *timestamp_ms,
        }
    }

    /// Score in `[0, 1]` used by the weighted-success-rate formula.
    /// Failed samples contribute zero.
    pub fn score(&self) -> f64 {
        match self {
            OutcomeEntry::Failed { .. } => 0.0,
            OutcomeEntry::Partial { score, .. } => *score,
            OutcomeEntry::Success { score, .. } => *score,
        }
    }

    pub fn status(&self) -> OutcomeStatus {
        match self {
            OutcomeEntry::Failed { .. } => OutcomeStatus::Failed,
            OutcomeEntry::Partial { .. } => OutcomeStatus::Partial,
            OutcomeEntry::Success { .. } => OutcomeStatus::Success,
        }
    }
}

/// The scope a rolling KPI window is keyed by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ScopeKey {
    Global,
    User { user_id: String },
    Organization { organization_id: String },
    Composite {
        user_id: String,
        organization_id: String,
    },
}

impl ScopeKey {
    /// Stable string form used as a persistence/lookup key.
    pub fn as_string(&self) -> String {
        match self {
            ScopeKey::Global => "global".to_string(),
            ScopeKey::User { user_id } => format!("user:{user_id}"),
            ScopeKey::Organization { organization_id } => format!("org:{organization_id}"),
            ScopeKey::Composite {
                user_id,
                organization_id,
            } => format!("org:{organization_id}:user:{user_id}"),
        }
    }
}

/// Snapshot of a scope's rolling window, returned after recording a
/// sample and surfaced via the `task_outcome_kpi` metadata chunk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KpiWindow {
    pub scope_key: String,
    pub sample_count: usize,
    pub success_count: usize,
    pub partial_count: usize,
    pub failed_count: usize,
    /// Unweighted fraction of samples that were `Success`.
    pub success_rate: f64,
    pub weighted_success_rate: f64,
    /// Epoch ms of the most recent alert fired for this scope, if any.
    pub last_alert_at_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_entry_scores_zero() {
        let e = OutcomeEntry::Failed { timestamp_ms: 1 };
        assert_eq!(e.score(), 0.0);
        assert_eq!(e.status(), OutcomeStatus::Failed);
    }

    #[test]
    fn composite_scope_key_format() {
        let k = ScopeKey::Composite {
            user_id: "u1".into(),
            organization_id: "acme".into(),
        };
        assert_eq!(k.as_string(), "org:acme:user:u1");
    }

    #[test]
    fn scope_keys_distinct_for_user_and_org() {
        let u = ScopeKey::User { user_id: "acme".into() };
        let o = ScopeKey::Organization {
            organization_id: "acme".into(),
        };
        assert_ne!(u.as_string(), o.as_string());
    }
}
