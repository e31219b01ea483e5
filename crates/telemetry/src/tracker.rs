use std::collections::{HashMap, VecDeque};

use ao_domain::config::TelemetryConfig;
use ao_domain::outcome::{KpiWindow, OutcomeEntry, OutcomeStatus, ScopeKey};
use parking_lot::RwLock;

/// Fired when a scope's weighted success rate drops below the configured
/// threshold and the cooldown since its last alert has elapsed.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryAlert {
    pub scope_key: String,
    pub weighted_success_rate: f64,
    pub sample_count: usize,
    pub fired_at_ms: u64,
}

struct ScopeWindow {
    /// Oldest first, newest last — matches the `alpha^(N-1-i)` weighting.
    entries: VecDeque<OutcomeEntry>,
    last_alert_at_ms: Option<u64>,
}

impl ScopeWindow {
    fn new() -> Self {
        Self {
            entries: VecDeque::new(),
            last_alert_at_ms: None,
        }
    }
}

/// Rolling per-scope KPI tracker (C6 Outcome Telemetry). Holds a bounded
/// ring of `OutcomeEntry` samples per scope and computes a recency-weighted
/// success rate, grounded in `RunStore`'s ring+index pattern but keyed by
/// `ScopeKey` instead of run id.
pub struct OutcomeTracker {
    config: TelemetryConfig,
    windows: RwLock<HashMap<String, ScopeWindow>>,
}

impl OutcomeTracker {
    pub fn new(config: TelemetryConfig) -> Self {
        Self {
            config,
            windows: RwLock::new(HashMap::new()),
        }
    }

    /// Seed a scope's window from persisted entries (used at startup,
    /// after `TelemetryStore::load_windows`).
    pub fn restore(&self, scope_key: &str, entries: Vec<OutcomeEntry>) {
        let mut windows = self.windows.write();
        let window = windows.entry(scope_key.to_string()).or_insert_with(ScopeWindow::new);
        window.entries = entries.into_iter().collect();
        while window.entries.len() > self.config.rolling_window_size {
            window.entries.pop_front();
        }
    }

    /// Record a sample against `scope`, evicting the oldest entry once the
    /// window exceeds `rolling_window_size`. Returns the updated KPI
    /// snapshot and an alert if this sample just tripped the threshold
    /// (subject to the per-scope cooldown).
    pub fn record(
        &self,
        scope: &ScopeKey,
        entry: OutcomeEntry,
        now_ms: u64,
    ) -> (KpiWindow, Option<TelemetryAlert>) {
        let scope_key = scope.as_string();
        let mut windows = self.windows.write();
        let window = windows.entry(scope_key.clone()).or_insert_with(ScopeWindow::new);

        window.entries.push_back(entry);
        while window.entries.len() > self.config.rolling_window_size {
            window.entries.pop_front();
        }

        let weighted_success_rate = weighted_success_rate(&window.entries, self.config.recency_alpha);
        let sample_count = window.entries.len();
        let (success_count, partial_count, failed_count) = status_counts(&window.entries);

        let degraded = sample_count >= self.config.alert_min_samples
            && weighted_success_rate < self.config.alert_below_weighted_success_rate;

        let cooldown_elapsed = match window.last_alert_at_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= self.config.alert_cooldown_ms,
        };

        let alert = if degraded && cooldown_elapsed {
            window.last_alert_at_ms = Some(now_ms);
            Some(TelemetryAlert {
                scope_key: scope_key.clone(),
                weighted_success_rate,
                sample_count,
                fired_at_ms: now_ms,
            })
        } else {
            None
        };

        let kpi = KpiWindow {
            scope_key,
            sample_count,
            success_count,
            partial_count,
            failed_count,
            success_rate: success_rate(success_count, sample_count),
            weighted_success_rate,
            last_alert_at_ms: window.last_alert_at_ms,
        };

        (kpi, alert)
    }

    /// Current snapshot for a scope without recording a new sample.
    pub fn snapshot(&self, scope: &ScopeKey) -> KpiWindow {
        let scope_key = scope.as_string();
        let windows = self.windows.read();
        match windows.get(&scope_key) {
            Some(window) => {
                let sample_count = window.entries.len();
                let (success_count, partial_count, failed_count) = status_counts(&window.entries);
                KpiWindow {
                    scope_key,
                    sample_count,
                    success_count,
                    partial_count,
                    failed_count,
                    success_rate: success_rate(success_count, sample_count),
                    weighted_success_rate: weighted_success_rate(&window.entries, self.config.recency_alpha),
                    last_alert_at_ms: window.last_alert_at_ms,
                }
            }
            None => KpiWindow {
                scope_key,
                sample_count: 0,
                weighted_success_rate: 1.0,
                ..KpiWindow::default()
            },
        }
    }

    /// Entries currently held for a scope, for persistence.
    pub fn entries(&self, scope_key: &str) -> Vec<OutcomeEntry> {
        self.windows
            .read()
            .get(scope_key)
            .map(|w| w.entries.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// The configured alert threshold, for callers surfacing it alongside
    /// a fired `TelemetryAlert`.
    pub fn alert_threshold(&self) -> f64 {
        self.config.alert_below_weighted_success_rate
    }

    /// Every scope key with a window, for periodic persistence flushes.
    pub fn known_scopes(&self) -> Vec<String> {
        self.windows.read().keys().cloned().collect()
    }
}

/// `sum(score_i * alpha^(N-1-i)) / sum(alpha^(N-1-i))` over entries ordered
/// oldest to newest. An empty window has a neutral rate of `1.0` so a
/// brand-new scope never looks degraded.
fn weighted_success_rate(entries: &VecDeque<OutcomeEntry>, alpha: f64) -> f64 {
    let n = entries.len();
    if n == 0 {
        return 1.0;
    }

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (i, entry) in entries.iter().enumerate() {
        let weight = alpha.powi((n - 1 - i) as i32);
        numerator += entry.score() * weight;
        denominator += weight;
    }

    if denominator == 0.0 {
        1.0
    } else {
        numerator / denominator
    }
}

/// Unweighted `(success, partial, failed)` counts over a window.
fn status_counts(entries: &VecDeque<OutcomeEntry>) -> (usize, usize, usize) {
    let mut success = 0;
    let mut partial = 0;
    let mut failed = 0;
    for entry in entries {
        match entry.status() {
            OutcomeStatus::Success => success += 1,
            OutcomeStatus::Partial => partial += 1,
            OutcomeStatus::Failed => failed += 1,
        }
    }
    (success, partial, failed)
}

/// Unweighted success fraction; a scope with no samples is neutral (`1.0`).
fn success_rate(success_count: usize, sample_count: usize) -> f64 {
    if sample_count == 0 {
        1.0
    } else {
        success_count as f64 / sample_count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn success(ts: u64) -> OutcomeEntry {
        OutcomeEntry::Success { timestamp_ms: ts, score: 1.0 }
    }
    fn failure(ts: u64) -> OutcomeEntry {
        OutcomeEntry::Failed { timestamp_ms: ts }
    }

    #[test]
    fn newest_sample_weighs_more_than_oldest() {
        let tracker = OutcomeTracker::new(TelemetryConfig::default());
        let scope = ScopeKey::Global;
        // One success long ago, rest failures, then a recent success.
        tracker.record(&scope, failure(1), 1);
        for i in 2..21 {
            tracker.record(&scope, failure(i), i);
        }
        let (kpi, _) = tracker.record(&scope, success(21), 21);
        assert!(kpi.weighted_success_rate > 0.0);
        assert!(kpi.weighted_success_rate < 0.2);
    }

    #[test]
    fn ring_evicts_oldest_beyond_window_size() {
        let cfg = TelemetryConfig { rolling_window_size: 3, ..TelemetryConfig::default() };
        let tracker = OutcomeTracker::new(cfg);
        let scope = ScopeKey::Global;
        tracker.record(&scope, failure(1), 1);
        tracker.record(&scope, failure(2), 2);
        tracker.record(&scope, failure(3), 3);
        let (kpi, _) = tracker.record(&scope, success(4), 4);
        assert_eq!(kpi.sample_count, 3);
    }

    #[test]
    fn alert_fires_once_then_respects_cooldown() {
        let cfg = TelemetryConfig {
            alert_min_samples: 2,
            alert_below_weighted_success_rate: 0.5,
            alert_cooldown_ms: 1000,
            ..TelemetryConfig::default()
        };
        let tracker = OutcomeTracker::new(cfg);
        let scope = ScopeKey::Global;
        tracker.record(&scope, failure(1), 1);
        let (_, alert1) = tracker.record(&scope, failure(2), 2);
        assert!(alert1.is_some());

        let (_, alert2) = tracker.record(&scope, failure(3), 3);
        assert!(alert2.is_none(), "cooldown should suppress a second alert");

        let (_, alert3) = tracker.record(&scope, failure(1500), 1500);
        assert!(alert3.is_some(), "alert should fire again after cooldown elapses");
    }

    #[test]
    fn alert_requires_minimum_sample_count() {
        let cfg = TelemetryConfig {
            alert_min_samples: 5,
            alert_below_weighted_success_rate: 0.9,
            ..TelemetryConfig::default()
        };
        let tracker = OutcomeTracker::new(cfg);
        let scope = ScopeKey::Global;
        let (_, alert) = tracker.record(&scope, failure(1), 1);
        assert!(alert.is_none());
    }

    #[test]
    fn empty_scope_has_neutral_rate() {
        let tracker = OutcomeTracker::new(TelemetryConfig::default());
        let kpi = tracker.snapshot(&ScopeKey::Organization { organization_id: "acme".into() });
        assert_eq!(kpi.weighted_success_rate, 1.0);
        assert_eq!(kpi.sample_count, 0);
    }

    #[test]
    fn restore_seeds_window_from_persisted_entries() {
        let tracker = OutcomeTracker::new(TelemetryConfig::default());
        tracker.restore("global", vec![success(1), success(2)]);
        let kpi = tracker.snapshot(&ScopeKey::Global);
        assert_eq!(kpi.sample_count, 2);
    }

    #[test]
    fn snapshot_breaks_down_status_counts_and_last_alert() {
        let cfg = TelemetryConfig {
            alert_min_samples: 1,
            alert_below_weighted_success_rate: 0.9,
            ..TelemetryConfig::default()
        };
        let tracker = OutcomeTracker::new(cfg);
        let scope = ScopeKey::Global;
        tracker.record(&scope, success(1), 1);
        let (kpi, alert) = tracker.record(&scope, failure(2), 2);

        assert_eq!(kpi.success_count, 1);
        assert_eq!(kpi.partial_count, 0);
        assert_eq!(kpi.failed_count, 1);
        assert_eq!(kpi.success_rate, 0.5);
        assert!(alert.is_some());
        assert_eq!(kpi.last_alert_at_ms, Some(2));

        let snap = tracker.snapshot(&scope);
        assert_eq!(snap.last_alert_at_ms, Some(2));
    }
}
