use std::collections::HashMap;

use ao_domain::capability::CapabilityKind;
use ao_domain::turn::{ToolFailureMode, ToolSelectionMode, TurnPolicy};

/// Normalize a raw request-override key: lowercase, dashes and spaces to
/// underscores. `"Tool-Selection Mode"` and `"tool_selection_mode"` are the
/// same key after normalization.
fn normalize_key(key: &str) -> String {
    key.trim()
        .to_lowercase()
        .replace(['-', ' '], "_")
}

/// Apply request-supplied policy overrides on top of a seed `TurnPolicy`.
/// Unknown keys and unparseable values are silently ignored — the seed
/// value for that field is kept.
pub fn apply_overrides(seed: TurnPolicy, raw: &HashMap<String, String>) -> TurnPolicy {
    let mut policy = seed;
    let normalized: HashMap<String, String> = raw
        .iter()
        .map(|(k, v)| (normalize_key(k), v.trim().to_lowercase()))
        .collect();

    if let Some(value) = normalized.get("tool_selection_mode") {
        match value.as_str() {
            "discovered" => policy.tool_selection_mode = ToolSelectionMode::Discovered,
            "all" => policy.tool_selection_mode = ToolSelectionMode::All,
            _ => {}
        }
    }

    if let Some(value) = normalized.get("tool_failure_mode") {
        match value.as_str() {
            "fail_open" => policy.tool_failure_mode = ToolFailureMode::FailOpen,
            "fail_closed" => {
                policy.tool_failure_mode = ToolFailureMode::FailClosed;
                policy.requested_fail_closed_explicitly = true;
            }
            _ => {}
        }
    }

    if let Some(value) = normalized.get("fail_closed") {
        match value.as_str() {
            "true" => {
                policy.tool_failure_mode = ToolFailureMode::FailClosed;
                policy.requested_fail_closed_explicitly = true;
            }
            "false" => policy.tool_failure_mode = ToolFailureMode::FailOpen,
            _ => {}
        }
    }

    policy
}

/// Request-scoped overrides to the discovery filter, parsed independently
/// of `TurnPolicy` since they shape `CapabilityPlan` rather than it.
#[derive(Debug, Clone, PartialEq)]
pub struct CapabilityOverrides {
    pub enabled: bool,
    pub kind_filter: Option<CapabilityKind>,
    pub category_filter: Option<String>,
}

impl Default for CapabilityOverrides {
    fn default() -> Self {
        Self {
            enabled: true,
            kind_filter: None,
            category_filter: None,
        }
    }
}

/// Parses `enableCapabilityDiscovery`, `capabilityDiscoveryKind`, and
/// `capabilityCategory` from raw request flags. Category is matched
/// case-sensitively against descriptor categories, so it's read from `raw`
/// directly rather than the lowercased key/value map `apply_overrides` uses.
pub fn apply_capability_overrides(raw: &HashMap<String, String>) -> CapabilityOverrides {
    let mut overrides = CapabilityOverrides::default();

    let normalized_lower: HashMap<String, String> = raw
        .iter()
        .map(|(k, v)| (normalize_key(k), v.trim().to_lowercase()))
        .collect();

    if let Some(value) = normalized_lower.get("enable_capability_discovery") {
        match value.as_str() {
            "true" => overrides.enabled = true,
            "false" => overrides.enabled = false,
            _ => {}
        }
    }

    if let Some(value) = normalized_lower.get("capability_discovery_kind") {
        if value != "any" {
            overrides.kind_filter = CapabilityKind::parse(value);
        }
    }

    let normalized_raw: HashMap<String, String> = raw
        .iter()
        .map(|(k, v)| (normalize_key(k), v.trim().to_string()))
        .collect();
    if let Some(value) = normalized_raw.get("capability_category") {
        if !value.is_empty() {
            overrides.category_filter = Some(value.clone());
        }
    }

    overrides
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_keys_are_ignored() {
        let mut raw = HashMap::new();
        raw.insert("some-unknown-flag".to_string(), "whatever".to_string());
        let policy = apply_overrides(TurnPolicy::default(), &raw);
        assert_eq!(policy.tool_selection_mode, ToolSelectionMode::Discovered);
    }

    #[test]
    fn dash_and_space_keys_normalize_the_same() {
        let mut dash = HashMap::new();
        dash.insert("tool-selection-mode".to_string(), "all".to_string());
        let mut space = HashMap::new();
        space.insert("tool selection mode".to_string(), "all".to_string());

        let a = apply_overrides(TurnPolicy::default(), &dash);
        let b = apply_overrides(TurnPolicy::default(), &space);
        assert_eq!(a.tool_selection_mode, ToolSelectionMode::All);
        assert_eq!(b.tool_selection_mode, ToolSelectionMode::All);
    }

    #[test]
    fn fail_closed_shorthand_sets_explicit_flag() {
        let mut raw = HashMap::new();
        raw.insert("fail_closed".to_string(), "true".to_string());
        let policy = apply_overrides(TurnPolicy::default(), &raw);
        assert_eq!(policy.tool_failure_mode, ToolFailureMode::FailClosed);
        assert!(policy.requested_fail_closed_explicitly);
    }

    #[test]
    fn unparseable_value_keeps_seed_default() {
        let mut raw = HashMap::new();
        raw.insert("tool_selection_mode".to_string(), "everything".to_string());
        let policy = apply_overrides(TurnPolicy::default(), &raw);
        assert_eq!(policy.tool_selection_mode, ToolSelectionMode::Discovered);
    }

    #[test]
    fn capability_overrides_default_to_enabled_with_no_filter() {
        let overrides = apply_capability_overrides(&HashMap::new());
        assert!(overrides.enabled);
        assert_eq!(overrides.kind_filter, None);
        assert_eq!(overrides.category_filter, None);
    }

    #[test]
    fn capability_overrides_parse_kind_and_disable_flag() {
        let mut raw = HashMap::new();
        raw.insert("capability-discovery-kind".to_string(), "skill".to_string());
        raw.insert("enable_capability_discovery".to_string(), "false".to_string());
        let overrides = apply_capability_overrides(&raw);
        assert_eq!(overrides.kind_filter, Some(CapabilityKind::Skill));
        assert!(!overrides.enabled);
    }

    #[test]
    fn capability_category_preserves_original_case() {
        let mut raw = HashMap::new();
        raw.insert("capability_category".to_string(), "DevOps".to_string());
        let overrides = apply_capability_overrides(&raw);
        assert_eq!(overrides.category_filter, Some("DevOps".to_string()));
    }

    #[test]
    fn capability_discovery_kind_any_means_no_filter() {
        let mut raw = HashMap::new();
        raw.insert("capability_discovery_kind".to_string(), "any".to_string());
        let overrides = apply_capability_overrides(&raw);
        assert_eq!(overrides.kind_filter, None);
    }
}
