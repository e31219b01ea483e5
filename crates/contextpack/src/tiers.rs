use ao_domain::capability::{group_by_category, CapabilityDescriptor, CapabilityKind, CapabilityMatch};
use ao_domain::config::ContextConfig;

use crate::injection;
use crate::report::{ContextReport, TierReport};
use crate::truncation::{self, Section};

/// `ceil(len / 4)` character-to-token heuristic used throughout context
/// assembly. Deliberately crude — callers needing exact counts should use
/// the LLM provider's own tokenizer.
pub fn estimate_tokens(text: &str) -> usize {
    (text.len() + 3) / 4
}

/// Max capability names shown per category before collapsing the rest into
/// a `"(+N more)"` suffix.
const TIER0_NAMES_PER_CATEGORY: usize = 4;

fn display_name(d: &CapabilityDescriptor) -> &str {
    if d.display_name.is_empty() {
        &d.name
    } else {
        &d.display_name
    }
}

/// Tier 0: a category summary built from the full available descriptor
/// set, independent of any particular query. Categories are sorted by
/// member count descending (`group_by_category`'s contract); each line
/// lists up to `TIER0_NAMES_PER_CATEGORY` names, collapsing the remainder
/// into `"(+N more)"`. Callers cache this by index version rather than
/// rebuilding it per discovery call.
pub fn build_tier0(descriptors: &[CapabilityDescriptor], budget_chars: usize) -> (String, TierReport) {
    let groups = group_by_category(descriptors);
    let mut summary = String::new();
    for (category, members) in &groups {
        let shown: Vec<&str> = members
            .iter()
            .take(TIER0_NAMES_PER_CATEGORY)
            .map(|d| display_name(d))
            .collect();
        let remaining = members.len().saturating_sub(shown.len());
        summary.push_str(&format!("{category}: {}", shown.join(", ")));
        if remaining > 0 {
            summary.push_str(&format!(" (+{remaining} more)"));
        }
        summary.push('\n');
    }

    let (truncated, was_truncated) = truncation::truncate_per_file(&summary, budget_chars);
    let rendered = injection::format_tier0(&truncated);
    let report = TierReport {
        included_count: groups.len(),
        injected_chars: rendered.len(),
        estimated_tokens: estimate_tokens(&rendered),
        truncated_total_cap: was_truncated,
    };
    (rendered, report)
}

/// Top-level JSON schema property names for a tool descriptor; empty for
/// every other kind or when no schema is set.
fn tool_parameter_names(d: &CapabilityDescriptor) -> Vec<String> {
    if d.kind != CapabilityKind::Tool {
        return Vec::new();
    }
    d.full_schema
        .as_ref()
        .and_then(|s| s.get("properties"))
        .and_then(|p| p.as_object())
        .map(|props| props.keys().cloned().collect())
        .unwrap_or_default()
}

/// Tier 1: up to `tier1_top_k` matches at or above `tier1_min_relevance`,
/// capped at `tier1_max_chars` total. Returns the rendered text, the
/// subset of matches actually included (for Tier 2 to draw from, in the
/// same relevance order), and the accounting report.
pub fn build_tier1<'a>(
    matches: &'a [CapabilityMatch],
    cfg: &ContextConfig,
) -> (String, Vec<&'a CapabilityMatch>, TierReport) {
    let eligible: Vec<&CapabilityMatch> = matches
        .iter()
        .filter(|m| m.score >= cfg.tier1_min_relevance)
        .take(cfg.tier1_top_k)
        .collect();

    let mut sections: Vec<Section> = eligible
        .iter()
        .enumerate()
        .map(|(i, m)| {
            let params = tool_parameter_names(&m.descriptor);
            let line = injection::format_tier1_entry(
                i + 1,
                display_name(&m.descriptor),
                m.descriptor.kind.as_str(),
                &m.descriptor.description,
                &params,
                &m.descriptor.required_tools,
                m.descriptor.available,
            );
            Section {
                filename: m.descriptor.id.clone(),
                raw_chars: line.len(),
                content: line,
                truncated_per_file: false,
                truncated_total_cap: false,
                included: true,
                missing: false,
            }
        })
        .collect();

    truncation::apply_total_cap(&mut sections, cfg.tier1_max_chars);

    let mut rendered = String::new();
    let mut included = Vec::new();
    let mut truncated_any = false;
    for (section, m) in sections.iter().zip(eligible.iter()) {
        if section.included {
            rendered.push_str(&section.content);
            included.push(*m);
        }
        truncated_any |= section.truncated_total_cap;
    }

    let report = TierReport {
        included_count: included.len(),
        injected_chars: rendered.len(),
        estimated_tokens: estimate_tokens(&rendered),
        truncated_total_cap: truncated_any,
    };
    (rendered, included, report)
}

/// Tier 2: up to `tier2_top_k` matches drawn from the Tier 1 subset (which
/// is already relevance-ordered), capped at `tier2_max_chars` total.
/// Renders the full schema (tools) or full content (skills).
pub fn build_tier2(tier1_subset: &[&CapabilityMatch], cfg: &ContextConfig) -> (String, TierReport) {
    let candidates: Vec<&&CapabilityMatch> = tier1_subset.iter().take(cfg.tier2_top_k).collect();

    let mut sections: Vec<Section> = candidates
        .iter()
        .filter_map(|m| {
            let payload = m
                .descriptor
                .full_schema
                .as_ref()
                .map(|v| serde_json::to_string_pretty(v).unwrap_or_default())
                .or_else(|| m.descriptor.full_content.clone())?;
            let rendered = injection::format_tier2_entry(
                display_name(&m.descriptor),
                &m.descriptor.description,
                &payload,
                &m.descriptor.required_secrets,
                &m.descriptor.tags,
            );
            Some(Section {
                filename: m.descriptor.id.clone(),
                raw_chars: rendered.len(),
                content: rendered,
                truncated_per_file: false,
                truncated_total_cap: false,
                included: true,
                missing: false,
            })
        })
        .collect();

    truncation::apply_total_cap(&mut sections, cfg.tier2_max_chars);

    let mut rendered = String::new();
    let mut included_count = 0;
    let mut truncated_any = false;
    for section in &sections {
        if section.included {
            rendered.push_str(&section.content);
            included_count += 1;
        }
        truncated_any |= section.truncated_total_cap;
    }

    let report = TierReport {
        included_count,
        injected_chars: rendered.len(),
        estimated_tokens: estimate_tokens(&rendered),
        truncated_total_cap: truncated_any,
    };
    (rendered, report)
}

/// Assemble all three tiers into one prompt-ready string plus a report.
pub fn assemble(
    all_descriptors: &[CapabilityDescriptor],
    matches: &[CapabilityMatch],
    cfg: &ContextConfig,
) -> (String, ContextReport) {
    let (tier0_text, tier0_report) = build_tier0(all_descriptors, cfg.tier0_max_chars);
    let (tier1_text, tier1_subset, tier1_report) = build_tier1(matches, cfg);
    let (tier2_text, tier2_report) = build_tier2(&tier1_subset, cfg);

    let mut assembled = String::new();
    assembled.push_str(&tier0_text);
    assembled.push_str(&tier1_text);
    assembled.push_str(&tier2_text);

    let total_injected_chars = assembled.len();
    let total_estimated_tokens =
        tier0_report.estimated_tokens + tier1_report.estimated_tokens + tier2_report.estimated_tokens;

    let report = ContextReport {
        tier0: tier0_report,
        tier1: tier1_report,
        tier2: tier2_report,
        total_injected_chars,
        total_estimated_tokens,
    };
    (assembled, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ao_domain::capability::{CapabilityKind, SourceRef};

    fn descriptor(name: &str, category: &str, available: bool) -> CapabilityDescriptor {
        CapabilityDescriptor {
            id: format!("tool:{name}"),
            kind: CapabilityKind::Tool,
            name: name.into(),
            display_name: String::new(),
            description: format!("{name} description"),
            category: category.into(),
            tags: vec![],
            required_secrets: vec![],
            required_tools: vec![],
            available,
            has_side_effects: false,
            full_schema: Some(serde_json::json!({"type": "object"})),
            full_content: None,
            source_ref: SourceRef::InProcess,
        }
    }

    fn match_for(d: CapabilityDescriptor, score: f64) -> CapabilityMatch {
        CapabilityMatch {
            descriptor: d,
            score,
            boosted: false,
        }
    }

    #[test]
    fn tier1_excludes_matches_below_relevance_floor() {
        let cfg = ContextConfig::default();
        let matches = vec![
            match_for(descriptor("a", "search", true), 0.9),
            match_for(descriptor("b", "search", true), 0.1),
        ];
        let (_, included, _) = build_tier1(&matches, &cfg);
        assert_eq!(included.len(), 1);
        assert_eq!(included[0].descriptor.name, "a");
    }

    #[test]
    fn tier1_caps_at_top_k() {
        let cfg = ContextConfig::default();
        let matches: Vec<_> = (0..10)
            .map(|i| match_for(descriptor(&format!("t{i}"), "search", true), 0.9))
            .collect();
        let (_, included, _) = build_tier1(&matches, &cfg);
        assert_eq!(included.len(), cfg.tier1_top_k);
    }

    #[test]
    fn tier2_entry_includes_secrets_and_tags() {
        let mut d = descriptor("search", "web", true);
        d.required_secrets = vec!["SEARCH_API_KEY".to_string()];
        d.tags = vec!["web".to_string(), "research".to_string()];
        let matches = vec![match_for(d, 0.9)];
        let cfg = ContextConfig::default();
        let (_, tier1_subset, _) = build_tier1(&matches, &cfg);
        let (text, _) = build_tier2(&tier1_subset, &cfg);
        assert!(text.contains("Required secrets: SEARCH_API_KEY"));
        assert!(text.contains("Tags: web, research"));
    }

    #[test]
    fn tier2_never_exceeds_tier1_subset_size() {
        let cfg = ContextConfig::default();
        let matches = vec![match_for(descriptor("only", "search", true), 0.9)];
        let (_, tier1_subset, _) = build_tier1(&matches, &cfg);
        let (_, tier2_report) = build_tier2(&tier1_subset, &cfg);
        assert!(tier2_report.included_count <= tier1_subset.len());
    }

    #[test]
    fn tier0_shows_up_to_four_names_then_more_suffix() {
        let descriptors: Vec<_> = (0..6)
            .map(|i| descriptor(&format!("t{i}"), "search", true))
            .collect();
        let (text, _) = build_tier0(&descriptors, 10_000);
        assert!(text.contains("search: t0, t1, t2, t3 (+2 more)"));
    }

    #[test]
    fn tier0_omits_more_suffix_when_all_names_shown() {
        let descriptors: Vec<_> = (0..2)
            .map(|i| descriptor(&format!("t{i}"), "search", true))
            .collect();
        let (text, _) = build_tier0(&descriptors, 10_000);
        assert!(text.contains("search: t0, t1\n"));
        assert!(!text.contains("more"));
    }

    #[test]
    fn tier0_sorts_larger_categories_first() {
        let mut descriptors: Vec<_> = (0..2)
            .map(|i| descriptor(&format!("a{i}"), "files", true))
            .collect();
        descriptors.extend((0..3).map(|i| descriptor(&format!("b{i}"), "search", true)));
        let (text, _) = build_tier0(&descriptors, 10_000);
        let search_pos = text.find("search:").unwrap();
        let files_pos = text.find("files:").unwrap();
        assert!(search_pos < files_pos);
    }

    #[test]
    fn tier1_entry_includes_sequence_number_and_requires() {
        let mut d = descriptor("runner", "ops", false);
        d.required_tools = vec!["shell".to_string()];
        let matches = vec![match_for(d, 0.9)];
        let cfg = ContextConfig::default();
        let (text, _, _) = build_tier1(&matches, &cfg);
        assert!(text.starts_with("1. runner (tool)."));
        assert!(text.contains("Requires: shell."));
        assert!(text.contains("[not available]"));
    }

    #[test]
    fn tier1_entry_includes_params_for_tools() {
        let mut d = descriptor("search", "web", true);
        d.full_schema = Some(serde_json::json!({
            "type": "object",
            "properties": { "query": {"type": "string"} }
        }));
        let matches = vec![match_for(d, 0.9)];
        let cfg = ContextConfig::default();
        let (text, _, _) = build_tier1(&matches, &cfg);
        assert!(text.contains("Params: query."));
        assert!(!text.contains("[not available]"));
    }

    #[test]
    fn token_estimate_rounds_up() {
        assert_eq!(estimate_tokens("abc"), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }

    #[test]
    fn total_token_budget_respects_sum_of_tier_caps() {
        let descriptors: Vec<_> = (0..5)
            .map(|i| descriptor(&format!("d{i}"), "search", true))
            .collect();
        let matches: Vec<_> = descriptors
            .iter()
            .cloned()
            .map(|d| match_for(d, 0.9))
            .collect();
        let cfg = ContextConfig::default();
        let (_, report) = assemble(&descriptors, &matches, &cfg);
        let max_possible = cfg.tier0_max_chars + cfg.tier1_max_chars + cfg.tier2_max_chars;
        assert!(report.total_injected_chars <= max_possible + 256);
    }
}
