/// Description length at which Tier 1 lines truncate with `"..."`.
const TIER1_DESCRIPTION_TRUNCATE_CHARS: usize = 160;

/// Format the Tier 0 category summary section.
pub fn format_tier0(summary: &str) -> String {
    format!(
        "\
=== CAPABILITY_OVERVIEW ===
{summary}
=== END_CAPABILITY_OVERVIEW ===
"
    )
}

fn truncate_description(description: &str) -> String {
    if description.len() <= TIER1_DESCRIPTION_TRUNCATE_CHARS {
        return description.to_string();
    }
    let mut truncated = description[..TIER1_DESCRIPTION_TRUNCATE_CHARS].to_string();
    truncated.push_str("...");
    truncated
}

/// Format a single Tier 1 entry: `"{n}. name (kind). <desc>. Params: a, b.
/// Requires: x. [not available]"`. The Params/Requires segments are omitted
/// when empty; `[not available]` is appended only for unavailable
/// descriptors.
pub fn format_tier1_entry(
    n: usize,
    name: &str,
    kind: &str,
    description: &str,
    params: &[String],
    requires: &[String],
    available: bool,
) -> String {
    let desc = truncate_description(description);
    let mut line = format!("{n}. {name} ({kind}). {desc}.");
    if !params.is_empty() {
        line.push_str(&format!(" Params: {}.", params.join(", ")));
    }
    if !requires.is_empty() {
        line.push_str(&format!(" Requires: {}.", requires.join(", ")));
    }
    if !available {
        line.push_str(" [not available]");
    }
    line.push('\n');
    line
}

/// Format a single Tier 2 entry: display name, description, the full
/// schema/content payload, required secrets, and tags.
pub fn format_tier2_entry(
    name: &str,
    description: &str,
    payload: &str,
    required_secrets: &[String],
    tags: &[String],
) -> String {
    let mut body = format!("{name}\n{description}\n{payload}\n");
    if !required_secrets.is_empty() {
        body.push_str(&format!("Required secrets: {}\n", required_secrets.join(", ")));
    }
    if !tags.is_empty() {
        body.push_str(&format!("Tags: {}\n", tags.join(", ")));
    }
    format!(
        "\
=== CAPABILITY_DETAIL: {name} ===
{body}=== END_CAPABILITY_DETAIL ===
"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier1_entry_omits_params_and_requires_when_empty() {
        let line = format_tier1_entry(1, "web-search", "tool", "finds things", &[], &[], true);
        assert_eq!(line, "1. web-search (tool). finds things.\n");
    }

    #[test]
    fn tier1_entry_truncates_long_descriptions() {
        let long = "x".repeat(200);
        let line = format_tier1_entry(1, "x", "tool", &long, &[], &[], true);
        assert!(line.contains("..."));
        assert!(line.len() < long.len());
    }

    #[test]
    fn tier2_entry_omits_empty_secrets_and_tags() {
        let body = format_tier2_entry("x", "desc", "{}", &[], &[]);
        assert!(!body.contains("Required secrets"));
        assert!(!body.contains("Tags"));
    }
}
