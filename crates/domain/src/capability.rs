use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Discriminant for the heterogeneous capability sources the index ingests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityKind {
    Tool,
    Skill,
    Extension,
    Channel,
    Voice,
    Productivity,
}

impl CapabilityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityKind::Tool => "tool",
            CapabilityKind::Skill => "skill",
            CapabilityKind::Extension => "extension",
            CapabilityKind::Channel => "channel",
            CapabilityKind::Voice => "voice",
            CapabilityKind::Productivity => "productivity",
        }
    }

    /// Parses a `capabilityDiscoveryKind` override value. `"any"` (and any
    /// other unrecognized value) yields `None`, meaning "no kind filter".
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "tool" => Some(CapabilityKind::Tool),
            "skill" => Some(CapabilityKind::Skill),
            "extension" => Some(CapabilityKind::Extension),
            "channel" => Some(CapabilityKind::Channel),
            "voice" => Some(CapabilityKind::Voice),
            "productivity" => Some(CapabilityKind::Productivity),
            _ => None,
        }
    }
}

/// Back-pointer to where a descriptor was sourced from, for lazy reload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SourceRef {
    /// Registered in-process (tool registries, built-in extensions).
    InProcess,
    /// Loaded from a `CAPABILITY.yaml`/`CAPABILITY.yml` manifest on disk.
    Manifest { path: String },
}

/// Unified shape for tools, skills, extensions, channels, and file-based
/// manifest entries. The index treats all kinds uniformly; only the
/// context assembler renders kind-specific Tier-2 text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    /// Globally unique, conventionally `"{kind}:{name}"`.
    pub id: String,
    pub kind: CapabilityKind,
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub required_secrets: Vec<String>,
    #[serde(default)]
    pub required_tools: Vec<String>,
    /// Derived at index time from secret/tool presence. Never persisted
    /// independently of that derivation.
    pub available: bool,
    #[serde(default)]
    pub has_side_effects: bool,
    /// Tier-2 payload. Only set for `kind == Tool`. Never embedded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_schema: Option<serde_json::Value>,
    /// Tier-2 payload. Only set for `kind == Skill`. Never embedded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_content: Option<String>,
    pub source_ref: SourceRef,
}

impl CapabilityDescriptor {
    /// `kind:name` composite key — must be unique alongside `id`.
    pub fn kind_name_key(&self) -> String {
        format!("{}:{}", self.kind.as_str(), self.name)
    }

    /// Embedding text, built per the ordering contract: name, description,
    /// category, tags, tool parameters, required tools. Newline-joined.
    /// Never includes `full_schema`/`full_content` verbatim.
    pub fn embedding_text(&self) -> String {
        let mut lines = Vec::new();

        let name = if self.display_name.is_empty() {
            &self.name
        } else {
            &self.display_name
        };
        lines.push(name.to_string());

        if !self.description.is_empty() {
            lines.push(self.description.clone());
        }

        if !self.category.is_empty() {
            lines.push(format!("Category: {}", self.category));
        }

        if !self.tags.is_empty() {
            lines.push(format!("Use cases: {}", self.tags.join(", ")));
        }

        if self.kind == CapabilityKind::Tool {
            if let Some(props) = self
                .full_schema
                .as_ref()
                .and_then(|s| s.get("properties"))
                .and_then(|p| p.as_object())
            {
                let names: Vec<&str> = props.keys().map(|s| s.as_str()).collect();
                if !names.is_empty() {
                    lines.push(format!("Parameters: {}", names.join(", ")));
                }
            }
        }

        if !self.required_tools.is_empty() {
            lines.push(format!("Requires: {}", self.required_tools.join(", ")));
        }

        lines.join("\n")
    }
}

/// A capability embedded into the vector store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityEmbeddingRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub text_content: String,
    pub metadata: CapabilityMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityMetadata {
    pub kind: CapabilityKind,
    pub category: String,
    pub available: bool,
    pub tags: Vec<String>,
}

/// Relationship type between two capabilities. Undirected except `DependsOn`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    DependsOn,
    ComposedWith,
    TaggedWith,
    SameCategory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityEdge {
    pub source_id: String,
    pub target_id: String,
    pub edge_type: EdgeType,
    pub weight: f64,
}

/// A match returned by `CapabilityIndex::search` or the discovery engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityMatch {
    pub descriptor: CapabilityDescriptor,
    pub score: f64,
    /// Set when a neighbor was inserted by graph reranking rather than
    /// returned directly by vector search.
    #[serde(default)]
    pub boosted: bool,
}

/// Post-search metadata filter.
#[derive(Debug, Clone, Default)]
pub struct CapabilityFilter {
    pub kind: Option<CapabilityKind>,
    pub category: Option<String>,
    pub only_available: bool,
}

/// Neighbor relationship returned by `CapabilityGraph::related`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelatedCapability {
    pub id: String,
    pub weight: f64,
    pub edge_type: EdgeType,
}

/// Tag overlap count for two descriptors, used by `TaggedWith` construction.
pub fn tag_overlap(a: &[String], b: &[String]) -> usize {
    let set: std::collections::HashSet<&String> = a.iter().collect();
    b.iter().filter(|t| set.contains(t)).count()
}

/// Group descriptors by category, sorted by member count descending
/// (ties broken by first-seen order). Used by Tier 0 rendering; `SameCategory`
/// edge construction cares only about group membership, not this ordering.
pub fn group_by_category(
    descriptors: &[CapabilityDescriptor],
) -> Vec<(String, Vec<&CapabilityDescriptor>)> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<&CapabilityDescriptor>> = HashMap::new();
    for d in descriptors {
        groups.entry(d.category.clone()).or_insert_with(|| {
            order.push(d.category.clone());
            Vec::new()
        });
        groups.get_mut(&d.category).unwrap().push(d);
    }
    let mut grouped: Vec<(String, Vec<&CapabilityDescriptor>)> = order
        .into_iter()
        .map(|c| {
            let members = groups.remove(&c).unwrap_or_default();
            (c, members)
        })
        .collect();
    grouped.sort_by(|a, b| b.1.len().cmp(&a.1.len()));
    grouped
}
