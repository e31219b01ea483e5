use std::collections::HashMap;

use ao_domain::capability::{tag_overlap, CapabilityDescriptor, EdgeType, RelatedCapability};
use async_trait::async_trait;
use parking_lot::RwLock;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

const TAG_OVERLAP_WEIGHT: f64 = 0.3;
const MIN_SHARED_TAGS: usize = 2;
const SAME_CATEGORY_WEIGHT: f64 = 0.1;
const MIN_CATEGORY_GROUP: usize = 2;
const MAX_CATEGORY_GROUP: usize = 8;
const COMPOSED_WITH_INCREMENT: f64 = 0.5;
const DEPENDS_ON_WEIGHT: f64 = 1.0;

/// Reads the relationship graph between capabilities. An injected
/// capability handle backed by either an in-memory graph (this crate) or
/// a persistent store.
///
/// `related_sync` is the fast non-async path, correct only for in-memory
/// backends — a persistent backend returns an empty vec here rather than
/// blocking; callers that need a correct answer against a persistent
/// backend must call `related`.
#[async_trait]
pub trait CapabilityGraph: Send + Sync {
    fn related_sync(&self, id: &str) -> Vec<RelatedCapability>;
    async fn related(&self, id: &str) -> Vec<RelatedCapability>;
}

#[derive(Debug, Clone)]
struct EdgeWeight {
    edge_type: EdgeType,
    weight: f64,
}

/// In-memory capability relationship graph backed by `petgraph`.
pub struct InMemoryCapabilityGraph {
    inner: RwLock<GraphInner>,
}

struct GraphInner {
    graph: DiGraph<String, EdgeWeight>,
    index_of: HashMap<String, NodeIndex>,
}

impl InMemoryCapabilityGraph {
    /// Build a fresh graph from the current descriptor set plus an
    /// optional list of preset co-occurrence groups (ids that are known
    /// to be used together), which seed `ComposedWith` edges.
    pub fn build(descriptors: &[CapabilityDescriptor], co_occurrence_sets: &[Vec<String>]) -> Self {
        let mut graph = DiGraph::new();
        let mut index_of = HashMap::new();
        for d in descriptors {
            let idx = graph.add_node(d.id.clone());
            index_of.insert(d.id.clone(), idx);
        }

        let mut inner = GraphInner { graph, index_of };

        // DEPENDS_ON: descriptor -> required tool, directed, weight 1.0.
        let by_name: HashMap<(&str, &str), &str> = descriptors
            .iter()
            .map(|d| ((d.kind.as_str(), d.name.as_str()), d.id.as_str()))
            .collect();
        for d in descriptors {
            for tool_name in &d.required_tools {
                if let Some(&target_id) = by_name.get(&("tool", tool_name.as_str())) {
                    if target_id != d.id {
                        add_edge(&mut inner, &d.id, target_id, EdgeType::DependsOn, DEPENDS_ON_WEIGHT, false);
                    }
                }
            }
        }

        // COMPOSED_WITH: undirected, additive across repeated co-occurrence.
        for group in co_occurrence_sets {
            for i in 0..group.len() {
                for j in (i + 1)..group.len() {
                    add_edge(
                        &mut inner,
                        &group[i],
                        &group[j],
                        EdgeType::ComposedWith,
                        COMPOSED_WITH_INCREMENT,
                        true,
                    );
                }
            }
        }

        // TAGGED_WITH: undirected, weight 0.3 * overlap, only when overlap >= 2.
        for i in 0..descriptors.len() {
            for j in (i + 1)..descriptors.len() {
                let overlap = tag_overlap(&descriptors[i].tags, &descriptors[j].tags);
                if overlap >= MIN_SHARED_TAGS {
                    add_edge(
                        &mut inner,
                        &descriptors[i].id,
                        &descriptors[j].id,
                        EdgeType::TaggedWith,
                        TAG_OVERLAP_WEIGHT * overlap as f64,
                        false,
                    );
                }
            }
        }

        // SAME_CATEGORY: undirected, weight 0.1, only for groups of size 2-8.
        let groups = ao_domain::capability::group_by_category(descriptors);
        for (_, members) in groups {
            if members.len() < MIN_CATEGORY_GROUP || members.len() > MAX_CATEGORY_GROUP {
                continue;
            }
            for i in 0..members.len() {
                for j in (i + 1)..members.len() {
                    add_edge(
                        &mut inner,
                        &members[i].id,
                        &members[j].id,
                        EdgeType::SameCategory,
                        SAME_CATEGORY_WEIGHT,
                        false,
                    );
                }
            }
        }

        Self {
            inner: RwLock::new(inner),
        }
    }
}

/// Add an edge, or accumulate into an existing same-type edge between the
/// same pair when `additive` is set (used by `ComposedWith`, whose weight
/// grows with repeated co-occurrence evidence).
fn add_edge(
    inner: &mut GraphInner,
    source_id: &str,
    target_id: &str,
    edge_type: EdgeType,
    weight: f64,
    additive: bool,
    // undirected means we also add the reverse edge
) {
    add_edge_directed(inner, source_id, target_id, edge_type, weight, additive);
}

fn add_edge_directed(
    inner: &mut GraphInner,
    source_id: &str,
    target_id: &str,
    edge_type: EdgeType,
    weight: f64,
    additive: bool,
) {
    let (Some(&src), Some(&dst)) = (
        inner.index_of.get(source_id),
        inner.index_of.get(target_id),
    ) else {
        return;
    };
    if src == dst {
        return;
    }

    for direction in [(src, dst), (dst, src)] {
        let existing = inner
            .graph
            .edges(direction.0)
            .find(|e| e.target() == direction.1 && e.weight().edge_type == edge_type)
            .map(|e| e.id());

        if let Some(edge_id) = existing {
            if additive {
                if let Some(w) = inner.graph.edge_weight_mut(edge_id) {
                    w.weight += weight;
                }
            }
        } else {
            inner.graph.add_edge(direction.0, direction.1, EdgeWeight { edge_type, weight });
        }

        // DEPENDS_ON is directed: don't add the reverse edge.
        if edge_type == EdgeType::DependsOn {
            break;
        }
    }
}

fn related_from(inner: &GraphInner, id: &str) -> Vec<RelatedCapability> {
    let Some(&idx) = inner.index_of.get(id) else {
        return Vec::new();
    };
    let mut neighbors: Vec<RelatedCapability> = inner
        .graph
        .edges(idx)
        .map(|e| RelatedCapability {
            id: inner.graph[e.target()].clone(),
            weight: e.weight().weight,
            edge_type: e.weight().edge_type,
        })
        .collect();
    neighbors.sort_by(|a, b| b.weight.partial_cmp(&a.weight).unwrap_or(std::cmp::Ordering::Equal));
    neighbors
}

#[async_trait]
impl CapabilityGraph for InMemoryCapabilityGraph {
    fn related_sync(&self, id: &str) -> Vec<RelatedCapability> {
        related_from(&self.inner.read(), id)
    }

    async fn related(&self, id: &str) -> Vec<RelatedCapability> {
        related_from(&self.inner.read(), id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ao_domain::capability::{CapabilityKind, SourceRef};

    fn tool(name: &str, category: &str, tags: Vec<&str>, required_tools: Vec<&str>) -> CapabilityDescriptor {
        CapabilityDescriptor {
            id: format!("tool:{name}"),
            kind: CapabilityKind::Tool,
            name: name.into(),
            display_name: String::new(),
            description: String::new(),
            category: category.into(),
            tags: tags.into_iter().map(String::from).collect(),
            required_secrets: vec![],
            required_tools: required_tools.into_iter().map(String::from).collect(),
            available: true,
            has_side_effects: false,
            full_schema: None,
            full_content: None,
            source_ref: SourceRef::InProcess,
        }
    }

    #[test]
    fn depends_on_edge_has_weight_one() {
        let a = tool("summarize", "text", vec![], vec!["web-search"]);
        let b = tool("web-search", "search", vec![], vec![]);
        let graph = InMemoryCapabilityGraph::build(&[a, b], &[]);
        let related = graph.related_sync("tool:summarize");
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].id, "tool:web-search");
        assert_eq!(related[0].edge_type, EdgeType::DependsOn);
        assert_eq!(related[0].weight, 1.0);
    }

    #[test]
    fn depends_on_is_directed() {
        let a = tool("summarize", "text", vec![], vec!["web-search"]);
        let b = tool("web-search", "search", vec![], vec![]);
        let graph = InMemoryCapabilityGraph::build(&[a, b], &[]);
        assert!(graph.related_sync("tool:web-search").is_empty());
    }

    #[test]
    fn tagged_with_requires_at_least_two_shared_tags() {
        let a = tool("a", "x", vec!["web", "search"], vec![]);
        let b = tool("b", "y", vec!["web", "search"], vec![]);
        let c = tool("c", "z", vec!["web"], vec![]);
        let graph = InMemoryCapabilityGraph::build(&[a, b, c], &[]);
        let related_a = graph.related_sync("tool:a");
        assert!(related_a.iter().any(|r| r.id == "tool:b"));
        assert!(!related_a.iter().any(|r| r.id == "tool:c"));
        let edge = related_a.iter().find(|r| r.id == "tool:b").unwrap();
        assert!((edge.weight - 0.6).abs() < 1e-9);
    }

    #[test]
    fn same_category_edge_requires_group_size_in_range() {
        let members: Vec<CapabilityDescriptor> = (0..9)
            .map(|i| tool(&format!("t{i}"), "crowded", vec![], vec![]))
            .collect();
        let graph = InMemoryCapabilityGraph::build(&members, &[]);
        // Group of 9 exceeds MAX_CATEGORY_GROUP, so no SAME_CATEGORY edges.
        assert!(graph.related_sync("tool:t0").is_empty());
    }

    #[test]
    fn same_category_edge_present_for_small_group() {
        let a = tool("a", "rare", vec![], vec![]);
        let b = tool("b", "rare", vec![], vec![]);
        let graph = InMemoryCapabilityGraph::build(&[a, b], &[]);
        let related = graph.related_sync("tool:a");
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].edge_type, EdgeType::SameCategory);
        assert!((related[0].weight - 0.1).abs() < 1e-9);
    }

    #[test]
    fn composed_with_weight_accumulates_across_co_occurrences() {
        let a = tool("a", "x", vec![], vec![]);
        let b = tool("b", "y", vec![], vec![]);
        let co_occurrence = vec![
            vec!["tool:a".to_string(), "tool:b".to_string()],
            vec!["tool:a".to_string(), "tool:b".to_string()],
        ];
        let graph = InMemoryCapabilityGraph::build(&[a, b], &co_occurrence);
        let related = graph.related_sync("tool:a");
        assert_eq!(related.len(), 1);
        assert!((related[0].weight - 1.0).abs() < 1e-9);
    }

    #[test]
    fn related_sorted_by_weight_descending() {
        let a = tool("a", "rare", vec!["x", "y"], vec![]);
        let b = tool("b", "rare", vec!["x", "y"], vec![]);
        let co_occurrence = vec![vec!["tool:a".to_string(), "tool:b".to_string()]];
        let graph = InMemoryCapabilityGraph::build(&[a, b], &co_occurrence);
        let related = graph.related_sync("tool:a");
        // tagged_with (0.6) + same_category (0.1) + composed_with (0.5) as
        // three distinct edges; composed_with should sort first.
        assert_eq!(related[0].edge_type, EdgeType::ComposedWith);
    }
}
