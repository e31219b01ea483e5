use std::collections::HashSet;

use ao_domain::capability::{CapabilityDescriptor, CapabilityMatch, EdgeType, RelatedCapability};

use crate::graph::CapabilityGraph;

pub const DEFAULT_BOOST_FACTOR: f64 = 0.15;

/// Expand a seed match set with the capability graph's 1-hop neighbors.
///
/// Neighbors already present in `seed` are boosted in place:
/// `score += boost_factor * edge_weight`, capped at `1.0`, regardless of
/// edge type. Neighbors not in `seed` are only inserted as new matches when
/// reached over a `DEPENDS_ON` or `COMPOSED_WITH` edge — a shared tag or
/// category isn't a strong enough relationship to pull something new into
/// context, so those edge types may only boost, never introduce. Inserted
/// matches get `score = neighbor_seed_score * boost_factor * edge_weight`
/// and `boosted = true`. Requires a `lookup` function to resolve a neighbor
/// id to its descriptor (e.g. `CapabilityIndex::get`) since the graph itself
/// only stores ids and edges.
pub async fn rerank(
    graph: &dyn CapabilityGraph,
    seed: Vec<CapabilityMatch>,
    boost_factor: f64,
    lookup: impl Fn(&str) -> Option<CapabilityDescriptor>,
) -> Vec<CapabilityMatch> {
    let mut by_id: std::collections::HashMap<String, CapabilityMatch> = seed
        .into_iter()
        .map(|m| (m.descriptor.id.clone(), m))
        .collect();
    let seed_ids: Vec<String> = by_id.keys().cloned().collect();
    let seed_scores: std::collections::HashMap<String, f64> =
        by_id.iter().map(|(id, m)| (id.clone(), m.score)).collect();

    let mut inserted: HashSet<String> = HashSet::new();

    for seed_id in &seed_ids {
        let neighbors: Vec<RelatedCapability> = graph.related(seed_id).await;
        let seed_score = seed_scores.get(seed_id).copied().unwrap_or(0.0);

        for n in neighbors {
            if let Some(existing) = by_id.get_mut(&n.id) {
                existing.score = (existing.score + boost_factor * n.weight).min(1.0);
                existing.boosted = true;
                continue;
            }

            if !matches!(n.edge_type, EdgeType::DependsOn | EdgeType::ComposedWith) {
                continue;
            }

            if inserted.contains(&n.id) {
                continue;
            }
            let Some(descriptor) = lookup(&n.id) else {
                continue;
            };

            let score = seed_score * boost_factor * n.weight;
            inserted.insert(n.id.clone());
            by_id.insert(
                n.id.clone(),
                CapabilityMatch {
                    descriptor,
                    score,
                    boosted: true,
                },
            );
        }
    }

    let mut matches: Vec<CapabilityMatch> = by_id.into_values().collect();
    matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::InMemoryCapabilityGraph;
    use ao_domain::capability::{CapabilityKind, SourceRef};

    fn tool(name: &str, category: &str, tags: Vec<&str>) -> CapabilityDescriptor {
        CapabilityDescriptor {
            id: format!("tool:{name}"),
            kind: CapabilityKind::Tool,
            name: name.into(),
            display_name: String::new(),
            description: String::new(),
            category: category.into(),
            tags: tags.into_iter().map(String::from).collect(),
            required_secrets: vec![],
            required_tools: vec![],
            available: true,
            has_side_effects: false,
            full_schema: None,
            full_content: None,
            source_ref: SourceRef::InProcess,
        }
    }

    #[tokio::test]
    async fn boosts_existing_seed_member() {
        let a = tool("a", "x", vec!["web", "search"]);
        let b = tool("b", "y", vec!["web", "search"]);
        let descriptors = vec![a.clone(), b.clone()];
        let graph = InMemoryCapabilityGraph::build(&descriptors, &[]);

        let seed = vec![
            CapabilityMatch { descriptor: a, score: 0.5, boosted: false },
            CapabilityMatch { descriptor: b, score: 0.4, boosted: false },
        ];
        let by_id: std::collections::HashMap<String, CapabilityDescriptor> =
            descriptors.into_iter().map(|d| (d.id.clone(), d)).collect();

        let reranked = rerank(&graph, seed, DEFAULT_BOOST_FACTOR, |id| by_id.get(id).cloned()).await;
        let a_result = reranked.iter().find(|m| m.descriptor.id == "tool:a").unwrap();
        assert!(a_result.boosted);
        assert!((a_result.score - (0.5 + DEFAULT_BOOST_FACTOR * 0.6)).abs() < 1e-9);
    }

    #[tokio::test]
    async fn inserts_neighbor_not_in_seed_over_composed_with_edge() {
        let a = tool("a", "rare", vec![]);
        let b = tool("b", "rare", vec![]);
        let descriptors = vec![a.clone(), b.clone()];
        let co_occurrence = vec![vec!["tool:a".to_string(), "tool:b".to_string()]];
        let graph = InMemoryCapabilityGraph::build(&descriptors, &co_occurrence);

        let seed = vec![CapabilityMatch { descriptor: a, score: 0.8, boosted: false }];
        let by_id: std::collections::HashMap<String, CapabilityDescriptor> =
            descriptors.into_iter().map(|d| (d.id.clone(), d)).collect();

        let reranked = rerank(&graph, seed, DEFAULT_BOOST_FACTOR, |id| by_id.get(id).cloned()).await;
        let b_result = reranked.iter().find(|m| m.descriptor.id == "tool:b").unwrap();
        assert!(b_result.boosted);
        assert!((b_result.score - (0.8 * DEFAULT_BOOST_FACTOR * 0.5)).abs() < 1e-9);
    }

    #[tokio::test]
    async fn same_category_neighbor_is_never_inserted() {
        let a = tool("a", "rare", vec![]);
        let b = tool("b", "rare", vec![]);
        let descriptors = vec![a.clone(), b.clone()];
        let graph = InMemoryCapabilityGraph::build(&descriptors, &[]);

        let seed = vec![CapabilityMatch { descriptor: a, score: 0.8, boosted: false }];
        let by_id: std::collections::HashMap<String, CapabilityDescriptor> =
            descriptors.into_iter().map(|d| (d.id.clone(), d)).collect();

        let reranked = rerank(&graph, seed, DEFAULT_BOOST_FACTOR, |id| by_id.get(id).cloned()).await;
        assert!(reranked.iter().all(|m| m.descriptor.id != "tool:b"));
    }

    #[tokio::test]
    async fn boosted_score_never_exceeds_one() {
        let a = tool("a", "rare", vec!["x", "y"]);
        let b = tool("b", "rare", vec!["x", "y"]);
        let descriptors = vec![a.clone(), b.clone()];
        let co_occurrence = vec![vec!["tool:a".to_string(), "tool:b".to_string()]];
        let graph = InMemoryCapabilityGraph::build(&descriptors, &co_occurrence);

        let seed = vec![
            CapabilityMatch { descriptor: a, score: 0.99, boosted: false },
            CapabilityMatch { descriptor: b, score: 0.99, boosted: false },
        ];
        let by_id: std::collections::HashMap<String, CapabilityDescriptor> =
            descriptors.into_iter().map(|d| (d.id.clone(), d)).collect();

        let reranked = rerank(&graph, seed, DEFAULT_BOOST_FACTOR, |id| by_id.get(id).cloned()).await;
        assert!(reranked.iter().all(|m| m.score <= 1.0));
    }
}
