pub mod overrides;

use std::collections::HashMap;

use ao_discovery::{DiscoveryEngine, DiscoveryOptions};
use ao_domain::capability::{CapabilityFilter, CapabilityKind};
use ao_domain::config::PlannerConfig;
use ao_domain::error::{Error, Result};
use ao_domain::turn::{CapabilityPlan, PlanDiagnostics, ToolSelectionMode, TurnPlan, TurnPolicy};

pub use overrides::{apply_capability_overrides, apply_overrides, CapabilityOverrides};

/// Resolves a `TurnPlan` for a single turn: seed defaults, request
/// overrides, capability discovery with retry, and fallback handling.
pub struct TurnPlanner {
    discovery: std::sync::Arc<DiscoveryEngine>,
    config: PlannerConfig,
}

impl TurnPlanner {
    pub fn new(discovery: std::sync::Arc<DiscoveryEngine>, config: PlannerConfig) -> Self {
        Self { discovery, config }
    }

    fn seed_policy(&self) -> TurnPolicy {
        TurnPolicy {
            tool_selection_mode: if self.config.default_discovered {
                ToolSelectionMode::Discovered
            } else {
                ToolSelectionMode::All
            },
            tool_failure_mode: if self.config.default_fail_open {
                ao_domain::turn::ToolFailureMode::FailOpen
            } else {
                ao_domain::turn::ToolFailureMode::FailClosed
            },
            requested_fail_closed_explicitly: false,
        }
    }

    /// Resolve a turn plan for `query`, applying `raw_overrides` on top of
    /// the configured seed defaults.
    pub async fn plan(&self, query: &str, raw_overrides: &HashMap<String, String>) -> Result<TurnPlan> {
        let policy = overrides::apply_overrides(self.seed_policy(), raw_overrides);
        let cap_overrides = overrides::apply_capability_overrides(raw_overrides);

        if policy.tool_selection_mode == ToolSelectionMode::All {
            return Ok(TurnPlan {
                policy,
                capability_plan: CapabilityPlan {
                    enabled: cap_overrides.enabled,
                    kind_filter: cap_overrides.kind_filter,
                    category_filter: cap_overrides.category_filter,
                    tool_names: Vec::new(),
                    prompt_context: None,
                    diagnostics: PlanDiagnostics {
                        discovery_succeeded: true,
                        ..Default::default()
                    },
                },
            });
        }

        if !cap_overrides.enabled {
            let mut diagnostics = PlanDiagnostics::default();
            diagnostics.discovery_succeeded = true;
            diagnostics.fallback_to_all = true;
            diagnostics.fallback_reason = Some("capability discovery disabled by request".to_string());
            return Ok(TurnPlan {
                policy: TurnPolicy {
                    tool_selection_mode: ToolSelectionMode::All,
                    ..policy
                },
                capability_plan: CapabilityPlan {
                    enabled: false,
                    kind_filter: cap_overrides.kind_filter,
                    category_filter: cap_overrides.category_filter,
                    tool_names: Vec::new(),
                    prompt_context: None,
                    diagnostics,
                },
            });
        }

        let mut diagnostics = PlanDiagnostics::default();
        let max_attempts = 1 + self.config.max_retries;
        let mut last_err: Option<Error> = None;

        let discovery_options = DiscoveryOptions {
            filter: CapabilityFilter {
                kind: cap_overrides.kind_filter,
                category: cap_overrides.category_filter.clone(),
                only_available: true,
            },
            use_graph_rerank: self.discovery.graph_rerank_enabled(),
            boost_factor: None,
        };

        for attempt in 0..max_attempts {
            diagnostics.discovery_attempts = attempt + 1;
            match self.discovery.discover(query, &discovery_options).await {
                Ok(result) => {
                    diagnostics.discovery_succeeded = true;
                    let tool_names: Vec<String> = result
                        .tier1_matches
                        .iter()
                        .filter(|m| m.descriptor.kind == CapabilityKind::Tool)
                        .map(|m| m.descriptor.name.clone())
                        .collect();

                    if tool_names.is_empty() {
                        diagnostics.fallback_to_all = true;
                        diagnostics.fallback_reason = Some("zero tools discovered".to_string());
                        return Ok(TurnPlan {
                            policy: TurnPolicy {
                                tool_selection_mode: ToolSelectionMode::All,
                                ..policy
                            },
                            capability_plan: CapabilityPlan {
                                enabled: true,
                                kind_filter: cap_overrides.kind_filter,
                                category_filter: cap_overrides.category_filter,
                                tool_names: Vec::new(),
                                prompt_context: Some(result.context_text),
                                diagnostics,
                            },
                        });
                    }

                    return Ok(TurnPlan {
                        policy,
                        capability_plan: CapabilityPlan {
                            enabled: true,
                            kind_filter: cap_overrides.kind_filter,
                            category_filter: cap_overrides.category_filter,
                            tool_names,
                            prompt_context: Some(result.context_text),
                            diagnostics,
                        },
                    });
                }
                Err(err) => {
                    last_err = Some(err);
                    if attempt + 1 < max_attempts {
                        ao_discovery::sleep_backoff(self.config.retry_backoff_ms).await;
                    }
                }
            }
        }

        diagnostics.discovery_succeeded = false;
        match policy.tool_failure_mode {
            ao_domain::turn::ToolFailureMode::FailClosed => Err(Error::DiscoveryFailed(
                last_err.map(|e| e.to_string()).unwrap_or_else(|| "discovery exhausted retries".into()),
            )),
            ao_domain::turn::ToolFailureMode::FailOpen => {
                diagnostics.fallback_to_all = true;
                diagnostics.fallback_reason = Some(format!(
                    "discovery failed after {max_attempts} attempts"
                ));
                Ok(TurnPlan {
                    policy: TurnPolicy {
                        tool_selection_mode: ToolSelectionMode::All,
                        ..policy
                    },
                    capability_plan: CapabilityPlan {
                        enabled: true,
                        kind_filter: cap_overrides.kind_filter,
                        category_filter: cap_overrides.category_filter,
                        tool_names: Vec::new(),
                        prompt_context: None,
                        diagnostics,
                    },
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ao_capability_graph::InMemoryCapabilityGraph;
    use ao_capability_index::{CapabilityIndex, InMemoryVectorStore};
    use ao_domain::capability::{CapabilityDescriptor, SourceRef};
    use ao_domain::config::ContextConfig;
    use ao_domain::turn::ToolFailureMode;
    use async_trait::async_trait;
    use std::collections::HashMap as Map;
    use std::sync::Mutex;

    struct FixedEmbedder {
        vectors: Mutex<Map<String, Vec<f32>>>,
    }

    #[async_trait]
    impl ao_capability_index::EmbeddingProvider for FixedEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let vectors = self.vectors.lock().unwrap();
            Ok(texts
                .iter()
                .map(|t| vectors.get(t).cloned().unwrap_or_else(|| vec![0.0, 0.0]))
                .collect())
        }

        async fn health_check(&self) -> Result<()> {
            Ok(())
        }
    }

    fn tool(name: &str) -> CapabilityDescriptor {
        CapabilityDescriptor {
            id: format!("tool:{name}"),
            kind: CapabilityKind::Tool,
            name: name.into(),
            display_name: String::new(),
            description: format!("{name} does a thing"),
            category: "search".into(),
            tags: vec![],
            required_secrets: vec![],
            required_tools: vec![],
            available: true,
            has_side_effects: false,
            full_schema: None,
            full_content: None,
            source_ref: SourceRef::InProcess,
        }
    }

    async fn planner_with(descriptors: Vec<CapabilityDescriptor>, vectors: Map<String, Vec<f32>>) -> TurnPlanner {
        let embedder = std::sync::Arc::new(FixedEmbedder { vectors: Mutex::new(vectors) });
        let store = std::sync::Arc::new(InMemoryVectorStore::new());
        let index = std::sync::Arc::new(CapabilityIndex::new(embedder, store));
        index
            .build(descriptors.clone(), &ao_capability_index::AvailabilityContext::default())
            .await
            .unwrap();
        let graph = std::sync::Arc::new(InMemoryCapabilityGraph::build(&descriptors, &[]));
        let discovery = std::sync::Arc::new(DiscoveryEngine::new(index, graph, ContextConfig::default()));
        TurnPlanner::new(discovery, PlannerConfig::default())
    }

    #[tokio::test]
    async fn discovered_mode_extracts_tool_names() {
        let d = tool("web-search");
        let mut vectors = Map::new();
        vectors.insert(d.embedding_text(), vec![1.0, 0.0]);
        vectors.insert("find stuff".to_string(), vec![0.95, 0.05]);
        let planner = planner_with(vec![d], vectors).await;

        let plan = planner.plan("find stuff", &HashMap::new()).await.unwrap();
        assert_eq!(plan.capability_plan.tool_names, vec!["web-search".to_string()]);
        assert!(plan.capability_plan.diagnostics.discovery_succeeded);
    }

    #[tokio::test]
    async fn zero_discovered_tools_falls_back_to_all() {
        let planner = planner_with(vec![], Map::new()).await;
        let plan = planner.plan("anything", &HashMap::new()).await.unwrap();
        assert_eq!(plan.policy.tool_selection_mode, ToolSelectionMode::All);
        assert!(plan.capability_plan.diagnostics.fallback_to_all);
    }

    #[tokio::test]
    async fn explicit_all_mode_skips_discovery_entirely() {
        let planner = planner_with(vec![], Map::new()).await;
        let mut raw = HashMap::new();
        raw.insert("tool_selection_mode".to_string(), "all".to_string());
        let plan = planner.plan("anything", &raw).await.unwrap();
        assert_eq!(plan.capability_plan.diagnostics.discovery_attempts, 0);
    }

    #[tokio::test]
    async fn disabled_discovery_falls_back_to_all_without_attempting() {
        let d = tool("web-search");
        let mut vectors = Map::new();
        vectors.insert(d.embedding_text(), vec![1.0, 0.0]);
        vectors.insert("find stuff".to_string(), vec![0.95, 0.05]);
        let planner = planner_with(vec![d], vectors).await;

        let mut raw = HashMap::new();
        raw.insert("enable_capability_discovery".to_string(), "false".to_string());
        let plan = planner.plan("find stuff", &raw).await.unwrap();
        assert_eq!(plan.policy.tool_selection_mode, ToolSelectionMode::All);
        assert!(!plan.capability_plan.enabled);
        assert_eq!(plan.capability_plan.diagnostics.discovery_attempts, 0);
        assert!(plan.capability_plan.prompt_context.is_none());
    }

    #[tokio::test]
    async fn discovered_mode_populates_prompt_context_and_filters() {
        let d = tool("web-search");
        let mut vectors = Map::new();
        vectors.insert(d.embedding_text(), vec![1.0, 0.0]);
        vectors.insert("find stuff".to_string(), vec![0.95, 0.05]);
        let planner = planner_with(vec![d], vectors).await;

        let mut raw = HashMap::new();
        raw.insert("capability_discovery_kind".to_string(), "tool".to_string());
        let plan = planner.plan("find stuff", &raw).await.unwrap();
        assert_eq!(plan.capability_plan.kind_filter, Some(CapabilityKind::Tool));
        assert!(plan.capability_plan.prompt_context.is_some());
    }

    #[tokio::test]
    async fn fail_closed_raises_error_on_persistent_discovery_failure() {
        struct FailingEmbedder;
        #[async_trait]
        impl ao_capability_index::EmbeddingProvider for FailingEmbedder {
            async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
                Err(Error::Provider {
                    provider: "fixed".into(),
                    message: "down".into(),
                })
            }
            async fn health_check(&self) -> Result<()> {
                Ok(())
            }
        }

        let index = std::sync::Arc::new(CapabilityIndex::new(
            std::sync::Arc::new(FailingEmbedder),
            std::sync::Arc::new(InMemoryVectorStore::new()),
        ));
        let graph = std::sync::Arc::new(InMemoryCapabilityGraph::build(&[], &[]));
        let discovery = std::sync::Arc::new(DiscoveryEngine::new(index, graph, ContextConfig::default()));
        let planner = TurnPlanner::new(discovery, PlannerConfig { max_retries: 1, retry_backoff_ms: 1, ..Default::default() });

        let mut raw = HashMap::new();
        raw.insert("fail_closed".to_string(), "true".to_string());
        let result = planner.plan("anything", &raw).await;
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().kind(), ao_domain::error::ErrorKind::DiscoveryFailed);
    }

    #[tokio::test]
    async fn fail_open_falls_back_on_persistent_discovery_failure() {
        struct FailingEmbedder;
        #[async_trait]
        impl ao_capability_index::EmbeddingProvider for FailingEmbedder {
            async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
                Err(Error::Provider {
                    provider: "fixed".into(),
                    message: "down".into(),
                })
            }
            async fn health_check(&self) -> Result<()> {
                Ok(())
            }
        }

        let index = std::sync::Arc::new(CapabilityIndex::new(
            std::sync::Arc::new(FailingEmbedder),
            std::sync::Arc::new(InMemoryVectorStore::new()),
        ));
        let graph = std::sync::Arc::new(InMemoryCapabilityGraph::build(&[], &[]));
        let discovery = std::sync::Arc::new(DiscoveryEngine::new(index, graph, ContextConfig::default()));
        let planner = TurnPlanner::new(discovery, PlannerConfig { max_retries: 1, retry_backoff_ms: 1, ..Default::default() });

        let plan = planner.plan("anything", &HashMap::new()).await.unwrap();
        assert_eq!(plan.policy.tool_selection_mode, ToolSelectionMode::All);
        assert!(plan.capability_plan.diagnostics.fallback_to_all);
        assert_eq!(plan.capability_plan.diagnostics.discovery_attempts, 2);
    }
}
