use std::sync::Arc;
use std::time::{Duration, Instant};

use ao_capability_graph::CapabilityGraph;
use ao_capability_index::CapabilityIndex;
use ao_contextpack::report::ContextReport;
use ao_contextpack::tiers;
use ao_domain::capability::{CapabilityFilter, CapabilityMatch};
use ao_domain::config::ContextConfig;
use ao_domain::error::Result;
use parking_lot::RwLock;

/// Options for a single discovery call.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryOptions {
    pub filter: CapabilityFilter,
    /// Whether to expand the seed match set through the capability graph.
    pub use_graph_rerank: bool,
    pub boost_factor: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct DiscoveryTimings {
    pub search_ms: u128,
    pub rerank_ms: u128,
    pub assemble_ms: u128,
    pub total_ms: u128,
}

#[derive(Debug, Clone)]
pub struct DiscoveryResult {
    pub context_text: String,
    pub report: ContextReport,
    pub matches: Vec<CapabilityMatch>,
    /// The subset of `matches` actually injected at Tier 1 (relevance
    /// floor applied, capped at `tier1_top_k`), in relevance order. Tier 2
    /// always draws from this same subset, so this is also `Tier1 ∪ Tier2`
    /// for tool-name extraction purposes.
    pub tier1_matches: Vec<CapabilityMatch>,
    pub tier0_cache_hit: bool,
    pub timings: DiscoveryTimings,
}

struct Tier0Cache {
    index_version: u64,
    text: String,
    report: ao_contextpack::report::TierReport,
}

/// Composes the capability index (C1), capability graph (C2), and context
/// assembler (C3) into a single `discover` call, and exposes index
/// mutation as `refresh_index`.
pub struct DiscoveryEngine {
    index: Arc<CapabilityIndex>,
    /// Swapped out wholesale by `refresh_index`, so readers either see the
    /// old graph or the new one, never a torn rebuild.
    graph: RwLock<Arc<dyn CapabilityGraph>>,
    context_config: ContextConfig,
    tier0_cache: RwLock<Option<Tier0Cache>>,
}

impl DiscoveryEngine {
    pub fn new(
        index: Arc<CapabilityIndex>,
        graph: Arc<dyn CapabilityGraph>,
        context_config: ContextConfig,
    ) -> Self {
        Self {
            index,
            graph: RwLock::new(graph),
            context_config,
            tier0_cache: RwLock::new(None),
        }
    }

    pub fn index(&self) -> &Arc<CapabilityIndex> {
        &self.index
    }

    /// Whether this engine's configuration has graph reranking turned on for
    /// production discovery calls.
    pub fn graph_rerank_enabled(&self) -> bool {
        self.context_config.enable_graph_rerank
    }

    fn current_graph(&self) -> Arc<dyn CapabilityGraph> {
        self.graph.read().clone()
    }

    async fn tier0(&self) -> (String, ao_contextpack::report::TierReport, bool) {
        let version = self.index.version();
        if let Some(cached) = self.tier0_cache.read().as_ref() {
            if cached.index_version == version {
                return (cached.text.clone(), cached.report.clone(), true);
            }
        }

        let descriptors = self.index.all_descriptors();
        let (text, report) = tiers::build_tier0(&descriptors, self.context_config.tier0_max_chars);
        *self.tier0_cache.write() = Some(Tier0Cache {
            index_version: version,
            text: text.clone(),
            report: report.clone(),
        });
        (text, report, false)
    }

    /// Run a query end to end: vector search, optional graph rerank, and
    /// tiered context assembly.
    pub async fn discover(&self, query: &str, options: &DiscoveryOptions) -> Result<DiscoveryResult> {
        let start = Instant::now();
        let top_k = 2 * self.context_config.tier1_top_k;

        let search_start = Instant::now();
        let mut matches = self.index.search(query, top_k, &options.filter).await?;
        let search_ms = search_start.elapsed().as_millis();

        let mut rerank_ms = 0u128;
        if options.use_graph_rerank {
            let rerank_start = Instant::now();
            let boost_factor = options
                .boost_factor
                .unwrap_or(self.context_config.graph_boost_factor);
            let index = self.index.clone();
            let graph = self.current_graph();
            matches = ao_capability_graph::rerank(graph.as_ref(), matches, boost_factor, |id| {
                index.get(id)
            })
            .await;
            rerank_ms = rerank_start.elapsed().as_millis();
        }

        let assemble_start = Instant::now();
        let (tier0_text, tier0_report, tier0_cache_hit) = self.tier0().await;
        let (tier1_text, tier1_subset, tier1_report) = tiers::build_tier1(&matches, &self.context_config);
        let tier1_matches: Vec<CapabilityMatch> = tier1_subset.iter().map(|m| (*m).clone()).collect();
        let (tier2_text, tier2_report) = tiers::build_tier2(&tier1_subset, &self.context_config);

        let mut context_text = String::new();
        context_text.push_str(&tier0_text);
        context_text.push_str(&tier1_text);
        context_text.push_str(&tier2_text);

        let total_injected_chars = context_text.len();
        let total_estimated_tokens =
            tier0_report.estimated_tokens + tier1_report.estimated_tokens + tier2_report.estimated_tokens;

        let report = ContextReport {
            tier0: tier0_report,
            tier1: tier1_report,
            tier2: tier2_report,
            total_injected_chars,
            total_estimated_tokens,
        };
        let assemble_ms = assemble_start.elapsed().as_millis();

        Ok(DiscoveryResult {
            context_text,
            report,
            matches,
            tier1_matches,
            tier0_cache_hit,
            timings: DiscoveryTimings {
                search_ms,
                rerank_ms,
                assemble_ms,
                total_ms: start.elapsed().as_millis(),
            },
        })
    }

    /// Mutate the index (full rebuild when `replace` is true, else a
    /// partial upsert), then rebuild the capability graph from the full
    /// current descriptor set and publish it by swap. Tier 0 is also
    /// invalidated eagerly rather than waiting on its version check, since
    /// a rebuild always means new content even if the version counter
    /// hasn't been read yet.
    pub async fn refresh_index(
        &self,
        descriptors: Vec<ao_domain::capability::CapabilityDescriptor>,
        availability: &ao_capability_index::AvailabilityContext,
        replace: bool,
    ) -> Result<ao_capability_index::IndexMutationReport> {
        let report = if replace {
            self.index.build(descriptors, availability).await?
        } else {
            self.index.upsert(descriptors, availability).await?
        };

        let all_descriptors = self.index.all_descriptors();
        let rebuilt = ao_capability_graph::InMemoryCapabilityGraph::build(&all_descriptors, &[]);
        *self.graph.write() = Arc::new(rebuilt);
        *self.tier0_cache.write() = None;

        Ok(report)
    }
}

/// Default backoff helper for retrying discovery on transient failure,
/// grounded in the turn planner's `1 + max_retries` attempt budget.
pub async fn sleep_backoff(millis: u64) {
    tokio::time::sleep(Duration::from_millis(millis)).await;
}
