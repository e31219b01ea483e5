use serde::Serialize;

/// Structured trace events emitted across all AgentOS crates. Each variant
/// is logged as a single `tracing` event carrying its fields as JSON, so
/// any configured subscriber (fmt, json, otlp) can pick them up uniformly.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    IndexBuilt {
        version: u64,
        descriptor_count: usize,
        embedded_count: usize,
        embedding_failures: usize,
        duration_ms: u64,
    },
    IndexUpserted {
        version: u64,
        upserted_count: usize,
        duration_ms: u64,
    },
    CapabilitySearch {
        query_chars: usize,
        top_k: usize,
        result_count: usize,
        duration_ms: u64,
    },
    GraphRerank {
        seed_count: usize,
        boosted_count: usize,
        inserted_count: usize,
    },
    ContextAssembled {
        tier0_chars: usize,
        tier1_chars: usize,
        tier1_count: usize,
        tier2_chars: usize,
        tier2_count: usize,
        total_chars: usize,
    },
    DiscoveryCompleted {
        query_chars: usize,
        duration_ms: u64,
        used_cache_tier0: bool,
    },
    DiscoveryRetried {
        attempt: u32,
        backoff_ms: u64,
        reason: String,
    },
    PlanResolved {
        tool_selection_mode: String,
        fail_mode: String,
        selected_tool_count: usize,
        discovery_attempts: u32,
        fallback_to_all: bool,
    },
    LlmRequest {
        provider: String,
        model: String,
        streaming: bool,
        duration_ms: u64,
        prompt_tokens: Option<u32>,
        completion_tokens: Option<u32>,
    },
    ToolExecuted {
        tool_name: String,
        call_id: String,
        success: bool,
        duration_ms: u64,
    },
    TurnOutcomeRecorded {
        scope_key: String,
        status: String,
        sample_count: usize,
        weighted_success_rate: f64,
    },
    TurnOutcomeAlertFired {
        scope_key: String,
        weighted_success_rate: f64,
        threshold: f64,
    },
    AdaptiveActionApplied {
        scope_key: String,
        reason: String,
    },
    MemoryRecalled {
        scopes_count: usize,
        recalled_count: usize,
        injected_chars: usize,
        duration_ms: u64,
    },
    TurnStateTransition {
        conversation_id: String,
        from: String,
        to: String,
    },
    TurnCanceled {
        conversation_id: String,
        reason: String,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "ao_event");
    }
}
