use serde::{Deserialize, Serialize};
use std::pin::Pin;

use crate::error::ErrorKind;

/// A boxed async stream, used for LLM streaming responses and outbound turns.
pub type BoxStream<'a, T> = Pin<Box<dyn futures_core::Stream<Item = T> + Send + 'a>>;

/// Token usage for a completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Events emitted by an `LlmProvider` while streaming a single generation.
///
/// The terminal `Done` value carries the authoritative final text and usage.
/// Intermediate `Token` chunks are a live preview only — the generator's
/// *return value*, not the concatenation of tokens, is what the orchestrator
/// treats as the final response.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ProviderEvent {
    #[serde(rename = "token")]
    Token { text: String },

    #[serde(rename = "tool_call_started")]
    ToolCallStarted { call_id: String, tool_name: String },

    #[serde(rename = "tool_call_delta")]
    ToolCallDelta { call_id: String, delta: String },

    #[serde(rename = "tool_call_finished")]
    ToolCallFinished {
        call_id: String,
        tool_name: String,
        arguments: serde_json::Value,
    },

    #[serde(rename = "done")]
    Done {
        text: String,
        usage: Option<Usage>,
        finish_reason: Option<String>,
    },

    #[serde(rename = "error")]
    Error { message: String },
}

/// Tenant routing metadata surfaced in a `metadata_update` chunk when a
/// turn falls back to the single-tenant default organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantRoutingMetadata {
    pub organization_id: String,
    pub used_default: bool,
}

/// Planner diagnostics surfaced in a `metadata_update` chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnPlanningMetadata {
    pub tool_selection_mode: String,
    pub discovery_attempted: bool,
    pub discovery_succeeded: bool,
    pub selected_tool_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
}

/// Long-term memory recall profile surfaced in a `metadata_update` chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LongTermMemoryRecallMetadata {
    pub scopes: Vec<String>,
    pub recalled_count: usize,
    pub injected_chars: usize,
}

/// Outcome classification surfaced once a turn completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOutcomeMetadata {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// Rolling KPI snapshot surfaced alongside the outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOutcomeKpiMetadata {
    pub scope_key: String,
    pub sample_count: usize,
    pub weighted_success_rate: f64,
}

/// Emitted at most once per cooldown window when a scope degrades.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOutcomeAlertMetadata {
    pub scope_key: String,
    pub weighted_success_rate: f64,
    pub threshold: f64,
}

/// Namespaced payload carried by a `metadata_update` chunk. Exactly one
/// field is set per chunk; modeled as a struct (not an enum) because a
/// single metadata_update may, in principle, carry more than one key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_routing: Option<TenantRoutingMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn_planning: Option<TurnPlanningMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub long_term_memory_recall: Option<LongTermMemoryRecallMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_outcome: Option<TaskOutcomeMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_outcome_kpi: Option<TaskOutcomeKpiMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_outcome_alert: Option<TaskOutcomeAlertMetadata>,
}

/// The outbound wire type of a turn. A closed union — external consumers
/// must reject unknown variants at the boundary rather than duck-type them.
///
/// Exactly one `final_response` chunk is emitted per turn, and exactly one
/// `done` chunk always terminates the stream, including error paths.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum StreamChunk {
    #[serde(rename = "text_delta")]
    TextDelta { text: String },

    #[serde(rename = "tool_call_start")]
    ToolCallStart { call_id: String, tool_name: String },

    #[serde(rename = "tool_call_end")]
    ToolCallEnd {
        call_id: String,
        tool_name: String,
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// The authoritative final text of the turn. Always equal to the
    /// generator's return value, never a concatenation of `text_delta`s.
    #[serde(rename = "final_response")]
    FinalResponse { text: String },

    #[serde(rename = "metadata_update")]
    MetadataUpdate { metadata: StreamMetadata },

    #[serde(rename = "error")]
    Error { kind: ErrorKind, message: String },

    /// Always the last chunk of a turn, success or failure.
    #[serde(rename = "done")]
    Done,
}

impl StreamChunk {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamChunk::Done)
    }
}
