//! `POST /v1/turns` — the core runtime entry point.
//!
//! Accepts the inbound turn shape, builds a [`TurnContext`] + [`Message`]
//! list, and drives it through the composed [`TurnOrchestrator`]. Streams
//! the outbound `StreamChunk` union as SSE by default; `stream=false`
//! buffers server-side and returns the final response plus trailing
//! metadata as one JSON object — the same buffered/streaming duality the
//! teacher's chat endpoint offers.

use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json};
use futures_util::stream::Stream;
use serde::Deserialize;

use ao_domain::stream::StreamChunk;
use ao_domain::tool::{ContentPart, Message, MessageContent, Role};
use ao_domain::turn::TurnContext;
use ao_orchestrator::TurnRequest;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct InboundTurn {
    pub user_id: String,
    #[serde(default)]
    pub organization_id: Option<String>,
    pub session_id: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub selected_persona_id: Option<String>,
    #[serde(default)]
    pub text_input: Option<String>,
    #[serde(default)]
    pub vision_inputs: Vec<VisionInput>,
    /// Opaque provider→key overrides. Accepted for wire compatibility but
    /// not wired into provider adapters: `LlmProvider::generate_stream`
    /// has no per-call credential hook, only the server-configured
    /// `AuthRotator`.
    #[serde(default)]
    pub user_api_keys: HashMap<String, String>,
    #[serde(default)]
    pub options: TurnOptions,
    #[serde(default)]
    pub memory_control: MemoryControl,
}

#[derive(Debug, Deserialize)]
pub struct VisionInput {
    pub url: String,
    #[serde(default)]
    pub media_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TurnOptions {
    #[serde(default)]
    pub custom_flags: HashMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MemoryControl {
    #[serde(default)]
    pub long_term_memory: LongTermMemoryControl,
}

#[derive(Debug, Default, Deserialize)]
pub struct LongTermMemoryControl {
    #[serde(default)]
    pub scopes: LongTermMemoryScopes,
}

#[derive(Debug, Default, Deserialize)]
pub struct LongTermMemoryScopes {
    #[serde(default)]
    pub user: bool,
    #[serde(default)]
    pub persona: bool,
    #[serde(default)]
    pub organization: bool,
}

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    #[serde(default = "default_true")]
    pub stream: bool,
}
fn default_true() -> bool {
    true
}

fn build_request(state: &AppState, body: InboundTurn) -> Result<TurnRequest, String> {
    let organization_id = body
        .organization_id
        .or_else(|| Some(state.config.orchestrator.default_organization_id.clone()));
    let conversation_id = body.conversation_id.unwrap_or_else(|| body.session_id.clone());

    let mut parts = Vec::new();
    if let Some(text) = &body.text_input {
        parts.push(ContentPart::Text { text: text.clone() });
    }
    for vision in &body.vision_inputs {
        parts.push(ContentPart::Image {
            url: vision.url.clone(),
            media_type: vision.media_type.clone(),
        });
    }
    if parts.is_empty() {
        return Err("one of text_input or vision_inputs is required".into());
    }

    let discovery_query = body.text_input.clone().unwrap_or_default();
    let message = Message {
        role: Role::User,
        content: if parts.len() == 1 {
            if let ContentPart::Text { text } = &parts[0] {
                MessageContent::Text(text.clone())
            } else {
                MessageContent::Parts(parts)
            }
        } else {
            MessageContent::Parts(parts)
        },
    };

    let mut memory_scopes = Vec::new();
    let scopes = &body.memory_control.long_term_memory.scopes;
    if scopes.user {
        memory_scopes.push("user".to_string());
    }
    if scopes.persona {
        memory_scopes.push("persona".to_string());
    }
    if scopes.organization {
        memory_scopes.push("organization".to_string());
    }

    let context = TurnContext {
        user_id: body.user_id,
        organization_id,
        session_id: body.session_id,
        conversation_id,
        selected_persona_id: body.selected_persona_id,
        custom_flags: body.options.custom_flags.clone(),
    };

    Ok(TurnRequest {
        context,
        messages: vec![message],
        discovery_query,
        policy_overrides: body.options.custom_flags,
        memory_scopes,
    })
}

pub async fn run_turn(
    State(state): State<AppState>,
    Query(q): Query<StreamQuery>,
    Json(body): Json<InboundTurn>,
) -> impl IntoResponse {
    let request = match build_request(&state, body) {
        Ok(r) => r,
        Err(e) => {
            return (
                axum::http::StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": e })),
            )
                .into_response();
        }
    };

    let rx = state.orchestrator.run_turn(request);

    if q.stream {
        let stream = make_sse_stream(rx);
        Sse::new(stream).keep_alive(KeepAlive::default()).into_response()
    } else {
        buffered_response(rx).await.into_response()
    }
}

fn make_sse_stream(
    mut rx: tokio::sync::mpsc::Receiver<StreamChunk>,
) -> impl Stream<Item = Result<Event, std::convert::Infallible>> {
    async_stream::stream! {
        while let Some(chunk) = rx.recv().await {
            let event_type = match &chunk {
                StreamChunk::TextDelta { .. } => "text_delta",
                StreamChunk::ToolCallStart { .. } => "tool_call_start",
                StreamChunk::ToolCallEnd { .. } => "tool_call_end",
                StreamChunk::FinalResponse { .. } => "final_response",
                StreamChunk::MetadataUpdate { .. } => "metadata_update",
                StreamChunk::Error { .. } => "error",
                StreamChunk::Done => "done",
            };
            let data = serde_json::to_string(&chunk).unwrap_or_default();
            yield Ok(Event::default().event(event_type).data(data));
        }
    }
}

async fn buffered_response(mut rx: tokio::sync::mpsc::Receiver<StreamChunk>) -> impl IntoResponse {
    let mut final_text = String::new();
    let mut metadata = Vec::new();
    let mut error = None;

    while let Some(chunk) = rx.recv().await {
        match chunk {
            StreamChunk::FinalResponse { text } => final_text = text,
            StreamChunk::MetadataUpdate { metadata: m } => metadata.push(m),
            StreamChunk::Error { kind, message } => {
                error = Some(serde_json::json!({ "kind": kind, "message": message }))
            }
            StreamChunk::TextDelta { .. }
            | StreamChunk::ToolCallStart { .. }
            | StreamChunk::ToolCallEnd { .. }
            | StreamChunk::Done => {}
        }
    }

    Json(serde_json::json!({
        "final_response": final_text,
        "metadata": metadata,
        "error": error,
    }))
}
