//! Capability index introspection and refresh.
//!
//! - `GET /v1/capabilities` — operational listing (id, kind, category,
//!   available). Never exposes `full_schema`/`full_content`.
//! - `POST /v1/capabilities/refresh` — rescans manifest roots and the
//!   in-process tool registry, rebuilds the index, returns the new version.

use std::path::Path;
use std::sync::atomic::Ordering;

use axum::extract::State;
use axum::response::{IntoResponse, Json};

use ao_capability_index::{manifest, AvailabilityContext};
use ao_domain::capability::{CapabilityDescriptor, CapabilityKind, SourceRef};

use crate::state::AppState;

/// Env var listing extra manifest scan roots, `:`-separated (matches §6's
/// "path-list environment variable").
pub const MANIFEST_PATH_ENV: &str = "AO_CAPABILITY_PATH";

/// The two tools `ao-tools::ExecToolRuntime` always registers.
pub fn builtin_tool_descriptors() -> Vec<CapabilityDescriptor> {
    vec![
        CapabilityDescriptor {
            id: "tool:exec".into(),
            kind: CapabilityKind::Tool,
            name: "exec".into(),
            display_name: "Shell exec".into(),
            description: "Run a shell command, foreground or background.".into(),
            category: "system".into(),
            tags: vec![],
            required_secrets: vec![],
            required_tools: vec![],
            available: true,
            has_side_effects: true,
            full_schema: None,
            full_content: None,
            source_ref: SourceRef::InProcess,
        },
        CapabilityDescriptor {
            id: "tool:process".into(),
            kind: CapabilityKind::Tool,
            name: "process".into(),
            display_name: "Process management".into(),
            description: "Inspect and control a backgrounded exec session.".into(),
            category: "system".into(),
            tags: vec![],
            required_secrets: vec![],
            required_tools: vec![],
            available: true,
            has_side_effects: true,
            full_schema: None,
            full_content: None,
            source_ref: SourceRef::InProcess,
        },
    ]
}

/// Scan manifest roots plus the built-in tool set. Shared by startup
/// composition and the refresh endpoint so both observe the same sources.
pub fn scan_all_descriptors(workspace_local: &Path) -> Vec<CapabilityDescriptor> {
    let mut found = manifest::scan_roots(workspace_local, MANIFEST_PATH_ENV);
    found.extend(builtin_tool_descriptors());
    found
}

/// Derive the current `AvailabilityContext` from registered LLM providers
/// and the fixed built-in tool set. A manifest descriptor's
/// `required_secrets` names a provider id; it is "available" once that
/// provider has successfully initialized. Shared by startup composition
/// and the refresh endpoint so both agree on what's available.
pub fn compute_availability(state: &AppState) -> AvailabilityContext {
    AvailabilityContext {
        available_secrets: state.llm.list_providers().into_iter().collect(),
        available_tools: ["exec".to_string(), "process".to_string()].into_iter().collect(),
    }
}

pub async fn list_capabilities(State(state): State<AppState>) -> impl IntoResponse {
    let items: Vec<serde_json::Value> = state
        .capability_index
        .all_descriptors()
        .into_iter()
        .map(|d| {
            serde_json::json!({
                "id": d.id,
                "kind": d.kind.as_str(),
                "category": d.category,
                "available": d.available,
            })
        })
        .collect();

    Json(serde_json::json!({
        "version": state.capability_index.version(),
        "count": items.len(),
        "capabilities": items,
    }))
}

pub async fn refresh_capabilities(State(state): State<AppState>) -> impl IntoResponse {
    let workspace_local = std::path::Path::new(".");
    let descriptors = scan_all_descriptors(workspace_local);
    let availability = compute_availability(&state);

    match state.discovery.refresh_index(descriptors, &availability, true).await {
        Ok(report) => {
            state.ready.store(true, Ordering::Release);
            if !report.embedding_failures.is_empty() {
                tracing::warn!(
                    failures = report.embedding_failures.len(),
                    "capability refresh: some descriptors failed to embed"
                );
            }
            Json(serde_json::json!({
                "version": state.capability_index.version(),
                "count": report.upserted_count,
            }))
            .into_response()
        }
        Err(e) => (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}
