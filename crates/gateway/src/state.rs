use std::sync::Arc;

use ao_capability_index::CapabilityIndex;
use ao_discovery::DiscoveryEngine;
use ao_domain::config::Config;
use ao_orchestrator::TurnOrchestrator;
use ao_providers::ProviderRegistry;
use ao_telemetry::OutcomeTracker;

/// Shared application state passed to all API handlers.
///
/// - **Core services** — config, LLM providers
/// - **C1–C8 runtime** — capability index, telemetry, the composed orchestrator
/// - **Security** — the bearer-token digest computed once at startup
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub llm: Arc<ProviderRegistry>,

    pub capability_index: Arc<CapabilityIndex>,
    /// Owns the capability graph; `discover` and `refresh_index` are the
    /// only sanctioned way to read or rebuild it.
    pub discovery: Arc<DiscoveryEngine>,
    pub telemetry: Arc<OutcomeTracker>,
    pub orchestrator: Arc<TurnOrchestrator>,

    /// Flips to `true` once the capability index has completed its first
    /// build; gates `/readyz`.
    pub ready: Arc<std::sync::atomic::AtomicBool>,

    /// SHA-256 hash of the API bearer token (read once at startup).
    /// `None` = dev mode (no auth enforced).
    pub api_token_hash: Option<Vec<u8>>,
}
