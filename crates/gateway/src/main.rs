use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use clap::Parser;
use sha2::{Digest, Sha256};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::EnvFilter;

use ao_capability_graph::InMemoryCapabilityGraph;
use ao_capability_index::{CapabilityIndex, InMemoryVectorStore, OllamaEmbeddingProvider};
use ao_discovery::DiscoveryEngine;
use ao_domain::config::{Config, ConfigSeverity};
use ao_orchestrator::TurnOrchestrator;
use ao_planner::TurnPlanner;
use ao_providers::ProviderRegistry;
use ao_telemetry::{FileTelemetryStore, OutcomeTracker, TelemetryStore};
use ao_tools::{ExecToolRuntime, ProcessManager};

use ao_gateway::api;
use ao_gateway::api::capabilities::{compute_availability, scan_all_descriptors};
use ao_gateway::cli::{Cli, Command, ConfigCommand};
use ao_gateway::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None | Some(Command::Serve) => {
            init_tracing();
            let (config, _config_path) = ao_gateway::cli::load_config()?;
            run_server(Arc::new(config)).await
        }
        Some(Command::Doctor) => {
            let (config, config_path) = ao_gateway::cli::load_config()?;
            let passed = ao_gateway::cli::doctor::run(&config, &config_path).await?;
            if !passed {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Validate)) => {
            let (config, config_path) = ao_gateway::cli::load_config()?;
            let valid = ao_gateway::cli::config::validate(&config, &config_path);
            if !valid {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            let (config, _config_path) = ao_gateway::cli::load_config()?;
            ao_gateway::cli::config::show(&config);
            Ok(())
        }
        Some(Command::Version) => {
            println!("agentos-gateway {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Initialize structured JSON tracing (only for the `serve` command).
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,ao_gateway=debug")),
        )
        .json()
        .init();
}

/// Start the gateway server with the given configuration.
async fn run_server(config: Arc<Config>) -> anyhow::Result<()> {
    tracing::info!("AgentOS starting");

    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    // ── LLM providers ────────────────────────────────────────────────
    let llm = Arc::new(ProviderRegistry::from_config(&config.llm)?);
    let executor = llm
        .for_role("executor")
        .or_else(|| {
            llm.list_providers()
                .first()
                .and_then(|id| llm.get(id))
        })
        .ok_or_else(|| anyhow::anyhow!("no LLM provider available to run turns"))?;
    tracing::info!(providers = llm.len(), "LLM providers ready");

    // ── Capability index (C1) ────────────────────────────────────────
    let embedder = Arc::new(OllamaEmbeddingProvider::new(config.embedding.clone()));
    let vector_store = Arc::new(InMemoryVectorStore::new());
    let capability_index = Arc::new(CapabilityIndex::new(embedder, vector_store));

    let ready = Arc::new(AtomicBool::new(false));

    // ── Capability graph (C2) + discovery (C3) ───────────────────────
    // Built empty at startup; the initial index build below rebuilds it
    // from the first descriptor scan via `discovery.refresh_index`.
    let graph = Arc::new(InMemoryCapabilityGraph::build(&[], &[]));
    let discovery = Arc::new(DiscoveryEngine::new(
        capability_index.clone(),
        graph.clone(),
        config.context.clone(),
    ));

    // ── Outcome telemetry (C5) ────────────────────────────────────────
    let telemetry_store = FileTelemetryStore::new("data/telemetry");
    let telemetry = Arc::new(OutcomeTracker::new(config.telemetry.clone()));
    for (scope_key, entries) in telemetry_store.load_windows().await.unwrap_or_default() {
        telemetry.restore(&scope_key, entries);
    }
    tracing::info!("telemetry windows restored");

    // ── Turn planner (C4) ────────────────────────────────────────────
    let planner = Arc::new(TurnPlanner::new(discovery.clone(), config.planner.clone()));

    // ── Tool runtime ─────────────────────────────────────────────────
    let process_manager = Arc::new(ProcessManager::new(config.tools.exec.clone()));
    let tools = Arc::new(ExecToolRuntime::new(process_manager));

    // ── Turn orchestrator (C6–C8) ────────────────────────────────────
    let orchestrator = Arc::new(TurnOrchestrator::new(
        planner,
        telemetry.clone(),
        executor,
        tools,
        None,
        config.orchestrator.clone(),
        config.adaptive.clone(),
    ));

    // ── API token ─────────────────────────────────────────────────────
    let api_token_hash = std::env::var(&config.server.api_token_env)
        .ok()
        .filter(|v| !v.is_empty())
        .map(|token| Sha256::digest(token.as_bytes()).to_vec());
    if api_token_hash.is_none() {
        tracing::warn!(
            env_var = %config.server.api_token_env,
            "no API token configured — all routes are unauthenticated (dev mode)"
        );
    }

    let state = AppState {
        config: config.clone(),
        llm,
        capability_index: capability_index.clone(),
        discovery: discovery.clone(),
        telemetry: telemetry.clone(),
        orchestrator,
        ready: ready.clone(),
        api_token_hash,
    };

    // ── Initial capability index build ───────────────────────────────
    {
        let descriptors = scan_all_descriptors(std::path::Path::new("."));
        let availability = compute_availability(&state);
        match discovery.refresh_index(descriptors, &availability, true).await {
            Ok(report) => {
                ready.store(true, std::sync::atomic::Ordering::Release);
                tracing::info!(
                    upserted = report.upserted_count,
                    failures = report.embedding_failures.len(),
                    "capability index built"
                );
            }
            Err(e) => {
                tracing::error!(error = %e, "initial capability index build failed");
            }
        }
    }

    // ── Background: telemetry flush ──────────────────────────────────
    {
        let telemetry = telemetry.clone();
        let store = FileTelemetryStore::new("data/telemetry");
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(30));
            loop {
                interval.tick().await;
                for scope_key in telemetry.known_scopes() {
                    let entries = telemetry.entries(&scope_key);
                    if let Err(e) = store.save_window(&scope_key, &entries).await {
                        tracing::warn!(error = %e, scope_key, "telemetry flush failed");
                    }
                }
            }
        });
        tracing::info!("telemetry flush task started (30s tick)");
    }

    // ── Background: capability manifest hot-reload ───────────────────
    {
        let discovery = discovery.clone();
        let state_for_reload = state.clone();
        tokio::spawn(async move {
            let mut last_mtime = ao_capability_index::manifest::newest_mtime_roots(
                std::path::Path::new("."),
                ao_gateway::api::capabilities::MANIFEST_PATH_ENV,
            );
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(15));
            loop {
                interval.tick().await;
                let mtime = ao_capability_index::manifest::newest_mtime_roots(
                    std::path::Path::new("."),
                    ao_gateway::api::capabilities::MANIFEST_PATH_ENV,
                );
                if mtime == last_mtime {
                    continue;
                }
                last_mtime = mtime;
                let descriptors = scan_all_descriptors(std::path::Path::new("."));
                let availability = compute_availability(&state_for_reload);
                match discovery.refresh_index(descriptors, &availability, false).await {
                    Ok(report) => tracing::info!(
                        upserted = report.upserted_count,
                        "capability manifests hot-reloaded"
                    ),
                    Err(e) => tracing::warn!(error = %e, "capability hot-reload failed"),
                }
            }
        });
        tracing::info!("capability hot-reload task started (15s poll)");
    }

    // ── CORS layer ────────────────────────────────────────────────────
    let cors_layer = build_cors_layer(&config.server.cors);

    // ── Concurrency limit ─────────────────────────────────────────────
    let max_concurrent = std::env::var("AO_MAX_CONCURRENT_REQUESTS")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(256);
    tracing::info!(max_concurrent, "concurrency limit set");

    // ── Rate-limit layer ──────────────────────────────────────────────
    let governor_layer = config.server.rate_limit.as_ref().map(|rl| {
        use tower_governor::governor::GovernorConfigBuilder;
        use tower_governor::GovernorLayer;

        let gov_config = GovernorConfigBuilder::default()
            .per_second(rl.requests_per_sec as u64)
            .burst_size(rl.burst_size)
            .finish()
            .expect("rate_limit: requests_per_sec and burst_size must be > 0");

        tracing::info!(
            requests_per_sec = rl.requests_per_sec,
            burst_size = rl.burst_size,
            "per-IP rate limiting enabled"
        );

        GovernorLayer {
            config: std::sync::Arc::new(gov_config),
        }
    });
    if governor_layer.is_none() {
        tracing::info!("per-IP rate limiting disabled (no [server.rate_limit] in config)");
    }

    // ── Router ────────────────────────────────────────────────────────
    let router = api::router(state.clone())
        .layer(cors_layer)
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_concurrent));
    let app = if let Some(gov) = governor_layer {
        router.layer(gov).with_state(state)
    } else {
        router.with_state(state)
    };

    // ── Bind ──────────────────────────────────────────────────────────
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;

    tracing::info!(addr = %addr, "AgentOS listening");

    axum::serve(listener, app).await.context("axum server error")?;

    Ok(())
}

/// Build a [`CorsLayer`] from the configured allowed origins.
///
/// Origins may contain a trailing `*` wildcard for the port segment
/// (e.g. `http://localhost:*`). These are expanded into a predicate that
/// matches any port on that host. A literal `"*"` allows all origins.
fn build_cors_layer(cors: &ao_domain::config::CorsConfig) -> CorsLayer {
    use axum::http::header;

    if cors.allowed_origins.len() == 1 && cors.allowed_origins[0] == "*" {
        tracing::warn!("CORS configured with wildcard \"*\" — all origins allowed");
        return CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);
    }

    let mut exact: Vec<HeaderValue> = Vec::new();
    let mut wildcard_prefixes: Vec<String> = Vec::new();

    for origin in &cors.allowed_origins {
        if origin.ends_with(":*") {
            let prefix = origin.trim_end_matches('*').to_owned();
            wildcard_prefixes.push(prefix);
        } else if let Ok(hv) = origin.parse::<HeaderValue>() {
            exact.push(hv);
        } else {
            tracing::warn!(origin = %origin, "invalid CORS origin, skipping");
        }
    }

    let allow_origin = if wildcard_prefixes.is_empty() {
        AllowOrigin::list(exact)
    } else {
        AllowOrigin::predicate(move |origin, _| {
            let origin_str = origin.to_str().unwrap_or("");
            if exact.iter().any(|e| e.as_bytes() == origin.as_bytes()) {
                return true;
            }
            wildcard_prefixes.iter().any(|prefix| {
                origin_str
                    .strip_prefix(prefix.as_str())
                    .map(|port| !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()))
                    .unwrap_or(false)
            })
        })
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}
