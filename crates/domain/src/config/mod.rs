mod adaptive;
mod context;
mod embedding;
mod llm;
mod observability;
mod orchestrator;
mod planner;
mod server;
mod telemetry;
mod tools;

pub use adaptive::*;
pub use context::*;
pub use embedding::*;
pub use llm::*;
pub use observability::*;
pub use orchestrator::*;
pub use planner::*;
pub use server::*;
pub use telemetry::*;
pub use tools::*;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub adaptive: AdaptiveConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub admin: AdminConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Admin
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Environment variable holding the admin bearer token.
    /// If the env var is unset, admin endpoints are **disabled** (403).
    #[serde(default = "d_admin_token_env")]
    pub token_env: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            token_env: d_admin_token_env(),
        }
    }
}

fn d_admin_token_env() -> String {
    "AO_ADMIN_TOKEN".into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.port".into(),
                message: "port must be greater than 0".into(),
            });
        }

        if self.server.host.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.host".into(),
                message: "host must not be empty".into(),
            });
        }

        if self.embedding.endpoint.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "embedding.endpoint".into(),
                message: "endpoint must not be empty".into(),
            });
        } else if !self.embedding.endpoint.starts_with("http://")
            && !self.embedding.endpoint.starts_with("https://")
        {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "embedding.endpoint".into(),
                message: format!(
                    "endpoint must start with http:// or https:// (got \"{}\")",
                    self.embedding.endpoint
                ),
            });
        }

        // Warn when no LLM providers are configured.
        if self.llm.providers.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "llm.providers".into(),
                message: "no LLM providers configured".into(),
            });
        }

        let mut seen_ids: HashSet<&str> = HashSet::new();
        for (i, provider) in self.llm.providers.iter().enumerate() {
            if provider.id.is_empty() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("llm.providers[{i}].id"),
                    message: "provider id must not be empty".into(),
                });
            }
            if provider.base_url.is_empty() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("llm.providers[{i}].base_url"),
                    message: "provider base_url must not be empty".into(),
                });
            } else if !provider.base_url.starts_with("http://")
                && !provider.base_url.starts_with("https://")
            {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("llm.providers[{i}].base_url"),
                    message: format!(
                        "base_url must start with http:// or https:// (got \"{}\")",
                        provider.base_url
                    ),
                });
            }

            if !provider.id.is_empty() && !seen_ids.insert(&provider.id) {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Warning,
                    field: format!("llm.providers[{i}].id"),
                    message: format!(
                        "duplicate provider id \"{}\" — later provider will shadow earlier one",
                        provider.id
                    ),
                });
            }

            let needs_credentials =
                matches!(provider.auth.mode, AuthMode::ApiKey | AuthMode::QueryParam);
            if needs_credentials {
                let has_env = provider.auth.env.as_ref().is_some_and(|v| !v.is_empty());
                let has_key = provider.auth.key.as_ref().is_some_and(|v| !v.is_empty());
                let has_keys = !provider.auth.keys.is_empty();
                if !has_env && !has_key && !has_keys {
                    errors.push(ConfigError {
                        severity: ConfigSeverity::Error,
                        field: format!("llm.providers[{i}].auth"),
                        message: format!(
                            "provider \"{}\" uses {:?} auth mode but has no auth.env, auth.key, or auth.keys configured",
                            provider.id, provider.auth.mode
                        ),
                    });
                }
            }
        }

        if self.server.cors.allowed_origins.len() == 1 && self.server.cors.allowed_origins[0] == "*"
        {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "server.cors.allowed_origins".into(),
                message: "wildcard \"*\" allows all origins (not recommended for production)"
                    .into(),
            });
        }

        // Context tier budgets must be internally consistent.
        if self.context.tier1_min_relevance < 0.0 || self.context.tier1_min_relevance > 1.0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "context.tier1_min_relevance".into(),
                message: "must be between 0.0 and 1.0".into(),
            });
        }
        if self.context.tier2_top_k > self.context.tier1_top_k {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "context.tier2_top_k".into(),
                message: "tier2_top_k must not exceed tier1_top_k (tier 2 is a subset of tier 1)"
                    .into(),
            });
        }

        // Planner retries and backoff must be usable.
        if self.planner.max_retries == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "planner.max_retries".into(),
                message: "must allow at least one discovery attempt".into(),
            });
        }

        // Telemetry recency decay must be in (0, 1].
        if self.telemetry.recency_alpha <= 0.0 || self.telemetry.recency_alpha > 1.0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "telemetry.recency_alpha".into(),
                message: "must be in (0.0, 1.0]".into(),
            });
        }
        if self.telemetry.rolling_window_size == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "telemetry.rolling_window_size".into(),
                message: "must be greater than 0".into(),
            });
        }

        // Adaptive controller thresholds must be sane when enabled.
        if self.adaptive.enabled
            && (self.adaptive.min_weighted_success_rate < 0.0
                || self.adaptive.min_weighted_success_rate > 1.0)
        {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "adaptive.min_weighted_success_rate".into(),
                message: "must be between 0.0 and 1.0".into(),
            });
        }

        if self.orchestrator.max_tool_call_iterations == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "orchestrator.max_tool_call_iterations".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.orchestrator.default_organization_id.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "orchestrator.default_organization_id".into(),
                message: "must not be empty".into(),
            });
        }

        if self.tools.exec.timeout_sec == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "tools.exec.timeout_sec".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.tools.exec.max_output_chars == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "tools.exec.max_output_chars".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.tools.exec.pending_max_output_chars > self.tools.exec.max_output_chars {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "tools.exec.pending_max_output_chars".into(),
                message: "exceeds max_output_chars; will never be reached".into(),
            });
        }

        if let Some(rate_limit) = &self.server.rate_limit {
            if rate_limit.requests_per_sec == 0 {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: "server.rate_limit.requests_per_sec".into(),
                    message: "must be greater than 0".into(),
                });
            }
        }
        if self.server.api_token_env.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "server.api_token_env".into(),
                message: "empty api_token_env disables bearer-token auth on the HTTP surface"
                    .into(),
            });
        }

        errors
    }
}
