use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Capability embedding provider
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "d_provider")]
    pub provider: String,
    #[serde(default = "d_model")]
    pub model: String,
    #[serde(default = "d_endpoint")]
    pub endpoint: String,
    /// How long a `(descriptor, embedding-text hash)` vector is cached.
    #[serde(default = "d_cache_ttl")]
    pub cache_ttl_secs: u64,
    /// Capability descriptors embedded per outbound HTTP batch request.
    #[serde(default = "d_batch_size")]
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: d_provider(),
            model: d_model(),
            endpoint: d_endpoint(),
            cache_ttl_secs: d_cache_ttl(),
            batch_size: d_batch_size(),
        }
    }
}

fn d_provider() -> String {
    "ollama".into()
}
fn d_model() -> String {
    "nomic-embed-text".into()
}
fn d_endpoint() -> String {
    "http://localhost:11434".into()
}
fn d_cache_ttl() -> u64 {
    3600
}
fn d_batch_size() -> usize {
    32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_ollama_local() {
        let c = EmbeddingConfig::default();
        assert_eq!(c.provider, "ollama");
        assert_eq!(c.endpoint, "http://localhost:11434");
        assert_eq!(c.batch_size, 32);
    }

    #[test]
    fn deserialize_empty_uses_defaults() {
        let c: EmbeddingConfig = toml::from_str("").unwrap();
        assert_eq!(c.model, "nomic-embed-text");
    }
}
