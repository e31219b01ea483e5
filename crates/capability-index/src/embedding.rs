use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::time::{Duration, Instant};

use ao_domain::config::EmbeddingConfig;
use ao_domain::error::{Error, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;

/// Cosine similarity between two vectors. Returns `0.0` for a
/// zero-magnitude or mismatched-length pair rather than panicking or
/// dividing by zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        tracing::warn!(a_len = a.len(), b_len = b.len(), "cosine_similarity: length mismatch");
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    dot / (mag_a * mag_b)
}

/// Stable hash of embedding text, used as the cache key.
pub fn hash_text(text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}

#[derive(Clone)]
struct CachedEmbedding {
    embedding: Vec<f32>,
    expires_at: Instant,
}

const CACHE_MAX_ENTRIES: usize = 10_000;

/// Provides embeddings for capability descriptor text and search queries.
/// An injected capability handle, never a module-level singleton.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
    async fn health_check(&self) -> Result<()>;
}

#[derive(Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

/// Ollama-compatible `/api/embeddings` client with a TTL cache keyed on a
/// hash of the input text.
pub struct OllamaEmbeddingProvider {
    config: EmbeddingConfig,
    http: reqwest::Client,
    cache: RwLock<HashMap<u64, CachedEmbedding>>,
}

impl OllamaEmbeddingProvider {
    pub fn new(config: EmbeddingConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn get_cached(&self, key: u64) -> Option<Vec<f32>> {
        let cache = self.cache.read();
        cache.get(&key).and_then(|entry| {
            if entry.expires_at > Instant::now() {
                Some(entry.embedding.clone())
            } else {
                None
            }
        })
    }

    fn put_cached(&self, key: u64, embedding: Vec<f32>) {
        let mut cache = self.cache.write();
        if cache.len() >= CACHE_MAX_ENTRIES {
            cache.clear();
        }
        cache.insert(
            key,
            CachedEmbedding {
                embedding,
                expires_at: Instant::now() + Duration::from_secs(self.config.cache_ttl_secs),
            },
        );
    }

    async fn fetch_one(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.config.endpoint);
        let resp = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "model": self.config.model, "prompt": text }))
            .send()
            .await
            .map_err(|e| Error::Provider {
                provider: self.config.provider.clone(),
                message: e.to_string(),
            })?;

        if !resp.status().is_success() {
            return Err(Error::Provider {
                provider: self.config.provider.clone(),
                message: format!("embeddings endpoint returned {}", resp.status()),
            });
        }

        let parsed: OllamaEmbeddingResponse = resp.json().await.map_err(|e| Error::Provider {
            provider: self.config.provider.clone(),
            message: e.to_string(),
        })?;
        Ok(parsed.embedding)
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.config.batch_size) {
            for text in chunk {
                let key = hash_text(text);
                if let Some(cached) = self.get_cached(key) {
                    out.push(cached);
                    continue;
                }
                let embedding = self.fetch_one(text).await?;
                self.put_cached(key, embedding.clone());
                out.push(embedding);
            }
        }
        Ok(out)
    }

    async fn health_check(&self) -> Result<()> {
        let url = format!("{}/api/tags", self.config.endpoint);
        self.http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Provider {
                provider: self.config.provider.clone(),
                message: e.to_string(),
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_similarity_identical_vectors_is_one() {
        let a = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_orthogonal_vectors_is_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_mismatched_length_is_zero() {
        let a = vec![1.0, 2.0];
        let b = vec![1.0, 2.0, 3.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn cosine_similarity_zero_magnitude_is_zero() {
        let a = vec![0.0, 0.0];
        let b = vec![1.0, 2.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn hash_text_is_deterministic() {
        assert_eq!(hash_text("web search"), hash_text("web search"));
        assert_ne!(hash_text("web search"), hash_text("file write"));
    }
}
