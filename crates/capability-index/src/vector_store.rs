use std::collections::HashMap;

use ao_domain::capability::CapabilityEmbeddingRecord;
use ao_domain::error::Result;
use async_trait::async_trait;
use parking_lot::RwLock;

use crate::embedding::cosine_similarity;

/// A single scored hit from a vector store query.
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub id: String,
    pub score: f64,
}

/// Storage backend for capability embeddings. An injected capability
/// handle — implementations may be in-memory (this crate) or backed by a
/// persistent service; callers depend only on this trait.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn create_collection(&self, name: &str) -> Result<()>;
    async fn collection_exists(&self, name: &str) -> Result<bool>;
    async fn upsert(&self, collection: &str, records: Vec<CapabilityEmbeddingRecord>) -> Result<()>;
    async fn query(&self, collection: &str, vector: &[f32], top_k: usize) -> Result<Vec<VectorHit>>;
    async fn delete(&self, collection: &str, ids: &[String]) -> Result<()>;
}

#[derive(Default)]
struct CollectionInner {
    records: HashMap<String, CapabilityEmbeddingRecord>,
}

/// Brute-force cosine-similarity vector store. Adequate for the
/// capability-count scale this system targets (hundreds, not millions).
#[derive(Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, CollectionInner>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn create_collection(&self, name: &str) -> Result<()> {
        self.collections
            .write()
            .entry(name.to_string())
            .or_insert_with(CollectionInner::default);
        Ok(())
    }

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        Ok(self.collections.read().contains_key(name))
    }

    async fn upsert(&self, collection: &str, records: Vec<CapabilityEmbeddingRecord>) -> Result<()> {
        let mut collections = self.collections.write();
        let inner = collections.entry(collection.to_string()).or_default();
        for record in records {
            inner.records.insert(record.id.clone(), record);
        }
        Ok(())
    }

    async fn query(&self, collection: &str, vector: &[f32], top_k: usize) -> Result<Vec<VectorHit>> {
        let collections = self.collections.read();
        let Some(inner) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut scored: Vec<VectorHit> = inner
            .records
            .values()
            .map(|r| VectorHit {
                id: r.id.clone(),
                score: cosine_similarity(&r.vector, vector) as f64,
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn delete(&self, collection: &str, ids: &[String]) -> Result<()> {
        if let Some(inner) = self.collections.write().get_mut(collection) {
            for id in ids {
                inner.records.remove(id);
            }
        }
        Ok(())
    }
}
