use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ao_domain::capability::{
    CapabilityDescriptor, CapabilityEmbeddingRecord, CapabilityFilter, CapabilityMatch,
    CapabilityMetadata,
};
use ao_domain::error::Result;
use parking_lot::RwLock;

use crate::embedding::{hash_text, EmbeddingProvider};
use crate::vector_store::VectorStore;

const COLLECTION: &str = "capabilities";

/// Which secrets and tool names are currently present. Availability is
/// derived purely from this — never from embedding success, so an
/// embedding-batch failure never silently hides a usable capability.
#[derive(Debug, Clone, Default)]
pub struct AvailabilityContext {
    pub available_secrets: HashSet<String>,
    pub available_tools: HashSet<String>,
}

impl AvailabilityContext {
    fn is_available(&self, descriptor: &CapabilityDescriptor) -> bool {
        descriptor
            .required_secrets
            .iter()
            .all(|s| self.available_secrets.contains(s))
            && descriptor
                .required_tools
                .iter()
                .all(|t| self.available_tools.contains(t))
    }
}

/// Outcome of an index build/upsert: which descriptors failed to embed.
/// These descriptors remain in the index (and keep their
/// secret/tool-derived `available` flag) but are flagged so discovery can
/// choose to exclude them from vector search specifically.
#[derive(Debug, Clone, Default)]
pub struct IndexMutationReport {
    pub upserted_count: usize,
    pub embedding_failures: Vec<String>,
}

/// Holds capability descriptors, their embeddings, and a monotonic
/// version bumped on every build/upsert/refresh. Readers observe a
/// publish-by-swap: the version is only advanced after the backing
/// vector-store write completes.
pub struct CapabilityIndex {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    descriptors: RwLock<HashMap<String, CapabilityDescriptor>>,
    embedding_failed: RwLock<HashSet<String>>,
    version: AtomicU64,
}

impl CapabilityIndex {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStore>) -> Self {
        Self {
            embedder,
            store,
            descriptors: RwLock::new(HashMap::new()),
            embedding_failed: RwLock::new(HashSet::new()),
            version: AtomicU64::new(0),
        }
    }

    /// Current monotonic index version. Bumped once per successful
    /// build/upsert; used by the context assembler to invalidate its
    /// cached Tier 0 summary.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Replace the entire index. Used at startup and by a full
    /// `refreshIndex(partial = false)`.
    pub async fn build(
        &self,
        descriptors: Vec<CapabilityDescriptor>,
        availability: &AvailabilityContext,
    ) -> Result<IndexMutationReport> {
        self.store.create_collection(COLLECTION).await?;
        let report = self.upsert(descriptors, availability).await?;
        Ok(report)
    }

    /// Insert or replace a subset of descriptors. Used by a partial
    /// `refreshIndex(partial = true)` and by manifest hot-reload.
    pub async fn upsert(
        &self,
        mut descriptors: Vec<CapabilityDescriptor>,
        availability: &AvailabilityContext,
    ) -> Result<IndexMutationReport> {
        for d in descriptors.iter_mut() {
            d.available = availability.is_available(d);
        }

        let texts: Vec<String> = descriptors.iter().map(|d| d.embedding_text()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await;

        let mut report = IndexMutationReport::default();
        let mut records = Vec::with_capacity(descriptors.len());

        match embeddings {
            Ok(vectors) => {
                let mut failed = self.embedding_failed.write();
                for (d, (text, vector)) in descriptors.iter().zip(texts.into_iter().zip(vectors)) {
                    failed.remove(&d.id);
                    records.push(CapabilityEmbeddingRecord {
                        id: d.id.clone(),
                        vector,
                        text_content: text,
                        metadata: CapabilityMetadata {
                            kind: d.kind,
                            category: d.category.clone(),
                            available: d.available,
                            tags: d.tags.clone(),
                        },
                    });
                }
            }
            Err(_) => {
                // Whole-batch failure: every descriptor in this call is
                // flagged, but all still enter the registry and keep
                // their availability.
                let mut failed = self.embedding_failed.write();
                for d in &descriptors {
                    failed.insert(d.id.clone());
                    report.embedding_failures.push(d.id.clone());
                }
            }
        }

        if !records.is_empty() {
            self.store.upsert(COLLECTION, records).await?;
        }

        report.upserted_count = descriptors.len();

        let mut registry = self.descriptors.write();
        for d in descriptors {
            registry.insert(d.id.clone(), d);
        }
        drop(registry);

        self.version.fetch_add(1, Ordering::AcqRel);
        Ok(report)
    }

    pub fn get(&self, id: &str) -> Option<CapabilityDescriptor> {
        self.descriptors.read().get(id).cloned()
    }

    pub fn all_descriptors(&self) -> Vec<CapabilityDescriptor> {
        self.descriptors.read().values().cloned().collect()
    }

    /// Embedding-based search over the query text, returning up to
    /// `top_k` matches. Descriptors whose embedding failed are excluded
    /// from *search results* (they simply can't be matched semantically)
    /// but remain available via `get`/`all_descriptors`.
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        filter: &CapabilityFilter,
    ) -> Result<Vec<CapabilityMatch>> {
        let query_vector = self.embedder.embed_batch(&[query.to_string()]).await?;
        let Some(vector) = query_vector.into_iter().next() else {
            return Ok(Vec::new());
        };

        let hits = self.store.query(COLLECTION, &vector, top_k * 4).await?;
        let registry = self.descriptors.read();
        let failed = self.embedding_failed.read();

        let mut matches: Vec<CapabilityMatch> = hits
            .into_iter()
            .filter(|h| !failed.contains(&h.id))
            .filter_map(|hit| registry.get(&hit.id).cloned().map(|d| (d, hit.score)))
            .filter(|(d, _)| filter.kind.map(|k| k == d.kind).unwrap_or(true))
            .filter(|(d, _)| {
                filter
                    .category
                    .as_ref()
                    .map(|c| c == &d.category)
                    .unwrap_or(true)
            })
            .filter(|(d, _)| !filter.only_available || d.available)
            .map(|(descriptor, score)| CapabilityMatch {
                descriptor,
                score,
                boosted: false,
            })
            .collect();

        matches.truncate(top_k);
        Ok(matches)
    }

    /// Hash of a descriptor's embedding text, used to detect whether its
    /// embedding needs to be recomputed on a partial upsert.
    pub fn text_hash(descriptor: &CapabilityDescriptor) -> u64 {
        hash_text(&descriptor.embedding_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_store::InMemoryVectorStore;
    use ao_domain::capability::{CapabilityKind, SourceRef};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FixedEmbedder {
        vectors: Mutex<HashMap<String, Vec<f32>>>,
        fail: bool,
    }

    #[async_trait]
    impl EmbeddingProvider for FixedEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            if self.fail {
                return Err(ao_domain::error::Error::Provider {
                    provider: "fixed".into(),
                    message: "forced failure".into(),
                });
            }
            let vectors = self.vectors.lock().unwrap();
            Ok(texts
                .iter()
                .map(|t| vectors.get(t).cloned().unwrap_or_else(|| vec![0.0, 0.0]))
                .collect())
        }

        async fn health_check(&self) -> Result<()> {
            Ok(())
        }
    }

    fn descriptor(name: &str, required_secrets: Vec<&str>) -> CapabilityDescriptor {
        CapabilityDescriptor {
            id: format!("tool:{name}"),
            kind: CapabilityKind::Tool,
            name: name.into(),
            display_name: String::new(),
            description: "desc".into(),
            category: "search".into(),
            tags: vec![],
            required_secrets: required_secrets.into_iter().map(String::from).collect(),
            required_tools: vec![],
            available: false,
            has_side_effects: false,
            full_schema: None,
            full_content: None,
            source_ref: SourceRef::InProcess,
        }
    }

    #[tokio::test]
    async fn availability_derives_from_secret_presence() {
        let d = descriptor("needs-key", vec!["API_KEY"]);
        let mut vectors = HashMap::new();
        vectors.insert(d.embedding_text(), vec![1.0, 0.0]);
        let embedder = Arc::new(FixedEmbedder {
            vectors: Mutex::new(vectors),
            fail: false,
        });
        let store = Arc::new(InMemoryVectorStore::new());
        let index = CapabilityIndex::new(embedder, store);

        let without_key = AvailabilityContext::default();
        index.build(vec![d.clone()], &without_key).await.unwrap();
        assert!(!index.get("tool:needs-key").unwrap().available);

        let mut with_key = AvailabilityContext::default();
        with_key.available_secrets.insert("API_KEY".into());
        index.upsert(vec![d], &with_key).await.unwrap();
        assert!(index.get("tool:needs-key").unwrap().available);
    }

    #[tokio::test]
    async fn embedding_failure_does_not_change_availability() {
        let d = descriptor("open-tool", vec![]);
        let embedder = Arc::new(FixedEmbedder {
            vectors: Mutex::new(HashMap::new()),
            fail: true,
        });
        let store = Arc::new(InMemoryVectorStore::new());
        let index = CapabilityIndex::new(embedder, store);

        let report = index
            .build(vec![d.clone()], &AvailabilityContext::default())
            .await
            .unwrap();

        assert_eq!(report.embedding_failures, vec!["tool:open-tool".to_string()]);
        // Still available: availability tracks secrets/tools, not embedding success.
        assert!(index.get("tool:open-tool").unwrap().available);
    }

    #[tokio::test]
    async fn version_bumps_on_every_upsert() {
        let embedder = Arc::new(FixedEmbedder {
            vectors: Mutex::new(HashMap::new()),
            fail: true,
        });
        let store = Arc::new(InMemoryVectorStore::new());
        let index = CapabilityIndex::new(embedder, store);
        let v0 = index.version();
        index
            .build(vec![descriptor("a", vec![])], &AvailabilityContext::default())
            .await
            .unwrap();
        assert_eq!(index.version(), v0 + 1);
    }

    #[tokio::test]
    async fn search_surfaces_query_embedding_failure() {
        let embedder = Arc::new(FixedEmbedder {
            vectors: Mutex::new(HashMap::new()),
            fail: true,
        });
        let store = Arc::new(InMemoryVectorStore::new());
        let index = CapabilityIndex::new(embedder, store);
        let matches = index
            .search("anything", 5, &CapabilityFilter::default())
            .await;
        assert!(matches.is_err());
    }

    #[tokio::test]
    async fn search_finds_the_closer_of_two_descriptors() {
        let d1 = descriptor("near", vec![]);
        let d2 = descriptor("far", vec![]);
        let mut vectors = HashMap::new();
        vectors.insert(d1.embedding_text(), vec![1.0, 0.0]);
        vectors.insert(d2.embedding_text(), vec![0.0, 1.0]);
        vectors.insert("query".to_string(), vec![0.9, 0.1]);
        let embedder = Arc::new(FixedEmbedder {
            vectors: Mutex::new(vectors),
            fail: false,
        });
        let store = Arc::new(InMemoryVectorStore::new());
        let index = CapabilityIndex::new(embedder, store);
        index
            .build(vec![d1, d2], &AvailabilityContext::default())
            .await
            .unwrap();

        let matches = index
            .search("query", 1, &CapabilityFilter::default())
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].descriptor.name, "near");
    }
}
