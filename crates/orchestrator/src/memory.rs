use async_trait::async_trait;

use ao_domain::error::Result;

/// One recalled memory passage, scored against the recall query.
#[derive(Debug, Clone)]
pub struct MemoryRecallHit {
    pub scope: String,
    pub text: String,
    pub score: f64,
}

/// Injected capability handle for long-term memory recall. Deliberately
/// narrower than a full memory-provider API (no ingest, persona, or
/// session lifecycle here) — the orchestrator only ever needs to pull
/// relevant passages into a turn's context.
#[async_trait]
pub trait MemoryRetriever: Send + Sync {
    async fn recall(&self, query: &str, top_k: usize) -> Result<Vec<MemoryRecallHit>>;
}
