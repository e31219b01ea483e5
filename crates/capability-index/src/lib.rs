pub mod embedding;
pub mod index;
pub mod manifest;
pub mod vector_store;

pub use embedding::{cosine_similarity, EmbeddingProvider, OllamaEmbeddingProvider};
pub use index::{AvailabilityContext, CapabilityIndex, IndexMutationReport};
pub use vector_store::{InMemoryVectorStore, VectorHit, VectorStore};
