pub mod graph;
pub mod rerank;

pub use graph::{CapabilityGraph, InMemoryCapabilityGraph};
pub use rerank::{rerank, DEFAULT_BOOST_FACTOR};
