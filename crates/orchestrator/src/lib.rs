pub mod conversation_lock;
pub mod memory;
pub mod orchestrator;
pub mod provider;
pub mod state;
pub mod tool_runtime;

pub use conversation_lock::ConversationLockMap;
pub use memory::{MemoryRecallHit, MemoryRetriever};
pub use orchestrator::{TurnOrchestrator, TurnRequest};
pub use provider::{ChatRequest, LlmProvider};
pub use state::TurnState;
pub use tool_runtime::ToolRuntime;
