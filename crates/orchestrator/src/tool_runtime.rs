use async_trait::async_trait;

use ao_domain::error::Result;
use ao_domain::tool::{ToolCall, ToolDefinition};

/// Injected capability handle for tool execution. An implementation owns
/// the full catalog of registered tools; the orchestrator only ever asks
/// it for the definitions behind a resolved `CapabilityPlan`'s tool names
/// and for the result of executing a single call.
#[async_trait]
pub trait ToolRuntime: Send + Sync {
    /// Resolve `names` (as selected by the planner) to the `ToolDefinition`s
    /// handed to the LLM. Unknown names are silently dropped.
    fn definitions(&self, names: &[String]) -> Vec<ToolDefinition>;

    /// The full registered tool catalog, for `ToolSelectionMode::All` —
    /// unlike `definitions`, this isn't filtered by a discovered name list.
    fn all_definitions(&self) -> Vec<ToolDefinition>;

    /// Execute a single tool call and return its result content, or an
    /// error if the tool itself failed. Dispatch and timeout handling are
    /// the implementation's responsibility.
    async fn execute(&self, call: &ToolCall) -> Result<String>;
}
