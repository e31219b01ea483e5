use async_trait::async_trait;

use ao_domain::error::Result;
use ao_domain::stream::{BoxStream, ProviderEvent};
use ao_domain::tool::{Message, ToolDefinition};

/// A provider-agnostic chat completion request.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    /// Model identifier override. `None` lets the provider use its default.
    pub model: Option<String>,
}

/// Injected capability handle for turn generation. Implementations adapt a
/// specific vendor's wire format to this single streaming shape; the
/// orchestrator never reaches into a provider's internals.
///
/// The stream's terminal `ProviderEvent::Done` carries the authoritative
/// final text — the orchestrator never reconstructs it from `Token` deltas.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn generate_stream(&self, req: ChatRequest) -> Result<BoxStream<'static, ProviderEvent>>;

    /// A unique identifier for this provider instance, used in trace events.
    fn provider_id(&self) -> &str;
}
