//! LlmProvider trait definition.
//!
//! Uses RPITIT for `complete`; `BoxLlmProvider` supplies the object-safe
//! wrapper agents and supervisors hold.

use switchboard_types::llm::{CompletionRequest, CompletionResponse, LlmError};

/// Trait for LLM backends consumed by agents and supervisors.
///
/// Concrete HTTP clients live outside this workspace; the engine only needs
/// completion, with tool calls.
pub trait LlmProvider: Send + Sync {
    /// Human-readable provider name (e.g., "anthropic", "openai").
    fn name(&self) -> &str;

    /// Send a completion request and receive the full response.
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl std::future::Future<Output = Result<CompletionResponse, LlmError>> + Send;
}
