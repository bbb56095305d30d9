use crate::{ChatReply, ChatRequest, LlmProvider, ProviderError};

/// Provider that never answers. Every file routed through it lands in the fallback category.
#[derive(Debug, Default)]
pub struct NoopProvider;

#[async_trait::async_trait]
impl LlmProvider for NoopProvider {
    async fn chat(&self, _request: &ChatRequest) -> Result<ChatReply, ProviderError> {
        Err(ProviderError::NotImplemented)
    }
}
