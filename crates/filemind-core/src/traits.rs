use std::path::Path;

use async_trait::async_trait;

use crate::error::{ExtractError, ProviderError};
use crate::types::ChatMessage;

/// Remote (or fake) embedding capability.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Stable identifier for the provider/model (e.g. `openai:text-embedding-3-small`).
    fn id(&self) -> &str;
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;
}

/// Remote chat-completion capability.
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn id(&self) -> &str;
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, ProviderError>;
}

/// Turns a file into plain text. Blocking; callers run it off the async executor.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<String, ExtractError>;
}
