//! Embedding and chat providers plus the gateways the rest of filemind talks to.
//!
//! `APP_USE_FAKE_EMBEDDINGS=1` switches to the deterministic [`FakeEmbedder`]
//! for fast, offline development and tests.

use std::sync::Arc;

use tracing::info;

use filemind_core::config::{ChatSettings, EmbeddingSettings, ProviderKind};
use filemind_core::error::ProviderError;
use filemind_core::traits::{ChatModel, Embedder};

pub mod chat;
pub mod fake;
pub mod gateway;
pub mod openai;

pub use chat::OpenAiChat;
pub use fake::{FakeEmbedder, FAKE_EMBEDDING_DIM};
pub use gateway::{truncate_chars, ChatGateway, EmbeddingGateway};
pub use openai::OpenAiEmbedder;

pub fn get_default_embedder(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>, ProviderError> {
    match settings.effective_provider() {
        ProviderKind::Fake => {
            info!("Using FakeEmbedder");
            Ok(Arc::new(FakeEmbedder::default()))
        }
        ProviderKind::OpenAi => {
            let embedder = OpenAiEmbedder::from_settings(settings)?;
            info!(model = %settings.model, base_url = %settings.base_url, "Using OpenAI-compatible embedder");
            Ok(Arc::new(embedder))
        }
    }
}

pub fn get_default_chat(settings: &ChatSettings) -> Result<Arc<dyn ChatModel>, ProviderError> {
    Ok(Arc::new(OpenAiChat::from_settings(settings)?))
}

/// Gateway over the configured embedder.
pub fn embedding_gateway(settings: &EmbeddingSettings) -> Result<EmbeddingGateway, ProviderError> {
    Ok(EmbeddingGateway::from_settings(get_default_embedder(settings)?, settings))
}

pub fn chat_gateway(settings: &ChatSettings) -> Result<ChatGateway, ProviderError> {
    Ok(ChatGateway::from_settings(get_default_chat(settings)?, settings))
}
