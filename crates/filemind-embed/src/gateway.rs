//! Gateways in front of the remote capabilities.
//!
//! Both enforce a hard timeout per call so one hung request can never stall an
//! indexing run or a query; a timeout surfaces as [`ProviderError::Timeout`]
//! and follows the same skip/fail policy as any other provider failure.

use std::sync::Arc;
use std::time::Duration;

use filemind_core::config::{ChatSettings, EmbeddingSettings};
use filemind_core::error::ProviderError;
use filemind_core::traits::{ChatModel, Embedder};
use filemind_core::types::ChatMessage;

/// Longest prefix of `text` holding at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[derive(Clone)]
pub struct EmbeddingGateway {
    embedder: Arc<dyn Embedder>,
    max_input_chars: usize,
    timeout: Duration,
}

impl EmbeddingGateway {
    pub fn new(embedder: Arc<dyn Embedder>, max_input_chars: usize, timeout: Duration) -> Self {
        Self { embedder, max_input_chars, timeout }
    }

    pub fn from_settings(embedder: Arc<dyn Embedder>, settings: &EmbeddingSettings) -> Self {
        Self::new(embedder, settings.max_input_chars, Duration::from_secs(settings.timeout_secs))
    }

    pub fn embedder_id(&self) -> &str {
        self.embedder.id()
    }

    /// Embed `text` after cutting it to the provider-safe prefix.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let input = truncate_chars(text, self.max_input_chars);
        let vector = tokio::time::timeout(self.timeout, self.embedder.embed(input))
            .await
            .map_err(|_| ProviderError::Timeout(self.timeout))??;
        if vector.is_empty() {
            return Err(ProviderError::Malformed("provider returned an empty vector".into()));
        }
        if vector.iter().any(|x| !x.is_finite()) {
            return Err(ProviderError::Malformed("provider returned non-finite values".into()));
        }
        Ok(vector)
    }
}

#[derive(Clone)]
pub struct ChatGateway {
    model: Arc<dyn ChatModel>,
    timeout: Duration,
}

impl ChatGateway {
    pub fn new(model: Arc<dyn ChatModel>, timeout: Duration) -> Self {
        Self { model, timeout }
    }

    pub fn from_settings(model: Arc<dyn ChatModel>, settings: &ChatSettings) -> Self {
        Self::new(model, Duration::from_secs(settings.timeout_secs))
    }

    pub async fn chat(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        tokio::time::timeout(self.timeout, self.model.chat(messages))
            .await
            .map_err(|_| ProviderError::Timeout(self.timeout))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_keeps_char_prefix() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello", 3), "hel");
        assert_eq!(truncate_chars("ñandú", 2), "ña");
        assert_eq!(truncate_chars("", 0), "");
    }
}
