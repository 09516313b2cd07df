//! Chat features on top of the index: question answering over retrieved
//! chunks, document summaries and conversations about a single document.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use filemind_core::config::ChatSettings;
use filemind_core::traits::TextExtractor;
use filemind_core::types::ChatMessage;
use filemind_core::walk::display_name;
use filemind_core::{Error, Result};
use filemind_embed::{truncate_chars, ChatGateway};
use filemind_vector::Retriever;

mod prompt;

/// Chunks handed to the model as context for [`Assistant::ask`].
pub const DEFAULT_CONTEXT_CHUNKS: usize = 5;

/// Returned without a model call when nothing in the index clears the relevance floor.
pub const NO_CONTEXT_ANSWER: &str = "I couldn't find anything in your indexed documents that relates to that question.";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub source_name: String,
    pub source_path: String,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<Source>,
}

pub struct Assistant {
    retriever: Retriever,
    chat: ChatGateway,
    extractor: Arc<dyn TextExtractor>,
    context_chunks: usize,
    max_document_chars: usize,
}

impl Assistant {
    pub fn new(retriever: Retriever, chat: ChatGateway, extractor: Arc<dyn TextExtractor>, settings: &ChatSettings) -> Self {
        Self {
            retriever,
            chat,
            extractor,
            context_chunks: DEFAULT_CONTEXT_CHUNKS,
            max_document_chars: settings.max_document_chars,
        }
    }

    pub fn with_context_chunks(mut self, k: usize) -> Self {
        self.context_chunks = k.max(1);
        self
    }

    /// Answer `question` from the best matching chunks of the index.
    pub async fn ask(&self, question: &str) -> Result<Answer> {
        let chunks = self.retriever.retrieve(question, self.context_chunks).await?;
        if chunks.is_empty() {
            info!("no chunk cleared the relevance floor");
            return Ok(Answer { text: NO_CONTEXT_ANSWER.to_string(), sources: Vec::new() });
        }
        debug!(chunks = chunks.len(), "asking with retrieved context");

        let context = prompt::render_context(&chunks);
        let messages = [
            ChatMessage::system(prompt::ASK_SYSTEM),
            ChatMessage::user(prompt::build_question(question, &context)),
        ];
        let text = self.chat.chat(&messages).await?;
        let sources = chunks
            .into_iter()
            .map(|c| Source { source_name: c.source_name, source_path: c.source_path, score: c.score })
            .collect();
        Ok(Answer { text, sources })
    }

    pub async fn summarize(&self, path: &Path) -> Result<String> {
        let text = self.document_text(path).await?;
        let limited = truncate_chars(&text, self.max_document_chars);
        let truncated = limited.len() < text.len();
        let messages = [
            ChatMessage::system(prompt::SUMMARY_SYSTEM),
            ChatMessage::user(prompt::build_summary_request(&display_name(path), limited, truncated)),
        ];
        Ok(self.chat.chat(&messages).await?)
    }

    /// Continue `history` with the document at `path` as system context.
    pub async fn chat_with_document(&self, path: &Path, history: &[ChatMessage]) -> Result<String> {
        if history.iter().all(|m| m.content.trim().is_empty()) {
            return Err(Error::InvalidQuery);
        }
        let text = self.document_text(path).await?;
        let limited = truncate_chars(&text, self.max_document_chars);
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(ChatMessage::system(prompt::document_system(&display_name(path), limited)));
        messages.extend_from_slice(history);
        Ok(self.chat.chat(&messages).await?)
    }

    async fn document_text(&self, path: &Path) -> Result<String> {
        if !path.is_file() {
            return Err(Error::NotFound(path.display().to_string()));
        }
        let extractor = self.extractor.clone();
        let owned: PathBuf = path.to_path_buf();
        let text = tokio::task::spawn_blocking(move || extractor.extract(&owned))
            .await
            .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))??;
        if text.trim().is_empty() {
            return Err(Error::NotFound(format!("no text in {}", path.display())));
        }
        Ok(text)
    }
}
