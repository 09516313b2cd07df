use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use filemind_assist::{Assistant, NO_CONTEXT_ANSWER};
use filemind_core::config::ChatSettings;
use filemind_core::error::ProviderError;
use filemind_core::extract::PlainTextExtractor;
use filemind_core::traits::{ChatModel, Embedder};
use filemind_core::types::{ChatMessage, ChunkRecord, Role};
use filemind_core::Error;
use filemind_embed::{ChatGateway, EmbeddingGateway};
use filemind_vector::{Retriever, StoreHandle, VectorStore};

struct AxisEmbedder;

#[async_trait]
impl Embedder for AxisEmbedder {
    fn id(&self) -> &str {
        "axis"
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
        Ok(vec![1.0, 0.0])
    }
}

/// Remembers the last conversation it was sent and replies with a canned answer.
#[derive(Default)]
struct RecordingChat {
    last: Mutex<Vec<ChatMessage>>,
}

#[async_trait]
impl ChatModel for RecordingChat {
    fn id(&self) -> &str {
        "recording"
    }

    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        *self.last.lock().unwrap() = messages.to_vec();
        Ok("canned reply".into())
    }
}

fn rec(path: &str, text: &str, embedding: Vec<f32>) -> ChunkRecord {
    ChunkRecord {
        id: format!("{path}#{text}"),
        source_path: path.into(),
        source_name: path.rsplit('/').next().unwrap_or(path).into(),
        embedding,
        preview_text: text.into(),
    }
}

fn assistant(records: Vec<ChunkRecord>, chat: Arc<RecordingChat>, settings: &ChatSettings) -> Assistant {
    let store = StoreHandle::with_store("unused.json", VectorStore::from_records(records).unwrap());
    let retriever = Retriever::new(
        Arc::new(store),
        EmbeddingGateway::new(Arc::new(AxisEmbedder), 8000, Duration::from_secs(5)),
    );
    let gateway = ChatGateway::new(chat, Duration::from_secs(5));
    Assistant::new(retriever, gateway, Arc::new(PlainTextExtractor::new()), settings)
}

#[tokio::test]
async fn ask_sends_retrieved_context_and_reports_sources() {
    let chat = Arc::new(RecordingChat::default());
    let records = vec![
        rec("notes/garden.md", "Tomatoes go in after the last frost.", vec![0.9, 0.1]),
        rec("notes/taxes.txt", "Receipts live in the blue folder.", vec![0.0, 1.0]),
    ];
    let helper = assistant(records, chat.clone(), &ChatSettings::default());

    let answer = helper.ask("When do I plant tomatoes?").await.unwrap();
    assert_eq!(answer.text, "canned reply");
    assert_eq!(answer.sources.len(), 1);
    assert_eq!(answer.sources[0].source_name, "garden.md");

    let sent = chat.last.lock().unwrap().clone();
    assert_eq!(sent[0].role, Role::System);
    assert!(sent[1].content.contains("Tomatoes go in after the last frost."));
    assert!(sent[1].content.ends_with("When do I plant tomatoes?"));
    assert!(!sent[1].content.contains("blue folder"));
}

#[tokio::test]
async fn ask_without_relevant_chunks_skips_the_model() {
    let chat = Arc::new(RecordingChat::default());
    let helper = assistant(vec![rec("a.txt", "unrelated", vec![0.0, 1.0])], chat.clone(), &ChatSettings::default());
    let answer = helper.ask("anything").await.unwrap();
    assert_eq!(answer.text, NO_CONTEXT_ANSWER);
    assert!(answer.sources.is_empty());
    assert!(chat.last.lock().unwrap().is_empty());
}

#[tokio::test]
async fn ask_propagates_search_validation() {
    let chat = Arc::new(RecordingChat::default());
    let empty = assistant(Vec::new(), chat.clone(), &ChatSettings::default());
    assert!(matches!(empty.ask("hello").await, Err(Error::EmptyIndex)));
    assert!(matches!(empty.ask(" ").await, Err(Error::InvalidQuery)));
}

#[tokio::test]
async fn summarize_truncates_long_documents() {
    let tmp = tempfile::tempdir().unwrap();
    let doc = tmp.path().join("report.txt");
    std::fs::write(&doc, format!("{}{}", "a".repeat(100), "b".repeat(100))).unwrap();

    let chat = Arc::new(RecordingChat::default());
    let settings = ChatSettings { max_document_chars: 100, ..ChatSettings::default() };
    let helper = assistant(Vec::new(), chat.clone(), &settings);

    assert_eq!(helper.summarize(&doc).await.unwrap(), "canned reply");
    let sent = chat.last.lock().unwrap().clone();
    assert!(sent[1].content.contains("report.txt"));
    assert!(sent[1].content.contains(&"a".repeat(100)));
    assert!(!sent[1].content.contains("bb"));

    assert!(matches!(helper.summarize(&tmp.path().join("missing.txt")).await, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn document_chat_prepends_the_document() {
    let tmp = tempfile::tempdir().unwrap();
    let doc = tmp.path().join("recipe.md");
    std::fs::write(&doc, "Bake at 200C for 25 minutes.").unwrap();

    let chat = Arc::new(RecordingChat::default());
    let helper = assistant(Vec::new(), chat.clone(), &ChatSettings::default());
    let history = vec![
        ChatMessage::user("How hot?"),
        ChatMessage::assistant("200C."),
        ChatMessage::user("And for how long?"),
    ];
    helper.chat_with_document(&doc, &history).await.unwrap();

    let sent = chat.last.lock().unwrap().clone();
    assert_eq!(sent.len(), 4);
    assert_eq!(sent[0].role, Role::System);
    assert!(sent[0].content.contains("Bake at 200C"));
    assert_eq!(&sent[1..], &history[..]);

    assert!(matches!(helper.chat_with_document(&doc, &[]).await, Err(Error::InvalidQuery)));
}
