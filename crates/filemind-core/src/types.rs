//! Domain types shared by the indexing pipeline, the retrieval engine and the
//! command-line surface.

use serde::{Deserialize, Serialize};

pub type ChunkId = String;

/// Version stamped on every serialised [`IndexEvent`].
pub const EVENT_VERSION: u32 = 1;

/// The atomic unit of the index: one embedded window of a source document.
///
/// - `id`: opaque, unique per record generation
/// - `source_path`: normalised path (forward slashes) of the originating file
/// - `source_name`: display name of the originating file
/// - `embedding`: provider vector; all records of one store share its length
/// - `preview_text`: the chunk text the embedding was computed from
///
/// Records are never mutated after creation. Re-indexing a file replaces all
/// of its records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkRecord {
    pub id: ChunkId,
    pub source_path: String,
    pub source_name: String,
    pub embedding: Vec<f32>,
    pub preview_text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Indexing,
    Complete,
}

/// Incremental state of a long-running walk. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanProgress {
    pub files_processed: usize,
    pub total_files: usize,
    pub status: ScanStatus,
}

impl ScanProgress {
    pub fn indexing(files_processed: usize, total_files: usize) -> Self {
        Self { files_processed, total_files, status: ScanStatus::Indexing }
    }

    pub fn complete(total_files: usize) -> Self {
        Self { files_processed: total_files, total_files, status: ScanStatus::Complete }
    }
}

/// Terminal summary of a successful indexing run.
///
/// `total_chunks` is the size of the store after the merge; `new_chunks` the
/// number of records produced by this run. The failure counters make absorbed
/// per-file and per-chunk errors visible to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub success: bool,
    pub total_chunks: usize,
    pub new_chunks: usize,
    pub files_processed: usize,
    pub files_failed: usize,
    pub files_skipped_short: usize,
    pub chunks_failed: usize,
}

/// Events emitted by an indexing run: any number of `Progress`, then exactly
/// one of `Complete` or `Failed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IndexEvent {
    Progress(ScanProgress),
    Complete(RunSummary),
    Failed { error: String },
}

impl IndexEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, IndexEvent::Progress(_))
    }

    /// One self-contained NDJSON line (no trailing newline).
    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(&EventRecord { version: EVENT_VERSION, event: self.clone() })
    }
}

/// Wire envelope for [`IndexEvent`]: `{"version":1,"type":"progress",...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub version: u32,
    #[serde(flatten)]
    pub event: IndexEvent,
}

/// A search result. Derived at query time, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalHit {
    pub source_name: String,
    pub source_path: String,
    pub score: f32,
    pub preview_text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStatus {
    pub has_index: bool,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}
