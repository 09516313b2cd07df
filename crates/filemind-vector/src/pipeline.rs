//! The indexing pipeline: walk → extract → chunk → embed → merge → persist,
//! reported as a stream of [`IndexEvent`]s.

use std::path::PathBuf;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, warn};

use filemind_core::chunker::{Chunker, ChunkingConfig};
use filemind_core::config::Settings;
use filemind_core::traits::TextExtractor;
use filemind_core::types::{ChunkRecord, IndexEvent, RunSummary, ScanProgress};
use filemind_core::walk::{collect_files, display_name, normalize_path, WalkEntry, WalkRules};
use filemind_core::{Error, Result};
use filemind_embed::EmbeddingGateway;

use crate::store::StoreHandle;

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub chunking: ChunkingConfig,
    pub min_text_chars: usize,
    pub max_chunks_per_file: usize,
    pub progress_every: usize,
    pub embed_concurrency: usize,
    pub event_buffer: usize,
    pub walk_rules: WalkRules,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl PipelineOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        let indexing = &settings.indexing;
        Self {
            chunking: settings.chunking,
            min_text_chars: indexing.min_text_chars,
            max_chunks_per_file: indexing.max_chunks_per_file,
            progress_every: indexing.progress_every,
            embed_concurrency: indexing.embed_concurrency,
            event_buffer: indexing.event_buffer,
            walk_rules: indexing.walk_rules(),
        }
    }
}

#[derive(Clone)]
pub struct IndexingPipeline {
    store: Arc<StoreHandle>,
    gateway: EmbeddingGateway,
    extractor: Arc<dyn TextExtractor>,
    chunker: Chunker,
    options: PipelineOptions,
}

impl IndexingPipeline {
    pub fn new(
        store: Arc<StoreHandle>,
        gateway: EmbeddingGateway,
        extractor: Arc<dyn TextExtractor>,
        options: PipelineOptions,
    ) -> Result<Self> {
        let chunker = Chunker::new(options.chunking)?;
        Ok(Self { store, gateway, extractor, chunker, options })
    }

    /// Whether any run holds this pipeline's store.
    pub fn is_running(&self) -> bool {
        self.store.is_indexing()
    }

    /// Start a run over `directories`.
    ///
    /// Fails with [`Error::Busy`] while another run over the same store is in
    /// flight, whichever pipeline started it. Dropping the returned stream cancels the run at the next file
    /// boundary; a cancelled run neither merges nor persists.
    pub fn index(&self, directories: Vec<PathBuf>) -> Result<ReceiverStream<IndexEvent>> {
        let guard = self.store.begin_run()?;
        let (tx, rx) = mpsc::channel(self.options.event_buffer.max(1));
        let pipeline = self.clone();
        tokio::spawn(async move {
            pipeline.run(directories, tx).await;
            drop(guard);
        });
        Ok(ReceiverStream::new(rx))
    }

    async fn run(self, directories: Vec<PathBuf>, tx: mpsc::Sender<IndexEvent>) {
        match self.execute(directories, &tx).await {
            Ok(Some(summary)) => {
                info!(
                    total_chunks = summary.total_chunks,
                    new_chunks = summary.new_chunks,
                    files = summary.files_processed,
                    failed = summary.files_failed,
                    "indexing run complete"
                );
                let _ = tx.send(IndexEvent::Complete(summary)).await;
            }
            Ok(None) => info!("indexing run cancelled by caller"),
            Err(err) => {
                error!(error = %err, "indexing run failed");
                let _ = tx.send(IndexEvent::Failed { error: err.to_string() }).await;
            }
        }
    }

    /// `Ok(None)` when the receiver went away before the run finished.
    async fn execute(&self, directories: Vec<PathBuf>, tx: &mpsc::Sender<IndexEvent>) -> Result<Option<RunSummary>> {
        let rules = self.options.walk_rules.clone();
        let files = tokio::task::spawn_blocking(move || collect_files(&directories, &rules))
            .await
            .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?;
        let total = files.len();
        info!(total_files = total, embedder = self.gateway.embedder_id(), "indexing started");

        if !emit(tx, IndexEvent::Progress(ScanProgress::indexing(0, total))).await {
            return Ok(None);
        }

        let generation = chrono::Utc::now().timestamp_millis();
        let every = self.options.progress_every.max(1);
        let mut batch = RunBatch::default();

        for (i, entry) in files.iter().enumerate() {
            if tx.is_closed() {
                return Ok(None);
            }
            self.index_file(entry, generation, &mut batch).await;
            let processed = i + 1;
            if processed % every == 0
                && processed < total
                && !emit(tx, IndexEvent::Progress(ScanProgress::indexing(processed, total))).await
            {
                return Ok(None);
            }
        }
        batch.summary.files_processed = total;

        if !emit(tx, IndexEvent::Progress(ScanProgress::complete(total))).await {
            return Ok(None);
        }

        let mut summary = batch.summary;
        summary.new_chunks = batch.records.len();
        let merged = self.store.snapshot().await.merge(batch.records)?;
        let committed = self.store.commit(merged).await?;
        summary.total_chunks = committed.size();
        summary.success = true;
        Ok(Some(summary))
    }

    async fn index_file(&self, entry: &WalkEntry, generation: i64, batch: &mut RunBatch) {
        let path = entry.path.clone();
        let extractor = self.extractor.clone();
        let text = match tokio::task::spawn_blocking(move || extractor.extract(&path)).await {
            Ok(Ok(text)) => text,
            Ok(Err(err)) => {
                warn!(path = %entry.path.display(), error = %err, "skipping unreadable file");
                batch.summary.files_failed += 1;
                return;
            }
            Err(err) => {
                warn!(path = %entry.path.display(), error = %err, "extraction task aborted");
                batch.summary.files_failed += 1;
                return;
            }
        };

        if text.trim().chars().count() < self.options.min_text_chars {
            debug!(path = %entry.path.display(), "text too short; not embedding");
            batch.summary.files_skipped_short += 1;
            return;
        }

        let mut chunks = self.chunker.chunk(&text);
        if chunks.len() > self.options.max_chunks_per_file {
            debug!(
                path = %entry.path.display(),
                dropped = chunks.len() - self.options.max_chunks_per_file,
                "chunk cap reached"
            );
            chunks.truncate(self.options.max_chunks_per_file);
        }

        let source_path = normalize_path(&entry.path);
        let source_name = display_name(&entry.path);
        let gateway = &self.gateway;
        let embedded: Vec<_> = stream::iter(chunks.into_iter().enumerate())
            .map(move |(idx, chunk)| async move {
                let result = gateway.embed(&chunk).await;
                (idx, chunk, result)
            })
            .buffered(self.options.embed_concurrency.max(1))
            .collect()
            .await;

        for (idx, chunk, result) in embedded {
            let embedding = match result {
                Ok(embedding) => embedding,
                Err(err) => {
                    warn!(path = %source_path, chunk = idx, error = %err, "skipping chunk");
                    batch.summary.chunks_failed += 1;
                    continue;
                }
            };
            let dim = *batch.dimension.get_or_insert(embedding.len());
            if dim != embedding.len() {
                warn!(path = %source_path, chunk = idx, expected = dim, actual = embedding.len(), "embedding dimension changed mid-run");
                batch.summary.chunks_failed += 1;
                continue;
            }
            batch.records.push(ChunkRecord {
                id: chunk_id(&source_path, idx, generation, &chunk),
                source_path: source_path.clone(),
                source_name: source_name.clone(),
                embedding,
                preview_text: chunk,
            });
        }
        debug!(path = %source_path, "file indexed");
    }
}

/// Everything a run has produced so far.
#[derive(Default)]
struct RunBatch {
    records: Vec<ChunkRecord>,
    dimension: Option<usize>,
    summary: RunSummary,
}

/// `false` once the receiving side is gone.
async fn emit(tx: &mpsc::Sender<IndexEvent>, event: IndexEvent) -> bool {
    tx.send(event).await.is_ok()
}

/// Opaque record id, unique per (path, chunk, generation, text).
pub fn chunk_id(source_path: &str, index: usize, generation: i64, text: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(source_path.as_bytes());
    hasher.update(&(index as u64).to_le_bytes());
    hasher.update(&generation.to_le_bytes());
    hasher.update(text.as_bytes());
    hasher.finalize().to_hex().as_str()[..32].to_string()
}
