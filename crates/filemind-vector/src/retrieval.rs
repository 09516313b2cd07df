//! Brute-force cosine retrieval over the in-memory store.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use filemind_core::types::{ChunkRecord, RetrievalHit};
use filemind_core::{Error, Result};
use filemind_embed::EmbeddingGateway;

use crate::store::StoreHandle;

/// Hits scoring at or below this are never returned.
pub const MIN_SCORE: f32 = 0.25;
pub const MAX_RESULTS: usize = 12;
pub const PREVIEW_CHARS: usize = 150;

/// Cosine of the angle between `a` and `b`, within `[-1.0, 1.0]`; `0.0` when
/// either has zero norm or the arithmetic overflows.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let cosine = dot / (norm_a.sqrt() * norm_b.sqrt());
    if cosine.is_finite() {
        cosine.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ScoredRecord<'a> {
    pub record: &'a ChunkRecord,
    pub score: f32,
}

/// Score, floor, sort (stable, descending) and keep the best record per
/// source path, at most `limit` of them.
pub fn rank<'a>(query: &[f32], records: &'a [ChunkRecord], limit: usize) -> Vec<ScoredRecord<'a>> {
    let mut scored: Vec<ScoredRecord<'a>> = records
        .iter()
        .map(|record| ScoredRecord { record, score: cosine_similarity(query, &record.embedding) })
        .filter(|s| s.score > MIN_SCORE)
        .collect();
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

    let mut seen = HashSet::new();
    scored
        .into_iter()
        .filter(|s| seen.insert(s.record.source_path.as_str()))
        .take(limit)
        .collect()
}

/// `text` cut to [`PREVIEW_CHARS`] characters, with `...` when cut.
pub fn preview(text: &str) -> String {
    match text.char_indices().nth(PREVIEW_CHARS) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// A retrieved chunk with its full text, used as chat context.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub source_name: String,
    pub source_path: String,
    pub score: f32,
    pub text: String,
}

#[derive(Clone)]
pub struct Retriever {
    store: Arc<StoreHandle>,
    gateway: EmbeddingGateway,
}

impl Retriever {
    pub fn new(store: Arc<StoreHandle>, gateway: EmbeddingGateway) -> Self {
        Self { store, gateway }
    }

    /// Up to [`MAX_RESULTS`] hits, best first, one per source file.
    pub async fn search(&self, query: &str) -> Result<Vec<RetrievalHit>> {
        let hits = self
            .retrieve(query, MAX_RESULTS)
            .await?
            .into_iter()
            .map(|chunk| RetrievalHit {
                preview_text: preview(&chunk.text),
                source_name: chunk.source_name,
                source_path: chunk.source_path,
                score: chunk.score,
            })
            .collect();
        Ok(hits)
    }

    /// Same ranking as [`Retriever::search`], returning whole chunk texts.
    pub async fn retrieve(&self, query: &str, limit: usize) -> Result<Vec<RetrievedChunk>> {
        if query.trim().is_empty() {
            return Err(Error::InvalidQuery);
        }
        let store = self.store.snapshot().await;
        let Some(expected) = store.dimension() else {
            return Err(Error::EmptyIndex);
        };

        let vector = self.gateway.embed(query).await?;
        if vector.len() != expected {
            return Err(Error::DimensionMismatch { expected, actual: vector.len() });
        }

        let ranked = rank(&vector, store.records(), limit);
        debug!(candidates = store.size(), hits = ranked.len(), "ranked query");
        Ok(ranked
            .into_iter()
            .map(|s| RetrievedChunk {
                source_name: s.record.source_name.clone(),
                source_path: s.record.source_path.clone(),
                score: s.score,
                text: s.record.preview_text.clone(),
            })
            .collect())
    }
}
