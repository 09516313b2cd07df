//! Flat-file vector store.
//!
//! The whole record set lives in memory and is written to a single JSON file
//! after every successful indexing run:
//!
//! ```json
//! {"version":1,"dimension":1536,"updated_at":"2026-01-01T00:00:00Z","records":[...]}
//! ```
//!
//! A bare JSON array of records (the unversioned layout) is still accepted on
//! load and rewritten in the versioned layout on the next persist.

use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::NamedTempFile;
use tokio::sync::RwLock;
use tracing::{debug, info};

use filemind_core::types::{ChunkRecord, IndexStatus};
use filemind_core::{Error, Result};

pub const STORE_FORMAT_VERSION: u64 = 1;

#[derive(Serialize)]
struct StoreFileOut<'a> {
    version: u64,
    dimension: Option<usize>,
    updated_at: String,
    records: &'a [ChunkRecord],
}

#[derive(Deserialize)]
struct StoreFileIn {
    #[serde(default)]
    dimension: Option<usize>,
    records: Vec<ChunkRecord>,
}

/// An ordered, dimension-homogeneous collection of [`ChunkRecord`]s.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorStore {
    records: Vec<ChunkRecord>,
}

impl VectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store, rejecting record sets of mixed dimensionality.
    pub fn from_records(records: Vec<ChunkRecord>) -> Result<Self> {
        check_dimensions(&records)?;
        Ok(Self { records })
    }

    /// Read the persisted store at `path`. An absent file is an empty store;
    /// a present but unreadable one is [`Error::CorruptIndex`].
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no index on disk; starting empty");
                return Ok(Self::new());
            }
            Err(err) => return Err(Error::Io(err)),
        };
        let corrupt = |reason: String| Error::CorruptIndex { path: path.to_path_buf(), reason };

        let value: Value = serde_json::from_slice(&bytes).map_err(|e| corrupt(e.to_string()))?;
        let records = match value {
            Value::Array(_) => {
                debug!(path = %path.display(), "loading unversioned index layout");
                serde_json::from_value::<Vec<ChunkRecord>>(value).map_err(|e| corrupt(e.to_string()))?
            }
            Value::Object(_) => {
                let version = value
                    .get("version")
                    .and_then(Value::as_u64)
                    .ok_or_else(|| corrupt("missing format version".into()))?;
                if version != STORE_FORMAT_VERSION {
                    return Err(corrupt(format!("unsupported format version {version}")));
                }
                let file: StoreFileIn = serde_json::from_value(value).map_err(|e| corrupt(e.to_string()))?;
                if let (Some(declared), Some(first)) = (file.dimension, file.records.first()) {
                    if declared != first.embedding.len() {
                        return Err(corrupt(format!(
                            "declared dimension {declared} but records have {}",
                            first.embedding.len()
                        )));
                    }
                }
                file.records
            }
            _ => return Err(corrupt("expected a JSON object or array".into())),
        };

        let store = Self::from_records(records).map_err(|e| corrupt(e.to_string()))?;
        info!(path = %path.display(), records = store.size(), "loaded index");
        Ok(store)
    }

    /// Existing records whose source path does not appear in `new_records`,
    /// followed by `new_records`. The only update primitive: a path is always
    /// replaced as a whole.
    pub fn merge(&self, new_records: Vec<ChunkRecord>) -> Result<Self> {
        let replaced: HashSet<&str> = new_records.iter().map(|r| r.source_path.as_str()).collect();
        let mut records: Vec<ChunkRecord> = self
            .records
            .iter()
            .filter(|r| !replaced.contains(r.source_path.as_str()))
            .cloned()
            .collect();
        records.extend(new_records);
        Self::from_records(records)
    }

    /// Atomically replace the file at `path` with this store.
    pub fn persist(&self, path: &Path) -> Result<()> {
        let persist_err = |source: std::io::Error| Error::Persist { path: path.to_path_buf(), source };
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).map_err(persist_err)?;

        let body = serde_json::to_vec(&StoreFileOut {
            version: STORE_FORMAT_VERSION,
            dimension: self.dimension(),
            updated_at: chrono::Utc::now().to_rfc3339(),
            records: &self.records,
        })?;

        let mut tmp = NamedTempFile::new_in(&parent).map_err(persist_err)?;
        tmp.write_all(&body).map_err(persist_err)?;
        tmp.as_file().sync_all().map_err(persist_err)?;
        tmp.persist(path).map_err(|e| persist_err(e.error))?;
        debug!(path = %path.display(), records = self.size(), bytes = body.len(), "persisted index");
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn size(&self) -> usize {
        self.records.len()
    }

    /// Embedding length shared by every record, `None` when empty.
    pub fn dimension(&self) -> Option<usize> {
        self.records.first().map(|r| r.embedding.len())
    }

    pub fn records(&self) -> &[ChunkRecord] {
        &self.records
    }

    /// Number of records originating from `source_path`.
    pub fn count_for(&self, source_path: &str) -> usize {
        self.records.iter().filter(|r| r.source_path == source_path).count()
    }
}

fn check_dimensions(records: &[ChunkRecord]) -> Result<()> {
    let Some(expected) = records.first().map(|r| r.embedding.len()) else {
        return Ok(());
    };
    match records.iter().find(|r| r.embedding.len() != expected) {
        Some(odd) => Err(Error::DimensionMismatch { expected, actual: odd.embedding.len() }),
        None => Ok(()),
    }
}

/// Process-wide owner of the store: the index path plus the current
/// in-memory snapshot.
///
/// Readers take a cheap [`Arc`] snapshot and never block a running index;
/// they may observe the pre-run store until [`StoreHandle::commit`] swaps it.
/// Writers go through [`StoreHandle::begin_run`]: one index run per store.
pub struct StoreHandle {
    path: PathBuf,
    current: RwLock<Arc<VectorStore>>,
    indexing: Arc<AtomicBool>,
}

/// Holds a store's in-flight flag for the lifetime of one index run.
pub struct RunGuard(Arc<AtomicBool>);

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl StoreHandle {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let store = VectorStore::load(&path)?;
        Ok(Self::with_store(path, store))
    }

    pub fn with_store(path: impl Into<PathBuf>, store: VectorStore) -> Self {
        Self {
            path: path.into(),
            current: RwLock::new(Arc::new(store)),
            indexing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Claim the store for an index run, or [`Error::Busy`] if another run
    /// (from any pipeline) holds it.
    pub fn begin_run(&self) -> Result<RunGuard> {
        self.indexing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| RunGuard(self.indexing.clone()))
            .map_err(|_| Error::Busy)
    }

    pub fn is_indexing(&self) -> bool {
        self.indexing.load(Ordering::Acquire)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn snapshot(&self) -> Arc<VectorStore> {
        self.current.read().await.clone()
    }

    pub async fn status(&self) -> IndexStatus {
        let store = self.snapshot().await;
        IndexStatus { has_index: !store.is_empty(), count: store.size() }
    }

    /// Persist `store`, then make it the current snapshot. On a persist
    /// failure the in-memory store is left untouched.
    pub async fn commit(&self, store: VectorStore) -> Result<Arc<VectorStore>> {
        let store = Arc::new(store);
        let to_write = store.clone();
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || to_write.persist(&path))
            .await
            .map_err(|e| Error::Persist {
                path: self.path.clone(),
                source: std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
            })??;
        *self.current.write().await = store.clone();
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(path: &str, n: usize, dim: usize) -> ChunkRecord {
        ChunkRecord {
            id: format!("{path}#{n}"),
            source_path: path.to_string(),
            source_name: path.rsplit('/').next().unwrap_or(path).to_string(),
            embedding: vec![0.5; dim],
            preview_text: format!("chunk {n} of {path}"),
        }
    }

    #[test]
    fn merge_replaces_whole_paths() {
        let existing = VectorStore::from_records(vec![rec("a", 0, 2), rec("a", 1, 2), rec("b", 0, 2)]).unwrap();
        let merged = existing.merge(vec![rec("a", 7, 2), rec("c", 0, 2)]).unwrap();
        let ids: Vec<&str> = merged.records().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b#0", "a#7", "c#0"]);
    }

    #[test]
    fn merge_rejects_mixed_dimensions() {
        let existing = VectorStore::from_records(vec![rec("a", 0, 2)]).unwrap();
        let err = existing.merge(vec![rec("b", 0, 3)]).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 2, actual: 3 }));
        // replacing every record is allowed to change the dimension
        assert_eq!(existing.merge(vec![rec("a", 1, 3)]).unwrap().dimension(), Some(3));
    }
}
