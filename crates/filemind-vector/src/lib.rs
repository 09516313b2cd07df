//! Vector store, indexing pipeline and retrieval engine.

pub mod pipeline;
pub mod retrieval;
pub mod store;

pub use pipeline::{chunk_id, IndexingPipeline, PipelineOptions};
pub use retrieval::{cosine_similarity, rank, RetrievedChunk, Retriever, MAX_RESULTS, MIN_SCORE, PREVIEW_CHARS};
pub use store::{RunGuard, StoreHandle, VectorStore, STORE_FORMAT_VERSION};
