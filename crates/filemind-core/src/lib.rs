//! Shared building blocks for filemind: domain types, the error taxonomy,
//! layered configuration, collaborator traits, and the pure text/file
//! utilities (chunking, directory walking, extraction, keyword scan).

pub mod chunker;
pub mod config;
pub mod error;
pub mod extract;
pub mod scan;
pub mod traits;
pub mod types;
pub mod walk;

pub use error::{Error, ExtractError, ProviderError, Result};
