//! Vector similarity index behind the knowledge base. The trait is the
//! seam: the RAG tool neither knows nor cares whether documents live in
//! HelixDB or in process memory.

pub mod helix;
pub mod memory;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::config::WayfarerConfig;
use crate::core::error::WayfarerError;

pub use helix::HelixVectorIndex;
pub use memory::InMemoryVectorIndex;

#[derive(Error, Debug)]
pub enum VectorIndexError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Retry exhausted after {0} attempts: {1}")]
    RetryExhausted(u32, String),
}

/// A document handed to the index: raw text, its embedding and free-form
/// source metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedDocument {
    pub id: String,
    pub content: String,
    pub vector: Vec<f32>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// One retrieval hit. `distance` is 0 for an exact match and grows with
/// dissimilarity; backends must return hits ordered nearest-first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredDocument {
    pub content: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub distance: f64,
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn upsert(&self, documents: Vec<IndexedDocument>) -> Result<(), VectorIndexError>;

    /// Top-k nearest documents by embedding. `metadata_filter` restricts
    /// candidates to documents carrying every given key/value pair.
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        metadata_filter: Option<&HashMap<String, String>>,
    ) -> Result<Vec<ScoredDocument>, VectorIndexError>;

    /// Drop every indexed document (used by ingestion's reset-first mode).
    async fn reset(&self) -> Result<(), VectorIndexError>;

    fn backend_name(&self) -> &'static str;
}

pub struct VectorIndexFactory;

impl VectorIndexFactory {
    pub fn from_config(config: &WayfarerConfig) -> Result<Arc<dyn VectorIndex>, WayfarerError> {
        match config.index_backend.as_str() {
            "helix" => Ok(Arc::new(HelixVectorIndex::new(
                &config.helix_host,
                config.helix_port,
            )?)),
            "memory" => Ok(Arc::new(InMemoryVectorIndex::new())),
            other => Err(WayfarerError::Config(format!(
                "Unknown index backend: {other}. Supported: helix, memory"
            ))),
        }
    }
}
