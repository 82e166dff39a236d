use thiserror::Error;

/// Crate-level error type. Component modules carry their own narrower
/// error enums; this is what the binaries and the turn API surface.
#[derive(Error, Debug)]
pub enum WayfarerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Flight catalog error: {0}")]
    Catalog(#[from] crate::catalog::CatalogError),

    #[error("Vector index error: {0}")]
    Index(#[from] crate::index::VectorIndexError),

    #[error("LLM provider error: {0}")]
    LlmProvider(#[from] crate::llm::providers::base::LlmProviderError),

    #[error("Embedding generation error: {0}")]
    Embedding(#[from] crate::llm::embeddings::EmbeddingError),

    #[error("Criteria extraction error: {0}")]
    Extraction(#[from] crate::tools::criteria::ExtractionError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, WayfarerError>;
