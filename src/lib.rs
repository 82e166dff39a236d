//! Wayfarer - conversational travel assistant.
//!
//! A user turn flows through a routing graph: intent classification, then
//! either structured flight search, retrieval-augmented question answering,
//! or a clarification request. Collaborators (LLM provider, embedding
//! generator, vector index, flight catalog) are injected at construction
//! time by the process entry point.

pub mod agent;
pub mod catalog;
pub mod core;
pub mod index;
pub mod kb;
pub mod llm;
pub mod tools;
pub mod utils;

pub use utils::{normalize_city, safe_truncate, safe_truncate_ellipsis};

pub use agent::TravelAgent;
pub use agent::state::{ChatMessage, ChatRole, Intent, TurnState};
pub use catalog::{Flight, FlightCatalog};
pub use core::config::WayfarerConfig;
pub use core::error::{Result, WayfarerError};
pub use index::{IndexedDocument, ScoredDocument, VectorIndex};
pub use llm::embeddings::EmbeddingGenerator;
pub use tools::criteria::FlightCriteria;
pub use tools::flight_search::{FlightSearchEngine, ScoredFlight};
pub use tools::rag::{RagResult, RagTool};

/// Default Gemini chat model.
pub const DEFAULT_LLM_MODEL: &str = "gemini-2.5-flash";

/// Default Gemini embedding model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "gemini-embedding-001";

/// Default Gemini API endpoint.
pub const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com";

/// Default local Ollama endpoint (fallback provider).
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Default HelixDB port.
pub const DEFAULT_HELIX_PORT: u16 = 6969;

/// Default embedding cache capacity.
pub const DEFAULT_CACHE_SIZE: usize = 1000;

/// Default embedding cache TTL in seconds.
pub const DEFAULT_CACHE_TTL: u64 = 300;

/// How many documents the RAG tool retrieves by default.
pub const DEFAULT_RAG_TOP_K: usize = 3;

/// How many recent messages form the conversation context window.
pub const CONVERSATION_CONTEXT_MESSAGES: usize = 6;
