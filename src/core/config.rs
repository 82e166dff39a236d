use serde::{Deserialize, Serialize};

use crate::{
    DEFAULT_CACHE_SIZE, DEFAULT_CACHE_TTL, DEFAULT_EMBEDDING_MODEL, DEFAULT_GEMINI_URL,
    DEFAULT_HELIX_PORT, DEFAULT_LLM_MODEL, DEFAULT_OLLAMA_URL, DEFAULT_RAG_TOP_K,
};

/// Process-wide configuration. Pure pass-through values: nothing in here
/// branches, it is read once at startup by the entry point and handed to
/// the component constructors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WayfarerConfig {
    // LLM provider
    pub llm_provider: String,
    pub llm_model: String,
    pub llm_api_key: Option<String>,
    pub llm_base_url: Option<String>,
    pub llm_temperature: f64,
    pub llm_max_tokens: u32,

    // Local fallback provider
    pub llm_fallback_enabled: bool,
    pub llm_fallback_url: String,
    pub llm_fallback_model: String,

    // Embeddings
    pub embedding_provider: String,
    pub embedding_model: String,
    pub embedding_url: String,
    pub embedding_api_key: Option<String>,
    pub embedding_cache_size: usize,
    pub embedding_cache_ttl: u64,

    pub embedding_fallback_enabled: bool,
    pub embedding_fallback_url: String,
    pub embedding_fallback_model: String,

    // Vector index
    pub index_backend: String,
    pub helix_host: String,
    pub helix_port: u16,

    // Data sources
    pub catalog_path: String,
    pub kb_dir: String,
    pub visa_rules_path: String,

    // Tool limits
    pub rag_top_k: usize,
    pub rag_chunk_size: usize,
    pub max_results_shown: usize,

    pub timeout: u64,
}

impl WayfarerConfig {
    pub fn new() -> Self {
        Self {
            llm_provider: "gemini".to_string(),
            llm_model: DEFAULT_LLM_MODEL.to_string(),
            llm_api_key: None,
            llm_base_url: None,
            llm_temperature: 0.7,
            llm_max_tokens: 2048,

            llm_fallback_enabled: true,
            llm_fallback_url: DEFAULT_OLLAMA_URL.to_string(),
            llm_fallback_model: "llama3.2".to_string(),

            embedding_provider: "gemini".to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_url: DEFAULT_GEMINI_URL.to_string(),
            embedding_api_key: None,
            embedding_cache_size: DEFAULT_CACHE_SIZE,
            embedding_cache_ttl: DEFAULT_CACHE_TTL,

            embedding_fallback_enabled: true,
            embedding_fallback_url: DEFAULT_OLLAMA_URL.to_string(),
            embedding_fallback_model: "nomic-embed-text".to_string(),

            index_backend: "helix".to_string(),
            helix_host: "localhost".to_string(),
            helix_port: DEFAULT_HELIX_PORT,

            catalog_path: "data/flights.json".to_string(),
            kb_dir: "data/knowledge_base".to_string(),
            visa_rules_path: "data/visa_rules.md".to_string(),

            rag_top_k: DEFAULT_RAG_TOP_K,
            rag_chunk_size: 600,
            max_results_shown: 5,

            timeout: 30,
        }
    }

    /// Build from `WAYFARER_*` environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Self {
        let mut config = Self::new();

        if let Ok(provider) = std::env::var("WAYFARER_LLM_PROVIDER") {
            config.llm_provider = provider;
        }
        if let Ok(model) = std::env::var("WAYFARER_LLM_MODEL") {
            config.llm_model = model;
        }
        if let Ok(key) = std::env::var("WAYFARER_LLM_API_KEY") {
            config.llm_api_key = Some(key);
        }
        if let Ok(url) = std::env::var("WAYFARER_LLM_BASE_URL") {
            config.llm_base_url = Some(url);
        }
        if let Ok(temp) = std::env::var("WAYFARER_LLM_TEMPERATURE") {
            if let Ok(parsed) = temp.parse() {
                config.llm_temperature = parsed;
            }
        }
        if let Ok(provider) = std::env::var("WAYFARER_EMBEDDING_PROVIDER") {
            config.embedding_provider = provider;
        }
        if let Ok(model) = std::env::var("WAYFARER_EMBEDDING_MODEL") {
            config.embedding_model = model;
        }
        if let Ok(url) = std::env::var("WAYFARER_EMBEDDING_URL") {
            config.embedding_url = url;
        }
        if let Ok(key) = std::env::var("WAYFARER_EMBEDDING_API_KEY") {
            config.embedding_api_key = Some(key);
        }
        if let Ok(backend) = std::env::var("WAYFARER_INDEX_BACKEND") {
            config.index_backend = backend;
        }
        if let Ok(host) = std::env::var("WAYFARER_HELIX_HOST") {
            config.helix_host = host;
        }
        if let Ok(port) = std::env::var("WAYFARER_HELIX_PORT") {
            if let Ok(parsed) = port.parse() {
                config.helix_port = parsed;
            }
        }
        if let Ok(path) = std::env::var("WAYFARER_CATALOG_PATH") {
            config.catalog_path = path;
        }
        if let Ok(dir) = std::env::var("WAYFARER_KB_DIR") {
            config.kb_dir = dir;
        }
        if let Ok(top_k) = std::env::var("WAYFARER_RAG_TOP_K") {
            if let Ok(parsed) = top_k.parse() {
                config.rag_top_k = parsed;
            }
        }

        // The Gemini key doubles for embeddings unless set separately.
        if config.embedding_api_key.is_none() {
            config.embedding_api_key = config.llm_api_key.clone();
        }

        config
    }
}

impl Default for WayfarerConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WayfarerConfig::new();
        assert_eq!(config.llm_provider, "gemini");
        assert_eq!(config.rag_top_k, 3);
        assert_eq!(config.max_results_shown, 5);
        assert_eq!(config.rag_chunk_size, 600);
    }
}
