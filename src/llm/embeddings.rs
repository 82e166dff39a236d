//! Embedding generation for knowledge-base retrieval. A single shared
//! generator serves all turns; results are cached by content hash.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{DEFAULT_CACHE_SIZE, DEFAULT_CACHE_TTL, DEFAULT_OLLAMA_URL};

const DEFAULT_FALLBACK_MODEL: &str = "nomic-embed-text";

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Empty text")]
    EmptyText,

    #[error("Unknown embedding provider: {0}")]
    UnknownProvider(String),

    #[error("Both primary and fallback failed: primary={0}, fallback={1}")]
    BothFailed(String, String),
}

#[derive(Serialize)]
struct GeminiEmbedRequest<'a> {
    content: GeminiEmbedContent<'a>,
}

#[derive(Serialize)]
struct GeminiEmbedContent<'a> {
    parts: Vec<GeminiEmbedPart<'a>>,
}

#[derive(Serialize)]
struct GeminiEmbedPart<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GeminiEmbedResponse {
    embedding: GeminiEmbeddingValues,
}

#[derive(Deserialize)]
struct GeminiEmbeddingValues {
    values: Vec<f32>,
}

#[derive(Serialize)]
struct GeminiBatchEmbedRequest<'a> {
    requests: Vec<GeminiBatchEmbedEntry<'a>>,
}

#[derive(Serialize)]
struct GeminiBatchEmbedEntry<'a> {
    model: String,
    content: GeminiEmbedContent<'a>,
}

#[derive(Deserialize)]
struct GeminiBatchEmbedResponse {
    embeddings: Vec<GeminiEmbeddingValues>,
}

#[derive(Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embedding: Vec<f32>,
}

/// The embedding seam. Retrieval and ingestion depend on this rather
/// than on a concrete HTTP generator.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

struct CacheEntry {
    embedding: Vec<f32>,
    created_at: Instant,
}

struct EmbeddingCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
    ttl: Duration,
}

impl EmbeddingCache {
    fn new(max_size: usize, ttl_secs: u64) -> Self {
        let capacity = NonZeroUsize::new(max_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl: Duration::from_secs(ttl_secs),
        }
    }

    fn key(text: &str) -> String {
        format!("{:x}", Sha256::digest(text.as_bytes()))
    }

    fn get(&self, text: &str) -> Option<Vec<f32>> {
        let key = Self::key(text);
        let mut entries = self.entries.lock();
        let expired = match entries.get(&key) {
            Some(entry) if entry.created_at.elapsed() < self.ttl => {
                return Some(entry.embedding.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(&key);
        }
        None
    }

    fn put(&self, text: &str, embedding: Vec<f32>) {
        self.entries.lock().put(
            Self::key(text),
            CacheEntry {
                embedding,
                created_at: Instant::now(),
            },
        );
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

pub struct EmbeddingGenerator {
    provider: String,
    model: String,
    base_url: String,
    api_key: Option<String>,
    client: Client,
    cache: EmbeddingCache,

    fallback_enabled: bool,
    fallback_url: String,
    fallback_model: String,
    using_fallback: AtomicBool,
    fallback_count: AtomicUsize,
}

impl EmbeddingGenerator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        provider: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout_secs: u64,
        cache_size: usize,
        cache_ttl: u64,
        fallback_enabled: bool,
        fallback_url: Option<String>,
        fallback_model: Option<String>,
    ) -> Self {
        let provider = provider.into().to_lowercase();
        let model = model.into();
        info!("Embedding generator initialized (provider={}, model={})", provider, model);

        Self {
            provider,
            model,
            base_url: base_url.into(),
            api_key,
            client: Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .unwrap_or_default(),
            cache: EmbeddingCache::new(cache_size, cache_ttl),
            fallback_enabled,
            fallback_url: fallback_url.unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            fallback_model: fallback_model
                .unwrap_or_else(|| DEFAULT_FALLBACK_MODEL.to_string()),
            using_fallback: AtomicBool::new(false),
            fallback_count: AtomicUsize::new(0),
        }
    }

    /// Minimal constructor for local development and tests.
    pub fn ollama(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self::new(
            "ollama",
            base_url,
            model,
            None,
            30,
            DEFAULT_CACHE_SIZE,
            DEFAULT_CACHE_TTL,
            false,
            None,
            None,
        )
    }

    /// Embed one text, consulting the cache first and degrading to the
    /// fallback endpoint when the primary provider fails.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::EmptyText);
        }
        if let Some(cached) = self.cache.get(text) {
            debug!("Embedding cache hit ({} cached)", self.cache.len());
            return Ok(cached);
        }

        let embedding = match self.embed_with_provider(&self.provider, text).await {
            Ok(embedding) => {
                self.using_fallback.store(false, Ordering::SeqCst);
                embedding
            }
            Err(primary_error) if self.fallback_enabled => {
                warn!(
                    "Primary embedding provider {} failed, falling back to ollama: {}",
                    self.provider, primary_error
                );
                let fallback = self
                    .embed_ollama(&self.fallback_url, &self.fallback_model, text)
                    .await
                    .map_err(|fallback_error| {
                        EmbeddingError::BothFailed(
                            primary_error.to_string(),
                            fallback_error.to_string(),
                        )
                    })?;
                self.using_fallback.store(true, Ordering::SeqCst);
                self.fallback_count.fetch_add(1, Ordering::SeqCst);
                fallback
            }
            Err(e) => return Err(e),
        };

        self.cache.put(text, embedding.clone());
        Ok(embedding)
    }

    /// Embed several texts, using the provider's batch endpoint where one
    /// exists. Order of the output matches the input.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if self.provider == "gemini" {
            let misses: Vec<&str> = texts
                .iter()
                .map(String::as_str)
                .filter(|t| self.cache.get(t).is_none())
                .collect();
            if !misses.is_empty() {
                let fresh = self.embed_gemini_batch(&misses).await?;
                for (text, embedding) in misses.iter().zip(fresh) {
                    self.cache.put(text, embedding);
                }
            }
            return texts
                .iter()
                .map(|t| {
                    self.cache.get(t).ok_or_else(|| {
                        EmbeddingError::InvalidResponse("batch embedding missing".to_string())
                    })
                })
                .collect();
        }

        let jobs = texts.iter().map(|t| self.embed(t));
        futures::future::try_join_all(jobs).await
    }

    pub fn is_using_fallback(&self) -> bool {
        self.using_fallback.load(Ordering::SeqCst)
    }

    pub fn fallback_count(&self) -> usize {
        self.fallback_count.load(Ordering::SeqCst)
    }

    async fn embed_with_provider(
        &self,
        provider: &str,
        text: &str,
    ) -> Result<Vec<f32>, EmbeddingError> {
        match provider {
            "gemini" => self.embed_gemini(text).await,
            "ollama" => self.embed_ollama(&self.base_url, &self.model, text).await,
            other => Err(EmbeddingError::UnknownProvider(other.to_string())),
        }
    }

    async fn embed_gemini(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let url = format!("{}/v1beta/models/{}:embedContent", self.base_url, self.model);
        let request = GeminiEmbedRequest {
            content: GeminiEmbedContent {
                parts: vec![GeminiEmbedPart { text }],
            },
        };
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.api_key.as_deref().unwrap_or_default())
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json::<GeminiEmbedResponse>()
            .await?;

        if response.embedding.values.is_empty() {
            return Err(EmbeddingError::InvalidResponse("empty embedding".to_string()));
        }
        Ok(response.embedding.values)
    }

    async fn embed_gemini_batch(
        &self,
        texts: &[&str],
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let url = format!(
            "{}/v1beta/models/{}:batchEmbedContents",
            self.base_url, self.model
        );
        let request = GeminiBatchEmbedRequest {
            requests: texts
                .iter()
                .map(|&text| GeminiBatchEmbedEntry {
                    model: format!("models/{}", self.model),
                    content: GeminiEmbedContent {
                        parts: vec![GeminiEmbedPart { text }],
                    },
                })
                .collect(),
        };
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.api_key.as_deref().unwrap_or_default())
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json::<GeminiBatchEmbedResponse>()
            .await?;

        if response.embeddings.len() != texts.len() {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                response.embeddings.len()
            )));
        }
        Ok(response.embeddings.into_iter().map(|e| e.values).collect())
    }

    async fn embed_ollama(
        &self,
        base_url: &str,
        model: &str,
        text: &str,
    ) -> Result<Vec<f32>, EmbeddingError> {
        let request = OllamaEmbedRequest {
            model,
            prompt: text,
        };
        let response = self
            .client
            .post(format!("{base_url}/api/embeddings"))
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json::<OllamaEmbedResponse>()
            .await?;

        if response.embedding.is_empty() {
            return Err(EmbeddingError::InvalidResponse("empty embedding".to_string()));
        }
        Ok(response.embedding)
    }
}

#[async_trait]
impl Embedder for EmbeddingGenerator {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        EmbeddingGenerator::embed(self, text).await
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        EmbeddingGenerator::embed_batch(self, texts).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_round_trip() {
        let cache = EmbeddingCache::new(10, 300);
        assert_eq!(cache.get("hello"), None);
        cache.put("hello", vec![0.1, 0.2]);
        assert_eq!(cache.get("hello"), Some(vec![0.1, 0.2]));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_expiry() {
        let cache = EmbeddingCache::new(10, 0);
        cache.put("hello", vec![0.1]);
        assert_eq!(cache.get("hello"), None);
    }

    #[test]
    fn test_cache_eviction() {
        let cache = EmbeddingCache::new(2, 300);
        cache.put("a", vec![0.1]);
        cache.put("b", vec![0.2]);
        cache.put("c", vec![0.3]);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("c"), Some(vec![0.3]));
    }

    #[tokio::test]
    async fn test_empty_text_rejected() {
        let generator = EmbeddingGenerator::ollama("http://localhost:11434", "test-model");
        assert!(matches!(
            generator.embed("   ").await,
            Err(EmbeddingError::EmptyText)
        ));
    }
}
