//! Knowledge-base ingestion: markdown files in, embedded chunks out.
//! The chunking policy is a fixed preprocessing step; retrieval quality
//! tuning happens elsewhere.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use text_splitter::MarkdownSplitter;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::index::{IndexedDocument, VectorIndex, VectorIndexError};
use crate::llm::embeddings::{Embedder, EmbeddingError};

#[derive(Error, Debug)]
pub enum KbError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Index upsert failed: {0}")]
    Index(#[from] VectorIndexError),
}

pub struct KnowledgeBaseIngestor {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    chunk_size: usize,
}

impl KnowledgeBaseIngestor {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>, chunk_size: usize) -> Self {
        Self {
            embedder,
            index,
            chunk_size,
        }
    }

    /// Split markdown into chunks of at most `chunk_size` characters,
    /// keeping headed sections together where they fit.
    pub fn chunk_markdown(&self, text: &str) -> Vec<String> {
        let splitter = MarkdownSplitter::new(self.chunk_size);
        splitter
            .chunks(text)
            .map(str::to_string)
            .filter(|c| !c.trim().is_empty())
            .collect()
    }

    fn chunk_file(&self, path: &Path) -> Result<Vec<(String, String)>, KbError> {
        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let text = std::fs::read_to_string(path).map_err(|source_err| KbError::Io {
            path: path.display().to_string(),
            source: source_err,
        })?;
        Ok(self
            .chunk_markdown(&text)
            .into_iter()
            .map(|chunk| (chunk, source.clone()))
            .collect())
    }

    /// Ingest every `*.md` file under `kb_dir` plus the standalone visa
    /// rules file. Returns the number of chunks indexed; zero when no
    /// source material was found (a warning, not an error).
    pub async fn ingest(
        &self,
        kb_dir: impl AsRef<Path>,
        visa_rules_path: impl AsRef<Path>,
        reset: bool,
    ) -> Result<usize, KbError> {
        let kb_dir = kb_dir.as_ref();
        let visa_rules_path = visa_rules_path.as_ref();

        let mut pairs: Vec<(String, String)> = Vec::new();

        if kb_dir.is_dir() {
            let mut paths: Vec<_> = std::fs::read_dir(kb_dir)
                .map_err(|source| KbError::Io {
                    path: kb_dir.display().to_string(),
                    source,
                })?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.extension().is_some_and(|ext| ext == "md"))
                .collect();
            paths.sort();
            for path in paths {
                pairs.extend(self.chunk_file(&path)?);
            }
        } else {
            warn!("Knowledge base directory not found: {}", kb_dir.display());
        }

        if visa_rules_path.is_file() {
            pairs.extend(self.chunk_file(visa_rules_path)?);
        }

        if pairs.is_empty() {
            warn!("No knowledge base chunks loaded; check paths");
            return Ok(0);
        }

        if reset {
            self.index.reset().await?;
        }

        let texts: Vec<String> = pairs.iter().map(|(chunk, _)| chunk.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;

        let documents: Vec<IndexedDocument> = pairs
            .into_iter()
            .zip(vectors)
            .map(|((content, source), vector)| IndexedDocument {
                id: Uuid::new_v4().to_string(),
                content,
                vector,
                metadata: HashMap::from([("source".to_string(), source)]),
            })
            .collect();

        let count = documents.len();
        self.index.upsert(documents).await?;
        info!("Knowledge base initialized with {} chunks", count);
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::index::InMemoryVectorIndex;

    struct StubEmbedder;

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Ok(vec![1.0, 0.0])
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    fn ingestor(index: Arc<InMemoryVectorIndex>) -> KnowledgeBaseIngestor {
        KnowledgeBaseIngestor::new(Arc::new(StubEmbedder), index, 120)
    }

    #[test]
    fn test_chunk_markdown_respects_size() {
        let ingestor = ingestor(Arc::new(InMemoryVectorIndex::new()));
        let text = "## Visas\n\nLong paragraph. ".repeat(30);
        let chunks = ingestor.chunk_markdown(&text);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.chars().count() <= 120));
    }

    #[test]
    fn test_chunk_markdown_keeps_small_sections_whole() {
        let ingestor = ingestor(Arc::new(InMemoryVectorIndex::new()));
        let chunks = ingestor.chunk_markdown("## Baggage\n\nTwo bags allowed.");
        assert_eq!(chunks.len(), 1);
    }

    #[tokio::test]
    async fn test_ingest_directory() {
        let dir = std::env::temp_dir().join(format!("wayfarer-kb-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("policies.md"),
            "## Refunds\n\nRefundable fares can be cancelled for free.",
        )
        .unwrap();
        let visa_rules = dir.join("visa_rules.md");
        std::fs::write(&visa_rules, "## Japan\n\n90 days visa-free.").unwrap();

        let index = Arc::new(InMemoryVectorIndex::new());
        let count = ingestor(index.clone())
            .ingest(&dir, &visa_rules, true)
            .await
            .unwrap();

        assert!(count >= 2);
        assert_eq!(index.len(), count);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_ingest_missing_sources_is_zero() {
        let index = Arc::new(InMemoryVectorIndex::new());
        let count = ingestor(index.clone())
            .ingest("/nonexistent/kb", "/nonexistent/visa.md", false)
            .await
            .unwrap();
        assert_eq!(count, 0);
        assert!(index.is_empty());
    }
}
