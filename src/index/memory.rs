//! In-process vector index. Brute-force cosine over a small corpus is
//! plenty for local development and keeps the test suite network-free.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use super::{IndexedDocument, ScoredDocument, VectorIndex, VectorIndexError};

/// Cosine similarity mapped onto [0, 1]; mismatched or empty vectors
/// score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|y| y * y).sum::<f32>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    let similarity = f64::from(dot / (mag_a * mag_b));
    ((similarity + 1.0) / 2.0).clamp(0.0, 1.0)
}

#[derive(Default)]
pub struct InMemoryVectorIndex {
    documents: RwLock<Vec<IndexedDocument>>,
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn upsert(&self, documents: Vec<IndexedDocument>) -> Result<(), VectorIndexError> {
        let mut stored = self.documents.write();
        for document in documents {
            if let Some(existing) = stored.iter_mut().find(|d| d.id == document.id) {
                *existing = document;
            } else {
                stored.push(document);
            }
        }
        debug!("In-memory index holds {} documents", stored.len());
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        metadata_filter: Option<&HashMap<String, String>>,
    ) -> Result<Vec<ScoredDocument>, VectorIndexError> {
        let stored = self.documents.read();
        let mut hits: Vec<ScoredDocument> = stored
            .iter()
            .filter(|d| {
                metadata_filter.is_none_or(|filter| {
                    filter
                        .iter()
                        .all(|(k, v)| d.metadata.get(k) == Some(v))
                })
            })
            .map(|d| ScoredDocument {
                content: d.content.clone(),
                metadata: d.metadata.clone(),
                distance: 1.0 - cosine_similarity(vector, &d.vector),
            })
            .collect();
        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn reset(&self) -> Result<(), VectorIndexError> {
        self.documents.write().clear();
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn doc(id: &str, content: &str, vector: Vec<f32>) -> IndexedDocument {
        IndexedDocument {
            id: id.to_string(),
            content: content.to_string(),
            vector,
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn test_cosine_identical() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_cosine_orthogonal() {
        assert!((cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]) - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_cosine_mismatched_lengths() {
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_query_empty_index() {
        let index = InMemoryVectorIndex::new();
        let hits = tokio_test::block_on(index.query(&[1.0], 3, None)).unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_query_orders_by_distance() {
        let index = InMemoryVectorIndex::new();
        index
            .upsert(vec![
                doc("a", "far", vec![0.0, 1.0]),
                doc("b", "near", vec![1.0, 0.0]),
                doc("c", "middle", vec![1.0, 1.0]),
            ])
            .await
            .unwrap();

        let hits = index.query(&[1.0, 0.0], 2, None).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].content, "near");
        assert_eq!(hits[1].content, "middle");
        assert!(hits[0].distance < hits[1].distance);
    }

    #[tokio::test]
    async fn test_metadata_filter_restricts_candidates() {
        let index = InMemoryVectorIndex::new();
        let mut visa = doc("a", "visa text", vec![1.0, 0.0]);
        visa.metadata
            .insert("source".to_string(), "visa_rules.md".to_string());
        let mut policy = doc("b", "policy text", vec![1.0, 0.0]);
        policy
            .metadata
            .insert("source".to_string(), "airline_policies.md".to_string());
        index.upsert(vec![visa, policy]).await.unwrap();

        let filter = HashMap::from([("source".to_string(), "visa_rules.md".to_string())]);
        let hits = index.query(&[1.0, 0.0], 5, Some(&filter)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content, "visa text");
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_id() {
        let index = InMemoryVectorIndex::new();
        index.upsert(vec![doc("a", "old", vec![1.0])]).await.unwrap();
        index.upsert(vec![doc("a", "new", vec![1.0])]).await.unwrap();
        assert_eq!(index.len(), 1);
        let hits = index.query(&[1.0], 1, None).await.unwrap();
        assert_eq!(hits[0].content, "new");
    }

    #[tokio::test]
    async fn test_reset_empties_index() {
        let index = InMemoryVectorIndex::new();
        index.upsert(vec![doc("a", "x", vec![1.0])]).await.unwrap();
        index.reset().await.unwrap();
        assert!(index.is_empty());
        assert!(index.query(&[1.0], 3, None).await.unwrap().is_empty());
    }
}
