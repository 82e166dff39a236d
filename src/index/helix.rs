//! HelixDB-backed vector index. Queries are named HelixDB queries with
//! bounded exponential-backoff retry, matching the deployment's schema:
//! `upsert_travel_chunks`, `search_travel_chunks`, `drop_travel_chunks`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use helix_rs::{HelixDB, HelixDBClient};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{debug, info};

use super::{IndexedDocument, ScoredDocument, VectorIndex, VectorIndexError};

const MAX_RETRIES: u32 = 3;
const INITIAL_RETRY_DELAY_MS: u64 = 100;
const MAX_RETRY_DELAY_MS: u64 = 10_000;

#[derive(Serialize)]
struct UpsertParams {
    documents: Vec<IndexedDocument>,
}

#[derive(Serialize)]
struct SearchParams {
    vector: Vec<f32>,
    k: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<HashMap<String, String>>,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    documents: Vec<ScoredDocument>,
}

pub struct HelixVectorIndex {
    inner: HelixDB,
    is_connected: AtomicBool,
    base_url: String,
}

impl HelixVectorIndex {
    pub fn new(host: &str, port: u16) -> Result<Self, VectorIndexError> {
        let endpoint = format!("http://{host}");
        let base_url = format!("http://{host}:{port}");

        let inner = <HelixDB as HelixDBClient>::new(Some(&endpoint), Some(port), None);

        info!("Helix vector index created for {}", base_url);

        Ok(Self {
            inner,
            is_connected: AtomicBool::new(false),
            base_url,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.is_connected.load(Ordering::Relaxed)
    }

    async fn execute_query<T, P>(
        &self,
        query_name: &str,
        params: &P,
    ) -> Result<T, VectorIndexError>
    where
        T: DeserializeOwned,
        P: Serialize + Sync,
    {
        let mut last_error = None;
        let mut delay = Duration::from_millis(INITIAL_RETRY_DELAY_MS);

        for attempt in 1..=MAX_RETRIES {
            debug!("Executing query: {} (attempt {})", query_name, attempt);

            match self.inner.query::<P, T>(query_name, params).await {
                Ok(result) => {
                    if !self.is_connected.load(Ordering::Relaxed) {
                        self.is_connected.store(true, Ordering::Relaxed);
                    }
                    return Ok(result);
                }
                Err(e) => {
                    let err_str = e.to_string();

                    // Not-found responses are definitive, not transient.
                    if err_str.contains("not found") || err_str.contains("No value") {
                        return Err(VectorIndexError::Query(err_str));
                    }

                    debug!(
                        "Query {} failed (attempt {}/{}): {}",
                        query_name, attempt, MAX_RETRIES, e
                    );
                    last_error = Some(err_str);

                    if attempt < MAX_RETRIES {
                        tokio::time::sleep(delay).await;
                        delay = (delay * 2).min(Duration::from_millis(MAX_RETRY_DELAY_MS));
                    }
                }
            }
        }

        Err(VectorIndexError::RetryExhausted(
            MAX_RETRIES,
            last_error.unwrap_or_else(|| "Unknown error".to_string()),
        ))
    }
}

#[async_trait]
impl VectorIndex for HelixVectorIndex {
    async fn upsert(&self, documents: Vec<IndexedDocument>) -> Result<(), VectorIndexError> {
        let count = documents.len();
        let params = UpsertParams { documents };
        let _: serde_json::Value = self.execute_query("upsert_travel_chunks", &params).await?;
        info!("Upserted {} documents into {}", count, self.base_url);
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        metadata_filter: Option<&HashMap<String, String>>,
    ) -> Result<Vec<ScoredDocument>, VectorIndexError> {
        let params = SearchParams {
            vector: vector.to_vec(),
            k: top_k,
            filter: metadata_filter.cloned(),
        };
        let response: SearchResponse =
            self.execute_query("search_travel_chunks", &params).await?;
        debug!("Retrieved {} documents", response.documents.len());
        Ok(response.documents)
    }

    async fn reset(&self) -> Result<(), VectorIndexError> {
        let _: serde_json::Value = self
            .execute_query("drop_travel_chunks", &serde_json::json!({}))
            .await?;
        info!("Dropped all indexed documents at {}", self.base_url);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "helix"
    }
}
