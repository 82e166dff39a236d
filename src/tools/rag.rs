//! Retrieval-augmented question answering over the travel knowledge
//! base: follow-up detection, similarity search, answer synthesis.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::index::{VectorIndex, VectorIndexError};
use crate::llm::embeddings::{Embedder, EmbeddingError};
use crate::llm::providers::base::{LlmProvider, LlmProviderError};
use crate::utils::safe_truncate;

/// Fixed reply when the knowledge base holds nothing relevant. Also the
/// phrase the confidence check scans generated answers for.
pub const NO_INFO_MESSAGE: &str = "I don't have that information in my knowledge base.";

/// Truncation windows for the follow-up rewrites.
const SEARCH_CONTEXT_CHARS: usize = 300;
const PROMPT_CONTEXT_CHARS: usize = 500;

const FOLLOW_UP_CUES: &[&str] = &["this", "that", "it", "mean", "explain", "what", "how"];
const FOLLOW_UP_PHRASES: &[&str] = &["what do you mean", "explain", "can you clarify"];

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Index query failed: {0}")]
    Index(#[from] VectorIndexError),

    #[error("LLM generation failed: {0}")]
    Llm(#[from] LlmProviderError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagResult {
    pub answer: String,
    pub sources: Vec<String>,
    /// Binary signal: 0.0 for no-information outcomes, 1.0 otherwise.
    pub confidence: f64,
}

impl RagResult {
    fn no_information() -> Self {
        Self {
            answer: NO_INFO_MESSAGE.to_string(),
            sources: Vec::new(),
            confidence: 0.0,
        }
    }
}

/// Heuristic: short questions leaning on a pronoun or question cue, or
/// any question carrying an explicit clarification phrase, refer back to
/// the previous answer.
pub fn is_follow_up(question: &str) -> bool {
    let q = question.trim().to_lowercase();
    if q.split_whitespace().count() <= 5 && FOLLOW_UP_CUES.iter().any(|cue| q.contains(cue)) {
        return true;
    }
    FOLLOW_UP_PHRASES.iter().any(|phrase| q.contains(phrase))
}

const RAG_SYSTEM_PROMPT: &str = r#"You are a knowledgeable travel assistant specializing in visa requirements and travel policies.

**Your guidelines:**
1. Answer ONLY using the provided context
2. If the answer is not in the context, explicitly say: "I don't have that information in my knowledge base."
3. Be specific and cite relevant details (dates, requirements, fees)
4. Use a friendly, helpful tone
5. If context mentions sources, include them in your answer
6. For visa questions, always mention passport validity requirements if available"#;

fn build_rag_prompt(context: &str, question: &str) -> String {
    format!("**Context:**\n{context}\n\n**Question:** {question}\n\n**Answer:**")
}

fn rewrite_follow_up(previous_answer: &str, question: &str) -> String {
    format!(
        "[Follow-up question. Previous assistant answer: {}]\n\
         User asks: {}\n\
         Answer in the context of the previous answer if the user is asking for clarification or more detail.",
        safe_truncate(previous_answer, PROMPT_CONTEXT_CHARS),
        question
    )
}

pub struct RagTool {
    llm: Arc<dyn LlmProvider>,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    top_k: usize,
}

impl RagTool {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        top_k: usize,
    ) -> Self {
        info!("RAG tool ready (backend={}, top_k={})", index.backend_name(), top_k);
        Self {
            llm,
            embedder,
            index,
            top_k,
        }
    }

    /// Answer a question from the knowledge base. Zero retrieved
    /// documents short-circuits to the no-information result without
    /// spending a generation call.
    pub async fn query(
        &self,
        question: &str,
        previous_assistant_message: Option<&str>,
    ) -> Result<RagResult, RagError> {
        let follow_up = previous_assistant_message
            .filter(|m| !m.is_empty())
            .filter(|_| is_follow_up(question));

        let search_query = match follow_up {
            Some(previous) => format!(
                "{} {}",
                safe_truncate(previous, SEARCH_CONTEXT_CHARS),
                question
            ),
            None => question.to_string(),
        };

        let vector = self.embedder.embed(&search_query).await?;
        let documents = self.index.query(&vector, self.top_k, None).await?;

        if documents.is_empty() {
            debug!("No documents retrieved, returning no-information result");
            return Ok(RagResult::no_information());
        }

        let context = documents
            .iter()
            .map(|d| d.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let sources: Vec<String> = documents.into_iter().map(|d| d.content).collect();

        let question_text = match follow_up {
            Some(previous) => rewrite_follow_up(previous, question),
            None => question.to_string(),
        };

        let prompt = build_rag_prompt(&context, &question_text);
        let (answer, _metadata) = self.llm.generate(RAG_SYSTEM_PROMPT, &prompt, None).await?;
        let answer = answer.trim().to_string();

        if answer.is_empty() || answer.to_lowercase().contains(&NO_INFO_MESSAGE.to_lowercase()) {
            return Ok(RagResult {
                answer: if answer.is_empty() {
                    NO_INFO_MESSAGE.to_string()
                } else {
                    answer
                },
                sources,
                confidence: 0.0,
            });
        }

        Ok(RagResult {
            answer,
            sources,
            confidence: 1.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    use crate::index::{IndexedDocument, InMemoryVectorIndex};
    use crate::llm::providers::base::LlmMetadata;

    struct CannedProvider {
        response: String,
    }

    #[async_trait]
    impl LlmProvider for CannedProvider {
        async fn generate(
            &self,
            _system_prompt: &str,
            _user_prompt: &str,
            _response_format: Option<&str>,
        ) -> Result<(String, LlmMetadata), LlmProviderError> {
            Ok((self.response.clone(), LlmMetadata::default()))
        }

        fn provider_name(&self) -> &str {
            "canned"
        }

        fn model_name(&self) -> &str {
            "canned"
        }
    }

    /// Fails the test if any generation call is attempted.
    struct UnreachableProvider;

    #[async_trait]
    impl LlmProvider for UnreachableProvider {
        async fn generate(
            &self,
            _system_prompt: &str,
            _user_prompt: &str,
            _response_format: Option<&str>,
        ) -> Result<(String, LlmMetadata), LlmProviderError> {
            unreachable!("generation must not be called");
        }

        fn provider_name(&self) -> &str {
            "unreachable"
        }

        fn model_name(&self) -> &str {
            "unreachable"
        }
    }

    #[derive(Default)]
    struct StubEmbedder {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            self.seen.lock().push(text.to_string());
            Ok(vec![1.0, 0.0])
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    async fn seeded_index() -> Arc<InMemoryVectorIndex> {
        let index = Arc::new(InMemoryVectorIndex::new());
        index
            .upsert(vec![IndexedDocument {
                id: "visa-japan".to_string(),
                content: "Japan requires a visa for stays over 90 days.".to_string(),
                vector: vec![1.0, 0.0],
                metadata: HashMap::new(),
            }])
            .await
            .unwrap();
        index
    }

    #[test]
    fn test_follow_up_short_with_cue() {
        assert!(is_follow_up("what does that mean"));
        assert!(is_follow_up("explain it"));
        assert!(is_follow_up("how?"));
    }

    #[test]
    fn test_follow_up_phrase_anywhere() {
        assert!(is_follow_up(
            "sorry, can you clarify the passport validity requirement again"
        ));
    }

    #[test]
    fn test_not_follow_up() {
        assert!(!is_follow_up("do I need a visa to travel to Japan"));
        assert!(!is_follow_up("best time of year in Tokyo please"));
    }

    #[tokio::test]
    async fn test_empty_retrieval_skips_generation() {
        let tool = RagTool::new(
            Arc::new(UnreachableProvider),
            Arc::new(StubEmbedder::default()),
            Arc::new(InMemoryVectorIndex::new()),
            3,
        );
        let result = tool.query("do I need a visa for Japan?", None).await.unwrap();
        assert_eq!(result.answer, NO_INFO_MESSAGE);
        assert!(result.sources.is_empty());
        assert_eq!(result.confidence, 0.0);
    }

    #[tokio::test]
    async fn test_confident_answer_with_sources() {
        let tool = RagTool::new(
            Arc::new(CannedProvider {
                response: "Yes, for stays over 90 days you need a visa.".to_string(),
            }),
            Arc::new(StubEmbedder::default()),
            seeded_index().await,
            3,
        );
        let result = tool.query("do I need a visa for Japan?", None).await.unwrap();
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.sources.len(), 1);
        assert!(result.sources[0].contains("90 days"));
    }

    #[tokio::test]
    async fn test_no_info_answer_zeroes_confidence() {
        let tool = RagTool::new(
            Arc::new(CannedProvider {
                response: format!("Unfortunately, {NO_INFO_MESSAGE}"),
            }),
            Arc::new(StubEmbedder::default()),
            seeded_index().await,
            3,
        );
        let result = tool.query("visa rules for Mars?", None).await.unwrap();
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.sources.len(), 1);
    }

    #[tokio::test]
    async fn test_follow_up_search_uses_previous_answer() {
        let embedder = Arc::new(StubEmbedder::default());
        let tool = RagTool::new(
            Arc::new(CannedProvider {
                response: "It means ninety days.".to_string(),
            }),
            embedder.clone(),
            seeded_index().await,
            3,
        );
        let previous = "Japan allows visa-free stays up to 90 days.";
        tool.query("what does that mean", Some(previous)).await.unwrap();

        let seen = embedder.seen.lock();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].starts_with(previous));
        assert!(seen[0].ends_with("what does that mean"));
    }

    #[tokio::test]
    async fn test_plain_question_searches_verbatim() {
        let embedder = Arc::new(StubEmbedder::default());
        let tool = RagTool::new(
            Arc::new(CannedProvider {
                response: "Answer.".to_string(),
            }),
            embedder.clone(),
            seeded_index().await,
            3,
        );
        tool.query("do I need a visa for Japan?", Some("previous answer"))
            .await
            .unwrap();
        assert_eq!(embedder.seen.lock()[0], "do I need a visa for Japan?");
    }
}
