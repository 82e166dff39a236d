//! Decorator that retries a failed generation against a local Ollama
//! instance, so a provider outage degrades latency instead of answers.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::{info, warn};

use super::base::{LlmMetadata, LlmProvider, LlmProviderError};
use super::ollama::OllamaProvider;
use crate::DEFAULT_OLLAMA_URL;

const DEFAULT_FALLBACK_MODEL: &str = "llama3.2";

pub struct LlmProviderWithFallback {
    primary: Arc<dyn LlmProvider>,
    fallback: Option<OllamaProvider>,
    using_fallback: AtomicBool,
    fallback_count: AtomicUsize,
    primary_failures: AtomicUsize,
}

impl LlmProviderWithFallback {
    pub fn new(
        primary: Arc<dyn LlmProvider>,
        fallback_enabled: bool,
        fallback_url: Option<String>,
        fallback_model: Option<String>,
        temperature: f64,
    ) -> Self {
        let fallback = fallback_enabled.then(|| {
            let url = fallback_url.unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());
            let model = fallback_model.unwrap_or_else(|| DEFAULT_FALLBACK_MODEL.to_string());
            info!(
                "LLM fallback armed: primary={}, fallback={}/{}",
                primary.provider_name(),
                url,
                model
            );
            OllamaProvider::new(url, model, temperature)
        });

        Self {
            primary,
            fallback,
            using_fallback: AtomicBool::new(false),
            fallback_count: AtomicUsize::new(0),
            primary_failures: AtomicUsize::new(0),
        }
    }

    pub fn is_using_fallback(&self) -> bool {
        self.using_fallback.load(Ordering::SeqCst)
    }

    pub fn fallback_count(&self) -> usize {
        self.fallback_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for LlmProviderWithFallback {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        response_format: Option<&str>,
    ) -> Result<(String, LlmMetadata), LlmProviderError> {
        let primary_error = match self
            .primary
            .generate(system_prompt, user_prompt, response_format)
            .await
        {
            Ok(result) => {
                self.using_fallback.store(false, Ordering::SeqCst);
                return Ok(result);
            }
            Err(e) => {
                self.primary_failures.fetch_add(1, Ordering::SeqCst);
                e
            }
        };

        let Some(fallback) = &self.fallback else {
            return Err(primary_error);
        };

        warn!(
            "Primary provider {} failed, falling back to {}: {}",
            self.primary.provider_name(),
            fallback.model_name(),
            primary_error
        );

        let (content, mut metadata) = fallback
            .generate(system_prompt, user_prompt, response_format)
            .await?;

        metadata.fallback_used = true;
        metadata.original_provider = Some(self.primary.provider_name().to_string());
        metadata.original_error = Some(primary_error.to_string());

        self.using_fallback.store(true, Ordering::SeqCst);
        self.fallback_count.fetch_add(1, Ordering::SeqCst);

        Ok((content, metadata))
    }

    fn provider_name(&self) -> &str {
        if self.is_using_fallback() {
            "ollama-fallback"
        } else {
            self.primary.provider_name()
        }
    }

    fn model_name(&self) -> &str {
        self.primary.model_name()
    }
}
