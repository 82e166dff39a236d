use std::sync::Arc;

use super::embeddings::EmbeddingGenerator;
use super::providers::base::LlmProvider;
use super::providers::fallback::LlmProviderWithFallback;
use super::providers::gemini::GeminiProvider;
use super::providers::ollama::OllamaProvider;
use crate::DEFAULT_OLLAMA_URL;
use crate::core::config::WayfarerConfig;
use crate::core::error::WayfarerError;

pub struct LlmProviderFactory;

impl LlmProviderFactory {
    pub fn create(
        provider: &str,
        model: &str,
        api_key: Option<&str>,
        base_url: Option<&str>,
        temperature: f64,
        max_tokens: u32,
    ) -> Result<Arc<dyn LlmProvider>, WayfarerError> {
        match provider {
            "gemini" => Ok(Arc::new(GeminiProvider::new(
                api_key.unwrap_or_default(),
                model,
                base_url.map(String::from),
                temperature,
                max_tokens,
            ))),
            "ollama" => Ok(Arc::new(OllamaProvider::new(
                base_url.unwrap_or(DEFAULT_OLLAMA_URL),
                model,
                temperature,
            ))),
            other => Err(WayfarerError::Config(format!(
                "Unknown LLM provider: {other}. Supported: gemini, ollama"
            ))),
        }
    }

    /// Build the full provider stack from config: primary wrapped with the
    /// local fallback when enabled.
    pub fn from_config(config: &WayfarerConfig) -> Result<Arc<dyn LlmProvider>, WayfarerError> {
        let primary = Self::create(
            &config.llm_provider,
            &config.llm_model,
            config.llm_api_key.as_deref(),
            config.llm_base_url.as_deref(),
            config.llm_temperature,
            config.llm_max_tokens,
        )?;

        if !config.llm_fallback_enabled {
            return Ok(primary);
        }

        Ok(Arc::new(LlmProviderWithFallback::new(
            primary,
            true,
            Some(config.llm_fallback_url.clone()),
            Some(config.llm_fallback_model.clone()),
            config.llm_temperature,
        )))
    }
}

pub struct EmbeddingProviderFactory;

impl EmbeddingProviderFactory {
    pub fn from_config(config: &WayfarerConfig) -> EmbeddingGenerator {
        EmbeddingGenerator::new(
            config.embedding_provider.clone(),
            config.embedding_url.clone(),
            config.embedding_model.clone(),
            config.embedding_api_key.clone(),
            config.timeout,
            config.embedding_cache_size,
            config.embedding_cache_ttl,
            config.embedding_fallback_enabled,
            Some(config.embedding_fallback_url.clone()),
            Some(config.embedding_fallback_model.clone()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_ollama_provider() {
        let provider =
            LlmProviderFactory::create("ollama", "llama3.2", None, None, 0.7, 2048).unwrap();
        assert_eq!(provider.provider_name(), "ollama");
        assert_eq!(provider.model_name(), "llama3.2");
    }

    #[test]
    fn test_unknown_provider_is_config_error() {
        let result = LlmProviderFactory::create("watson", "m", None, None, 0.7, 2048);
        assert!(matches!(result, Err(WayfarerError::Config(_))));
    }
}
