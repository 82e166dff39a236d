pub mod base;
pub mod fallback;
pub mod gemini;
pub mod ollama;

pub use base::{LlmMetadata, LlmProvider, LlmProviderError};
pub use fallback::LlmProviderWithFallback;
pub use gemini::GeminiProvider;
pub use ollama::OllamaProvider;
