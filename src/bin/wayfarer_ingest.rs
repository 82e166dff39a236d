//! Build the travel knowledge base: chunk the markdown sources, embed
//! them and upsert into the configured vector index.

use std::sync::Arc;

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use wayfarer::WayfarerConfig;
use wayfarer::index::VectorIndexFactory;
use wayfarer::kb::KnowledgeBaseIngestor;
use wayfarer::llm::embeddings::Embedder;
use wayfarer::llm::factory::EmbeddingProviderFactory;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::from_default_env().add_directive("wayfarer=info".parse()?),
        )
        .init();

    let config = WayfarerConfig::from_env();

    let embedder: Arc<dyn Embedder> = Arc::new(EmbeddingProviderFactory::from_config(&config));
    let index = VectorIndexFactory::from_config(&config)?;

    let ingestor = KnowledgeBaseIngestor::new(embedder, index, config.rag_chunk_size);
    let count = ingestor
        .ingest(&config.kb_dir, &config.visa_rules_path, true)
        .await?;

    println!("Indexed {count} knowledge base chunks.");
    Ok(())
}
