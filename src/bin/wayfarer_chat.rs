//! Interactive chat front-end. Owns collaborator lifecycle: everything
//! is constructed here and injected into the agent.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use wayfarer::index::VectorIndexFactory;
use wayfarer::kb::KnowledgeBaseIngestor;
use wayfarer::llm::embeddings::Embedder;
use wayfarer::llm::factory::{EmbeddingProviderFactory, LlmProviderFactory};
use wayfarer::tools::criteria::CriteriaExtractor;
use wayfarer::{
    ChatMessage, FlightCatalog, FlightSearchEngine, RagTool, TravelAgent, TurnState,
    WayfarerConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::from_default_env().add_directive("wayfarer=info".parse()?),
        )
        .init();

    let config = WayfarerConfig::from_env();

    // No catalog, no assistant: startup aborts on a missing or malformed
    // flight file.
    let catalog = Arc::new(FlightCatalog::load(&config.catalog_path)?);

    let llm = LlmProviderFactory::from_config(&config)?;
    let embedder: Arc<dyn Embedder> = Arc::new(EmbeddingProviderFactory::from_config(&config));
    let index = VectorIndexFactory::from_config(&config)?;

    // Seed the in-process index when it is the configured backend; a
    // HelixDB deployment is populated by wayfarer-ingest instead.
    if config.index_backend == "memory" {
        let ingestor =
            KnowledgeBaseIngestor::new(embedder.clone(), index.clone(), config.rag_chunk_size);
        ingestor
            .ingest(&config.kb_dir, &config.visa_rules_path, false)
            .await?;
    }

    let agent = TravelAgent::new(
        llm.clone(),
        CriteriaExtractor::new(llm.clone()),
        FlightSearchEngine::new(catalog),
        RagTool::new(llm, embedder, index, config.rag_top_k),
    )
    .with_max_results_shown(config.max_results_shown);

    let stdin = io::stdin();
    let mut messages: Vec<ChatMessage> = Vec::new();

    println!("Travel Assistant. Type your message and press Enter (Ctrl+D or 'exit' to quit).\n");

    loop {
        print!("You: ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if matches!(input.to_lowercase().as_str(), "exit" | "quit" | "q") {
            break;
        }

        let state = TurnState::for_query(messages.clone(), input);
        let result = agent.run_turn(state).await;
        let response = result
            .final_response
            .unwrap_or_else(|| "I couldn't process your request.".to_string());

        println!("Assistant: {response}");

        messages.push(ChatMessage::user(input));
        messages.push(ChatMessage::assistant(response));
    }

    Ok(())
}
