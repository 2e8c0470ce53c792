//! # RAG with OpenAI
//!
//! Contextual chunking and retrieval using OpenAI embeddings and chat.
//!
//! Requires `OPENAI_API_KEY` (a `.env` file is read if present).
//!
//! Run: `cargo run -p ragdex-demos --example rag_openai --features openai`

use std::sync::Arc;

use ragdex::{
    ContextFailurePolicy, ContextualChunker, Document, OpenAIChatProvider,
    OpenAIEmbeddingProvider, RagConfig, RagPipeline, RecursiveChunker, telemetry,
};
use ragdex_demos::preview;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();

    let embedder = OpenAIEmbeddingProvider::from_env()?.with_dimensions(256);
    let chat = OpenAIChatProvider::from_env()?.with_temperature(0.0);

    let config = RagConfig::builder().chunk_size(400).chunk_overlap(40).top_k(3).build()?;
    let splitter = ContextualChunker::new(RecursiveChunker::from_config(&config), Arc::new(chat))
        .with_failure_policy(ContextFailurePolicy::Fallback);

    let pipeline = RagPipeline::builder()
        .config(config)
        .embedding_provider(Arc::new(embedder))
        .splitter(Arc::new(splitter))
        .build()?;

    let report = Document::new(
        "acme-2024",
        "ACME Corp annual report 2024.\n\nRevenue grew 12% to $4.1B, driven by the \
         industrial segment.\n\nOperating margin held at 18% despite higher input costs.\n\n\
         The board approved a $500M buyback for 2025.",
    )
    .with_metadata("company", "acme");

    let positions = pipeline.ingest(&[report]).await?;
    println!("Ingested {} contextualized chunks", positions.len());

    for query in ["How fast did ACME grow?", "capital return plans"] {
        println!("\nQuery: \"{query}\"");
        for chunk in pipeline.query(query).await? {
            println!("  [{:.3}] {}", chunk.score.unwrap_or_default(), preview(&chunk.text, 90));
        }
    }

    Ok(())
}
