//! # RAG Basic Demo
//!
//! Ingests a few documents, queries them, removes one, and saves the index.
//!
//! Uses a deterministic keyword embedder so it runs with **zero API keys**.
//!
//! Run: `cargo run -p ragdex-demos --example rag_basic`

use std::sync::Arc;

use ragdex::{
    Document, MetadataFilter, Query, RagConfig, RagPipeline, RecursiveChunker, telemetry,
};
use ragdex_demos::{KeywordEmbedder, preview};
use tracing::info;

const KEYWORDS: &[&str] = &[
    "rust", "memory", "safety", "python", "data", "science", "vector", "retrieval", "language",
    "chunk",
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing();

    // -- 1. Configure the pipeline ----------------------------------------
    let config = RagConfig::builder()
        .chunk_size(160)
        .chunk_overlap(32)
        .top_k(3)
        .similarity_threshold(0.1)
        .build()?;

    let pipeline = RagPipeline::builder()
        .embedding_provider(Arc::new(KeywordEmbedder::new(KEYWORDS)))
        .splitter(Arc::new(RecursiveChunker::from_config(&config)))
        .config(config)
        .build()?;

    // -- 2. Ingest sample documents ---------------------------------------
    let documents = vec![
        Document::new(
            "rust",
            "Rust is a systems programming language focused on safety, speed, and \
             concurrency. It achieves memory safety without a garbage collector through \
             its ownership system.\n\nThe borrow checker enforces memory safety at compile time.",
        )
        .with_metadata("topic", "rust"),
        Document::new(
            "python",
            "Python is a high-level, interpreted programming language known for its \
             readability. It is widely used in data science, web development, and automation.",
        )
        .with_metadata("topic", "python"),
        Document::new(
            "rag",
            "Retrieval-Augmented Generation combines a retrieval system with a language \
             model. Documents are split into chunk sequences, embedded, and stored in a \
             vector index. At query time the most relevant chunk texts are retrieved.",
        )
        .with_metadata("topic", "rag"),
    ];

    let positions = pipeline.ingest(&documents).await?;
    println!("Ingested {} documents into {} chunks", documents.len(), positions.len());

    // Ingesting the same documents again is a no-op.
    let again = pipeline.ingest(&documents).await?;
    println!("Re-ingest added {} chunks", again.len());

    // -- 3. Query ---------------------------------------------------------
    for query in ["memory safety in rust", "data science language", "vector retrieval"] {
        println!("\nQuery: \"{query}\"");
        let results = pipeline.query(query).await?;
        if results.is_empty() {
            println!("  (no results)");
        }
        for (i, chunk) in results.iter().enumerate() {
            println!(
                "  {}. [score={:.4}] doc={} | {}",
                i + 1,
                chunk.score.unwrap_or_default(),
                chunk.document_id,
                preview(&chunk.text, 70),
            );
        }
    }

    // -- 4. Filtered query ------------------------------------------------
    let filter = MetadataFilter::new().equals("topic", "rag");
    let filtered = pipeline.query_with(&Query::new("language"), 5, Some(&filter)).await?;
    println!("\nFiltered to topic=rag: {} result(s)", filtered.len());

    // -- 5. Remove a document's chunks and persist --------------------------
    {
        let mut index = pipeline.index().write().await;
        let ids: Vec<String> = index
            .chunks()
            .iter()
            .filter(|c| c.document_id == "python")
            .map(|c| c.id.clone())
            .collect();
        let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
        let removed = index.remove_ids(&ids);
        info!(removed, remaining = index.len(), "removed python chunks");
    }

    let path = std::env::temp_dir().join("ragdex-basic-index.json");
    pipeline.save(&path).await?;
    println!("\nSaved index to {}", path.display());

    Ok(())
}
