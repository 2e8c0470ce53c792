//! # RAG Fusion Demo
//!
//! Two indexes, one query, several paraphrases: shows how
//! [`QueryFusionRetriever`] merges ranked lists with reciprocal rank fusion,
//! and how the fused retriever is exposed to an agent as a tool.
//!
//! A canned language model stands in for a real one, so no API keys are needed.
//!
//! Run: `cargo run -p ragdex-demos --example rag_fusion`

use std::sync::Arc;

use futures::StreamExt;
use futures::stream;
use ragdex::{
    Document, DocumentStream, FusionMode, IndexRetriever, LlmProvider, Message, Query,
    QueryFusionRetriever, RagConfig, RagPipeline, RecursiveChunker, RetrievalTool, Retriever,
    ToolRegistry, telemetry,
};
use ragdex_demos::{KeywordEmbedder, preview};
use serde_json::json;

const KEYWORDS: &[&str] =
    &["apple", "revenue", "iphone", "tesla", "stock", "sales", "quarter", "earnings", "car"];

/// Answers every paraphrase request with the same list.
struct CannedLlm;

#[async_trait::async_trait]
impl LlmProvider for CannedLlm {
    async fn generate(&self, _messages: &[Message]) -> ragdex::Result<String> {
        Ok("1. apple quarterly earnings\n2. iphone sales revenue\n3. apple revenue growth".into())
    }
}

async fn build_pipeline(documents: Vec<Document>) -> anyhow::Result<RagPipeline> {
    let pipeline = RagPipeline::builder()
        .config(RagConfig::default())
        .embedding_provider(Arc::new(KeywordEmbedder::new(KEYWORDS)))
        .splitter(Arc::new(RecursiveChunker::new(200, 0)))
        .build()?;

    // Feed documents through the multi-source path, one stream per document.
    let sources: Vec<DocumentStream> =
        documents.into_iter().map(|d| stream::iter([Ok(d)]).boxed()).collect();
    let report = pipeline.ingest_sources(sources).await?;
    println!(
        "  ingested {} documents, {} chunks, {} failed",
        report.documents, report.inserted, report.failed
    );
    Ok(pipeline)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing();

    println!("Building news index");
    let news = build_pipeline(vec![
        Document::new("news-1", "Apple reported record revenue this quarter."),
        Document::new("news-2", "Tesla stock fell 5% after car deliveries missed."),
        Document::new("news-3", "iPhone sales drove Apple earnings higher."),
    ])
    .await?;

    println!("Building filings index");
    let filings = build_pipeline(vec![
        Document::new("10-q", "Apple quarterly earnings: revenue up, iPhone sales strong."),
        Document::new("tsla-8k", "Tesla filed an 8-K on car production."),
    ])
    .await?;

    let fusion = QueryFusionRetriever::builder()
        .retriever(Arc::new(IndexRetriever::new(news.index().clone())))
        .retriever(Arc::new(IndexRetriever::new(filings.index().clone())))
        .llm(Arc::new(CannedLlm))
        .num_queries(3)
        .mode(FusionMode::ReciprocalRank)
        .build()?;
    let fusion: Arc<dyn Retriever> = Arc::new(fusion);

    println!("\nFused results for \"apple revenue\":");
    let hits = fusion.retrieve(&Query::new("apple revenue"), 4, None).await?;
    for (i, chunk) in hits.iter().enumerate() {
        println!(
            "  {}. [rrf={:.4}] {} | {}",
            i + 1,
            chunk.score.unwrap_or_default(),
            chunk.document_id,
            preview(&chunk.text, 60)
        );
    }

    // Expose the fused retriever as an agent tool.
    let mut tools = ToolRegistry::new();
    tools.register(Arc::new(RetrievalTool::new(fusion, 3)))?;
    println!("\nRegistered tools: {}", serde_json::to_string_pretty(&tools.schemas())?);

    let output = tools.invoke("rag_search", json!({ "query": "tesla stock", "top_k": 2 })).await?;
    println!("\nrag_search output:\n{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
