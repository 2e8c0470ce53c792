//! End-to-end pipeline behaviour: ingest, threshold, multi-source ingestion,
//! persistence, and the retrieval tool.

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use common::StubEmbedder;
use futures::StreamExt;
use futures::stream;
use ragdex::{
    Chunk, Chunker, Document, DocumentSplitter, DocumentStream, IngestReport, RagConfig, RagError,
    RagPipeline, RecursiveChunker, Result, RetrievalTool, ToolRegistry, VectorIndex,
    merge_as_available,
};
use serde_json::json;
use tokio::sync::RwLock;

const VOCAB: &[&str] = &["apple", "banana", "cherry", "tesla"];

fn pipeline(provider: Arc<StubEmbedder>, threshold: f32) -> RagPipeline {
    RagPipeline::builder()
        .config(
            RagConfig::builder()
                .chunk_size(256)
                .chunk_overlap(0)
                .similarity_threshold(threshold)
                .build()
                .unwrap(),
        )
        .embedding_provider(provider)
        .splitter(Arc::new(RecursiveChunker::new(256, 0)))
        .build()
        .unwrap()
}

/// Fails for documents whose id starts with `bad`.
struct PickySplitter(RecursiveChunker);

#[async_trait]
impl DocumentSplitter for PickySplitter {
    async fn split_documents(&self, documents: &[Document]) -> Result<Vec<Chunk>> {
        if let Some(doc) = documents.iter().find(|d| d.id.starts_with("bad")) {
            return Err(RagError::ChunkingError(format!("cannot split {}", doc.id)));
        }
        Ok(self.0.split(documents))
    }
}

fn source(items: Vec<Result<Document>>) -> DocumentStream {
    stream::iter(items).boxed()
}

#[tokio::test]
async fn ingest_then_query_applies_threshold() {
    let pipeline = pipeline(Arc::new(StubEmbedder::new(VOCAB)), 0.5);
    let positions = pipeline
        .ingest(&[
            Document::new("apple", "Apple reported record revenue."),
            Document::new("tesla", "Tesla stock fell 5%."),
            Document::new("kiwi", "Kiwi harvest was average."),
        ])
        .await
        .unwrap();
    assert_eq!(positions, vec![0, 1, 2]);

    let hits = pipeline.query("apple sales").await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].document_id, "apple");
    assert!(hits[0].score.unwrap() >= 0.5);

    // Re-ingesting the same text adds nothing.
    let again = pipeline.ingest(&[Document::new("copy", "Apple reported record revenue.")]).await;
    assert!(again.unwrap().is_empty());
    assert_eq!(pipeline.index().read().await.len(), 3);
}

#[tokio::test]
async fn embedding_failure_surfaces_as_pipeline_error() {
    let provider = Arc::new(StubEmbedder::new(VOCAB));
    let pipeline = pipeline(provider.clone(), 0.0);
    provider.set_failing(true);

    let err = pipeline.ingest(&[Document::new("d", "apple pie")]).await.unwrap_err();
    assert!(matches!(err, RagError::PipelineError(_)));
    assert!(pipeline.index().read().await.is_empty());

    let err = pipeline.query("apple").await.unwrap_err();
    assert!(matches!(err, RagError::PipelineError(_)));
}

#[tokio::test]
async fn builder_requires_provider_or_index() {
    let missing = RagPipeline::builder()
        .config(RagConfig::default())
        .splitter(Arc::new(RecursiveChunker::new(64, 0)))
        .build();
    assert!(matches!(missing, Err(RagError::ConfigError(_))));

    let no_splitter = RagPipeline::builder()
        .config(RagConfig::default())
        .embedding_provider(Arc::new(StubEmbedder::new(VOCAB)))
        .build();
    assert!(matches!(no_splitter, Err(RagError::ConfigError(_))));
}

#[tokio::test]
async fn sources_are_ingested_despite_a_failing_source() {
    let pipeline = RagPipeline::builder()
        .config(RagConfig::default())
        .embedding_provider(Arc::new(StubEmbedder::new(VOCAB)))
        .splitter(Arc::new(PickySplitter(RecursiveChunker::new(256, 0))))
        .build()
        .unwrap();

    let healthy = source(vec![
        Ok(Document::new("a", "apple orchard")),
        Ok(Document::new("bad-1", "banana split")),
        Ok(Document::new("c", "cherry blossom")),
    ]);
    let broken = source(vec![
        Ok(Document::new("t", "tesla roadster")),
        Err(RagError::Io(std::io::Error::other("feed closed"))),
        Ok(Document::new("never", "never reached")),
    ]);

    let report = pipeline.ingest_sources(vec![healthy, broken]).await.unwrap();
    assert_eq!(report, IngestReport { documents: 4, inserted: 3, failed: 1 });

    let index = pipeline.index().read().await;
    assert!(index.contains_text("tesla roadster"));
    assert!(!index.contains_text("never reached"));
    assert!(!index.contains_text("banana split"));
}

#[tokio::test]
async fn single_failing_source_is_an_error() {
    let pipeline = pipeline(Arc::new(StubEmbedder::new(VOCAB)), 0.0);
    let only = source(vec![
        Ok(Document::new("a", "apple orchard")),
        Err(RagError::Io(std::io::Error::other("feed closed"))),
    ]);

    let err = pipeline.ingest_sources(vec![only]).await.unwrap_err();
    assert!(matches!(err, RagError::Io(_)));
    // Documents received before the failure stay ingested.
    assert!(pipeline.index().read().await.contains_text("apple orchard"));
}

#[tokio::test]
async fn every_source_failing_is_an_error() {
    let pipeline = pipeline(Arc::new(StubEmbedder::new(VOCAB)), 0.0);
    let first = source(vec![Err(RagError::Io(std::io::Error::other("feed one closed")))]);
    let second = source(vec![Err(RagError::Io(std::io::Error::other("feed two closed")))]);

    let err = pipeline.ingest_sources(vec![first, second]).await.unwrap_err();
    assert!(matches!(err, RagError::Io(_)));
    assert!(pipeline.index().read().await.is_empty());
}

#[tokio::test]
async fn merge_yields_one_error_after_all_sources_fail() {
    let failing = |items: Vec<Result<u32>>| stream::iter(items).boxed();
    let sources = vec![
        failing(vec![Ok(1), Err(RagError::ChunkingError("one".into()))]),
        failing(vec![Ok(2), Ok(3), Err(RagError::ChunkingError("two".into()))]),
    ];
    let items: Vec<Result<u32>> = merge_as_available(sources).collect().await;

    let values: Vec<u32> = items.iter().filter_map(|i| i.as_ref().ok().copied()).collect();
    assert_eq!(values.len(), 3);
    assert_eq!(items.iter().filter(|i| i.is_err()).count(), 1);
    assert!(items.last().unwrap().is_err());
}

#[tokio::test]
async fn merge_drops_errors_when_another_source_succeeds() {
    let clean: Vec<Result<u32>> = vec![Ok(1), Ok(2)];
    let broken: Vec<Result<u32>> = vec![Err(RagError::ChunkingError("broken".into()))];
    let sources = vec![stream::iter(clean).boxed(), stream::iter(broken).boxed()];
    let items: Vec<Result<u32>> = merge_as_available(sources).collect().await;

    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|i| i.is_ok()));
}

#[tokio::test]
async fn merge_keeps_each_source_in_order() {
    let a: Vec<Result<u32>> = (1..=5).map(Ok).collect();
    let b: Vec<Result<u32>> = (100..=103).map(Ok).collect();
    let sources = vec![stream::iter(a).boxed(), stream::iter(b).boxed()];
    let merged: Vec<u32> =
        merge_as_available(sources).map(|item| item.unwrap()).collect().await;

    assert_eq!(merged.len(), 9);
    let from_a: Vec<_> = merged.iter().copied().filter(|v| *v < 100).collect();
    let from_b: Vec<_> = merged.iter().copied().filter(|v| *v >= 100).collect();
    assert_eq!(from_a, [1, 2, 3, 4, 5]);
    assert_eq!(from_b, [100, 101, 102, 103]);
}

#[tokio::test]
async fn merge_of_nothing_is_empty() {
    let merged: Vec<Result<u32>> = merge_as_available(Vec::new()).collect().await;
    assert!(merged.is_empty());
}

#[tokio::test]
async fn saved_index_backs_a_new_pipeline() {
    let provider = Arc::new(StubEmbedder::new(VOCAB));
    let original = pipeline(provider.clone(), 0.0);
    original
        .ingest(&[Document::new("c", "cherry jam"), Document::new("t", "tesla battery")])
        .await
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pipeline-index.json");
    original.save(&path).await.unwrap();

    let index = VectorIndex::load(&path, provider).await.unwrap();
    let restored = RagPipeline::builder()
        .config(RagConfig::default())
        .splitter(Arc::new(RecursiveChunker::new(256, 0)))
        .index(Arc::new(RwLock::new(index)))
        .build()
        .unwrap();

    let hits = restored.query("tesla news").await.unwrap();
    assert_eq!(hits[0].document_id, "t");
}

#[tokio::test]
async fn retrieval_tool_is_dispatched_by_name() {
    let pipeline = pipeline(Arc::new(StubEmbedder::new(VOCAB)), 0.0);
    pipeline
        .ingest(&[
            Document::new("a", "apple crumble").with_metadata("kind", "dessert"),
            Document::new("b", "apple cider").with_metadata("kind", "drink"),
            Document::new("t", "tesla model"),
        ])
        .await
        .unwrap();

    let tool = RetrievalTool::new(Arc::new(pipeline.retriever().clone()), 2);
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(tool)).unwrap();
    assert_eq!(registry.names().collect::<Vec<_>>(), ["rag_search"]);

    let results = registry.invoke("rag_search", json!({ "query": "apple" })).await.unwrap();
    let results = results.as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["document_id"], "a");

    let filtered = registry
        .invoke("rag_search", json!({ "query": "apple", "top_k": 5, "filter": { "kind": "drink" } }))
        .await
        .unwrap();
    let filtered = filtered.as_array().unwrap();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0]["text"], "apple cider");
    assert_eq!(filtered[0]["metadata"]["kind"], "drink");

    let missing = registry.invoke("rag_search", json!({ "top_k": 1 })).await;
    assert!(matches!(missing, Err(RagError::ToolError(_))));
    let unknown = registry.invoke("web_search", json!({ "query": "apple" })).await;
    assert!(matches!(unknown, Err(RagError::ToolError(_))));

    let duplicate =
        registry.register(Arc::new(RetrievalTool::new(Arc::new(pipeline.retriever().clone()), 2)));
    assert!(matches!(duplicate, Err(RagError::ToolError(_))));
}
