use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use docrag_core::config::{Settings, StoreBackend};
use docrag_core::traits::{Embedder, VectorStore};
use docrag_core::types::{Point, ScoredPoint};
use docrag_core::Error;
use docrag_embed::FakeEmbedder;
use docrag_pipeline::{IndexBuilder, IndexGuard, QueryEngine};
use docrag_vector::MemoryStore;
use serde_json::json;

const DIM: usize = 384;

fn settings_for(root: &Path) -> Settings {
    let mut settings = Settings::default();
    settings.docs.root = root.to_path_buf();
    settings.embedding.dim = DIM;
    settings.embedding.fake = true;
    settings.store.backend = StoreBackend::Memory;
    settings
}

fn words(prefix: &str, n: usize) -> String {
    (0..n).map(|i| format!("{prefix}{i}")).collect::<Vec<_>>().join(" ")
}

/// MemoryStore that remembers every call and the last upserted batch.
#[derive(Default)]
struct RecordingStore {
    inner: MemoryStore,
    calls: Mutex<Vec<&'static str>>,
    upserted: Mutex<Vec<Point>>,
}

impl RecordingStore {
    fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn upserted(&self) -> Vec<Point> {
        self.upserted.lock().unwrap().clone()
    }
}

#[async_trait]
impl VectorStore for RecordingStore {
    async fn ping(&self) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push("ping");
        self.inner.ping().await
    }

    async fn recreate_collection(&self, collection: &str, dim: usize) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push("recreate");
        self.inner.recreate_collection(collection, dim).await
    }

    async fn upsert(&self, collection: &str, points: Vec<Point>) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push("upsert");
        *self.upserted.lock().unwrap() = points.clone();
        self.inner.upsert(collection, points).await
    }

    async fn query(&self, collection: &str, vector: &[f32], limit: usize) -> anyhow::Result<Vec<ScoredPoint>> {
        self.inner.query(collection, vector, limit).await
    }

    async fn count(&self, collection: &str) -> anyhow::Result<usize> {
        self.inner.count(collection).await
    }
}

/// A store whose backend never answers.
#[derive(Default)]
struct DownStore {
    recreated: Mutex<bool>,
}

fn down() -> anyhow::Error {
    Error::ServiceUnavailable("connection refused".into()).into()
}

#[async_trait]
impl VectorStore for DownStore {
    async fn ping(&self) -> anyhow::Result<()> {
        Err(down())
    }

    async fn recreate_collection(&self, _collection: &str, _dim: usize) -> anyhow::Result<()> {
        *self.recreated.lock().unwrap() = true;
        Err(down())
    }

    async fn upsert(&self, _collection: &str, _points: Vec<Point>) -> anyhow::Result<()> {
        Err(down())
    }

    async fn query(&self, _collection: &str, _vector: &[f32], _limit: usize) -> anyhow::Result<Vec<ScoredPoint>> {
        Err(down())
    }

    async fn count(&self, _collection: &str) -> anyhow::Result<usize> {
        Err(down())
    }
}

/// Fake embedder that blocks for `delay` on every batch.
struct SlowEmbedder {
    inner: FakeEmbedder,
    delay: Duration,
}

impl Embedder for SlowEmbedder {
    fn model_id(&self) -> &str {
        self.inner.model_id()
    }

    fn dim(&self) -> usize {
        self.inner.dim()
    }

    fn max_len(&self) -> usize {
        self.inner.max_len()
    }

    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        std::thread::sleep(self.delay);
        self.inner.embed_batch(texts)
    }
}

/// Fake embedder that reports a BERT-sized token window.
struct WindowedEmbedder {
    inner: FakeEmbedder,
    max_len: usize,
}

impl Embedder for WindowedEmbedder {
    fn model_id(&self) -> &str {
        self.inner.model_id()
    }

    fn dim(&self) -> usize {
        self.inner.dim()
    }

    fn max_len(&self) -> usize {
        self.max_len
    }

    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        self.inner.embed_batch(texts)
    }
}

fn fake() -> Arc<dyn Embedder> {
    Arc::new(FakeEmbedder::new(DIM))
}

#[tokio::test]
async fn thousand_word_document_becomes_three_points() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.md"), format!("---\ntitle: A\n---\n{}", words("w", 1000))).unwrap();
    let settings = settings_for(dir.path());
    let store = Arc::new(RecordingStore::default());
    let builder = IndexBuilder::new(&settings, fake(), store.clone(), IndexGuard::new()).unwrap();

    let report = builder.build().await.unwrap();
    assert_eq!(report.documents, 1);
    assert_eq!(report.points, 3);
    assert_eq!(report.collection, "physical_ai_book");
    assert_eq!(store.calls(), vec!["ping", "recreate", "upsert"]);

    let points = store.upserted();
    assert_eq!(points.iter().map(|p| p.id).collect::<Vec<_>>(), vec![0, 1, 2]);
    let sizes: Vec<usize> = points
        .iter()
        .map(|p| p.payload["content"].as_str().unwrap().split_whitespace().count())
        .collect();
    assert_eq!(sizes, vec![500, 500, 100]);
    for p in &points {
        assert_eq!(p.vector.len(), DIM);
        assert_eq!(p.payload["filename"], json!("a.md"));
        assert_eq!(p.payload["title"], json!("A"));
    }
    // Consecutive windows share 50 words.
    let first = points[0].payload["content"].as_str().unwrap();
    let second = points[1].payload["content"].as_str().unwrap();
    assert!(first.ends_with("w499"));
    assert!(second.starts_with("w450 "));
}

#[tokio::test]
async fn rebuild_replaces_rather_than_appends() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.md"), words("x", 700)).unwrap();
    std::fs::write(dir.path().join("b.md"), words("y", 20)).unwrap();
    let settings = settings_for(dir.path());
    let store = Arc::new(RecordingStore::default());
    let builder = IndexBuilder::new(&settings, fake(), store.clone(), IndexGuard::new()).unwrap();

    let first = builder.build().await.unwrap();
    let second = builder.build().await.unwrap();
    assert_eq!(first.points, 3);
    assert_eq!(second.points, first.points);
    assert_eq!(store.count("physical_ai_book").await.unwrap(), 3);

    // Ids restart at 0 and follow filename order.
    let points = store.upserted();
    assert_eq!(points.iter().map(|p| p.id).collect::<Vec<_>>(), vec![0, 1, 2]);
    assert_eq!(points[2].payload["filename"], json!("b.md"));
}

#[tokio::test]
async fn empty_directory_leaves_empty_collection() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("notes.txt"), "not markdown").unwrap();
    let settings = settings_for(dir.path());
    let store = Arc::new(MemoryStore::new());
    let builder = IndexBuilder::new(&settings, fake(), store.clone(), IndexGuard::new()).unwrap();

    let report = builder.build().await.unwrap();
    assert_eq!((report.documents, report.points), (0, 0));
    assert_eq!(store.count("physical_ai_book").await.unwrap(), 0);
}

#[tokio::test]
async fn missing_docs_root_is_a_build_failure() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings_for(&dir.path().join("nope"));
    let builder = IndexBuilder::new(&settings, fake(), Arc::new(MemoryStore::new()), IndexGuard::new()).unwrap();
    assert!(matches!(builder.build().await, Err(Error::Build(_))));
}

#[tokio::test]
async fn unreachable_store_fails_before_dropping_anything() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.md"), "hello").unwrap();
    let settings = settings_for(dir.path());
    let store = Arc::new(DownStore::default());
    let builder = IndexBuilder::new(&settings, fake(), store.clone(), IndexGuard::new()).unwrap();

    assert!(matches!(builder.build().await, Err(Error::ServiceUnavailable(_))));
    assert!(!*store.recreated.lock().unwrap());
}

#[tokio::test]
async fn invalid_chunking_is_rejected_up_front() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = settings_for(dir.path());
    settings.chunking.chunk_size = 50;
    settings.chunking.overlap = 50;
    let built = IndexBuilder::new(&settings, fake(), Arc::new(MemoryStore::new()), IndexGuard::new());
    assert!(matches!(built.err(), Some(Error::ChunkingConfig { chunk_size: 50, overlap: 50 })));
}

#[tokio::test]
async fn embedder_dimension_mismatch_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings_for(dir.path());
    let embedder: Arc<dyn Embedder> = Arc::new(FakeEmbedder::new(DIM + 1));
    let store = Arc::new(RecordingStore::default());
    let builder = IndexBuilder::new(&settings, embedder, store.clone(), IndexGuard::new()).unwrap();
    assert!(matches!(builder.build().await, Err(Error::InvalidConfig(_))));
    assert_eq!(store.calls(), vec!["ping"]);
}

#[tokio::test]
async fn reserved_metadata_keys_do_not_override_payload() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("real-name.md"),
        "---\nfilename: spoofed.md\ncontent: nope\nsidebar_position: 2\n---\nactual body text",
    )
    .unwrap();
    let settings = settings_for(dir.path());
    let store = Arc::new(RecordingStore::default());
    let builder = IndexBuilder::new(&settings, fake(), store.clone(), IndexGuard::new()).unwrap();
    builder.build().await.unwrap();

    let points = store.upserted();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].payload["filename"], json!("real-name.md"));
    assert_eq!(points[0].payload["content"], json!("actual body text"));
    assert_eq!(points[0].payload["sidebar_position"], json!(2));
}

async fn indexed_engine(dir: &Path) -> QueryEngine {
    let settings = settings_for(dir);
    let guard = IndexGuard::new();
    let store: Arc<dyn VectorStore> = Arc::new(MemoryStore::new());
    let embedder = fake();
    IndexBuilder::new(&settings, embedder.clone(), store.clone(), guard.clone())
        .unwrap()
        .build()
        .await
        .unwrap();
    QueryEngine::new(&settings, Some(embedder), Some(store), guard)
}

#[tokio::test]
async fn query_ranks_matching_chunk_first() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("bipedal-walking.md"),
        "---\ntitle: Walking\n---\nBalance matters: a humanoid robot keeps its balance by shifting weight, and balance control runs every tick.",
    )
    .unwrap();
    std::fs::write(dir.path().join("lidar.md"), "Lidar scans produce dense point clouds for mapping.").unwrap();
    std::fs::write(dir.path().join("ros-nodes.md"), "ROS nodes exchange messages over topics.").unwrap();
    let engine = indexed_engine(dir.path()).await;

    let results = engine.search("balance", Some(3)).await.unwrap();
    assert!(!results.is_empty() && results.len() <= 3);
    assert!(results[0].content.contains("balance"));
    assert_eq!(results[0].filename, "bipedal-walking.md");
    assert_eq!(results[0].title, "Bipedal Walking");
    assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
}

#[tokio::test]
async fn limit_is_respected_and_clamped() {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..6 {
        std::fs::write(dir.path().join(format!("doc-{i}.md")), format!("shared topic number {i}")).unwrap();
    }
    let engine = indexed_engine(dir.path()).await;

    assert_eq!(engine.search("shared topic", Some(2)).await.unwrap().len(), 2);
    assert_eq!(engine.search("shared topic", None).await.unwrap().len(), engine.default_limit());
    assert_eq!(engine.search("shared topic", Some(10_000)).await.unwrap().len(), 6);
}

#[tokio::test]
async fn unreachable_store_makes_queries_unavailable() {
    let settings = Settings { embedding: docrag_core::config::EmbeddingConfig { dim: DIM, ..Default::default() }, ..Default::default() };
    let engine = QueryEngine::new(&settings, Some(fake()), Some(Arc::new(DownStore::default())), IndexGuard::new());
    assert!(matches!(engine.search("balance", Some(3)).await, Err(Error::ServiceUnavailable(_))));
    assert!(matches!(engine.ping().await, Err(Error::ServiceUnavailable(_))));
}

#[tokio::test]
async fn query_before_any_build_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings_for(dir.path());
    let engine = QueryEngine::new(&settings, Some(fake()), Some(Arc::new(MemoryStore::new())), IndexGuard::new());
    assert!(matches!(engine.search("anything", None).await, Err(Error::ServiceUnavailable(_))));
}

#[tokio::test]
async fn concurrent_build_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.md"), "some words to embed").unwrap();
    let settings = settings_for(dir.path());
    let guard = IndexGuard::new();
    let slow: Arc<dyn Embedder> =
        Arc::new(SlowEmbedder { inner: FakeEmbedder::new(DIM), delay: Duration::from_millis(300) });
    let builder = Arc::new(IndexBuilder::new(&settings, slow, Arc::new(MemoryStore::new()), guard.clone()).unwrap());

    let running = tokio::spawn({
        let builder = Arc::clone(&builder);
        async move { builder.build().await }
    });
    while !guard.is_building() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(matches!(builder.build().await, Err(Error::BuildInProgress)));
    assert_eq!(running.await.unwrap().unwrap().points, 1);
    assert!(!guard.is_building());
}

#[tokio::test]
async fn slow_embedder_times_out() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.md"), "some words to embed").unwrap();
    let mut settings = settings_for(dir.path());
    settings.timeouts.embed_ms = 20;
    let slow: Arc<dyn Embedder> =
        Arc::new(SlowEmbedder { inner: FakeEmbedder::new(DIM), delay: Duration::from_millis(200) });
    let store: Arc<dyn VectorStore> = Arc::new(MemoryStore::new());
    let guard = IndexGuard::new();

    let builder = IndexBuilder::new(&settings, slow.clone(), store.clone(), guard.clone()).unwrap();
    let err = builder.build().await.unwrap_err();
    assert!(matches!(err, Error::Timeout { operation: "embedding", .. }));
    assert!(err.is_retryable());

    let engine = QueryEngine::new(&settings, Some(slow), Some(store), guard);
    assert!(matches!(engine.search("words", None).await, Err(Error::Timeout { .. })));
}

#[tokio::test]
async fn chunk_size_is_checked_against_token_window() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.md"), words("t", 600)).unwrap();
    let mut settings = settings_for(dir.path());
    let windowed: Arc<dyn Embedder> = Arc::new(WindowedEmbedder { inner: FakeEmbedder::new(DIM), max_len: 256 });
    let store: Arc<dyn VectorStore> = Arc::new(MemoryStore::new());

    let builder = IndexBuilder::new(&settings, windowed.clone(), store.clone(), IndexGuard::new()).unwrap();
    assert!(builder.chunks_exceed_token_window());
    // Oversized windows are logged, not rejected.
    assert_eq!(builder.build().await.unwrap().points, 2);

    settings.chunking.chunk_size = 200;
    settings.chunking.overlap = 20;
    let builder = IndexBuilder::new(&settings, windowed, store.clone(), IndexGuard::new()).unwrap();
    assert!(!builder.chunks_exceed_token_window());

    let unbounded = IndexBuilder::new(&settings_for(dir.path()), fake(), store, IndexGuard::new()).unwrap();
    assert!(!unbounded.chunks_exceed_token_window());
}
