use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context};
use docrag_core::chunker::Chunker;
use docrag_core::config::{Settings, TimeoutConfig};
use docrag_core::documents::{list_documents, read_document};
use docrag_core::frontmatter;
use docrag_core::traits::{Embedder, VectorStore};
use docrag_core::types::{Chunk, Document, Point, PointId};
use docrag_core::{Error, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::bounded::{classify, embed_texts, with_timeout};
use crate::guard::IndexGuard;

/// Where a build currently is. Logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPhase {
    Idle,
    Connected,
    CollectionReset,
    Enumerating,
    PerDocument,
    Upserting,
    Done,
}

impl fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BuildPhase::Idle => "idle",
            BuildPhase::Connected => "connected",
            BuildPhase::CollectionReset => "collection_reset",
            BuildPhase::Enumerating => "enumerating",
            BuildPhase::PerDocument => "per_document",
            BuildPhase::Upserting => "upserting",
            BuildPhase::Done => "done",
        };
        f.write_str(name)
    }
}

/// Outcome of a successful build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub collection: String,
    pub documents: usize,
    pub points: usize,
    pub elapsed_ms: u64,
}

/// Rebuilds the collection from scratch out of the documents directory.
pub struct IndexBuilder {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    chunker: Chunker,
    docs_root: PathBuf,
    extension: String,
    collection: String,
    dim: usize,
    timeouts: TimeoutConfig,
    guard: IndexGuard,
}

impl IndexBuilder {
    /// Fails with [`Error::ChunkingConfig`] before anything touches the store.
    pub fn new(
        settings: &Settings,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        guard: IndexGuard,
    ) -> Result<Self> {
        Ok(Self {
            embedder,
            store,
            chunker: Chunker::new(settings.chunking)?,
            docs_root: settings.docs.root.clone(),
            extension: settings.docs.extension.clone(),
            collection: settings.store.collection.clone(),
            dim: settings.embedding.dim,
            timeouts: settings.timeouts.clone(),
            guard,
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// True when a full window holds more words than the model reads tokens,
    /// so the tail of such chunks never reaches the embedding.
    pub fn chunks_exceed_token_window(&self) -> bool {
        self.chunker.config().chunk_size > self.embedder.max_len()
    }

    /// Full destructive rebuild.
    ///
    /// Connectivity and dimension are checked before the collection is
    /// dropped, so an unreachable store leaves the previous collection
    /// untouched. Once the drop has happened any failure leaves the
    /// collection empty or partially filled until the next successful build.
    pub async fn build(&self) -> Result<BuildReport> {
        let started = Instant::now();
        let _slot = self.guard.try_begin_build()?;
        self.enter(BuildPhase::Idle);

        self.check_ready().await?;
        self.enter(BuildPhase::Connected);

        let _write = self.guard.write().await;
        let (documents, points) = self.rebuild().await.map_err(|e| {
            warn!(collection = %self.collection, error = %format!("{e:#}"), "index build failed");
            classify(e, Error::Build)
        })?;
        self.enter(BuildPhase::Done);

        let report = BuildReport {
            collection: self.collection.clone(),
            documents,
            points,
            elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        };
        info!(
            collection = %report.collection,
            documents = report.documents,
            points = report.points,
            elapsed_ms = report.elapsed_ms,
            "index build complete"
        );
        Ok(report)
    }

    fn enter(&self, phase: BuildPhase) {
        info!(collection = %self.collection, %phase, "build phase");
    }

    async fn check_ready(&self) -> Result<()> {
        with_timeout("store ping", self.timeouts.store(), self.store.ping())
            .await
            .map_err(|e| Error::ServiceUnavailable(format!("vector store: {e:#}")))?;
        if self.embedder.dim() != self.dim {
            return Err(Error::InvalidConfig(format!(
                "embedder {} produces {}-d vectors, collection expects {}",
                self.embedder.model_id(),
                self.embedder.dim(),
                self.dim
            )));
        }
        info!(
            model = self.embedder.model_id(),
            dim = self.dim,
            max_len = self.embedder.max_len(),
            "embedder ready"
        );
        if self.chunks_exceed_token_window() {
            warn!(
                chunk_size = self.chunker.config().chunk_size,
                max_len = self.embedder.max_len(),
                "chunks are longer than the model's token window and will be truncated"
            );
        }
        Ok(())
    }

    async fn rebuild(&self) -> anyhow::Result<(usize, usize)> {
        self.enter(BuildPhase::CollectionReset);
        with_timeout(
            "recreate collection",
            self.timeouts.store(),
            self.store.recreate_collection(&self.collection, self.dim),
        )
        .await
        .context("recreating collection")?;

        self.enter(BuildPhase::Enumerating);
        let docs = list_documents(&self.docs_root, &self.extension)?;
        info!(root = %self.docs_root.display(), documents = docs.len(), "documents found");

        self.enter(BuildPhase::PerDocument);
        let mut points = Vec::new();
        let mut next_id: PointId = 0;
        for doc in &docs {
            let chunks = self.chunk_document(doc)?;
            let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
            let vectors = embed_texts(&self.embedder, texts, self.timeouts.embed())
                .await
                .with_context(|| format!("embedding {}", doc.filename))?;
            for (chunk, vector) in chunks.iter().zip(vectors) {
                if vector.len() != self.dim {
                    bail!("{}: embedding has dim {}, expected {}", doc.filename, vector.len(), self.dim);
                }
                points.push(Point { id: next_id, vector, payload: chunk.payload() });
                next_id += 1;
            }
            info!(file = %doc.filename, chunks = chunks.len(), "document embedded");
        }

        self.enter(BuildPhase::Upserting);
        let total = points.len();
        with_timeout("upsert", self.timeouts.store(), self.store.upsert(&self.collection, points))
            .await
            .context("upserting points")?;
        Ok((docs.len(), total))
    }

    fn chunk_document(&self, doc: &Document) -> anyhow::Result<Vec<Chunk>> {
        let text = read_document(doc)?;
        let (body, metadata) = frontmatter::parse(&text);
        Ok(self
            .chunker
            .chunks(&body)
            .map(|text| Chunk {
                text,
                source_filename: doc.filename.clone(),
                source_metadata: metadata.clone(),
            })
            .collect())
    }
}
