//! Capability interfaces for the two external collaborators of the pipeline.

use anyhow::anyhow;
use async_trait::async_trait;

use crate::types::{Point, ScoredPoint};

/// Maps text to fixed-dimension vectors.
pub trait Embedder: Send + Sync {
    /// Stable identifier for the model (e.g. `bert:all-MiniLM-L6-v2:d384`).
    fn model_id(&self) -> &str;
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow!("embedder returned no vector"))
    }
}

/// Persistent nearest-neighbour search over named collections of points.
///
/// Implementations that cannot reach their backend, or are asked about a
/// collection that does not exist, should return an error wrapping
/// [`crate::Error::ServiceUnavailable`] so callers can tell "down" apart from
/// "failed".
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Round trip to the backend without touching any collection.
    async fn ping(&self) -> anyhow::Result<()>;

    /// Drop `collection` if present and create it empty with `dim`-sized vectors.
    async fn recreate_collection(&self, collection: &str, dim: usize) -> anyhow::Result<()>;

    /// Insert or replace points by id.
    async fn upsert(&self, collection: &str, points: Vec<Point>) -> anyhow::Result<()>;

    /// At most `limit` hits ordered by descending score.
    async fn query(&self, collection: &str, vector: &[f32], limit: usize) -> anyhow::Result<Vec<ScoredPoint>>;

    async fn count(&self, collection: &str) -> anyhow::Result<usize>;
}
