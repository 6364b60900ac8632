//! In-process store: brute-force cosine similarity over a map of collections.
//! Readers run concurrently; writers take the map exclusively.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use docrag_core::traits::VectorStore;
use docrag_core::types::{Point, PointId, ScoredPoint};
use docrag_core::Error;

struct Collection {
    dim: usize,
    points: BTreeMap<PointId, Point>,
}

#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("memory store lock poisoned")
}

fn missing(collection: &str) -> anyhow::Error {
    Error::ServiceUnavailable(format!("collection '{collection}' does not exist")).into()
}

/// Cosine similarity; zero vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 { 0.0 } else { dot / (na * nb) }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn recreate_collection(&self, collection: &str, dim: usize) -> Result<()> {
        let mut map = self.collections.write().map_err(poisoned)?;
        map.insert(collection.to_string(), Collection { dim, points: BTreeMap::new() });
        Ok(())
    }

    async fn upsert(&self, collection: &str, points: Vec<Point>) -> Result<()> {
        let mut map = self.collections.write().map_err(poisoned)?;
        let target = map.get_mut(collection).ok_or_else(|| missing(collection))?;
        if let Some(bad) = points.iter().find(|p| p.vector.len() != target.dim) {
            bail!("point {} has {} dims, collection expects {}", bad.id, bad.vector.len(), target.dim);
        }
        for point in points {
            target.points.insert(point.id, point);
        }
        Ok(())
    }

    async fn query(&self, collection: &str, vector: &[f32], limit: usize) -> Result<Vec<ScoredPoint>> {
        let map = self.collections.read().map_err(poisoned)?;
        let target = map.get(collection).ok_or_else(|| missing(collection))?;
        if vector.len() != target.dim {
            bail!("query has {} dims, collection expects {}", vector.len(), target.dim);
        }
        let mut hits: Vec<ScoredPoint> = target
            .points
            .values()
            .map(|p| ScoredPoint { id: p.id, score: cosine_similarity(vector, &p.vector), payload: p.payload.clone() })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.id.cmp(&b.id)));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let map = self.collections.read().map_err(poisoned)?;
        map.get(collection).map(|c| c.points.len()).ok_or_else(|| missing(collection))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docrag_core::types::Payload;

    fn point(id: PointId, vector: Vec<f32>) -> Point {
        Point { id, vector, payload: Payload::new() }
    }

    #[tokio::test]
    async fn query_orders_by_descending_cosine() {
        let store = MemoryStore::new();
        store.recreate_collection("c", 2).await.unwrap();
        store
            .upsert("c", vec![point(0, vec![0.0, 1.0]), point(1, vec![1.0, 0.0]), point(2, vec![1.0, 1.0])])
            .await
            .unwrap();
        let hits = store.query("c", &[1.0, 0.1], 2).await.unwrap();
        let ids: Vec<PointId> = hits.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn recreate_discards_points() {
        let store = MemoryStore::new();
        store.recreate_collection("c", 2).await.unwrap();
        store.upsert("c", vec![point(0, vec![1.0, 0.0])]).await.unwrap();
        assert_eq!(store.count("c").await.unwrap(), 1);
        store.recreate_collection("c", 2).await.unwrap();
        assert_eq!(store.count("c").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn upsert_replaces_by_id() {
        let store = MemoryStore::new();
        store.recreate_collection("c", 2).await.unwrap();
        store.upsert("c", vec![point(0, vec![1.0, 0.0])]).await.unwrap();
        store.upsert("c", vec![point(0, vec![0.0, 1.0])]).await.unwrap();
        assert_eq!(store.count("c").await.unwrap(), 1);
        let hits = store.query("c", &[0.0, 1.0], 1).await.unwrap();
        assert!((hits[0].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn missing_collection_is_unavailable() {
        let store = MemoryStore::new();
        let err = store.query("absent", &[1.0], 3).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::ServiceUnavailable(_))));
    }

    #[tokio::test]
    async fn dimension_mismatch_is_rejected() {
        let store = MemoryStore::new();
        store.recreate_collection("c", 3).await.unwrap();
        assert!(store.upsert("c", vec![point(0, vec![1.0])]).await.is_err());
        assert!(store.query("c", &[1.0], 1).await.is_err());
    }

    #[test]
    fn zero_vectors_score_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }
}
