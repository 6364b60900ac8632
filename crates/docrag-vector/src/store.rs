use anyhow::{anyhow, Result};
use arrow_array::RecordBatchIterator;
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::table::Table;
use lancedb::{Connection, DistanceType};
use tracing::{debug, info};

use docrag_core::traits::VectorStore;
use docrag_core::types::{Point, ScoredPoint};
use docrag_core::Error;

use crate::schema::{build_points_schema, hits_from_batch, points_to_record_batch};
use crate::table::{open_db, recreate_table};

/// Collections are LanceDB tables under one database directory.
pub struct LanceStore {
    db: Connection,
}

impl LanceStore {
    pub async fn connect(uri: &str) -> Result<Self> {
        let db = open_db(uri).await.map_err(|e| Error::ServiceUnavailable(format!("cannot open LanceDB at {uri}: {e}")))?;
        info!(uri, "connected to LanceDB");
        Ok(Self { db })
    }

    async fn open(&self, collection: &str) -> Result<Table> {
        match self.db.open_table(collection).execute().await {
            Ok(table) => Ok(table),
            Err(lancedb::Error::TableNotFound { .. }) => {
                Err(Error::ServiceUnavailable(format!("collection '{collection}' does not exist")).into())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn vector_dim(table_schema: &arrow_schema::Schema) -> Result<usize> {
        match table_schema.field_with_name("vector")?.data_type() {
            arrow_schema::DataType::FixedSizeList(_, dim) => Ok(*dim as usize),
            other => Err(anyhow!("vector column has unexpected type {other}")),
        }
    }
}

#[async_trait]
impl VectorStore for LanceStore {
    async fn ping(&self) -> Result<()> {
        self.db
            .table_names()
            .execute()
            .await
            .map_err(|e| Error::ServiceUnavailable(format!("LanceDB not reachable: {e}")))?;
        Ok(())
    }

    async fn recreate_collection(&self, collection: &str, dim: usize) -> Result<()> {
        recreate_table(&self.db, collection, build_points_schema(dim)).await?;
        info!(collection, dim, "collection recreated");
        Ok(())
    }

    async fn upsert(&self, collection: &str, points: Vec<Point>) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }
        let table = self.open(collection).await?;
        let dim = Self::vector_dim(table.schema().await?.as_ref())?;
        let batch = points_to_record_batch(&points, dim)?;
        let schema = batch.schema();
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
        let mut mi = table.merge_insert(&["id"]);
        mi.when_matched_update_all(None).when_not_matched_insert_all();
        mi.execute(reader).await?;
        info!(collection, points = points.len(), "upserted points");
        Ok(())
    }

    async fn query(&self, collection: &str, vector: &[f32], limit: usize) -> Result<Vec<ScoredPoint>> {
        let table = self.open(collection).await?;
        let mut stream = table
            .vector_search(vector.to_vec())?
            .distance_type(DistanceType::Cosine)
            .limit(limit)
            .execute()
            .await?;
        let mut hits = Vec::new();
        while let Some(batch) = stream.try_next().await? {
            hits.extend(hits_from_batch(&batch)?);
        }
        debug!(collection, limit, hits = hits.len(), "vector search");
        Ok(hits)
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let table = self.open(collection).await?;
        Ok(table.count_rows(None).await?)
    }
}
