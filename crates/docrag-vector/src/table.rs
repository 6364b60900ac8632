//! LanceDB connection and table housekeeping.

use anyhow::Result;
use arrow_array::RecordBatchIterator;
use arrow_schema::SchemaRef;
use lancedb::database::CreateTableMode;
use lancedb::{connect, Connection};

pub async fn open_db(uri: &str) -> Result<Connection> {
    Ok(connect(uri).execute().await?)
}

/// Replace `name` with an empty table of `schema`, dropping existing rows.
pub async fn recreate_table(conn: &Connection, name: &str, schema: SchemaRef) -> Result<()> {
    let iter = RecordBatchIterator::new(vec![].into_iter(), schema);
    conn.create_table(name, Box::new(iter))
        .mode(CreateTableMode::Overwrite)
        .execute()
        .await?;
    Ok(())
}
