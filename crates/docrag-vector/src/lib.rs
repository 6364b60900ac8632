//! docrag-vector
//!
//! Vector store backends implementing [`docrag_core::traits::VectorStore`]:
//! [`LanceStore`] persists collections as LanceDB tables and searches them by
//! cosine distance; [`MemoryStore`] keeps everything in process.

pub mod memory;
pub mod schema;
pub mod store;
pub mod table;

use std::sync::Arc;

use docrag_core::config::{StoreBackend, StoreConfig};
use docrag_core::traits::VectorStore;

pub use memory::MemoryStore;
pub use store::LanceStore;

/// Connect the configured backend.
pub async fn open_store(cfg: &StoreConfig) -> anyhow::Result<Arc<dyn VectorStore>> {
    match cfg.backend {
        StoreBackend::Lancedb => Ok(Arc::new(LanceStore::connect(&cfg.uri).await?)),
        StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
    }
}
