//! Index builder and query engine over the [`Embedder`] / [`VectorStore`]
//! capabilities.
//!
//! Both halves share an [`IndexGuard`]: a build holds the write side for the
//! whole recreate → upsert span, queries hold the read side, so a query in
//! this process never observes a half-built collection.
//!
//! [`Embedder`]: docrag_core::traits::Embedder
//! [`VectorStore`]: docrag_core::traits::VectorStore

mod bounded;
pub mod builder;
pub mod guard;
pub mod query;

pub use builder::{BuildPhase, BuildReport, IndexBuilder};
pub use guard::IndexGuard;
pub use query::{derive_title, QueryEngine};
