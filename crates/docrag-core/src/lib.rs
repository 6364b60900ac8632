//! docrag-core
//!
//! Domain types, capability traits and the text side of the indexing
//! pipeline: frontmatter parsing, chunking and document enumeration.

pub mod chunker;
pub mod config;
pub mod documents;
pub mod error;
pub mod frontmatter;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
