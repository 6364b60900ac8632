//! Domain types flowing through the pipeline: documents become chunks,
//! chunks become points, points come back as search results.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

pub type PointId = u64;
/// Scalar/string values extracted from a frontmatter block.
pub type Metadata = BTreeMap<String, Value>;
/// Open string-keyed mapping stored with every point.
pub type Payload = BTreeMap<String, Value>;

pub const FILENAME_KEY: &str = "filename";
pub const CONTENT_KEY: &str = "content";

/// A source file discovered at build time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub path: PathBuf,
    pub filename: String,
}

impl Document {
    pub fn from_path(path: &Path) -> Self {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Self { path: path.to_path_buf(), filename }
    }
}

/// One word window of a document body, tagged with its source.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub text: String,
    pub source_filename: String,
    pub source_metadata: Metadata,
}

impl Chunk {
    /// Build the stored payload.
    ///
    /// Metadata goes in first; `filename` and `content` are written last and
    /// are never shadowed by metadata keys of the same name.
    pub fn payload(&self) -> Payload {
        let mut payload = Payload::new();
        for (key, value) in &self.source_metadata {
            if key == FILENAME_KEY || key == CONTENT_KEY {
                warn!(file = %self.source_filename, key = %key, "frontmatter key collides with a reserved payload field, dropping it");
                continue;
            }
            payload.insert(key.clone(), value.clone());
        }
        payload.insert(FILENAME_KEY.to_string(), Value::String(self.source_filename.clone()));
        payload.insert(CONTENT_KEY.to_string(), Value::String(self.text.clone()));
        payload
    }
}

/// The persisted unit: id + embedding + payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub id: PointId,
    pub vector: Vec<f32>,
    pub payload: Payload,
}

/// A ranked hit as returned by a vector store. Higher score is more similar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPoint {
    pub id: PointId,
    pub score: f32,
    pub payload: Payload,
}

/// Response unit of the query engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub filename: String,
    pub title: String,
    pub content: String,
    pub score: f32,
}
