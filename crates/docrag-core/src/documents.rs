//! Document discovery and loading.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;

use crate::types::Document;

/// Regular files directly under `root` whose extension is `extension`,
/// sorted by path so ids are assigned deterministically.
pub fn list_documents(root: &Path, extension: &str) -> Result<Vec<Document>> {
    if !root.is_dir() {
        bail!("document root {} is not a directory", root.display());
    }
    let mut docs = Vec::new();
    for entry in walkdir::WalkDir::new(root).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.with_context(|| format!("listing {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some(extension) {
            docs.push(Document::from_path(path));
        }
    }
    Ok(docs)
}

/// Read a document as UTF-8, decoding invalid sequences lossily.
pub fn read_document(doc: &Document) -> Result<String> {
    match fs::read_to_string(&doc.path) {
        Ok(content) => Ok(content),
        Err(_) => {
            let bytes = fs::read(&doc.path).with_context(|| format!("reading {}", doc.path.display()))?;
            Ok(String::from_utf8_lossy(&bytes).to_string())
        }
    }
}
