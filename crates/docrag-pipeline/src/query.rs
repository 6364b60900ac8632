use std::sync::Arc;

use docrag_core::config::{SearchConfig, Settings, TimeoutConfig};
use docrag_core::traits::{Embedder, VectorStore};
use docrag_core::types::{ScoredPoint, SearchResult, CONTENT_KEY, FILENAME_KEY};
use docrag_core::{Error, Result};
use serde_json::Value;
use tracing::debug;

use crate::bounded::{classify, embed_texts, with_timeout};
use crate::guard::IndexGuard;

const UNKNOWN: &str = "Unknown";

/// Embeds a query and maps store hits to [`SearchResult`]s.
///
/// Either collaborator may be absent when startup failed; every query then
/// reports [`Error::ServiceUnavailable`] instead of the process refusing to run.
pub struct QueryEngine {
    embedder: Option<Arc<dyn Embedder>>,
    store: Option<Arc<dyn VectorStore>>,
    collection: String,
    search: SearchConfig,
    timeouts: TimeoutConfig,
    guard: IndexGuard,
}

impl QueryEngine {
    pub fn new(
        settings: &Settings,
        embedder: Option<Arc<dyn Embedder>>,
        store: Option<Arc<dyn VectorStore>>,
        guard: IndexGuard,
    ) -> Self {
        Self {
            embedder,
            store,
            collection: settings.store.collection.clone(),
            search: settings.search.clone(),
            timeouts: settings.timeouts.clone(),
            guard,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.embedder.is_some() && self.store.is_some()
    }

    pub fn default_limit(&self) -> usize {
        self.search.default_limit
    }

    /// Round trip to the store, for health reporting.
    pub async fn ping(&self) -> Result<()> {
        let store = self.store.as_ref().ok_or_else(not_initialized)?;
        with_timeout("store ping", self.timeouts.store(), store.ping())
            .await
            .map_err(|e| Error::ServiceUnavailable(format!("vector store: {e:#}")))
    }

    /// Top `limit` chunks for `query`, in the store's order.
    ///
    /// `None` uses `search.default_limit`; larger limits are clamped to
    /// `search.max_limit`.
    pub async fn search(&self, query: &str, limit: Option<usize>) -> Result<Vec<SearchResult>> {
        if query.trim().is_empty() {
            return Err(Error::InvalidRequest("query must not be empty".into()));
        }
        let limit = limit.unwrap_or(self.search.default_limit);
        if limit == 0 {
            return Err(Error::InvalidRequest("limit must be at least 1".into()));
        }
        let limit = limit.min(self.search.max_limit);

        let (Some(embedder), Some(store)) = (&self.embedder, &self.store) else {
            return Err(not_initialized());
        };

        let vector = embed_texts(embedder, vec![query.to_string()], self.timeouts.embed())
            .await
            .and_then(|mut v| v.pop().ok_or_else(|| anyhow::anyhow!("embedder returned no vector")))
            .map_err(|e| classify(e, Error::Query))?;

        // Waiting behind a rebuild counts against the store timeout.
        let hits = with_timeout("store query", self.timeouts.store(), async {
            let _read = self.guard.read().await;
            store.query(&self.collection, &vector, limit).await
        })
        .await
        .map_err(|e| classify(e, Error::Query))?;
        debug!(collection = %self.collection, limit, hits = hits.len(), "query served");
        Ok(hits.into_iter().take(limit).map(to_result).collect())
    }
}

fn not_initialized() -> Error {
    Error::ServiceUnavailable("search engine is not initialized".into())
}

fn payload_str(hit: &ScoredPoint, key: &str) -> Option<String> {
    hit.payload.get(key).and_then(Value::as_str).map(str::to_string)
}

fn to_result(hit: ScoredPoint) -> SearchResult {
    let filename = payload_str(&hit, FILENAME_KEY).unwrap_or_else(|| UNKNOWN.to_string());
    let content = payload_str(&hit, CONTENT_KEY).unwrap_or_default();
    SearchResult { title: derive_title(&filename), filename, content, score: hit.score }
}

/// Human-readable title from a filename: drop a trailing `.md`, turn `-` into
/// spaces, then capitalize the first letter of every alphabetic run.
pub fn derive_title(filename: &str) -> String {
    let stem = filename.strip_suffix(".md").unwrap_or(filename);
    let mut title = String::with_capacity(stem.len());
    let mut in_word = false;
    for c in stem.chars() {
        let c = if c == '-' { ' ' } else { c };
        if in_word {
            title.extend(c.to_lowercase());
        } else {
            title.extend(c.to_uppercase());
        }
        in_word = c.is_alphabetic();
    }
    title
}
