use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use docrag_core::types::SearchResult;
use docrag_core::Error;
use docrag_pipeline::BuildReport;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
}

/// Liveness only; never touches the store or the model.
pub(crate) async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn search(
    State(state): State<AppState>,
    body: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
    let Json(req) = body.map_err(|e| Error::InvalidRequest(e.body_text()))?;
    let results = state.query.search(&req.query, req.limit).await?;
    Ok(Json(SearchResponse { results }))
}

pub(crate) async fn reindex(State(state): State<AppState>) -> Result<Json<BuildReport>, ApiError> {
    let builder = state
        .builder
        .as_ref()
        .ok_or_else(|| Error::ServiceUnavailable("index builder is not initialized".into()))?;
    Ok(Json(builder.build().await?))
}
