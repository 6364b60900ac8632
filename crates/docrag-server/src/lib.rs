//! HTTP surface over the query engine and index builder.

mod error;
mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use docrag_core::config::Settings;
use docrag_pipeline::{IndexBuilder, IndexGuard, QueryEngine};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

pub use error::ApiError;
pub use routes::{SearchRequest, SearchResponse};

/// Shared state for the handlers.
#[derive(Clone)]
pub struct AppState {
    pub query: Arc<QueryEngine>,
    /// `None` when the collaborators failed to initialize.
    pub builder: Option<Arc<IndexBuilder>>,
}

impl AppState {
    pub fn new(query: QueryEngine, builder: Option<IndexBuilder>) -> Self {
        Self { query: Arc::new(query), builder: builder.map(Arc::new) }
    }

    /// Load the embedder and connect the store once.
    ///
    /// Failures are logged and leave the engine uninitialized, so the server
    /// still comes up and answers searches with 503.
    pub async fn initialize(settings: &Settings) -> Self {
        let guard = IndexGuard::new();
        let embedder = match docrag_embed::load_embedder(&settings.embedding) {
            Ok(embedder) => Some(embedder),
            Err(e) => {
                error!(error = %format!("{e:#}"), "embedder initialization failed");
                None
            }
        };
        let store = match docrag_vector::open_store(&settings.store).await {
            Ok(store) => Some(store),
            Err(e) => {
                error!(error = %format!("{e:#}"), "vector store initialization failed");
                None
            }
        };
        let builder = match (&embedder, &store) {
            (Some(embedder), Some(store)) => {
                match IndexBuilder::new(settings, Arc::clone(embedder), Arc::clone(store), guard.clone()) {
                    Ok(builder) => Some(builder),
                    Err(e) => {
                        error!(error = %e, "index builder unavailable");
                        None
                    }
                }
            }
            _ => None,
        };
        Self::new(QueryEngine::new(settings, embedder, store, guard), builder)
    }
}

/// Build the router with all routes.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    Router::new()
        .route("/health", get(routes::health))
        .route("/search", post(routes::search))
        .route("/reindex", post(routes::reindex))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until Ctrl-C.
pub async fn serve(settings: &Settings, state: AppState) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        %addr,
        collection = %settings.store.collection,
        ready = state.query.is_ready(),
        "docrag server listening"
    );
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("docrag server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
