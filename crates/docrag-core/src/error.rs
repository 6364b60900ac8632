use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid chunking configuration: chunk_size={chunk_size}, overlap={overlap} (need 0 <= overlap < chunk_size)")]
    ChunkingConfig { chunk_size: usize, overlap: usize },

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("An index build is already running")]
    BuildInProgress,

    #[error("Index build failed: {0}")]
    Build(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: &'static str, after: Duration },
}

impl Error {
    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::BuildInProgress)
    }

    /// Short machine-readable name, used in HTTP error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidConfig(_) => "invalid_config",
            Self::ChunkingConfig { .. } => "chunking_config",
            Self::ServiceUnavailable(_) => "service_unavailable",
            Self::InvalidRequest(_) => "invalid_request",
            Self::BuildInProgress => "build_in_progress",
            Self::Build(_) => "build_failure",
            Self::Query(_) => "query_failure",
            Self::Timeout { .. } => "timeout",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
