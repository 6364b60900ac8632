use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use docrag_core::Error;
use tracing::{error, warn};

/// [`Error`] rendered as `{"error", "detail", "retryable"}`.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            Error::InvalidRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::BuildInProgress => StatusCode::CONFLICT,
            Error::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(kind = self.0.kind(), error = %self.0, "request failed");
        } else {
            warn!(kind = self.0.kind(), error = %self.0, "request rejected");
        }
        let body = serde_json::json!({
            "error": self.0.kind(),
            "detail": self.0.to_string(),
            "retryable": self.0.is_retryable(),
        });
        (status, Json(body)).into_response()
    }
}
