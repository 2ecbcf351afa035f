//! Error types for the Observer API server.
//!
//! [`ObserverError`] unifies all failure modes into a single enum that
//! can be converted into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation. Every
//! error body has the shape `{"success": false, "error": "<message>"}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thermostream_core::IngestError;
use thermostream_db::StoreError;

/// Errors that can occur in the Observer API layer.
#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    /// An invalid query parameter or request body was provided.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// A time range with `start` after `end`.
    #[error("invalid range: {0}")]
    InvalidRange(String),

    /// The submitted reading broke a domain rule.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The reading store could not serve the request; the caller may retry.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ObserverError {
    /// HTTP status this error is reported with.
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::InvalidQuery(_) | Self::InvalidRange(_) | Self::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ObserverError {
    fn from(e: StoreError) -> Self {
        if matches!(e, StoreError::InvalidRange { .. }) {
            Self::InvalidRange(e.to_string())
        } else if e.is_retryable() {
            Self::StoreUnavailable(e.to_string())
        } else {
            Self::Internal(e.to_string())
        }
    }
}

impl From<IngestError> for ObserverError {
    fn from(e: IngestError) -> Self {
        match e {
            IngestError::MalformedMessage(msg) => Self::InvalidQuery(msg),
            IngestError::ValidationFailed(msg) => Self::Validation(msg),
            IngestError::StoreUnavailable(msg) => Self::StoreUnavailable(msg),
        }
    }
}

impl IntoResponse for ObserverError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            Self::InvalidQuery(msg)
            | Self::InvalidRange(msg)
            | Self::Validation(msg)
            | Self::StoreUnavailable(msg)
            | Self::Internal(msg) => msg,
        };

        let body = serde_json::json!({
            "success": false,
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}
