//! Error types for the HTTP layer.
//!
//! [`ObserverError`] unifies all failure modes into a single enum that
//! converts into an Axum response with a `{success, error, status}` body.

use axum::extract::rejection::QueryRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tanktwin_core::supervisor::SupervisorError;

/// Errors that can occur in the API layer.
#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// An input was rejected.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An invalid query parameter was provided.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// The request body could not be parsed.
    #[error("invalid body: {0}")]
    InvalidBody(String),

    /// An id could not be parsed from the request path.
    #[error("invalid UUID: {0}")]
    InvalidUuid(String),

    /// A backing store is failing.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// A serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<SupervisorError> for ObserverError {
    fn from(err: SupervisorError) -> Self {
        match err {
            SupervisorError::NotFound { .. } => Self::NotFound(err.to_string()),
            SupervisorError::ValidationOutOfRange { .. } => Self::InvalidInput(err.to_string()),
            SupervisorError::Persistence { .. } => Self::Unavailable(err.to_string()),
            SupervisorError::ConcurrencyTimeout { .. } => Self::Internal(err.to_string()),
        }
    }
}

impl From<QueryRejection> for ObserverError {
    fn from(rejection: QueryRejection) -> Self {
        Self::InvalidQuery(rejection.body_text())
    }
}

impl ObserverError {
    /// HTTP status this error maps to.
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidInput(_)
            | Self::InvalidQuery(_)
            | Self::InvalidBody(_)
            | Self::InvalidUuid(_) => StatusCode::BAD_REQUEST,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Serialization(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ObserverError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(error = %self, status = status.as_u16(), "Request failed");
        }

        let body = serde_json::json!({
            "success": false,
            "error": self.to_string(),
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use tanktwin_core::store::StoreError;
    use tanktwin_types::AlertId;

    use super::*;

    #[test]
    fn supervisor_errors_map_to_statuses() {
        let cases = [
            (
                SupervisorError::NotFound { id: AlertId::new() },
                StatusCode::NOT_FOUND,
            ),
            (
                SupervisorError::ValidationOutOfRange {
                    field: "flow_rate",
                    value: f64::NAN,
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                SupervisorError::Persistence {
                    source: StoreError::Unavailable {
                        reason: "down".to_owned(),
                    },
                },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                SupervisorError::ConcurrencyTimeout {
                    operation: "tick",
                    waited_ms: 500,
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(ObserverError::from(err).status(), expected);
        }
    }
}
