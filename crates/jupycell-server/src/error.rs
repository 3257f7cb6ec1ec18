//! Error types for jupycell server.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::protocol::ErrorResponse;
use crate::session::SessionId;

/// Server error type.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// No session with this id.
    #[error("Kernel not found")]
    KernelNotFound(SessionId),

    /// No cell with this number in the session.
    #[error("Cell number does not exist.")]
    CellNotFound(i64),

    /// Add on an existing cell number.
    #[error("Cell number already exists. Use 'edit' to modify it.")]
    DuplicateCell(i64),

    /// Missing or malformed request fields.
    #[error("{0}")]
    Validation(String),

    /// A kernel could not be started.
    #[error("Failed to start kernel: {0}")]
    ChannelUnavailable(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other jupycell-core error.
    #[error("Core error: {0}")]
    Core(jupycell_core::Error),

    /// A background task failed.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<jupycell_core::Error> for ServerError {
    fn from(e: jupycell_core::Error) -> Self {
        match e {
            jupycell_core::Error::UnknownCell(number) => Self::CellNotFound(number),
            jupycell_core::Error::DuplicateCell(number) => Self::DuplicateCell(number),
            jupycell_core::Error::ChannelUnavailable(message) => Self::ChannelUnavailable(message),
            other => Self::Core(other),
        }
    }
}

impl ServerError {
    /// HTTP status used when this error ends a request.
    ///
    /// Request-level mistakes keep 200 and are reported in the body.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::KernelNotFound(_)
            | Self::CellNotFound(_)
            | Self::DuplicateCell(_)
            | Self::Validation(_) => StatusCode::OK,
            Self::ChannelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Io(_) | Self::Core(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_errors_map_to_request_errors() {
        let err: ServerError = jupycell_core::Error::UnknownCell(3).into();
        assert!(matches!(err, ServerError::CellNotFound(3)));
        assert_eq!(err.to_string(), "Cell number does not exist.");

        let err: ServerError = jupycell_core::Error::ChannelUnavailable("no python".into()).into();
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let err: ServerError = jupycell_core::Error::Channel("pipe".into()).into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_not_found_keeps_ok_status() {
        let err = ServerError::KernelNotFound(SessionId::new(9));
        assert_eq!(err.status_code(), StatusCode::OK);
        assert_eq!(err.to_string(), "Kernel not found");
    }
}
