use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Failure reported by a [`Storage`](crate::Storage) backend.
///
/// A missing key is never an error: `get` returns `Ok(None)` for it.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage backend failed: {0}")]
    Backend(String),
}

/// Connection-level fault. Always terminates the connection it happened on.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("connection closed")]
    Closed,
    #[error("transport failed: {0}")]
    Transport(String),
}

/// Request rejected before it reached any room server.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("no server registered for party {0:?}")]
    UnknownParty(String),
    #[error("websocket upgrade is missing the _pk connection id")]
    MissingConnectionId,
    #[error("room {0} is unavailable")]
    RoomUnavailable(String),
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        let status = match self {
            RouteError::UnknownParty(_) => StatusCode::NOT_FOUND,
            RouteError::MissingConnectionId => StatusCode::BAD_REQUEST,
            RouteError::RoomUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        (status, self.to_string()).into_response()
    }
}
