//! HTTP error mapping.

use a2a_relay_core::StoreError;
use a2a_relay_session::ManagerError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::protocol::ErrorBody;

/// Error returned by route handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Manager(#[from] ManagerError),
    #[error("{0}")]
    BadRequest(String),
}

impl ApiError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::Manager(ManagerError::Store(StoreError::InvalidId(_))) => {
                StatusCode::BAD_REQUEST
            }
            Self::Manager(ManagerError::Store(StoreError::NotFound(_))) => StatusCode::NOT_FOUND,
            Self::Manager(ManagerError::Store(StoreError::AlreadyExists(_))) => {
                StatusCode::CONFLICT
            }
            Self::Manager(ManagerError::Store(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Manager(ManagerError::Turn(_)) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        Self::Manager(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(%status, error = %self, "Request failed");
        } else {
            tracing::debug!(%status, error = %self, "Request rejected");
        }

        let partial = match &self {
            Self::Manager(ManagerError::Turn(turn)) => Some(turn.output.clone()),
            _ => None,
        };
        let body = ErrorBody {
            error: self.to_string(),
            partial,
        };
        (status, Json(body)).into_response()
    }
}
