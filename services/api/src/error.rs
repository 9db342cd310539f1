//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service and how each
//! variant is turned into an HTTP response.

use crate::config::ConfigError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use drive_track_core::ports::PortError;
use drive_track_core::services::InviteError;
use drive_track_core::ValidationError;
use serde_json::json;
use tracing::error;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("{0}")]
    Port(#[from] PortError),

    /// A guardian invitation could not be created.
    #[error("{0}")]
    Invite(#[from] InviteError),

    /// Input that fails the domain's validation rules.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Malformed request that never reached the domain.
    #[error("{0}")]
    BadRequest(String),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a failure while applying database migrations.
    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

fn port_status(e: &PortError) -> StatusCode {
    match e {
        PortError::NotFound(_) => StatusCode::NOT_FOUND,
        PortError::Conflict(_) => StatusCode::CONFLICT,
        PortError::PermissionDenied(_) => StatusCode::FORBIDDEN,
        PortError::InvalidCredential | PortError::Unauthorized => StatusCode::UNAUTHORIZED,
        PortError::Network(_) => StatusCode::SERVICE_UNAVAILABLE,
        PortError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Port(e) => port_status(e),
            ApiError::Invite(InviteError::InvalidArgument(_)) => StatusCode::BAD_REQUEST,
            ApiError::Invite(InviteError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Invite(InviteError::FailedPrecondition(_)) => StatusCode::PRECONDITION_FAILED,
            ApiError::Invite(InviteError::Port(e)) => port_status(e),
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Internal details stay in the log, the client gets a generic message.
        let message = if status.is_server_error() {
            error!("Request failed: {:?}", self);
            match status {
                StatusCode::SERVICE_UNAVAILABLE => "The data service is unreachable, please retry".to_string(),
                _ => "Internal server error".to_string(),
            }
        } else {
            self.to_string()
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
