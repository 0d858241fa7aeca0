//! Mapping of core errors onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use ticketdesk_core::{AuditError, CommandError, LifecycleError, StoreError};

/// Error body shared by every endpoint
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: &'static str,
}

/// Error returned by API handlers
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    pub fn new(status: StatusCode, kind: &'static str, error: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorResponse {
                error: error.into(),
                kind,
            },
        }
    }

    pub fn bad_request(error: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", error)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<LifecycleError> for ApiError {
    fn from(e: LifecycleError) -> Self {
        let status = match e {
            LifecycleError::NotFound(_) => StatusCode::NOT_FOUND,
            LifecycleError::InvalidTransition { .. } => StatusCode::CONFLICT,
            LifecycleError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            LifecycleError::ThreadSyncFailed { .. } => StatusCode::BAD_GATEWAY,
        };
        Self::new(status, e.kind(), e.to_string())
    }
}

impl From<CommandError> for ApiError {
    fn from(e: CommandError) -> Self {
        match e {
            CommandError::NotAdmin => Self::new(StatusCode::FORBIDDEN, e.kind(), e.to_string()),
            CommandError::Lifecycle(e) => e.into(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        LifecycleError::from(e).into()
    }
}

impl From<AuditError> for ApiError {
    fn from(e: AuditError) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "audit_unavailable", e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
