use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde::Serialize;
use std::fmt::{Display, Formatter};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApiErrorBody { pub code: &'static str, pub message: String }

#[derive(Debug, Clone)]
pub struct ApiError { pub status: StatusCode, pub code: &'static str, pub message: String }

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self { status, code, message: message.into() }
    }
    pub fn bad_request(msg: impl Into<String>) -> Self { Self::new(StatusCode::BAD_REQUEST, "bad_request", msg) }
    pub fn unauthorized(msg: impl Into<String>) -> Self { Self::new(StatusCode::UNAUTHORIZED, "unauthorized", msg) }
    pub fn not_found(msg: impl Into<String>) -> Self { Self::new(StatusCode::NOT_FOUND, "not_found", msg) }
    pub fn conflict(msg: impl Into<String>) -> Self { Self::new(StatusCode::CONFLICT, "conflict", msg) }
    pub fn internal(msg: impl Into<String>) -> Self { Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", msg) }
    /// Webhook signature missing or failed verification.
    pub fn invalid_signature() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "invalid_signature", "webhook signature missing or invalid")
    }
    /// Webhook referenced a provider-side project id no integration maps to.
    pub fn unknown_project(provider_project_id: &str) -> Self {
        Self::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            "unknown_project",
            format!("no connected integration for provider project {provider_project_id}"),
        )
    }
    pub fn bad_gateway(msg: impl Into<String>) -> Self { Self::new(StatusCode::BAD_GATEWAY, "provider_error", msg) }
}

impl Display for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { write!(f, "{}: {}", self.code, self.message) }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody { code: self.code, message: self.message };
        (self.status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Per-integration failure taxonomy for the reconciliation pipeline.
///
/// `Auth` flips the integration to disconnected; everything else is logged
/// and retried on the next scheduled run. None of these ever surface to an
/// end user as an HTTP error.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("provider rejected credentials: {0}")]
    Auth(String),
    #[error("provider request failed: {0}")]
    Provider(String),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

impl SyncError {
    pub fn is_auth(&self) -> bool { matches!(self, SyncError::Auth(_)) }
}
