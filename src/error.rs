//! Request-level error taxonomy and the JSON envelope it maps to.
//!
//! Every propagated error becomes `{status, statusCode, message}`, with a
//! structured `errors` tree attached for validation failures outside
//! production. Stack traces never reach the client.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use once_cell::sync::OnceCell;
use serde_json::json;
use thiserror::Error;

use crate::db::DbError;

/// Whether validation detail may be included in responses.
/// Set once at startup from the environment config; defaults to hidden.
static EXPOSE_VALIDATION_DETAIL: OnceCell<bool> = OnceCell::new();

pub fn set_expose_validation_detail(expose: bool) {
    let _ = EXPOSE_VALIDATION_DETAIL.set(expose);
}

fn expose_validation_detail() -> bool {
    *EXPOSE_VALIDATION_DETAIL.get().unwrap_or(&false)
}

#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed input (missing scope header, bad number, etc.)
    #[error("{0}")]
    BadRequest(String),

    /// Structured payload validation failure
    #[error("validation failed")]
    Validation(validator::ValidationErrors),

    /// Missing or invalid credential
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated but insufficiently privileged
    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    /// Resource still referenced elsewhere
    #[error("{0}")]
    Conflict(String),

    /// A resolved entity is missing a related row that provisioning
    /// always creates (e.g. an organization without a quota row). A bug,
    /// not a user error.
    #[error("data integrity fault: {0}")]
    IntegrityFault(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::IntegrityFault(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound => Self::NotFound("not found".to_string()),
            DbError::Conflict(msg) => Self::Conflict(msg),
            other => {
                tracing::error!(error = %other, "database error");
                Self::Internal("internal error".to_string())
            }
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(status = %status, error = %self, "request failed");
        }

        let mut body = json!({
            "status": "error",
            "statusCode": status.as_u16(),
            "message": self.to_string(),
        });

        if let ApiError::Validation(ref errors) = self {
            if expose_validation_detail() {
                if let Ok(tree) = serde_json::to_value(errors) {
                    body["errors"] = tree;
                }
            }
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(
            ApiError::BadRequest("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Forbidden("x".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::IntegrityFault("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn db_not_found_maps_to_not_found() {
        let err: ApiError = DbError::NotFound.into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }
}
