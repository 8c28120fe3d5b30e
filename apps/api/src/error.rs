//! Error types for the API.
//!
//! Every failure leaves the server as
//! `{"success": false, "code": "...", "message": "..."}`.

use axum::extract::rejection::{FormRejection, JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use tambo_core::CoreError;
use tambo_db::DbError;

/// API errors.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    #[error("Not allowed: {0}")]
    Forbidden(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{message}")]
    Conflict { code: &'static str, message: String },

    #[error("{message}")]
    Unprocessable { code: &'static str, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::Unprocessable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable code the frontend switches on.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict { code, .. } | ApiError::Unprocessable { code, .. } => code,
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn conflict(code: &'static str, message: impl Into<String>) -> Self {
        ApiError::Conflict {
            code,
            message: message.into(),
        }
    }

    fn unprocessable(code: &'static str, message: impl Into<String>) -> Self {
        ApiError::Unprocessable {
            code,
            message: message.into(),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    success: bool,
    code: &'a str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            ApiError::Internal(detail) => {
                error!(detail = %detail, "Request failed");
                "Ocurrió un error interno".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(ErrorBody {
            success: false,
            code: self.code(),
            message,
        });

        (self.status(), body).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(error: CoreError) -> Self {
        let message = error.to_string();
        match error {
            CoreError::Validation(_) => ApiError::unprocessable("VALIDATION_ERROR", message),
            CoreError::InsufficientStock { .. } => ApiError::conflict("INSUFFICIENT_STOCK", message),
            CoreError::InvalidTransition { .. } | CoreError::InvalidState { .. } => {
                ApiError::conflict("INVALID_STATE", message)
            }
            CoreError::PayrollIncomplete(_) => ApiError::unprocessable("PAYROLL_INCOMPLETE", message),
            CoreError::Overpayment { .. } | CoreError::InvalidPayment { .. } => {
                ApiError::unprocessable("INVALID_PAYMENT", message)
            }
            CoreError::UnbalancedEntry { .. } => ApiError::unprocessable("UNBALANCED_ENTRY", message),
            CoreError::DocumentRule(_) => ApiError::unprocessable("DOCUMENT_RULE", message),
            CoreError::TooManyLines { .. } => ApiError::unprocessable("TOO_MANY_LINES", message),
        }
    }
}

impl From<DbError> for ApiError {
    fn from(error: DbError) -> Self {
        match error {
            DbError::NotFound { .. } => ApiError::NotFound(error.to_string()),
            DbError::UniqueViolation { .. } => ApiError::conflict("DUPLICATE", error.to_string()),
            DbError::ForeignKeyViolation { .. } => {
                ApiError::BadRequest("referenced record does not exist".to_string())
            }
            DbError::Core(core) => core.into(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<FormRejection> for ApiError {
    fn from(rejection: FormRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tambo_core::ValidationError;

    #[test]
    fn test_db_errors_map_to_statuses() {
        let not_found: ApiError = DbError::not_found("Sale", "x").into();
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let duplicate: ApiError = DbError::duplicate("sku", "INCA-500").into();
        assert_eq!(duplicate.status(), StatusCode::CONFLICT);
        assert_eq!(duplicate.code(), "DUPLICATE");

        let invalid: ApiError = DbError::from(ValidationError::required("name")).into();
        assert_eq!(invalid.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(invalid.code(), "VALIDATION_ERROR");

        let stock: ApiError = DbError::Core(CoreError::InsufficientStock {
            sku: "INCA-500".to_string(),
            available: 1,
            requested: 2,
        })
        .into();
        assert_eq!(stock.code(), "INSUFFICIENT_STOCK");
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let err: ApiError = DbError::QueryFailed("no such column: foo".to_string()).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
