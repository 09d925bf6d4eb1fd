use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::{DbErr, RuntimeErr, SqlErr};
use serde::Serialize;

/// Application error type that can be returned from handlers
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Authentication errors
    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Unauthorized")]
    Unauthorized,

    // Resource errors
    #[error("{0} not found")]
    NotFound(String),

    // Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    // A stored canonical body that no longer decodes
    #[error("Malformed stored body: {0}")]
    MalformedBody(String),

    // Data exceptions and constraint violations raised by the store
    #[error("Storage error: {0}")]
    Storage(String),

    // Database errors
    #[error("Database error: {0}")]
    Database(String),

    // Internal errors
    #[error("Internal server error")]
    Internal(String),
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidToken | AppError::TokenExpired | AppError::Unauthorized => {
                StatusCode::UNAUTHORIZED
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) | AppError::Storage(_) => StatusCode::BAD_REQUEST,
            AppError::MalformedBody(_) | AppError::Database(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (error_message, details) = match &self {
            // 401 Unauthorized
            AppError::InvalidToken => ("Invalid token", None),
            AppError::TokenExpired => ("Token expired", None),
            AppError::Unauthorized => ("Unauthorized", None),

            // 404 Not Found
            AppError::NotFound(resource) => ("Not found", Some(resource.clone())),

            // 400 Bad Request
            AppError::Validation(msg) => ("Validation error", Some(msg.clone())),
            AppError::Storage(msg) => {
                tracing::warn!("Storage error: {}", msg);
                ("Data too long or constraint violated", None)
            }

            // 500 Internal Server Error
            AppError::MalformedBody(msg) => {
                tracing::error!(target: "caseflow::integrity", "Malformed stored body: {}", msg);
                ("Malformed stored body", None)
            }
            AppError::Database(msg) => {
                tracing::error!("Database error: {}", msg);
                ("Database error", None)
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                ("Internal server error", None)
            }
        };

        let body = Json(ErrorResponse {
            error: error_message.to_string(),
            details,
        });

        (status, body).into_response()
    }
}

// Convenient conversions from common error types

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        if is_data_exception(&err) {
            return AppError::Storage(err.to_string());
        }
        if let Some(
            SqlErr::UniqueConstraintViolation(msg) | SqlErr::ForeignKeyConstraintViolation(msg),
        ) = err.sql_err()
        {
            return AppError::Storage(msg);
        }

        match err {
            DbErr::RecordNotFound(_) => AppError::NotFound("Resource".to_string()),
            DbErr::RecordNotInserted => AppError::Storage("Record not inserted".to_string()),
            DbErr::RecordNotUpdated => AppError::NotFound("Resource".to_string()),
            _ => AppError::Database(err.to_string()),
        }
    }
}

/// SQLSTATE class 22 covers value-too-long, numeric overflow and friends.
fn is_data_exception(err: &DbErr) -> bool {
    let runtime = match err {
        DbErr::Exec(e) | DbErr::Query(e) => e,
        _ => return false,
    };

    match runtime {
        RuntimeErr::SqlxError(sea_orm::sqlx::Error::Database(db_err)) => db_err
            .code()
            .is_some_and(|code| code.starts_with("22")),
        _ => false,
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::TokenExpired,
            _ => AppError::InvalidToken,
        }
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
