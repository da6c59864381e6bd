//!
//! # Error Handling
//!
//! `AppError` is the single error type returned by every handler. It implements
//! `actix_web::error::ResponseError`, so handlers can bubble failures up with `?`
//! and the client always receives a JSON body of the form `{"error": "..."}`.
//!
//! Conversions exist for the lower layers (`sqlx`, `validator`, `jsonwebtoken`,
//! `bcrypt` and the storage layer) so that they compose with the `?` operator.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde_json::json;
use std::fmt;
use validator::ValidationErrors;

use crate::store::StoreError;

/// Represents all possible errors that can occur within the application.
#[derive(Debug)]
pub enum AppError {
    /// Authentication is missing or invalid (HTTP 401).
    Unauthorized(String),
    /// The caller is authenticated but may not perform the action (HTTP 403).
    Forbidden(String),
    /// The account exists but its email address has not been confirmed yet (HTTP 403).
    /// Carries the user id so the client can continue with the verification step.
    Unverified(i64),
    /// Malformed or semantically invalid request (HTTP 400).
    BadRequest(String),
    /// The requested resource does not exist (HTTP 404).
    NotFound(String),
    /// A uniqueness constraint would be violated (HTTP 409).
    Conflict(String),
    /// The caller has to wait before repeating the request (HTTP 429).
    TooManyRequests(String),
    /// Unexpected server-side failure (HTTP 500).
    InternalServerError(String),
    /// Failure inside the storage layer (HTTP 500).
    DatabaseError(String),
    /// Input validation failed (HTTP 422).
    ValidationError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            AppError::Unverified(user_id) => write!(f, "User not verified: {}", user_id),
            AppError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::TooManyRequests(msg) => write!(f, "Too Many Requests: {}", msg),
            AppError::InternalServerError(msg) => write!(f, "Internal Server Error: {}", msg),
            AppError::DatabaseError(msg) => write!(f, "Database Error: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation Error: {}", msg),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) | AppError::Unverified(_) => StatusCode::FORBIDDEN,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::InternalServerError(_) | AppError::DatabaseError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("{}", self);
        } else {
            log::warn!("{}", self);
        }

        match self {
            AppError::Unverified(user_id) => HttpResponse::build(status).json(json!({
                "error": "User not verified",
                "userId": user_id
            })),
            // Internal details stay in the log.
            AppError::DatabaseError(_) => HttpResponse::build(status).json(json!({
                "error": "Database error"
            })),
            AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::BadRequest(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::TooManyRequests(msg)
            | AppError::InternalServerError(msg)
            | AppError::ValidationError(msg) => HttpResponse::build(status).json(json!({
                "error": msg
            })),
        }
    }
}

/// `RowNotFound` becomes `NotFound`; everything else is a `DatabaseError`.
impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> AppError {
        match error {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".into()),
            _ => AppError::DatabaseError(error.to_string()),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(error: StoreError) -> AppError {
        match error {
            StoreError::Conflict(field) => AppError::Conflict(format!("{} already taken", field)),
            StoreError::UnknownSkill(id) => AppError::BadRequest(format!("Unknown skill: {}", id)),
            StoreError::Database(msg) => AppError::DatabaseError(msg),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(error: ValidationErrors) -> AppError {
        AppError::ValidationError(error.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(error: jsonwebtoken::errors::Error) -> AppError {
        AppError::Unauthorized(error.to_string())
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(error: bcrypt::BcryptError) -> AppError {
        AppError::InternalServerError(error.to_string())
    }
}
