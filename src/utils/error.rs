use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{error, warn};

use crate::services::BookingError;
use crate::utils::response::error as error_response;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Contention: {0}")]
    Contention(String),

    #[error("Too many requests: {0}")]
    RateLimited(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Internal server error")]
    InternalServerError(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::AuthError(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) | AppError::Contention(_) => StatusCode::CONFLICT,
            AppError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::AuthError(_) => "AUTH_ERROR",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Contention(_) => "CONTENTION",
            AppError::RateLimited(_) => "RATE_LIMITED",
            AppError::Timeout(_) => "TIMEOUT",
            AppError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    fn log(&self) {
        match self {
            AppError::InternalServerError(msg) | AppError::Timeout(msg) => {
                error!(code = self.code(), message = %msg, "Application error");
            }
            AppError::ValidationError(msg)
            | AppError::AuthError(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::Contention(msg)
            | AppError::RateLimited(msg) => {
                warn!(code = self.code(), message = %msg, "Request rejected");
            }
        }
    }
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        let message = err.to_string();
        match err {
            BookingError::Validation(_) | BookingError::InvalidQuantity { .. } => {
                AppError::ValidationError(message)
            }
            BookingError::DuplicateActiveBooking { .. }
            | BookingError::ConcertNotActive(_)
            | BookingError::InsufficientInventory { .. }
            | BookingError::InvalidTransition { .. } => AppError::Conflict(message),
            BookingError::ContentionExhausted { .. } => AppError::Contention(message),
            BookingError::ConcertNotFound(_)
            | BookingError::ClassNotFound(_)
            | BookingError::BookingNotFound(_) => AppError::NotFound(message),
            BookingError::Unauthorized => AppError::Forbidden(message),
            BookingError::Transaction(_)
            | BookingError::Store(_)
            | BookingError::Counter(_)
            | BookingError::Queue(_) => AppError::InternalServerError(message),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        self.log();

        // Infrastructure failures never reach the client verbatim
        let public_message = match &self {
            AppError::ValidationError(msg)
            | AppError::AuthError(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::Contention(msg) => msg.clone(),
            AppError::RateLimited(_) => "Too many requests, please try again later".to_string(),
            AppError::Timeout(_) => "The request took too long to complete".to_string(),
            AppError::InternalServerError(_) => "An internal error occurred".to_string(),
        };

        error_response(code, public_message, None, status)
    }
}
