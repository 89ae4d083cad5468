use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{error, warn};
use validator::ValidationErrors;

use crate::gateway::GatewayError;
use crate::store::StoreError;
use crate::utils::response::error as error_response;

pub const PAYMENT_UNAVAILABLE_MESSAGE: &str =
    "Payment could not be created. Please try again in a moment.";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(#[from] ValidationErrors),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Payment unavailable for order {order_code}")]
    PaymentUnavailable {
        order_code: String,
        #[source]
        source: GatewayError,
    },

    #[error("Database error")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Internal server error")]
    InternalServerError(String),
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateOrderCode(code) => {
                AppError::Conflict(format!("Order code {} is already in use", code))
            }
            StoreError::Database(e) => AppError::DatabaseError(e),
            StoreError::Corrupt(msg) => AppError::InternalServerError(msg),
        }
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::AuthError(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::PaymentUnavailable { .. } => StatusCode::BAD_GATEWAY,
            AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::InvalidInput(_) => "VALIDATION_ERROR",
            AppError::AuthError(_) => "AUTH_ERROR",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::PaymentUnavailable { .. } => "PAYMENT_UNAVAILABLE",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    fn log(&self) {
        match self {
            AppError::ValidationError(_)
            | AppError::InvalidInput(_)
            | AppError::NotFound(_)
            | AppError::Conflict(_) => {
                warn!(error = %self, "Request rejected");
            }
            AppError::AuthError(msg) | AppError::Forbidden(msg) => {
                warn!(message = %msg, "Access denied");
            }
            AppError::PaymentUnavailable { order_code, source } => {
                error!(order_code = %order_code, error = ?source, "Payment gateway failure");
            }
            AppError::InternalServerError(msg) => {
                error!(message = %msg, "Application error");
            }
            AppError::DatabaseError(e) => {
                error!(error = ?e, "Database error");
            }
        }
    }

    fn public_message(&self) -> String {
        match self {
            AppError::ValidationError(msg)
            | AppError::AuthError(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg) => msg.clone(),
            AppError::InvalidInput(_) => "The given data was invalid".to_string(),
            AppError::PaymentUnavailable { .. } => PAYMENT_UNAVAILABLE_MESSAGE.to_string(),
            AppError::DatabaseError(_) => "A database error occurred".to_string(),
            AppError::InternalServerError(_) => {
                "Something went wrong. Please try again.".to_string()
            }
        }
    }

    fn details(&self) -> Option<Value> {
        match self {
            AppError::InvalidInput(errors) => serde_json::to_value(errors.field_errors()).ok(),
            AppError::PaymentUnavailable { order_code, .. } => {
                Some(json!({ "order_code": order_code }))
            }
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.log();
        error_response(
            self.code(),
            self.public_message(),
            self.details(),
            self.status_code(),
        )
    }
}
