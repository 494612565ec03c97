use crate::credits::LedgerError;
use crate::db::errors::DbError;
use crate::sessions::SessionError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Identity header missing or malformed
    #[error("Not authenticated")]
    Unauthenticated { message: Option<String> },

    /// Caller is authenticated but not allowed to do this
    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    /// Invalid request data or business rule violation
    #[error("{message}")]
    BadRequest { message: String },

    /// Requested resource not found
    #[error("{resource} with ID {id} not found")]
    NotFound { resource: String, id: String },

    /// No credit left for the requested resource; recoverable by purchasing more
    #[error("{message}")]
    PaymentRequired { message: String, upgrade_url: String },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Database operation error
    #[error(transparent)]
    Database(#[from] DbError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Map a ledger failure to its HTTP meaning. Insufficient credits become a 402 pointing at
    /// `pricing_url`; plan errors are the caller's fault.
    pub fn from_ledger(err: LedgerError, pricing_url: &str) -> Self {
        match err {
            LedgerError::InsufficientCredits { resource_type } => Error::PaymentRequired {
                message: format!("No {resource_type} credits remaining. Purchase more at {pricing_url}"),
                upgrade_url: pricing_url.to_string(),
            },
            LedgerError::InvalidPlan { .. } | LedgerError::InvalidQuantity { .. } => Error::BadRequest { message: err.to_string() },
            LedgerError::Store(db_err) => Error::Database(db_err),
        }
    }

    pub fn from_session(err: SessionError, pricing_url: &str) -> Self {
        match err {
            SessionError::Ledger(ledger_err) => Error::from_ledger(ledger_err, pricing_url),
            SessionError::AlreadyFinished { .. } => Error::BadRequest { message: err.to_string() },
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            Error::Forbidden { .. } => StatusCode::FORBIDDEN,
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::PaymentRequired { .. } => StatusCode::PAYMENT_REQUIRED,
            Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Database(db_err) => match db_err {
                DbError::NotFound => StatusCode::NOT_FOUND,
                DbError::AllotmentExceeded { .. } | DbError::UnknownPack { .. } | DbError::Other(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::Unauthenticated { message } => message.clone().unwrap_or_else(|| "Authentication required".to_string()),
            Error::Forbidden { message } => message.clone(),
            Error::BadRequest { message } => message.clone(),
            Error::NotFound { resource, id } => format!("{resource} with ID {id} not found"),
            Error::PaymentRequired { message, .. } => message.clone(),
            Error::Internal { .. } => "Internal server error".to_string(),
            Error::Database(db_err) => match db_err {
                DbError::NotFound => "Resource not found".to_string(),
                DbError::AllotmentExceeded { .. } | DbError::UnknownPack { .. } | DbError::Other(_) => {
                    "Database error occurred".to_string()
                }
            },
            Error::Other(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Database(DbError::AllotmentExceeded { .. } | DbError::UnknownPack { .. }) => {
                tracing::error!("Credit ledger invariant breached: {}", self);
            }
            Error::Database(_) | Error::Internal { .. } | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Unauthenticated { .. } | Error::Forbidden { .. } => {
                tracing::info!("Authorization error: {}", self);
            }
            Error::PaymentRequired { .. } => {
                tracing::info!("Payment required: {}", self);
            }
            Error::BadRequest { .. } | Error::NotFound { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let status = self.status_code();

        match &self {
            Error::PaymentRequired { message, upgrade_url } => {
                let body = json!({
                    "message": message,
                    "upgrade_url": upgrade_url,
                });
                (status, axum::response::Json(body)).into_response()
            }
            _ => (status, self.user_message()).into_response(),
        }
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
