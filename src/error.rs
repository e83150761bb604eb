use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::migrate::MigrateError;
use thiserror::Error;

use crate::blockchain::transaction::TxStatus;

/// Top-level error type for the entire application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] TransactionError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failures talking to the remote ledger.
///
/// Always recoverable: callers log and retry on the next scheduled attempt.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("cannot decode ledger response: {0}")]
    Decode(String),

    #[error("ledger request timed out")]
    Timeout,
}

impl From<reqwest::Error> for GatewayError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            GatewayError::Timeout
        } else if error.is_decode() {
            GatewayError::Decode(error.to_string())
        } else {
            GatewayError::Transport(error.to_string())
        }
    }
}

/// Persistence errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] MigrateError),

    #[error("Cannot decode stored value: {0}")]
    Encoding(String),

    #[error("Transaction #{0} not updated")]
    MissingRow(i64),
}

/// Validation and entity-invariant errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TransactionError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Transaction already in terminal status {0}")]
    TerminalStatus(TxStatus),

    #[error("Transaction hash already assigned: {0}")]
    HashAlreadyAssigned(String),

    #[error("Block can only change while pending, status is {0}")]
    BlockFrozen(TxStatus),
}

/// API error response structure
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, "INVALID_INPUT", msg),
            AppError::Transaction(
                e @ (TransactionError::InvalidAddress(_) | TransactionError::InvalidAmount(_)),
            ) => (StatusCode::BAD_REQUEST, "INVALID_TRANSACTION", e.to_string()),
            AppError::Gateway(_) => (
                StatusCode::BAD_GATEWAY,
                "LEDGER_UNAVAILABLE",
                "The ledger could not be reached".to_string(),
            ),
            AppError::Storage(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                "A database error occurred".to_string(),
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            ),
        };

        let body = Json(ErrorResponse {
            error: message,
            error_code: error_code.to_string(),
        });

        (status, body).into_response()
    }
}

impl From<config::ConfigError> for AppError {
    fn from(error: config::ConfigError) -> Self {
        AppError::Config(error.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .into_iter()
            .map(|(field, errors)| {
                let codes: Vec<String> = errors.iter().map(|e| e.code.to_string()).collect();
                format!("{}: {}", field, codes.join(", "))
            })
            .collect::<Vec<String>>()
            .join("; ");

        AppError::InvalidInput(format!("Validation failed: {}", message))
    }
}

/// Result type alias for the application
pub type AppResult<T> = Result<T, AppError>;

pub type GatewayResult<T> = Result<T, GatewayError>;

pub type StorageResult<T> = Result<T, StorageError>;
