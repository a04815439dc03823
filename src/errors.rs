//! Error types for ledgerkey

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Main error type for wallet operations
///
/// Messages never include key material. Variants that wrap a `String` carry
/// a description of what failed, not the offending secret.
#[derive(Error, Debug)]
pub enum WalletError {
    // Identity errors
    #[error("No identity provisioned yet")]
    NotProvisioned,

    #[error("Stored key is corrupt: {0}")]
    CorruptKey(String),

    // Caller input errors
    #[error("Invalid signature encoding: {0}")]
    InvalidSignatureEncoding(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // Storage errors
    #[error("Storage failure: {0}")]
    StorageFailure(String),

    // Ledger errors
    #[error("Ledger network unavailable: {0}")]
    NetworkUnavailable(String),

    #[error("Transaction rejected by ledger: {0}")]
    TransactionRejected(String),

    // Cryptographic errors
    #[error("Signing failed: {0}")]
    SigningFailed(String),

    // Transport errors
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // Internal errors
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl WalletError {
    /// Whether the caller may safely retry the same request unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, WalletError::NetworkUnavailable(_))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            WalletError::NotProvisioned => StatusCode::NOT_FOUND,
            WalletError::InvalidSignatureEncoding(_)
            | WalletError::InvalidAddress(_)
            | WalletError::InvalidAmount(_)
            | WalletError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            WalletError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            WalletError::TransactionRejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
            WalletError::NetworkUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            WalletError::CorruptKey(_)
            | WalletError::StorageFailure(_)
            | WalletError::SigningFailed(_)
            | WalletError::ConfigError(_)
            | WalletError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<std::io::Error> for WalletError {
    fn from(err: std::io::Error) -> Self {
        WalletError::StorageFailure(err.to_string())
    }
}

impl From<config::ConfigError> for WalletError {
    fn from(err: config::ConfigError) -> Self {
        WalletError::ConfigError(err.to_string())
    }
}

impl From<JsonRejection> for WalletError {
    fn from(rejection: JsonRejection) -> Self {
        WalletError::InvalidRequest(rejection.body_text())
    }
}

/// Convert WalletError into a JSON HTTP response
impl IntoResponse for WalletError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = serde_json::json!({
            "error": self.to_string(),
            "code": status.as_u16(),
            "retryable": self.is_retryable(),
        });
        (status, axum::Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, WalletError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(WalletError::NotProvisioned.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            WalletError::CorruptKey("bad hex".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            WalletError::InvalidAddress("too short".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            WalletError::NetworkUnavailable("timeout".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_only_network_errors_are_retryable() {
        assert!(WalletError::NetworkUnavailable("timeout".into()).is_retryable());
        assert!(!WalletError::StorageFailure("disk full".into()).is_retryable());
        assert!(!WalletError::TransactionRejected("nonce too low".into()).is_retryable());
    }

    #[test]
    fn test_io_error_is_storage_failure() {
        let err: WalletError = std::io::Error::new(std::io::ErrorKind::Other, "boom").into();
        assert!(matches!(err, WalletError::StorageFailure(_)));
    }
}
