//! Transfer Error Types
//!
//! Errors surfaced synchronously to callers of the transfer service. Business
//! rejections (insufficient funds, unknown accounts) are NOT errors; they end
//! up as a FAILED transfer with reasons.

use thiserror::Error;

use crate::money::MoneyError;
use crate::store::StoreError;

/// Which side of a transfer a request-level check refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    From,
    To,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::From => write!(f, "accountFrom"),
            Side::To => write!(f, "accountTo"),
        }
    }
}

/// Transfer error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    // === Client Input Errors ===
    #[error("Missing account id: {0}")]
    MissingAccount(Side),

    #[error("Invalid amount: {0}")]
    InvalidAmount(#[from] MoneyError),

    // === Lookup Errors ===
    #[error("Transfer not found: {0}")]
    TransferNotFound(String),

    // === System Errors ===
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl TransferError {
    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            TransferError::MissingAccount(_) => "MISSING_ACCOUNT",
            TransferError::InvalidAmount(_) => "INVALID_AMOUNT",
            TransferError::TransferNotFound(_) => "TRANSFER_NOT_FOUND",
            TransferError::Store(_) => "STORE_UNAVAILABLE",
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            TransferError::MissingAccount(_) | TransferError::InvalidAmount(_) => 422,
            TransferError::TransferNotFound(_) => 404,
            TransferError::Store(_) => 503,
        }
    }

    /// Check if this is a client input error (never queued)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            TransferError::MissingAccount(_) | TransferError::InvalidAmount(_)
        )
    }
}
