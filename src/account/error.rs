//! Account Error Types

use thiserror::Error;

use crate::money::MoneyError;
use crate::store::StoreError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccountError {
    #[error("Invalid balance: {0}")]
    InvalidBalance(#[from] MoneyError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl AccountError {
    pub fn code(&self) -> &'static str {
        match self {
            AccountError::InvalidBalance(_) => "INVALID_BALANCE",
            AccountError::Store(_) => "STORE_UNAVAILABLE",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            AccountError::InvalidBalance(_) => 422,
            AccountError::Store(_) => 503,
        }
    }
}
