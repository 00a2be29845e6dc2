//! Transfer Status Definitions
//!
//! ```text
//! PENDING ──apply──▶ DONE
//!    │
//!    └─────apply──▶ FAILED (with reasons)
//! ```
//!
//! Transitions are forward-only. A PENDING transfer lives in the pending
//! collection; DONE and FAILED transfers live in the completed collection.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Transfer status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferStatus {
    /// Submitted, waiting for the processor
    #[default]
    Pending,

    /// Terminal: both balances were updated
    Done,

    /// Terminal: rejected, balances untouched
    Failed,
}

impl TransferStatus {
    /// Check if this is a terminal status (no more transitions possible)
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferStatus::Done | TransferStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Pending => "PENDING",
            TransferStatus::Done => "DONE",
            TransferStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Reason a transfer was rejected during application
///
/// Several reasons can apply at once (e.g. both accounts missing).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailReason {
    InsufficientFunds,
    IncorrectAmount,
    FromAccountNotFound,
    ToAccountNotFound,
}

impl FailReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailReason::InsufficientFunds => "INSUFFICIENT_FUNDS",
            FailReason::IncorrectAmount => "INCORRECT_AMOUNT",
            FailReason::FromAccountNotFound => "FROM_ACCOUNT_NOT_FOUND",
            FailReason::ToAccountNotFound => "TO_ACCOUNT_NOT_FOUND",
        }
    }
}

impl fmt::Display for FailReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(TransferStatus::Done.is_terminal());
        assert!(TransferStatus::Failed.is_terminal());
        assert!(!TransferStatus::Pending.is_terminal());
    }

    #[test]
    fn test_default_is_pending() {
        assert_eq!(TransferStatus::default(), TransferStatus::Pending);
    }

    #[test]
    fn test_display_matches_wire_format() {
        for status in [
            TransferStatus::Pending,
            TransferStatus::Done,
            TransferStatus::Failed,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status));
        }

        let json = serde_json::to_string(&FailReason::FromAccountNotFound).unwrap();
        assert_eq!(json, r#""FROM_ACCOUNT_NOT_FOUND""#);
        assert_eq!(
            FailReason::InsufficientFunds.to_string(),
            "INSUFFICIENT_FUNDS"
        );
    }
}
