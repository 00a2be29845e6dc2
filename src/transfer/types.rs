//! Transfer Core Types

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::state::{FailReason, TransferStatus};
use crate::core_types::{AccountId, TransferId};
use crate::money::StrictDecimal;

/// Ordered, deduplicated set of rejection reasons
pub type FailReasons = BTreeSet<FailReason>;

/// Transfer record
///
/// Stored in exactly one of the two transfer collections: the pending
/// collection while `status == Pending`, the completed collection once
/// resolved. `fail_reasons` is non-empty only when `status == Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    pub id: TransferId,
    pub account_from: AccountId,
    pub account_to: AccountId,
    pub amount: Decimal,
    /// Submission time; drain-order key of the pending collection
    pub date: DateTime<Utc>,
    pub status: TransferStatus,
    #[serde(default)]
    pub fail_reasons: FailReasons,
}

impl Transfer {
    /// Create a new PENDING transfer
    pub fn pending(
        id: TransferId,
        account_from: AccountId,
        account_to: AccountId,
        amount: Decimal,
        date: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            account_from,
            account_to,
            amount,
            date,
            status: TransferStatus::Pending,
            fail_reasons: FailReasons::new(),
        }
    }

    /// Check whether the transfer touches the given account on either side
    pub fn involves(&self, account: AccountId) -> bool {
        self.account_from == account || self.account_to == account
    }

    /// Resolve to DONE
    pub fn into_done(mut self) -> Self {
        debug_assert_eq!(self.status, TransferStatus::Pending);
        self.status = TransferStatus::Done;
        self.fail_reasons.clear();
        self
    }

    /// Resolve to FAILED with the given reasons
    pub fn into_failed(mut self, reasons: FailReasons) -> Self {
        debug_assert_eq!(self.status, TransferStatus::Pending);
        debug_assert!(!reasons.is_empty());
        self.status = TransferStatus::Failed;
        self.fail_reasons = reasons;
        self
    }
}

/// Transfer submission from the request layer
///
/// Every field is optional so that a missing field is reported as a client
/// input error by the service rather than as a deserialization failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    #[serde(default)]
    pub account_from: Option<AccountId>,
    #[serde(default)]
    pub account_to: Option<AccountId>,
    #[serde(default)]
    pub amount: Option<StrictDecimal>,
}

impl TransferRequest {
    pub fn new(account_from: AccountId, account_to: AccountId, amount: Decimal) -> Self {
        Self {
            account_from: Some(account_from),
            account_to: Some(account_to),
            amount: Some(amount.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample() -> Transfer {
        Transfer::pending(
            TransferId::new(),
            AccountId::new(),
            AccountId::new(),
            dec!(50.45),
            Utc::now(),
        )
    }

    #[test]
    fn test_pending_has_no_reasons() {
        let t = sample();
        assert_eq!(t.status, TransferStatus::Pending);
        assert!(t.fail_reasons.is_empty());
    }

    #[test]
    fn test_resolution() {
        let done = sample().into_done();
        assert_eq!(done.status, TransferStatus::Done);
        assert!(done.fail_reasons.is_empty());

        let reasons = FailReasons::from([FailReason::InsufficientFunds]);
        let failed = sample().into_failed(reasons.clone());
        assert_eq!(failed.status, TransferStatus::Failed);
        assert_eq!(failed.fail_reasons, reasons);
    }

    #[test]
    fn test_involves() {
        let t = sample();
        assert!(t.involves(t.account_from));
        assert!(t.involves(t.account_to));
        assert!(!t.involves(AccountId::new()));
    }

    #[test]
    fn test_wire_format_is_camel_case() {
        let t = sample().into_failed(FailReasons::from([
            FailReason::ToAccountNotFound,
            FailReason::FromAccountNotFound,
        ]));
        let json = serde_json::to_value(&t).unwrap();

        assert_eq!(json["accountFrom"], t.account_from.to_string());
        assert_eq!(json["accountTo"], t.account_to.to_string());
        assert_eq!(json["amount"], "50.45");
        assert_eq!(json["status"], "FAILED");
        // BTreeSet keeps declaration order
        assert_eq!(
            json["failReasons"],
            serde_json::json!(["FROM_ACCOUNT_NOT_FOUND", "TO_ACCOUNT_NOT_FOUND"])
        );

        let back: Transfer = serde_json::from_value(json).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn test_request_missing_fields() {
        let req: TransferRequest = serde_json::from_str("{}").unwrap();
        assert!(req.account_from.is_none());
        assert!(req.account_to.is_none());
        assert!(req.amount.is_none());
    }
}
