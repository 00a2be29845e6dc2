//! Transfer Validator
//!
//! Pure acceptance decision for a pending transfer given a snapshot of its two
//! accounts. No store access, no side effects.
//!
//! Check order:
//! 1. Account existence. Both sides are checked and reasons accumulate; if
//!    either account is missing the decision stops there.
//! 2. Amount well-formedness (positive, at most two decimals) and that both
//!    the debit and the credit are exactly representable, so an applied
//!    transfer can never round money away.
//! 3. Sufficient funds on the sending account.

use super::state::FailReason;
use super::types::{FailReasons, Transfer};
use crate::account::Account;
use crate::money;

/// Validator decision
///
/// `Accepted` carries the two accounts so callers can only reach the
/// balance mutation through a successful validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict<'a> {
    Accepted { from: &'a Account, to: &'a Account },
    Rejected(FailReasons),
}

impl Verdict<'_> {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted { .. })
    }
}

/// Decide whether `transfer` can be applied against the given accounts
pub fn validate<'a>(
    transfer: &Transfer,
    from: Option<&'a Account>,
    to: Option<&'a Account>,
) -> Verdict<'a> {
    let mut reasons = FailReasons::new();

    if from.is_none() {
        reasons.insert(FailReason::FromAccountNotFound);
    }
    if to.is_none() {
        reasons.insert(FailReason::ToAccountNotFound);
    }

    let (Some(from), Some(to)) = (from, to) else {
        return Verdict::Rejected(reasons);
    };

    let amount = transfer.amount;
    if !money::is_well_formed(amount)
        || money::exact_debit(from.balance, amount).is_none()
        || money::exact_credit(to.balance, amount).is_none()
    {
        reasons.insert(FailReason::IncorrectAmount);
        return Verdict::Rejected(reasons);
    }

    if amount > from.balance {
        reasons.insert(FailReason::InsufficientFunds);
        return Verdict::Rejected(reasons);
    }

    Verdict::Accepted { from, to }
}
