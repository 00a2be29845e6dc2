//! Data models for accounts

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core_types::AccountId;
use crate::money::StrictDecimal;

/// Account
///
/// The balance is never negative as a result of a transfer; the validator
/// refuses any debit larger than the current balance. Nothing enforces it at
/// write time, so a seeded balance is stored as given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub balance: Decimal,
}

impl Account {
    pub fn new(id: AccountId, balance: Decimal) -> Self {
        Self { id, balance }
    }
}

/// Account creation request
///
/// `balance` is optional and defaults to zero.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewAccount {
    #[serde(default)]
    pub balance: Option<StrictDecimal>,
}

impl NewAccount {
    pub fn with_balance(balance: Decimal) -> Self {
        Self {
            balance: Some(balance.into()),
        }
    }
}
