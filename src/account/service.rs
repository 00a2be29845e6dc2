//! Account service
//!
//! Thin layer over the ledger store: assigns ids on creation and reads
//! accounts back. Balances are only ever mutated by the transfer applier.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::info;

use super::error::AccountError;
use super::models::{Account, NewAccount};
use crate::core_types::AccountId;
use crate::money;
use crate::store::{LedgerStore, StoreError};

pub struct AccountService {
    store: Arc<dyn LedgerStore>,
}

impl AccountService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Create an account with a fresh id; balance defaults to zero
    ///
    /// A seed balance with more than two fractional digits is rejected.
    pub async fn create_account(&self, req: NewAccount) -> Result<Account, AccountError> {
        let balance = req.balance.map(|b| b.inner()).unwrap_or(Decimal::ZERO);
        let balance = money::check_balance(balance)?;
        let account = Account::new(AccountId::new(), balance);

        self.store.put_account(&account).await?;
        info!(account_id = %account.id, balance = %account.balance, "Account created");

        Ok(account)
    }

    pub async fn get_account(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        self.store.get_account(id).await
    }
}
