//! Transfer service
//!
//! Upward surface for the request layer: submission and lookups. Submission
//! only validates request shape and queues the transfer as PENDING; the
//! processor resolves it later.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use super::error::{Side, TransferError};
use super::types::{Transfer, TransferRequest};
use crate::core_types::{AccountId, TransferId};
use crate::money;
use crate::store::{LedgerStore, TransferCollection};

pub struct TransferService {
    store: Arc<dyn LedgerStore>,
}

impl TransferService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Queue a transfer for asynchronous processing
    ///
    /// Fails fast on missing account ids and malformed amounts; account
    /// existence and funds are checked later by the applier.
    pub async fn submit_transfer(&self, req: TransferRequest) -> Result<Transfer, TransferError> {
        let account_from = req
            .account_from
            .ok_or(TransferError::MissingAccount(Side::From))?;
        let account_to = req
            .account_to
            .ok_or(TransferError::MissingAccount(Side::To))?;
        let amount = money::check_amount(req.amount.map(|a| a.inner()))?;

        let transfer = Transfer::pending(
            TransferId::new(),
            account_from,
            account_to,
            amount,
            Utc::now(),
        );
        self.store
            .put_transfer(TransferCollection::Pending, &transfer)
            .await?;

        info!(
            transfer_id = %transfer.id,
            from = %transfer.account_from,
            to = %transfer.account_to,
            amount = %transfer.amount,
            "Transfer submitted"
        );
        Ok(transfer)
    }

    /// Look a transfer up, resolved first
    pub async fn get_transfer(&self, id: TransferId) -> Result<Transfer, TransferError> {
        for collection in [TransferCollection::Completed, TransferCollection::Pending] {
            if let Some(t) = self.store.get_transfer(collection, id).await? {
                return Ok(t);
            }
        }
        debug!(transfer_id = %id, "Transfer not found");
        Err(TransferError::TransferNotFound(id.to_string()))
    }

    /// Every transfer touching `account`, pending and resolved, unordered
    ///
    /// A transfer resolved between the two reads shows up once, in its
    /// resolved form.
    pub async fn transfers_by_account(
        &self,
        account: AccountId,
    ) -> Result<Vec<Transfer>, TransferError> {
        let pending = self
            .store
            .transfers_by_account(TransferCollection::Pending, account)
            .await?;
        let completed = self
            .store
            .transfers_by_account(TransferCollection::Completed, account)
            .await?;

        let mut by_id: HashMap<TransferId, Transfer> =
            pending.into_iter().map(|t| (t.id, t)).collect();
        by_id.extend(completed.into_iter().map(|t| (t.id, t)));

        Ok(by_id.into_values().collect())
    }
}
