//! Transfer Applier
//!
//! Resolves one pending transfer inside a single store transaction:
//!
//! ```text
//! take(pending, id) ─► read accounts ─► validate ─┬─ accepted ─► debit/credit ─► DONE
//!                                                  └─ rejected ─────────────────► FAILED
//!                                   put(completed, transfer) ─► commit
//! ```
//!
//! The get-and-remove on the pending collection is the only deduplication:
//! whichever invocation commits the removal first owns the transfer, every
//! other invocation for the same id either finds it gone or fails to commit.
//!
//! A failed commit leaves the store exactly as before, so the transfer stays
//! pending and the processor redelivers it on a later cycle.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use super::types::{FailReasons, Transfer};
use super::validator::{Verdict, validate};
use crate::account::Account;
use crate::core_types::TransferId;
use crate::store::{LedgerStore, StoreError, TransferCollection};

/// Result of one `apply` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Balances moved, transfer recorded as DONE
    Done,
    /// Transfer recorded as FAILED, balances untouched
    Failed(FailReasons),
    /// Nothing pending under this id (already resolved, or never existed)
    AlreadyConsumed,
    /// Transaction aborted; the transfer is still pending
    Requeued,
}

impl ApplyOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplyOutcome::Done => "DONE",
            ApplyOutcome::Failed(_) => "FAILED",
            ApplyOutcome::AlreadyConsumed => "ALREADY_CONSUMED",
            ApplyOutcome::Requeued => "REQUEUED",
        }
    }
}

impl std::fmt::Display for ApplyOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Transactional applier over a [`LedgerStore`]
#[derive(Clone)]
pub struct TransferApplier {
    store: Arc<dyn LedgerStore>,
}

impl TransferApplier {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    /// Apply the pending transfer `id`
    ///
    /// Never fails: store errors are logged and reported as `Requeued`.
    pub async fn apply(&self, id: TransferId) -> ApplyOutcome {
        match self.try_apply(id).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(
                    transfer_id = %id,
                    error = %e,
                    "Transfer transaction aborted, left pending for redelivery"
                );
                ApplyOutcome::Requeued
            }
        }
    }

    async fn try_apply(&self, id: TransferId) -> Result<ApplyOutcome, StoreError> {
        let mut txn = self.store.begin().await?;

        let Some(transfer) = txn.take_transfer(TransferCollection::Pending, id).await? else {
            txn.commit().await?;
            debug!(transfer_id = %id, "Transfer already consumed, skipping");
            return Ok(ApplyOutcome::AlreadyConsumed);
        };

        let from = txn.get_account(transfer.account_from).await?;
        let to = txn.get_account(transfer.account_to).await?;

        let (resolved, outcome) = match validate(&transfer, from.as_ref(), to.as_ref()) {
            Verdict::Accepted { from, to } => {
                for account in settle(from, to, transfer.amount) {
                    txn.put_account(account).await?;
                }
                (transfer.into_done(), ApplyOutcome::Done)
            }
            Verdict::Rejected(reasons) => (
                transfer.into_failed(reasons.clone()),
                ApplyOutcome::Failed(reasons),
            ),
        };

        txn.put_transfer(TransferCollection::Completed, resolved.clone())
            .await?;
        txn.commit().await?;

        log_resolved(&resolved);
        Ok(outcome)
    }
}

/// New balances for an accepted transfer
///
/// A self-transfer yields the single account with its balance unchanged.
fn settle(from: &Account, to: &Account, amount: Decimal) -> Vec<Account> {
    let mut debited = from.clone();
    debited.balance -= amount;

    if from.id == to.id {
        debited.balance += amount;
        return vec![debited];
    }

    let mut credited = to.clone();
    credited.balance += amount;
    vec![debited, credited]
}

fn log_resolved(transfer: &Transfer) {
    if transfer.fail_reasons.is_empty() {
        info!(
            transfer_id = %transfer.id,
            from = %transfer.account_from,
            to = %transfer.account_to,
            amount = %transfer.amount,
            "Transfer applied"
        );
    } else {
        info!(
            transfer_id = %transfer.id,
            from = %transfer.account_from,
            to = %transfer.account_to,
            amount = %transfer.amount,
            reasons = ?transfer.fail_reasons,
            "Transfer rejected"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::AccountId;
    use crate::store::{LedgerTxn, MemoryStore};
    use crate::transfer::state::{FailReason, TransferStatus};
    use async_trait::async_trait;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    async fn seed(store: &MemoryStore, balance: Decimal) -> AccountId {
        let account = Account::new(AccountId::new(), balance);
        store.put_account(&account).await.unwrap();
        account.id
    }

    async fn submit(
        store: &MemoryStore,
        from: AccountId,
        to: AccountId,
        amount: Decimal,
    ) -> TransferId {
        let t = Transfer::pending(TransferId::new(), from, to, amount, Utc::now());
        store
            .put_transfer(TransferCollection::Pending, &t)
            .await
            .unwrap();
        t.id
    }

    async fn balance(store: &MemoryStore, id: AccountId) -> Decimal {
        store.get_account(id).await.unwrap().unwrap().balance
    }

    async fn completed(store: &MemoryStore, id: TransferId) -> Transfer {
        store
            .get_transfer(TransferCollection::Completed, id)
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_apply_moves_funds() {
        let store = MemoryStore::new();
        let a = seed(&store, dec!(100.00)).await;
        let b = seed(&store, dec!(20.00)).await;
        let id = submit(&store, a, b, dec!(50.45)).await;

        let applier = TransferApplier::new(Arc::new(store.clone()));
        assert_eq!(applier.apply(id).await, ApplyOutcome::Done);

        assert_eq!(balance(&store, a).await, dec!(49.55));
        assert_eq!(balance(&store, b).await, dec!(70.45));

        let t = completed(&store, id).await;
        assert_eq!(t.status, TransferStatus::Done);
        assert!(t.fail_reasons.is_empty());
        assert!(
            store
                .get_transfer(TransferCollection::Pending, id)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_apply_missing_accounts() {
        let store = MemoryStore::new();
        let id = submit(&store, AccountId::new(), AccountId::new(), dec!(123.45)).await;

        let applier = TransferApplier::new(Arc::new(store.clone()));
        let expected =
            FailReasons::from([FailReason::FromAccountNotFound, FailReason::ToAccountNotFound]);
        assert_eq!(applier.apply(id).await, ApplyOutcome::Failed(expected.clone()));

        let t = completed(&store, id).await;
        assert_eq!(t.status, TransferStatus::Failed);
        assert_eq!(t.fail_reasons, expected);
    }

    #[tokio::test]
    async fn test_apply_insufficient_funds_leaves_balances() {
        let store = MemoryStore::new();
        let a = seed(&store, dec!(0.00)).await;
        let b = seed(&store, dec!(5.00)).await;
        let id = submit(&store, a, b, dec!(123.45)).await;

        let applier = TransferApplier::new(Arc::new(store.clone()));
        assert_eq!(
            applier.apply(id).await,
            ApplyOutcome::Failed(FailReasons::from([FailReason::InsufficientFunds]))
        );

        assert_eq!(balance(&store, a).await, dec!(0.00));
        assert_eq!(balance(&store, b).await, dec!(5.00));
    }

    #[tokio::test]
    async fn test_duplicate_apply_is_noop() {
        let store = MemoryStore::new();
        let a = seed(&store, dec!(10)).await;
        let b = seed(&store, dec!(0)).await;
        let id = submit(&store, a, b, dec!(4)).await;

        let applier = TransferApplier::new(Arc::new(store.clone()));
        assert_eq!(applier.apply(id).await, ApplyOutcome::Done);
        let resolved = completed(&store, id).await;

        assert_eq!(applier.apply(id).await, ApplyOutcome::AlreadyConsumed);
        assert_eq!(balance(&store, a).await, dec!(6));
        assert_eq!(balance(&store, b).await, dec!(4));
        assert_eq!(completed(&store, id).await, resolved);
    }

    #[tokio::test]
    async fn test_duplicate_apply_of_failed_transfer_is_noop() {
        let store = MemoryStore::new();
        let a = seed(&store, dec!(1.00)).await;
        let b = seed(&store, dec!(0)).await;
        let id = submit(&store, a, b, dec!(4)).await;

        let applier = TransferApplier::new(Arc::new(store.clone()));
        let reasons = FailReasons::from([FailReason::InsufficientFunds]);
        assert_eq!(applier.apply(id).await, ApplyOutcome::Failed(reasons.clone()));
        let resolved = completed(&store, id).await;
        assert_eq!(resolved.status, TransferStatus::Failed);

        // Funds arrive later; the failed transfer must not be retried
        store
            .put_account(&Account::new(a, dec!(100.00)))
            .await
            .unwrap();

        assert_eq!(applier.apply(id).await, ApplyOutcome::AlreadyConsumed);
        assert_eq!(completed(&store, id).await, resolved);
        assert_eq!(resolved.fail_reasons, reasons);
        assert_eq!(balance(&store, a).await, dec!(100.00));
        assert_eq!(balance(&store, b).await, dec!(0));
    }

    #[tokio::test]
    async fn test_inexact_credit_is_rejected_and_conserves_money() {
        let store = MemoryStore::new();
        let a = seed(&store, dec!(2000000.00)).await;
        let b = seed(&store, dec!(0.1234567890123456789012345678)).await;
        let id = submit(&store, a, b, dec!(1000000.00)).await;

        let applier = TransferApplier::new(Arc::new(store.clone()));
        assert_eq!(
            applier.apply(id).await,
            ApplyOutcome::Failed(FailReasons::from([FailReason::IncorrectAmount]))
        );

        assert_eq!(balance(&store, a).await, dec!(2000000.00));
        assert_eq!(
            balance(&store, b).await,
            dec!(0.1234567890123456789012345678)
        );
    }

    #[tokio::test]
    async fn test_unknown_id_is_already_consumed() {
        let applier = TransferApplier::new(Arc::new(MemoryStore::new()));
        assert_eq!(
            applier.apply(TransferId::new()).await,
            ApplyOutcome::AlreadyConsumed
        );
    }

    #[tokio::test]
    async fn test_self_transfer_conserves_balance() {
        let store = MemoryStore::new();
        let a = seed(&store, dec!(10.00)).await;
        let id = submit(&store, a, a, dec!(3.50)).await;

        let applier = TransferApplier::new(Arc::new(store.clone()));
        assert_eq!(applier.apply(id).await, ApplyOutcome::Done);
        assert_eq!(balance(&store, a).await, dec!(10.00));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_apply_same_id_applies_once() {
        let store = MemoryStore::new();
        let a = seed(&store, dec!(100)).await;
        let b = seed(&store, dec!(0)).await;
        let id = submit(&store, a, b, dec!(1.23)).await;

        let applier = TransferApplier::new(Arc::new(store.clone()));
        let mut handles = Vec::new();
        for _ in 0..16 {
            let applier = applier.clone();
            handles.push(tokio::spawn(async move { applier.apply(id).await }));
        }

        let mut done = 0;
        for h in handles {
            match h.await.unwrap() {
                ApplyOutcome::Done => done += 1,
                ApplyOutcome::AlreadyConsumed | ApplyOutcome::Requeued => {}
                other => panic!("unexpected outcome {:?}", other),
            }
        }

        assert_eq!(done, 1);
        assert_eq!(balance(&store, a).await, dec!(98.77));
        assert_eq!(balance(&store, b).await, dec!(1.23));
    }

    // === Commit failure ===

    /// Store whose transactions always fail to commit
    struct ConflictingStore(MemoryStore);

    struct ConflictingTxn(Box<dyn LedgerTxn>);

    #[async_trait]
    impl LedgerStore for ConflictingStore {
        async fn get_account(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
            self.0.get_account(id).await
        }
        async fn put_account(&self, account: &Account) -> Result<(), StoreError> {
            self.0.put_account(account).await
        }
        async fn get_transfer(
            &self,
            collection: TransferCollection,
            id: TransferId,
        ) -> Result<Option<Transfer>, StoreError> {
            self.0.get_transfer(collection, id).await
        }
        async fn put_transfer(
            &self,
            collection: TransferCollection,
            transfer: &Transfer,
        ) -> Result<(), StoreError> {
            self.0.put_transfer(collection, transfer).await
        }
        async fn oldest_pending(&self, limit: usize) -> Result<Vec<TransferId>, StoreError> {
            self.0.oldest_pending(limit).await
        }
        async fn transfers_by_account(
            &self,
            collection: TransferCollection,
            account: AccountId,
        ) -> Result<Vec<Transfer>, StoreError> {
            self.0.transfers_by_account(collection, account).await
        }
        async fn begin(&self) -> Result<Box<dyn LedgerTxn>, StoreError> {
            Ok(Box::new(ConflictingTxn(self.0.begin().await?)))
        }
    }

    #[async_trait]
    impl LedgerTxn for ConflictingTxn {
        async fn take_transfer(
            &mut self,
            collection: TransferCollection,
            id: TransferId,
        ) -> Result<Option<Transfer>, StoreError> {
            self.0.take_transfer(collection, id).await
        }
        async fn get_account(&mut self, id: AccountId) -> Result<Option<Account>, StoreError> {
            self.0.get_account(id).await
        }
        async fn put_account(&mut self, account: Account) -> Result<(), StoreError> {
            self.0.put_account(account).await
        }
        async fn put_transfer(
            &mut self,
            collection: TransferCollection,
            transfer: Transfer,
        ) -> Result<(), StoreError> {
            self.0.put_transfer(collection, transfer).await
        }
        async fn commit(self: Box<Self>) -> Result<(), StoreError> {
            Err(StoreError::Conflict)
        }
    }

    #[tokio::test]
    async fn test_commit_failure_requeues() {
        let store = MemoryStore::new();
        let a = seed(&store, dec!(100)).await;
        let b = seed(&store, dec!(0)).await;
        let id = submit(&store, a, b, dec!(10)).await;

        let applier = TransferApplier::new(Arc::new(ConflictingStore(store.clone())));
        assert_eq!(applier.apply(id).await, ApplyOutcome::Requeued);

        // Nothing took effect
        assert_eq!(store.oldest_pending(10).await.unwrap(), vec![id]);
        assert_eq!(balance(&store, a).await, dec!(100));
        assert_eq!(balance(&store, b).await, dec!(0));
        assert!(
            store
                .get_transfer(TransferCollection::Completed, id)
                .await
                .unwrap()
                .is_none()
        );

        // Redelivery against a healthy store resolves it
        let healthy = TransferApplier::new(Arc::new(store.clone()));
        assert_eq!(healthy.apply(id).await, ApplyOutcome::Done);
    }
}
