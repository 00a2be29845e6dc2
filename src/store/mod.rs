//! Ledger Store
//!
//! Contract of the transactional key-value store the transfer engine runs on.
//!
//! # Collections
//!
//! - **accounts**: `AccountId → Account`
//! - **pending transfers**: `TransferId → Transfer` (status always PENDING),
//!   with a secondary index on `date` for FIFO draining
//! - **completed transfers**: `TransferId → Transfer` (DONE or FAILED)
//!
//! # Transactions
//!
//! [`LedgerStore::begin`] opens an optimistic, read-committed transaction. All
//! calls made through the returned [`LedgerTxn`] form one atomic unit: either
//! `commit` applies every buffered write, or it fails with
//! [`StoreError::Conflict`] and none of them take effect. Dropping a
//! transaction without committing discards it.

pub mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::account::Account;
use crate::core_types::{AccountId, TransferId};
use crate::transfer::Transfer;

/// Which transfer collection an operation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferCollection {
    Pending,
    Completed,
}

/// Store error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A key read or written by the transaction was changed by another
    /// committed write. Nothing was applied.
    #[error("Optimistic transaction conflict")]
    Conflict,

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Ledger store - atomic single-key operations, queries and transactions
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn get_account(&self, id: AccountId) -> Result<Option<Account>, StoreError>;

    async fn put_account(&self, account: &Account) -> Result<(), StoreError>;

    async fn get_transfer(
        &self,
        collection: TransferCollection,
        id: TransferId,
    ) -> Result<Option<Transfer>, StoreError>;

    async fn put_transfer(
        &self,
        collection: TransferCollection,
        transfer: &Transfer,
    ) -> Result<(), StoreError>;

    /// Ids of the `limit` oldest pending transfers, ordered by `date` ascending
    ///
    /// Ties on `date` are broken by id, so the order is total but not
    /// submission order for identical timestamps.
    async fn oldest_pending(&self, limit: usize) -> Result<Vec<TransferId>, StoreError>;

    /// Every transfer in `collection` with `account_from == account` or
    /// `account_to == account`, in no particular order
    async fn transfers_by_account(
        &self,
        collection: TransferCollection,
        account: AccountId,
    ) -> Result<Vec<Transfer>, StoreError>;

    /// Begin an optimistic, read-committed transaction
    async fn begin(&self) -> Result<Box<dyn LedgerTxn>, StoreError>;
}

/// Open transaction handle
///
/// Reads observe the transaction's own buffered writes first, then the last
/// committed state. Writes are buffered until [`LedgerTxn::commit`].
#[async_trait]
pub trait LedgerTxn: Send {
    /// Atomic get-and-remove
    async fn take_transfer(
        &mut self,
        collection: TransferCollection,
        id: TransferId,
    ) -> Result<Option<Transfer>, StoreError>;

    async fn get_account(&mut self, id: AccountId) -> Result<Option<Account>, StoreError>;

    async fn put_account(&mut self, account: Account) -> Result<(), StoreError>;

    async fn put_transfer(
        &mut self,
        collection: TransferCollection,
        transfer: Transfer,
    ) -> Result<(), StoreError>;

    /// Validate and apply all buffered writes, or fail with `Conflict`
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
