//! In-process ledger store
//!
//! `MemoryStore` keeps the three collections in hash maps behind a single
//! `RwLock`, plus a `(date, id)` index over the pending collection.
//!
//! # Optimistic concurrency
//!
//! Every key carries a version: the value of the commit clock at its last
//! write. Removed keys keep their version as a tombstone, so a transaction
//! that saw a key as absent still conflicts with a concurrent insert.
//!
//! A transaction records the version of each key on first touch (read or
//! write) and buffers its writes. `commit` takes the write lock, checks every
//! recorded version against the current one, and either applies all writes
//! under one new clock value or returns `StoreError::Conflict`.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, trace};

use super::{LedgerStore, LedgerTxn, StoreError, TransferCollection};
use crate::account::Account;
use crate::core_types::{AccountId, TransferId};
use crate::transfer::Transfer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Key {
    Account(AccountId),
    Transfer(TransferCollection, TransferId),
}

/// Buffered write inside a transaction
#[derive(Debug, Clone)]
enum Staged {
    Account(Account),
    Transfer(TransferCollection, Transfer),
    Removed,
}

#[derive(Debug, Default)]
struct Tables {
    accounts: HashMap<AccountId, Account>,
    pending: HashMap<TransferId, Transfer>,
    completed: HashMap<TransferId, Transfer>,
    /// Secondary index on the pending collection
    pending_by_date: BTreeSet<(DateTime<Utc>, TransferId)>,
    versions: HashMap<Key, u64>,
    clock: u64,
}

impl Tables {
    fn version(&self, key: &Key) -> u64 {
        self.versions.get(key).copied().unwrap_or(0)
    }

    fn transfers(&self, collection: TransferCollection) -> &HashMap<TransferId, Transfer> {
        match collection {
            TransferCollection::Pending => &self.pending,
            TransferCollection::Completed => &self.completed,
        }
    }

    fn lookup(&self, key: &Key) -> Option<Staged> {
        match key {
            Key::Account(id) => self.accounts.get(id).cloned().map(Staged::Account),
            Key::Transfer(collection, id) => self
                .transfers(*collection)
                .get(id)
                .map(|t| Staged::Transfer(*collection, t.clone())),
        }
    }

    fn insert_transfer(&mut self, collection: TransferCollection, transfer: Transfer) {
        match collection {
            TransferCollection::Pending => {
                if let Some(old) = self.pending.get(&transfer.id) {
                    self.pending_by_date.remove(&(old.date, old.id));
                }
                self.pending_by_date.insert((transfer.date, transfer.id));
                self.pending.insert(transfer.id, transfer);
            }
            TransferCollection::Completed => {
                self.completed.insert(transfer.id, transfer);
            }
        }
    }

    fn remove_transfer(&mut self, collection: TransferCollection, id: TransferId) {
        match collection {
            TransferCollection::Pending => {
                if let Some(old) = self.pending.remove(&id) {
                    self.pending_by_date.remove(&(old.date, old.id));
                }
            }
            TransferCollection::Completed => {
                self.completed.remove(&id);
            }
        }
    }

    /// Apply a set of writes under one new clock value
    fn apply(&mut self, writes: impl IntoIterator<Item = (Key, Staged)>) {
        self.clock += 1;
        let version = self.clock;

        for (key, staged) in writes {
            match (key, staged) {
                (_, Staged::Account(account)) => {
                    self.accounts.insert(account.id, account);
                }
                (_, Staged::Transfer(collection, transfer)) => {
                    self.insert_transfer(collection, transfer);
                }
                (Key::Account(id), Staged::Removed) => {
                    self.accounts.remove(&id);
                }
                (Key::Transfer(collection, id), Staged::Removed) => {
                    self.remove_transfer(collection, id);
                }
            }
            self.versions.insert(key, version);
        }
    }
}

fn read_tables(tables: &RwLock<Tables>) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
    tables
        .read()
        .map_err(|_| StoreError::Unavailable("ledger lock poisoned".to_string()))
}

fn write_tables(tables: &RwLock<Tables>) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
    tables
        .write()
        .map_err(|_| StoreError::Unavailable("ledger lock poisoned".to_string()))
}

/// In-process ledger store with optimistic transactions
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn get_account(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        Ok(read_tables(&self.tables)?.accounts.get(&id).cloned())
    }

    async fn put_account(&self, account: &Account) -> Result<(), StoreError> {
        let mut tables = write_tables(&self.tables)?;
        tables.apply([(Key::Account(account.id), Staged::Account(account.clone()))]);
        Ok(())
    }

    async fn get_transfer(
        &self,
        collection: TransferCollection,
        id: TransferId,
    ) -> Result<Option<Transfer>, StoreError> {
        Ok(read_tables(&self.tables)?
            .transfers(collection)
            .get(&id)
            .cloned())
    }

    async fn put_transfer(
        &self,
        collection: TransferCollection,
        transfer: &Transfer,
    ) -> Result<(), StoreError> {
        let mut tables = write_tables(&self.tables)?;
        tables.apply([(
            Key::Transfer(collection, transfer.id),
            Staged::Transfer(collection, transfer.clone()),
        )]);
        Ok(())
    }

    async fn oldest_pending(&self, limit: usize) -> Result<Vec<TransferId>, StoreError> {
        Ok(read_tables(&self.tables)?
            .pending_by_date
            .iter()
            .take(limit)
            .map(|(_, id)| *id)
            .collect())
    }

    async fn transfers_by_account(
        &self,
        collection: TransferCollection,
        account: AccountId,
    ) -> Result<Vec<Transfer>, StoreError> {
        Ok(read_tables(&self.tables)?
            .transfers(collection)
            .values()
            .filter(|t| t.involves(account))
            .cloned()
            .collect())
    }

    async fn begin(&self) -> Result<Box<dyn LedgerTxn>, StoreError> {
        Ok(Box::new(MemoryTxn {
            tables: Arc::clone(&self.tables),
            observed: HashMap::new(),
            writes: HashMap::new(),
        }))
    }
}

/// Transaction over a [`MemoryStore`]
struct MemoryTxn {
    tables: Arc<RwLock<Tables>>,
    /// Version of each touched key at first touch
    observed: HashMap<Key, u64>,
    /// Latest buffered write per key
    writes: HashMap<Key, Staged>,
}

impl MemoryTxn {
    /// Read a key through the write buffer, recording its committed version
    fn read(&mut self, key: Key) -> Result<Option<Staged>, StoreError> {
        if let Some(staged) = self.writes.get(&key) {
            return Ok(match staged {
                Staged::Removed => None,
                other => Some(other.clone()),
            });
        }

        let tables = read_tables(&self.tables)?;
        self.observed.entry(key).or_insert_with(|| tables.version(&key));
        Ok(tables.lookup(&key))
    }

    fn stage(&mut self, key: Key, staged: Staged) -> Result<(), StoreError> {
        if !self.observed.contains_key(&key) {
            let version = read_tables(&self.tables)?.version(&key);
            self.observed.insert(key, version);
        }
        self.writes.insert(key, staged);
        Ok(())
    }
}

#[async_trait]
impl LedgerTxn for MemoryTxn {
    async fn take_transfer(
        &mut self,
        collection: TransferCollection,
        id: TransferId,
    ) -> Result<Option<Transfer>, StoreError> {
        let key = Key::Transfer(collection, id);
        match self.read(key)? {
            Some(Staged::Transfer(_, transfer)) => {
                self.writes.insert(key, Staged::Removed);
                Ok(Some(transfer))
            }
            _ => Ok(None),
        }
    }

    async fn get_account(&mut self, id: AccountId) -> Result<Option<Account>, StoreError> {
        match self.read(Key::Account(id))? {
            Some(Staged::Account(account)) => Ok(Some(account)),
            _ => Ok(None),
        }
    }

    async fn put_account(&mut self, account: Account) -> Result<(), StoreError> {
        self.stage(Key::Account(account.id), Staged::Account(account))
    }

    async fn put_transfer(
        &mut self,
        collection: TransferCollection,
        transfer: Transfer,
    ) -> Result<(), StoreError> {
        self.stage(
            Key::Transfer(collection, transfer.id),
            Staged::Transfer(collection, transfer),
        )
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTxn {
            tables,
            observed,
            writes,
        } = *self;

        if writes.is_empty() {
            trace!("Read-only transaction committed");
            return Ok(());
        }

        let mut tables = write_tables(&tables)?;

        if let Some(key) = observed
            .iter()
            .find(|(key, version)| tables.version(key) != **version)
            .map(|(key, _)| *key)
        {
            debug!(?key, "Transaction conflict detected at commit");
            return Err(StoreError::Conflict);
        }

        tables.apply(writes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn pending_at(secs: i64) -> Transfer {
        Transfer::pending(
            TransferId::new(),
            AccountId::new(),
            AccountId::new(),
            dec!(1.00),
            DateTime::from_timestamp(secs, 0).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_single_key_operations() {
        let store = MemoryStore::new();
        let account = Account::new(AccountId::new(), dec!(10));

        assert!(store.get_account(account.id).await.unwrap().is_none());
        store.put_account(&account).await.unwrap();
        assert_eq!(store.get_account(account.id).await.unwrap(), Some(account));

        let t = pending_at(1);
        store
            .put_transfer(TransferCollection::Pending, &t)
            .await
            .unwrap();
        assert_eq!(
            store
                .get_transfer(TransferCollection::Pending, t.id)
                .await
                .unwrap(),
            Some(t.clone())
        );
        assert!(
            store
                .get_transfer(TransferCollection::Completed, t.id)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_oldest_pending_is_date_ordered() {
        let store = MemoryStore::new();
        let t3 = pending_at(30);
        let t1 = pending_at(10);
        let t2 = pending_at(20);
        for t in [&t3, &t1, &t2] {
            store
                .put_transfer(TransferCollection::Pending, t)
                .await
                .unwrap();
        }

        assert_eq!(store.oldest_pending(2).await.unwrap(), vec![t1.id, t2.id]);
        assert_eq!(
            store.oldest_pending(10).await.unwrap(),
            vec![t1.id, t2.id, t3.id]
        );
        assert!(store.oldest_pending(0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_take_removes_from_index_on_commit() {
        let store = MemoryStore::new();
        let t = pending_at(1);
        store
            .put_transfer(TransferCollection::Pending, &t)
            .await
            .unwrap();

        let mut txn = store.begin().await.unwrap();
        let taken = txn
            .take_transfer(TransferCollection::Pending, t.id)
            .await
            .unwrap();
        assert_eq!(taken, Some(t.clone()));

        // Taking again inside the same transaction sees our own removal
        assert!(
            txn.take_transfer(TransferCollection::Pending, t.id)
                .await
                .unwrap()
                .is_none()
        );

        // Not committed yet: other readers still see it
        assert_eq!(store.oldest_pending(10).await.unwrap(), vec![t.id]);

        txn.commit().await.unwrap();
        assert!(store.oldest_pending(10).await.unwrap().is_empty());
        assert!(
            store
                .get_transfer(TransferCollection::Pending, t.id)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_drop_without_commit_rolls_back() {
        let store = MemoryStore::new();
        let account = Account::new(AccountId::new(), dec!(10));
        store.put_account(&account).await.unwrap();

        {
            let mut txn = store.begin().await.unwrap();
            txn.put_account(Account::new(account.id, dec!(0)))
                .await
                .unwrap();
        }

        assert_eq!(
            store.get_account(account.id).await.unwrap().unwrap().balance,
            dec!(10)
        );
    }

    #[tokio::test]
    async fn test_read_committed_isolation() {
        let store = MemoryStore::new();
        let account = Account::new(AccountId::new(), dec!(10));
        store.put_account(&account).await.unwrap();

        let mut writer = store.begin().await.unwrap();
        writer
            .put_account(Account::new(account.id, dec!(99)))
            .await
            .unwrap();

        let mut reader = store.begin().await.unwrap();
        let seen = reader.get_account(account.id).await.unwrap().unwrap();
        assert_eq!(seen.balance, dec!(10));

        // Own writes are visible
        let own = writer.get_account(account.id).await.unwrap().unwrap();
        assert_eq!(own.balance, dec!(99));
    }

    #[tokio::test]
    async fn test_conflicting_transactions() {
        let store = MemoryStore::new();
        let account = Account::new(AccountId::new(), dec!(100));
        store.put_account(&account).await.unwrap();

        let mut t1 = store.begin().await.unwrap();
        let mut t2 = store.begin().await.unwrap();

        let mut a1 = t1.get_account(account.id).await.unwrap().unwrap();
        let mut a2 = t2.get_account(account.id).await.unwrap().unwrap();
        a1.balance -= dec!(30);
        a2.balance -= dec!(50);
        t1.put_account(a1).await.unwrap();
        t2.put_account(a2).await.unwrap();

        t1.commit().await.unwrap();
        assert_eq!(t2.commit().await, Err(StoreError::Conflict));

        // No lost update: only the first debit applied
        assert_eq!(
            store.get_account(account.id).await.unwrap().unwrap().balance,
            dec!(70)
        );
    }

    #[tokio::test]
    async fn test_concurrent_take_only_one_wins() {
        let store = MemoryStore::new();
        let t = pending_at(1);
        store
            .put_transfer(TransferCollection::Pending, &t)
            .await
            .unwrap();

        let mut t1 = store.begin().await.unwrap();
        let mut t2 = store.begin().await.unwrap();
        assert!(
            t1.take_transfer(TransferCollection::Pending, t.id)
                .await
                .unwrap()
                .is_some()
        );
        assert!(
            t2.take_transfer(TransferCollection::Pending, t.id)
                .await
                .unwrap()
                .is_some()
        );

        t1.commit().await.unwrap();
        assert_eq!(t2.commit().await, Err(StoreError::Conflict));
    }

    #[tokio::test]
    async fn test_absent_key_conflicts_with_insert() {
        let store = MemoryStore::new();
        let id = AccountId::new();

        let mut txn = store.begin().await.unwrap();
        assert!(txn.get_account(id).await.unwrap().is_none());
        txn.put_account(Account::new(id, dec!(1))).await.unwrap();

        store.put_account(&Account::new(id, dec!(5))).await.unwrap();
        assert_eq!(txn.commit().await, Err(StoreError::Conflict));
    }

    #[tokio::test]
    async fn test_transfers_by_account() {
        let store = MemoryStore::new();
        let a = AccountId::new();
        let mut out = pending_at(1);
        out.account_from = a;
        let mut inbound = pending_at(2);
        inbound.account_to = a;
        let other = pending_at(3);

        for t in [&out, &inbound, &other] {
            store
                .put_transfer(TransferCollection::Pending, t)
                .await
                .unwrap();
        }

        let mut found: Vec<TransferId> = store
            .transfers_by_account(TransferCollection::Pending, a)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        found.sort();
        let mut expected = vec![out.id, inbound.id];
        expected.sort();
        assert_eq!(found, expected);

        assert!(
            store
                .transfers_by_account(TransferCollection::Completed, a)
                .await
                .unwrap()
                .is_empty()
        );
    }
}
