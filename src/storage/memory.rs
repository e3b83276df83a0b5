//! In-memory record store
//!
//! Each record sits behind its own lock. Transaction updates take the
//! transaction's mutex first and then a read lock on its group, so an
//! execution can never interleave with an owner-set change.

use super::store::{RecordKind, RecordStore, StorageError};
use crate::crypto::Identity;
use crate::multisig::{MultisigGroup, PendingTransaction};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

type GroupCell = Arc<RwLock<MultisigGroup>>;
type TransactionCell = Arc<Mutex<PendingTransaction>>;

/// Serializable copy of a store's contents
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub sequence: u64,
    pub groups: Vec<MultisigGroup>,
    pub transactions: Vec<PendingTransaction>,
}

/// Record store backed by process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    sequence: AtomicU64,
    groups: RwLock<HashMap<Identity, GroupCell>>,
    transactions: RwLock<HashMap<Identity, TransactionCell>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from a snapshot
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let groups = snapshot
            .groups
            .into_iter()
            .map(|g| (g.id, Arc::new(RwLock::new(g))))
            .collect();
        let transactions = snapshot
            .transactions
            .into_iter()
            .map(|t| (t.id, Arc::new(Mutex::new(t))))
            .collect();

        Self {
            sequence: AtomicU64::new(snapshot.sequence),
            groups: RwLock::new(groups),
            transactions: RwLock::new(transactions),
        }
    }

    /// Copy out every record
    pub fn snapshot(&self) -> Result<Snapshot, StorageError> {
        let mut transactions = Vec::new();
        for cell in self.transaction_cells()? {
            transactions.push(lock_transaction(&cell)?.clone());
        }
        transactions.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        Ok(Snapshot {
            sequence: self.sequence.load(Ordering::SeqCst),
            groups: self.list_groups()?,
            transactions,
        })
    }

    fn group_cell(&self, id: &Identity) -> Result<GroupCell, StorageError> {
        let groups = self
            .groups
            .read()
            .map_err(|_| StorageError::LockPoisoned("groups"))?;
        groups.get(id).cloned().ok_or(StorageError::NotFound {
            kind: RecordKind::Group,
            id: *id,
        })
    }

    fn transaction_cell(&self, id: &Identity) -> Result<TransactionCell, StorageError> {
        let transactions = self
            .transactions
            .read()
            .map_err(|_| StorageError::LockPoisoned("transactions"))?;
        transactions.get(id).cloned().ok_or(StorageError::NotFound {
            kind: RecordKind::Transaction,
            id: *id,
        })
    }

    fn transaction_cells(&self) -> Result<Vec<TransactionCell>, StorageError> {
        let transactions = self
            .transactions
            .read()
            .map_err(|_| StorageError::LockPoisoned("transactions"))?;
        Ok(transactions.values().cloned().collect())
    }
}

fn lock_transaction(
    cell: &TransactionCell,
) -> Result<std::sync::MutexGuard<'_, PendingTransaction>, StorageError> {
    cell.lock()
        .map_err(|_| StorageError::LockPoisoned("transaction"))
}

fn read_guard(
    cell: &GroupCell,
) -> Result<std::sync::RwLockReadGuard<'_, MultisigGroup>, StorageError> {
    cell.read().map_err(|_| StorageError::LockPoisoned("group"))
}

impl RecordStore for MemoryStore {
    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst)
    }

    fn insert_group(&self, group: MultisigGroup) -> Result<(), StorageError> {
        let mut groups = self
            .groups
            .write()
            .map_err(|_| StorageError::LockPoisoned("groups"))?;
        if groups.contains_key(&group.id) {
            return Err(StorageError::AlreadyExists {
                kind: RecordKind::Group,
                id: group.id,
            });
        }
        groups.insert(group.id, Arc::new(RwLock::new(group)));
        Ok(())
    }

    fn insert_transaction(&self, transaction: PendingTransaction) -> Result<(), StorageError> {
        let mut transactions = self
            .transactions
            .write()
            .map_err(|_| StorageError::LockPoisoned("transactions"))?;
        if transactions.contains_key(&transaction.id) {
            return Err(StorageError::AlreadyExists {
                kind: RecordKind::Transaction,
                id: transaction.id,
            });
        }
        transactions.insert(transaction.id, Arc::new(Mutex::new(transaction)));
        Ok(())
    }

    fn load_group(&self, id: &Identity) -> Result<Option<MultisigGroup>, StorageError> {
        let cell = match self.group_cell(id) {
            Ok(cell) => cell,
            Err(StorageError::NotFound { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        let group = read_guard(&cell)?.clone();
        Ok(Some(group))
    }

    fn load_transaction(
        &self,
        id: &Identity,
    ) -> Result<Option<PendingTransaction>, StorageError> {
        let cell = match self.transaction_cell(id) {
            Ok(cell) => cell,
            Err(StorageError::NotFound { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        let transaction = lock_transaction(&cell)?.clone();
        Ok(Some(transaction))
    }

    fn list_groups(&self) -> Result<Vec<MultisigGroup>, StorageError> {
        let cells: Vec<GroupCell> = {
            let groups = self
                .groups
                .read()
                .map_err(|_| StorageError::LockPoisoned("groups"))?;
            groups.values().cloned().collect()
        };

        let mut out = Vec::with_capacity(cells.len());
        for cell in cells {
            out.push(read_guard(&cell)?.clone());
        }
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(out)
    }

    fn list_transactions(
        &self,
        group: &Identity,
    ) -> Result<Vec<PendingTransaction>, StorageError> {
        let mut out = Vec::new();
        for cell in self.transaction_cells()? {
            let tx = lock_transaction(&cell)?;
            if tx.multisig == *group {
                out.push(tx.clone());
            }
        }
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(out)
    }

    fn read_group<T, E, F>(&self, id: &Identity, f: F) -> Result<T, E>
    where
        F: FnOnce(&MultisigGroup) -> Result<T, E>,
        E: From<StorageError>,
    {
        let cell = self.group_cell(id)?;
        let group = read_guard(&cell)?;
        f(&*group)
    }

    fn update_group<T, E, F>(&self, id: &Identity, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut MultisigGroup) -> Result<T, E>,
        E: From<StorageError>,
    {
        let cell = self.group_cell(id)?;
        let mut guard = cell
            .write()
            .map_err(|_| StorageError::LockPoisoned("group"))?;

        let mut working = guard.clone();
        let out = f(&mut working)?;
        *guard = working;
        log::debug!("Committed group {}", id);
        Ok(out)
    }

    fn update_transaction<T, E, F>(&self, id: &Identity, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut PendingTransaction, &MultisigGroup) -> Result<T, E>,
        E: From<StorageError>,
    {
        let cell = self.transaction_cell(id)?;
        let mut guard = lock_transaction(&cell)?;

        let group_cell = self.group_cell(&guard.multisig)?;
        let group = read_guard(&group_cell)?;

        let mut working = guard.clone();
        let out = f(&mut working, &*group)?;
        *guard = working;
        log::debug!("Committed transaction {}", id);
        Ok(out)
    }
}
