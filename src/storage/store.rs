//! Record storage interface
//!
//! The engine persists two record kinds, groups and pending transactions,
//! and needs every instruction to be one atomic check-then-mutate unit.
//! Implementations provide that through closure-scoped updates: the
//! closure sees a consistent view, and its changes are committed only if
//! it returns `Ok`.

use crate::crypto::Identity;
use crate::multisig::{MultisigGroup, PendingTransaction};
use std::fmt;
use std::io;
use thiserror::Error;

/// Kind of persisted record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Group,
    Transaction,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Group => f.write_str("group"),
            RecordKind::Transaction => f.write_str("transaction"),
        }
    }
}

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Invalid data: {0}")]
    InvalidData(String),
    #[error("{kind} {id} not found")]
    NotFound { kind: RecordKind, id: Identity },
    #[error("{kind} {id} already exists")]
    AlreadyExists { kind: RecordKind, id: Identity },
    #[error("Lock poisoned: {0}")]
    LockPoisoned(&'static str),
}

/// Atomic per-record storage for multisig state
pub trait RecordStore: Send + Sync {
    /// Monotonic counter used to derive fresh record ids
    fn next_sequence(&self) -> u64;

    /// Persist a new group; fails if the id is taken
    fn insert_group(&self, group: MultisigGroup) -> Result<(), StorageError>;

    /// Persist a new transaction; fails if the id is taken
    fn insert_transaction(&self, transaction: PendingTransaction) -> Result<(), StorageError>;

    fn load_group(&self, id: &Identity) -> Result<Option<MultisigGroup>, StorageError>;

    fn load_transaction(&self, id: &Identity)
        -> Result<Option<PendingTransaction>, StorageError>;

    fn list_groups(&self) -> Result<Vec<MultisigGroup>, StorageError>;

    /// Transactions belonging to `group`, oldest first
    fn list_transactions(&self, group: &Identity)
        -> Result<Vec<PendingTransaction>, StorageError>;

    /// Run `f` against a group while holding it against concurrent updates
    fn read_group<T, E, F>(&self, id: &Identity, f: F) -> Result<T, E>
    where
        F: FnOnce(&MultisigGroup) -> Result<T, E>,
        E: From<StorageError>;

    /// Mutate a group exclusively; changes persist only on `Ok`
    fn update_group<T, E, F>(&self, id: &Identity, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut MultisigGroup) -> Result<T, E>,
        E: From<StorageError>;

    /// Mutate a transaction exclusively, with its group held stable
    ///
    /// Changes persist only on `Ok`. Concurrent updates to the same
    /// transaction are serialized.
    fn update_transaction<T, E, F>(&self, id: &Identity, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut PendingTransaction, &MultisigGroup) -> Result<T, E>,
        E: From<StorageError>;
}
