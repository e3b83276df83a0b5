//! Multisig error taxonomy

use crate::crypto::{Identity, KeyError};
use crate::host::HostError;
use crate::storage::{RecordKind, StorageError};
use thiserror::Error;

/// Errors returned by multisig instructions
///
/// Every error is fatal to the single instruction that raised it and
/// leaves persisted state untouched.
#[derive(Error, Debug)]
pub enum MultisigError {
    #[error("The given owner is not part of this multisig: {0}")]
    InvalidOwner(Identity),
    #[error("Invalid owners: {0}")]
    InvalidOwners(String),
    #[error("Threshold must be > 0 and <= total owners (threshold {threshold}, owners {owners})")]
    InvalidThreshold { threshold: u64, owners: usize },
    #[error("Too many owners provided: {count} (max {max})")]
    TooManyOwners { count: usize, max: usize },
    #[error("Too many accounts in transaction: {count} (max {max})")]
    TooManyAccounts { count: usize, max: usize },
    #[error("Transaction payload too large: {len} bytes (max {max})")]
    PayloadTooLarge { len: usize, max: usize },
    #[error("Invalid multisig account: {0}")]
    InvalidMultisig(String),
    #[error("Transaction not found: {0}")]
    TransactionNotFound(Identity),
    #[error("Transaction has already been executed")]
    AlreadyExecuted,
    #[error("Not enough signers to execute transaction: have {have}, need {need}")]
    NotEnoughSignatures { have: usize, need: u64 },
    #[error("The owner set has changed since the transaction was created (version {snapshot}, now {current})")]
    OwnerSetChanged { snapshot: u32, current: u32 },
    #[error("Invalid accounts provided for execution: {0}")]
    InvalidAccounts(String),
    #[error("Caller could not be authenticated: {0}")]
    Unauthenticated(String),
    #[error("Target invocation failed: {0}")]
    InvocationFailed(#[from] HostError),
    #[error("Key error: {0}")]
    KeyError(#[from] KeyError),
    #[error("Storage error: {0}")]
    StorageError(StorageError),
}

impl MultisigError {
    /// True when retrying the same transaction can never succeed
    ///
    /// `NotEnoughSignatures` and failed invocations may succeed later;
    /// an executed or stale transaction never will.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            MultisigError::AlreadyExecuted
                | MultisigError::OwnerSetChanged { .. }
                | MultisigError::InvalidMultisig(_)
                | MultisigError::TransactionNotFound(_)
        )
    }
}

impl From<StorageError> for MultisigError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound {
                kind: RecordKind::Group,
                id,
            } => MultisigError::InvalidMultisig(format!("multisig {} does not exist", id)),
            StorageError::NotFound {
                kind: RecordKind::Transaction,
                id,
            } => MultisigError::TransactionNotFound(id),
            other => MultisigError::StorageError(other),
        }
    }
}
