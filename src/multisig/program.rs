//! Multisig program
//!
//! Binds a record store, a host runtime and capacity limits. The
//! instruction handlers live in `registry`, `proposal`, `approval` and
//! `execution`, each as an `impl` block on [`MultisigProgram`].

use crate::config::EngineConfig;
use crate::crypto::Identity;
use crate::host::ActionHost;
use crate::multisig::error::MultisigError;
use crate::multisig::state::{MultisigGroup, PendingTransaction};
use crate::storage::{RecordKind, RecordStore, StorageError};

/// The multisig authorization engine
pub struct MultisigProgram<S, H> {
    pub(crate) store: S,
    pub(crate) host: H,
    pub(crate) config: EngineConfig,
}

impl<S: RecordStore, H: ActionHost> MultisigProgram<S, H> {
    /// Create a program over `store` and `host`
    pub fn new(store: S, host: H, config: EngineConfig) -> Self {
        Self {
            store,
            host,
            config,
        }
    }

    /// Create a program with default capacity limits
    pub fn with_defaults(store: S, host: H) -> Self {
        Self::new(store, host, EngineConfig::default())
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Load a group
    pub fn group(&self, id: &Identity) -> Result<MultisigGroup, MultisigError> {
        self.store.load_group(id)?.ok_or_else(|| {
            StorageError::NotFound {
                kind: RecordKind::Group,
                id: *id,
            }
            .into()
        })
    }

    /// Load a pending or executed transaction
    pub fn transaction(&self, id: &Identity) -> Result<PendingTransaction, MultisigError> {
        self.store
            .load_transaction(id)?
            .ok_or(MultisigError::TransactionNotFound(*id))
    }

    /// All groups, oldest first
    pub fn groups(&self) -> Result<Vec<MultisigGroup>, MultisigError> {
        Ok(self.store.list_groups()?)
    }

    /// All transactions proposed under a group, oldest first
    pub fn transactions_for(
        &self,
        group: &Identity,
    ) -> Result<Vec<PendingTransaction>, MultisigError> {
        // Surface a missing group as InvalidMultisig rather than an empty list
        self.group(group)?;
        Ok(self.store.list_transactions(group)?)
    }
}
