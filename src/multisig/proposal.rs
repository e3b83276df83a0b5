//! Proposal store
//!
//! The single creation path for pending transactions.

use crate::config::EngineConfig;
use crate::crypto::Identity;
use crate::host::ActionHost;
use crate::multisig::error::MultisigError;
use crate::multisig::program::MultisigProgram;
use crate::multisig::state::{MultisigGroup, PendingTransaction, TransactionAccount};
use crate::storage::RecordStore;
use chrono::Utc;

const TRANSACTION_DOMAIN: &str = "multisig-transaction";

impl PendingTransaction {
    /// Build a transaction proposed by `proposer`
    ///
    /// The proposer's approval bit starts set; every other bit starts clear.
    pub(crate) fn propose(
        id: Identity,
        group: &MultisigGroup,
        proposer: &Identity,
        program_id: Identity,
        accounts: Vec<TransactionAccount>,
        data: Vec<u8>,
        config: &EngineConfig,
    ) -> Result<Self, MultisigError> {
        let owner_index = group
            .owner_index(proposer)
            .ok_or(MultisigError::InvalidOwner(*proposer))?;

        if accounts.len() > config.max_accounts {
            return Err(MultisigError::TooManyAccounts {
                count: accounts.len(),
                max: config.max_accounts,
            });
        }

        if data.len() > config.max_payload_len {
            return Err(MultisigError::PayloadTooLarge {
                len: data.len(),
                max: config.max_payload_len,
            });
        }

        let mut signers = vec![false; group.owners.len()];
        signers[owner_index] = true;

        Ok(Self {
            id,
            multisig: group.id,
            program_id,
            accounts,
            data,
            signers,
            executed_at: None,
            owners_version: group.owners_version,
            proposer: *proposer,
            created_at: Utc::now(),
        })
    }
}

impl<S: RecordStore, H: ActionHost> MultisigProgram<S, H> {
    /// Propose a transaction against `multisig`
    ///
    /// The group stays read-locked until the new record is stored, so the
    /// owners-version snapshot cannot race an owner-set change.
    pub fn create_transaction(
        &self,
        proposer: &Identity,
        multisig: &Identity,
        program_id: Identity,
        accounts: Vec<TransactionAccount>,
        data: Vec<u8>,
    ) -> Result<PendingTransaction, MultisigError> {
        self.store
            .read_group(multisig, |group| -> Result<PendingTransaction, MultisigError> {
                let sequence = self.store.next_sequence();
                let id = Identity::derive(
                    TRANSACTION_DOMAIN,
                    &[group.id.as_bytes(), &sequence.to_le_bytes()],
                );

                let transaction = PendingTransaction::propose(
                    id,
                    group,
                    proposer,
                    program_id,
                    accounts,
                    data,
                    &self.config,
                )?;
                self.store.insert_transaction(transaction.clone())?;

                log::info!(
                    "Proposed transaction {} on multisig {} by {} ({} accounts, {} bytes)",
                    transaction.id,
                    group.id,
                    proposer,
                    transaction.accounts.len(),
                    transaction.data.len()
                );
                Ok(transaction)
            })
    }
}
