//! Approval engine

use crate::crypto::Identity;
use crate::host::ActionHost;
use crate::multisig::error::MultisigError;
use crate::multisig::program::MultisigProgram;
use crate::multisig::state::{MultisigGroup, PendingTransaction};
use crate::storage::RecordStore;

impl PendingTransaction {
    /// Set `owner`'s approval bit
    ///
    /// Returns whether the bit changed. Setting an already-set bit is a
    /// successful no-op. The owners-version snapshot is deliberately not
    /// checked; a stale transaction can collect approvals but never run.
    pub(crate) fn approve(
        &mut self,
        group: &MultisigGroup,
        owner: &Identity,
    ) -> Result<bool, MultisigError> {
        let index = group
            .owner_index(owner)
            .ok_or(MultisigError::InvalidOwner(*owner))?;

        // A grown owner set can place an owner past the end of a stale bitmap
        match self.signers.get_mut(index) {
            Some(bit) => {
                let changed = !*bit;
                *bit = true;
                Ok(changed)
            }
            None => Ok(false),
        }
    }
}

impl<S: RecordStore, H: ActionHost> MultisigProgram<S, H> {
    /// Record `owner`'s approval of `transaction`
    ///
    /// Never executes the transaction; returns the updated record.
    pub fn approve(
        &self,
        owner: &Identity,
        multisig: &Identity,
        transaction: &Identity,
    ) -> Result<PendingTransaction, MultisigError> {
        self.store
            .update_transaction(transaction, |tx, group| -> Result<PendingTransaction, MultisigError> {
                if tx.multisig != *multisig {
                    return Err(MultisigError::InvalidMultisig(format!(
                        "transaction {} belongs to multisig {}",
                        tx.id, tx.multisig
                    )));
                }

                let changed = tx.approve(group, owner)?;
                log::debug!(
                    "Owner {} approved {} ({}/{} approvals{})",
                    owner,
                    tx.id,
                    tx.approval_count(),
                    group.threshold,
                    if changed { "" } else { ", unchanged" }
                );
                Ok(tx.clone())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_approval_is_idempotent() {
        let (program, keys, group) = testing::two_of_three();
        let tx = testing::propose(&program, &keys[0], &group);

        let once = program
            .approve(&keys[1].identity(), group.id(), tx.id())
            .unwrap();
        let twice = program
            .approve(&keys[1].identity(), group.id(), tx.id())
            .unwrap();

        assert_eq!(once.signers(), &[true, true, false]);
        assert_eq!(once.signers(), twice.signers());
        assert_eq!(twice.approval_count(), 2);
    }

    #[test]
    fn test_proposer_reapproval_is_noop() {
        let (program, keys, group) = testing::two_of_three();
        let tx = testing::propose(&program, &keys[0], &group);

        let after = program
            .approve(&keys[0].identity(), group.id(), tx.id())
            .unwrap();
        assert_eq!(after.signers(), &[true, false, false]);
    }

    #[test]
    fn test_non_owner_cannot_approve() {
        let (program, keys, group) = testing::two_of_three();
        let tx = testing::propose(&program, &keys[0], &group);
        let outsider = Identity::from_seed("d");

        assert!(matches!(
            program.approve(&outsider, group.id(), tx.id()),
            Err(MultisigError::InvalidOwner(id)) if id == outsider
        ));
        assert_eq!(program.transaction(tx.id()).unwrap(), tx);
    }

    #[test]
    fn test_approval_never_executes() {
        let (program, keys, group) = testing::two_of_three();
        let tx = testing::propose(&program, &keys[0], &group);

        let approved = program
            .approve(&keys[1].identity(), group.id(), tx.id())
            .unwrap();
        assert!(!approved.is_executed());
        assert!(program.host().calls().is_empty());
    }

    #[test]
    fn test_mismatched_group_rejected() {
        let (program, keys, group) = testing::two_of_three();
        let owners: Vec<Identity> = keys.iter().map(|k| k.identity()).collect();
        let other = program.initialize(&owners[0], owners.clone(), 1, 0).unwrap();
        let tx = testing::propose(&program, &keys[0], &group);

        assert!(matches!(
            program.approve(&owners[1], other.id(), tx.id()),
            Err(MultisigError::InvalidMultisig(_))
        ));
        assert!(matches!(
            program.approve(&owners[1], group.id(), &Identity::from_seed("missing")),
            Err(MultisigError::TransactionNotFound(_))
        ));
    }

    #[test]
    fn test_stale_transaction_accepts_approval() {
        let (program, keys, group) = testing::two_of_three();
        let tx = testing::propose(&program, &keys[0], &group);
        let owners: Vec<Identity> = keys.iter().map(|k| k.identity()).collect();
        program.reconfigure(group.id(), owners.clone(), 3).unwrap();

        let approved = program.approve(&owners[2], group.id(), tx.id()).unwrap();
        assert_eq!(approved.signers(), &[true, false, true]);
    }

    #[test]
    fn test_concurrent_approvals_commute() {
        let (program, keys, group) = testing::program_with_group(5, 5);
        let program = Arc::new(program);
        let tx = testing::propose(&program, &keys[0], &group);

        let handles: Vec<_> = keys
            .iter()
            .map(|k| k.identity())
            .flat_map(|owner| [owner, owner])
            .map(|owner| {
                let program = Arc::clone(&program);
                let group_id = *group.id();
                let tx_id = *tx.id();
                thread::spawn(move || program.approve(&owner, &group_id, &tx_id).map(|_| ()))
            })
            .collect();

        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        let final_tx = program.transaction(tx.id()).unwrap();
        assert_eq!(final_tx.signers(), &[true; 5]);
    }
}
