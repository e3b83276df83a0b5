//! Execution engine
//!
//! `Pending -> Executed` is the only transition. The target invocation runs
//! inside the transaction's exclusive update, so `executed_at` is written
//! if and only if the host accepted the call, and a racing execute waits
//! and then observes `AlreadyExecuted`.

use crate::crypto::Identity;
use crate::host::{ActionHost, Invocation};
use crate::multisig::authority::AuthorityToken;
use crate::multisig::error::MultisigError;
use crate::multisig::program::MultisigProgram;
use crate::multisig::state::{MultisigGroup, PendingTransaction, TransactionAccount};
use crate::storage::RecordStore;
use chrono::{DateTime, Utc};

/// Compare supplied accounts to the approved ones, flags included
fn match_accounts(
    approved: &[TransactionAccount],
    supplied: &[TransactionAccount],
) -> Result<(), MultisigError> {
    if approved.len() != supplied.len() {
        return Err(MultisigError::InvalidAccounts(format!(
            "expected {} accounts, got {}",
            approved.len(),
            supplied.len()
        )));
    }

    match approved
        .iter()
        .zip(supplied)
        .position(|(expected, actual)| expected != actual)
    {
        Some(index) => Err(MultisigError::InvalidAccounts(format!(
            "account {} does not match the approved account",
            index
        ))),
        None => Ok(()),
    }
}

impl PendingTransaction {
    /// Run the execution preconditions in order
    ///
    /// The first failing check decides the error.
    pub(crate) fn check_executable(
        &self,
        group: &MultisigGroup,
        supplied: &[TransactionAccount],
    ) -> Result<(), MultisigError> {
        if self.executed_at.is_some() {
            return Err(MultisigError::AlreadyExecuted);
        }

        if self.is_stale(group) {
            return Err(MultisigError::OwnerSetChanged {
                snapshot: self.owners_version,
                current: group.owners_version,
            });
        }

        let have = self.approval_count();
        if (have as u64) < group.threshold {
            return Err(MultisigError::NotEnoughSignatures {
                have,
                need: group.threshold,
            });
        }

        match_accounts(&self.accounts, supplied)
    }

    /// Build the host call, presenting the authority account as a signer
    pub(crate) fn to_invocation(
        &self,
        supplied: &[TransactionAccount],
        authority: &Identity,
    ) -> Invocation {
        let accounts = supplied
            .iter()
            .map(|account| {
                let mut account = *account;
                if account.pubkey == *authority {
                    account.is_signer = true;
                }
                account
            })
            .collect();

        Invocation {
            program_id: self.program_id,
            accounts,
            data: self.data.clone(),
        }
    }
}

impl<S: RecordStore, H: ActionHost> MultisigProgram<S, H> {
    /// Execute an approved transaction exactly once
    ///
    /// `supplied` must equal the accounts stored at proposal time. Returns
    /// the execution timestamp. A failed invocation leaves the transaction
    /// pending and retryable.
    pub fn execute_transaction(
        &self,
        multisig: &Identity,
        transaction: &Identity,
        supplied: &[TransactionAccount],
    ) -> Result<DateTime<Utc>, MultisigError> {
        self.store
            .update_transaction(transaction, |tx, group| -> Result<DateTime<Utc>, MultisigError> {
                if tx.multisig != *multisig {
                    return Err(MultisigError::InvalidMultisig(format!(
                        "transaction {} belongs to multisig {}",
                        tx.id, tx.multisig
                    )));
                }

                tx.check_executable(group, supplied)?;

                let token = AuthorityToken::for_group(group)?;
                let invocation = tx.to_invocation(supplied, token.authority());
                if let Err(e) = self.host.invoke(&invocation, &token) {
                    log::warn!("Execution of {} failed: {}", tx.id, e);
                    return Err(e.into());
                }

                let now = Utc::now();
                tx.executed_at = Some(now);
                log::info!(
                    "Executed transaction {} on multisig {} as {}",
                    tx.id,
                    group.id,
                    token.authority()
                );
                Ok(now)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multisig::TransactionStatus;
    use crate::testing;
    use std::sync::{Arc, Barrier};
    use std::thread;

    #[test]
    fn test_two_of_three_lifecycle() {
        let (program, keys, group) = testing::two_of_three();
        let (a, b) = (keys[0].identity(), keys[1].identity());
        let tx = testing::propose(&program, &keys[0], &group);
        let accounts = testing::target_accounts();

        assert!(matches!(
            program.execute_transaction(group.id(), tx.id(), &accounts),
            Err(MultisigError::NotEnoughSignatures { have: 1, need: 2 })
        ));

        let tx = program.approve(&a, group.id(), tx.id()).unwrap();
        assert_eq!(tx.signers(), &[true, false, false]);

        let tx = program.approve(&b, group.id(), tx.id()).unwrap();
        assert_eq!(tx.signers(), &[true, true, false]);

        let executed_at = program
            .execute_transaction(group.id(), tx.id(), &accounts)
            .unwrap();
        let stored = program.transaction(tx.id()).unwrap();
        assert_eq!(stored.executed_at(), Some(executed_at));
        assert_eq!(stored.status(), TransactionStatus::Executed);

        let calls = program.host().calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].invocation.program_id, testing::target_program());
        assert_eq!(calls[0].invocation.accounts, accounts);
        assert_eq!(calls[0].invocation.data, tx.data());
        assert_eq!(calls[0].authority, *group.authority());
        assert!(calls[0].verified);

        for _ in 0..3 {
            assert!(matches!(
                program.execute_transaction(group.id(), tx.id(), &accounts),
                Err(MultisigError::AlreadyExecuted)
            ));
        }
        assert_eq!(program.host().calls().len(), 1);
    }

    #[test]
    fn test_supplied_accounts_must_match() {
        let (program, keys, group) = testing::two_of_three();
        let tx = testing::propose(&program, &keys[0], &group);
        program.approve(&keys[1].identity(), group.id(), tx.id()).unwrap();

        let approved = testing::target_accounts();
        let mut swapped = approved.clone();
        swapped.swap(0, 1);
        let mut substituted = approved.clone();
        substituted[1].pubkey = Identity::from_seed("attacker");
        let mut flags = approved.clone();
        flags[1].is_writable = !flags[1].is_writable;
        let short = approved[..1].to_vec();

        for supplied in [swapped, substituted, flags, short, vec![]] {
            assert!(matches!(
                program.execute_transaction(group.id(), tx.id(), &supplied),
                Err(MultisigError::InvalidAccounts(_))
            ));
        }
        assert!(program.host().calls().is_empty());
        assert!(!program.transaction(tx.id()).unwrap().is_executed());
    }

    #[test]
    fn test_check_order() {
        let (program, keys, group) = testing::two_of_three();
        let tx = testing::propose(&program, &keys[0], &group);
        let owners: Vec<Identity> = keys.iter().map(|k| k.identity()).collect();

        // Not enough signatures wins over bad accounts
        assert!(matches!(
            program.execute_transaction(group.id(), tx.id(), &[]),
            Err(MultisigError::NotEnoughSignatures { .. })
        ));

        // Staleness wins over both
        program.reconfigure(group.id(), owners, 2).unwrap();
        assert!(matches!(
            program.execute_transaction(group.id(), tx.id(), &[]),
            Err(MultisigError::OwnerSetChanged { snapshot: 0, current: 1 })
        ));
    }

    #[test]
    fn test_stale_transaction_never_executes() {
        let (program, keys, group) = testing::two_of_three();
        let owners: Vec<Identity> = keys.iter().map(|k| k.identity()).collect();
        let tx = testing::propose(&program, &keys[0], &group);
        program.approve(&owners[1], group.id(), tx.id()).unwrap();

        // Same owners, new version: still stale
        program.reconfigure(group.id(), owners.clone(), 2).unwrap();
        let result = program.execute_transaction(group.id(), tx.id(), &testing::target_accounts());
        assert!(matches!(result, Err(ref e @ MultisigError::OwnerSetChanged { .. }) if e.is_permanent()));

        // A fresh proposal under the new version runs
        let fresh = testing::propose(&program, &keys[0], &group);
        program.approve(&owners[2], group.id(), fresh.id()).unwrap();
        program
            .execute_transaction(group.id(), fresh.id(), &testing::target_accounts())
            .unwrap();
        assert_eq!(program.host().calls().len(), 1);
    }

    #[test]
    fn test_failed_invocation_is_retryable() {
        let (program, keys, group) = testing::two_of_three();
        let tx = testing::propose(&program, &keys[0], &group);
        program.approve(&keys[2].identity(), group.id(), tx.id()).unwrap();
        let accounts = testing::target_accounts();

        program.host().set_failing(true);
        let result = program.execute_transaction(group.id(), tx.id(), &accounts);
        assert!(matches!(result, Err(ref e @ MultisigError::InvocationFailed(_)) if !e.is_permanent()));
        assert_eq!(program.transaction(tx.id()).unwrap().status(), TransactionStatus::Pending);

        program.host().set_failing(false);
        program.execute_transaction(group.id(), tx.id(), &accounts).unwrap();
        assert!(program.transaction(tx.id()).unwrap().is_executed());
        assert_eq!(program.host().calls().len(), 1);
    }

    #[test]
    fn test_wrong_group_rejected() {
        let (program, keys, group) = testing::two_of_three();
        let owners: Vec<Identity> = keys.iter().map(|k| k.identity()).collect();
        let other = program.initialize(&owners[0], owners.clone(), 1, 0).unwrap();
        let tx = testing::propose(&program, &keys[0], &group);
        program.approve(&owners[1], group.id(), tx.id()).unwrap();

        assert!(matches!(
            program.execute_transaction(other.id(), tx.id(), &testing::target_accounts()),
            Err(MultisigError::InvalidMultisig(_))
        ));
        assert!(program.host().calls().is_empty());
    }

    #[test]
    fn test_authority_account_promoted_to_signer() {
        let (program, keys, group) = testing::two_of_three();
        let accounts = vec![
            TransactionAccount::writable(*group.authority()),
            TransactionAccount::writable(Identity::from_seed("dest")),
        ];
        let tx = program
            .create_transaction(
                &keys[0].identity(),
                group.id(),
                testing::target_program(),
                accounts.clone(),
                vec![7],
            )
            .unwrap();
        program.approve(&keys[1].identity(), group.id(), tx.id()).unwrap();

        program.execute_transaction(group.id(), tx.id(), &accounts).unwrap();

        let calls = program.host().calls();
        assert!(calls[0].invocation.accounts[0].is_signer);
        assert!(!calls[0].invocation.accounts[1].is_signer);
        // Stored accounts stay as proposed
        assert_eq!(program.transaction(tx.id()).unwrap().accounts(), accounts.as_slice());
    }

    #[test]
    fn test_concurrent_execute_runs_once() {
        let (program, keys, group) = testing::two_of_three();
        let program = Arc::new(program);
        let tx = testing::propose(&program, &keys[0], &group);
        program.approve(&keys[1].identity(), group.id(), tx.id()).unwrap();

        let workers = 8;
        let barrier = Arc::new(Barrier::new(workers));
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                let program = Arc::clone(&program);
                let barrier = Arc::clone(&barrier);
                let group_id = *group.id();
                let tx_id = *tx.id();
                thread::spawn(move || {
                    barrier.wait();
                    program.execute_transaction(&group_id, &tx_id, &testing::target_accounts())
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let succeeded = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(succeeded, 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, MultisigError::AlreadyExecuted)));
        assert_eq!(program.host().calls().len(), 1);
    }
}
