//! Shared test fixtures

use crate::crypto::{Identity, KeyPair};
use crate::host::{ActionHost, HostError, Invocation};
use crate::multisig::state::{MultisigGroup, PendingTransaction, TransactionAccount};
use crate::multisig::{derive_authority, AuthorityToken, MultisigProgram};
use crate::storage::MemoryStore;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

pub type TestProgram = MultisigProgram<MemoryStore, RecordingHost>;

/// One invocation seen by [`RecordingHost`]
#[derive(Clone, Debug)]
pub struct RecordedCall {
    pub invocation: Invocation,
    pub authority: Identity,
    pub verified: bool,
}

/// Host that records successful invocations and can be told to fail
#[derive(Debug, Default)]
pub struct RecordingHost {
    calls: Mutex<Vec<RecordedCall>>,
    failing: AtomicBool,
}

impl RecordingHost {
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl ActionHost for RecordingHost {
    fn invoke(&self, invocation: &Invocation, authority: &AuthorityToken) -> Result<(), HostError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(HostError::Rejected("host configured to fail".to_string()));
        }
        self.calls.lock().unwrap().push(RecordedCall {
            invocation: invocation.clone(),
            authority: *authority.authority(),
            verified: authority.verify(),
        });
        Ok(())
    }
}

/// `n` distinct seeded identities
pub fn ids(n: usize) -> Vec<Identity> {
    (0..n).map(|i| Identity::from_seed(&format!("owner-{}", i))).collect()
}

/// A group built directly, bypassing `initialize`
pub fn group(owner_seeds: &[&str], threshold: u64) -> MultisigGroup {
    let id = Identity::from_seed(&format!("group-{}", owner_seeds.join(",")));
    let owners: Vec<Identity> = owner_seeds.iter().map(|s| Identity::from_seed(s)).collect();
    MultisigGroup {
        id,
        created_by: owners[0],
        owners,
        threshold,
        nonce: 0,
        owners_version: 0,
        authority: derive_authority(&id, 0),
        created_at: Utc::now(),
    }
}

/// A transaction proposed by the group's first owner, built directly
pub fn transaction(group: &MultisigGroup) -> PendingTransaction {
    let mut signers = vec![false; group.owners.len()];
    signers[0] = true;
    PendingTransaction {
        id: Identity::from_seed(&format!("tx-{}", group.id)),
        multisig: group.id,
        program_id: target_program(),
        accounts: target_accounts(),
        data: vec![1, 2, 3],
        signers,
        executed_at: None,
        owners_version: group.owners_version,
        proposer: group.owners[0],
        created_at: Utc::now(),
    }
}

pub fn target_program() -> Identity {
    Identity::from_seed("target-program")
}

pub fn target_accounts() -> Vec<TransactionAccount> {
    vec![
        TransactionAccount::writable(Identity::from_seed("vault")),
        TransactionAccount::readonly(Identity::from_seed("oracle")),
    ]
}

/// Empty program plus `n` owner key pairs
pub fn program_with_keys(n: usize) -> (TestProgram, Vec<KeyPair>) {
    let program = MultisigProgram::with_defaults(MemoryStore::new(), RecordingHost::default());
    let keys = (0..n).map(|_| KeyPair::generate()).collect();
    (program, keys)
}

/// Program holding one `threshold`-of-`n` group
pub fn program_with_group(n: usize, threshold: u64) -> (TestProgram, Vec<KeyPair>, MultisigGroup) {
    let (program, keys) = program_with_keys(n);
    let owners: Vec<Identity> = keys.iter().map(|k| k.identity()).collect();
    let group = program
        .initialize(&owners[0], owners.clone(), threshold, 1)
        .unwrap();
    (program, keys, group)
}

/// Owners A, B, C with threshold 2
pub fn two_of_three() -> (TestProgram, Vec<KeyPair>, MultisigGroup) {
    program_with_group(3, 2)
}

/// Propose the standard target action as `proposer`
pub fn propose(program: &TestProgram, proposer: &KeyPair, group: &MultisigGroup) -> PendingTransaction {
    program
        .create_transaction(
            &proposer.identity(),
            group.id(),
            target_program(),
            target_accounts(),
            vec![0xDE, 0xAD],
        )
        .unwrap()
}
