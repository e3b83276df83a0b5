//! Instruction surface
//!
//! Callers submit serialized [`Instruction`]s wrapped in a [`Request`].
//! Instructions that act for an owner carry secp256k1 credentials over the
//! instruction body and a caller nonce; the [`Processor`] authenticates them,
//! refuses a (signer, nonce) pair it has already seen, and dispatches to the
//! [`MultisigProgram`].

use crate::crypto::{public_key_from_hex, sha256, verify_signature, Identity, KeyPair};
use crate::host::ActionHost;
use crate::multisig::state::hex_bytes;
use crate::multisig::{MultisigError, MultisigGroup, MultisigProgram, PendingTransaction, TransactionAccount};
use crate::storage::{RecordStore, StorageError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

const SIGNING_DOMAIN: &[u8] = b"multisig-instruction";

/// A multisig instruction
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Instruction {
    /// Create a group; the signer pays for and is recorded as creator
    Initialize {
        owners: Vec<Identity>,
        threshold: u64,
        nonce: u8,
    },
    /// Propose an action; the signer must be an owner
    CreateTransaction {
        multisig: Identity,
        program_id: Identity,
        accounts: Vec<TransactionAccount>,
        #[serde(with = "hex_bytes")]
        data: Vec<u8>,
    },
    /// Approve a pending transaction as the signer
    Approve {
        multisig: Identity,
        transaction: Identity,
    },
    /// Execute a transaction that has met its threshold; anyone may submit
    ExecuteTransaction {
        multisig: Identity,
        transaction: Identity,
        accounts: Vec<TransactionAccount>,
    },
}

impl Instruction {
    pub fn name(&self) -> &'static str {
        match self {
            Instruction::Initialize { .. } => "initialize",
            Instruction::CreateTransaction { .. } => "create_transaction",
            Instruction::Approve { .. } => "approve",
            Instruction::ExecuteTransaction { .. } => "execute_transaction",
        }
    }

    /// Whether the instruction acts for an authenticated caller
    pub fn requires_signer(&self) -> bool {
        !matches!(self, Instruction::ExecuteTransaction { .. })
    }

    /// Hash that credentials sign for a given caller nonce
    pub fn signing_hash(&self, nonce: u64) -> Result<Vec<u8>, serde_json::Error> {
        let mut message = SIGNING_DOMAIN.to_vec();
        message.extend_from_slice(&nonce.to_le_bytes());
        message.extend(serde_json::to_vec(self)?);
        Ok(sha256(&message))
    }
}

/// Signature proving who submitted an instruction
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Public key of the signer (hex, compressed)
    pub signer_pubkey: String,
    /// Caller-chosen value; each (signer, nonce) pair is accepted once
    pub nonce: u64,
    /// Compact signature over the instruction's signing hash (hex)
    pub signature: String,
}

/// An instruction plus optional credentials
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub instruction: Instruction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,
}

impl Request {
    /// Request without credentials
    pub fn unsigned(instruction: Instruction) -> Self {
        Self {
            instruction,
            credentials: None,
        }
    }

    /// Sign `instruction` with `keypair` under a random nonce
    pub fn signed(instruction: Instruction, keypair: &KeyPair) -> Result<Self, MultisigError> {
        Self::signed_with_nonce(instruction, keypair, rand::random())
    }

    /// Sign `instruction` with `keypair` under `nonce`
    pub fn signed_with_nonce(
        instruction: Instruction,
        keypair: &KeyPair,
        nonce: u64,
    ) -> Result<Self, MultisigError> {
        let hash = instruction.signing_hash(nonce).map_err(|e| {
            MultisigError::Unauthenticated(format!("cannot encode instruction: {}", e))
        })?;
        let signature = keypair.sign(&hash)?;

        Ok(Self {
            instruction,
            credentials: Some(Credentials {
                signer_pubkey: keypair.public_key_hex(),
                nonce,
                signature: hex::encode(signature),
            }),
        })
    }
}

/// Resolves the identity a request was submitted by
pub trait Authenticator {
    fn authenticate(&self, request: &Request) -> Result<Identity, MultisigError>;
}

/// Checks secp256k1 credentials against the instruction body and nonce
#[derive(Clone, Copy, Debug, Default)]
pub struct SignatureAuthenticator;

impl Authenticator for SignatureAuthenticator {
    fn authenticate(&self, request: &Request) -> Result<Identity, MultisigError> {
        let credentials = request
            .credentials
            .as_ref()
            .ok_or_else(|| MultisigError::Unauthenticated("request is unsigned".to_string()))?;

        let public_key = public_key_from_hex(&credentials.signer_pubkey)
            .map_err(|e| MultisigError::Unauthenticated(e.to_string()))?;
        let signature = hex::decode(&credentials.signature)
            .map_err(|_| MultisigError::Unauthenticated("signature is not hex".to_string()))?;
        let hash = request
            .instruction
            .signing_hash(credentials.nonce)
            .map_err(|e| MultisigError::Unauthenticated(e.to_string()))?;

        let valid = verify_signature(&public_key, &hash, &signature)
            .map_err(|e| MultisigError::Unauthenticated(e.to_string()))?;
        if !valid {
            return Err(MultisigError::Unauthenticated(
                "signature does not match instruction".to_string(),
            ));
        }

        let identity = Identity::from_public_key(&public_key);
        log::debug!(
            "Authenticated {} for {}",
            identity,
            request.instruction.name()
        );
        Ok(identity)
    }
}

/// Signed (signer, nonce) pairs that have already been accepted
#[derive(Debug, Default)]
pub struct ReplayGuard {
    seen: Mutex<HashSet<(Identity, u64)>>,
}

impl ReplayGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Guard that already knows `entries`
    pub fn from_entries<I: IntoIterator<Item = (Identity, u64)>>(entries: I) -> Self {
        Self {
            seen: Mutex::new(entries.into_iter().collect()),
        }
    }

    /// Accept `nonce` for `signer` once
    pub fn record(&self, signer: &Identity, nonce: u64) -> Result<(), MultisigError> {
        let mut seen = self
            .seen
            .lock()
            .map_err(|_| StorageError::LockPoisoned("replay guard"))?;
        if !seen.insert((*signer, nonce)) {
            return Err(MultisigError::Unauthenticated(format!(
                "nonce {} already used by {}",
                nonce, signer
            )));
        }
        Ok(())
    }

    /// Accepted pairs, sorted
    pub fn entries(&self) -> Result<Vec<(Identity, u64)>, MultisigError> {
        let seen = self
            .seen
            .lock()
            .map_err(|_| StorageError::LockPoisoned("replay guard"))?;
        let mut entries: Vec<_> = seen.iter().copied().collect();
        entries.sort();
        Ok(entries)
    }
}

/// Result of a processed instruction
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InstructionOutcome {
    Initialized(MultisigGroup),
    TransactionCreated(PendingTransaction),
    Approved(PendingTransaction),
    Executed {
        transaction: Identity,
        executed_at: DateTime<Utc>,
    },
}

/// Authenticates requests and dispatches them to a program
pub struct Processor<'a, S, H, A = SignatureAuthenticator> {
    program: &'a MultisigProgram<S, H>,
    authenticator: A,
    replay: Arc<ReplayGuard>,
}

impl<'a, S: RecordStore, H: ActionHost> Processor<'a, S, H> {
    pub fn new(program: &'a MultisigProgram<S, H>) -> Self {
        Self::with_authenticator(program, SignatureAuthenticator)
    }
}

impl<'a, S: RecordStore, H: ActionHost, A: Authenticator> Processor<'a, S, H, A> {
    pub fn with_authenticator(program: &'a MultisigProgram<S, H>, authenticator: A) -> Self {
        Self {
            program,
            authenticator,
            replay: Arc::new(ReplayGuard::new()),
        }
    }

    /// Share accepted nonces with other processors or a persisted state
    pub fn with_replay_guard(mut self, replay: Arc<ReplayGuard>) -> Self {
        self.replay = replay;
        self
    }

    /// Authenticate and run one request
    pub fn process(&self, request: &Request) -> Result<InstructionOutcome, MultisigError> {
        let result = self.dispatch(request);
        if let Err(e) = &result {
            log::warn!("Rejected {}: {}", request.instruction.name(), e);
        }
        result
    }

    // The nonce is spent once authentication succeeds, even if the
    // instruction itself then fails.
    fn caller(&self, request: &Request) -> Result<Option<Identity>, MultisigError> {
        if !request.instruction.requires_signer() {
            return Ok(None);
        }

        let identity = self.authenticator.authenticate(request)?;
        if let Some(credentials) = &request.credentials {
            self.replay.record(&identity, credentials.nonce)?;
        }
        Ok(Some(identity))
    }

    fn dispatch(&self, request: &Request) -> Result<InstructionOutcome, MultisigError> {
        let caller = self.caller(request)?;
        let signer = || {
            caller.ok_or_else(|| MultisigError::Unauthenticated("missing signer".to_string()))
        };

        match &request.instruction {
            Instruction::Initialize {
                owners,
                threshold,
                nonce,
            } => {
                let group = self
                    .program
                    .initialize(&signer()?, owners.clone(), *threshold, *nonce)?;
                Ok(InstructionOutcome::Initialized(group))
            }
            Instruction::CreateTransaction {
                multisig,
                program_id,
                accounts,
                data,
            } => {
                let tx = self.program.create_transaction(
                    &signer()?,
                    multisig,
                    *program_id,
                    accounts.clone(),
                    data.clone(),
                )?;
                Ok(InstructionOutcome::TransactionCreated(tx))
            }
            Instruction::Approve {
                multisig,
                transaction,
            } => {
                let tx = self.program.approve(&signer()?, multisig, transaction)?;
                Ok(InstructionOutcome::Approved(tx))
            }
            Instruction::ExecuteTransaction {
                multisig,
                transaction,
                accounts,
            } => {
                let executed_at =
                    self.program
                        .execute_transaction(multisig, transaction, accounts)?;
                Ok(InstructionOutcome::Executed {
                    transaction: *transaction,
                    executed_at,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    fn init_request(keys: &[KeyPair], threshold: u64) -> Instruction {
        Instruction::Initialize {
            owners: keys.iter().map(|k| k.identity()).collect(),
            threshold,
            nonce: 4,
        }
    }

    #[test]
    fn test_signed_flow() {
        let (program, keys) = testing::program_with_keys(3);
        let processor = Processor::new(&program);

        let request = Request::signed(init_request(&keys, 2), &keys[0]).unwrap();
        let InstructionOutcome::Initialized(group) = processor.process(&request).unwrap() else {
            panic!("expected a group");
        };
        assert_eq!(group.created_by(), &keys[0].identity());

        let propose = Instruction::CreateTransaction {
            multisig: *group.id(),
            program_id: testing::target_program(),
            accounts: testing::target_accounts(),
            data: vec![9, 9],
        };
        let request = Request::signed(propose, &keys[2]).unwrap();
        let InstructionOutcome::TransactionCreated(tx) = processor.process(&request).unwrap() else {
            panic!("expected a transaction");
        };
        assert_eq!(tx.signers(), &[false, false, true]);

        let approve = Instruction::Approve {
            multisig: *group.id(),
            transaction: *tx.id(),
        };
        let request = Request::signed(approve, &keys[1]).unwrap();
        assert!(matches!(
            processor.process(&request).unwrap(),
            InstructionOutcome::Approved(ref t) if t.approval_count() == 2
        ));

        // Execution needs no signer
        let execute = Instruction::ExecuteTransaction {
            multisig: *group.id(),
            transaction: *tx.id(),
            accounts: testing::target_accounts(),
        };
        let outcome = processor.process(&Request::unsigned(execute)).unwrap();
        assert!(matches!(outcome, InstructionOutcome::Executed { transaction, .. } if transaction == *tx.id()));
        assert_eq!(program.host().calls().len(), 1);
    }

    #[test]
    fn test_unsigned_owner_instruction_rejected() {
        let (program, keys, group) = testing::two_of_three();
        let tx = testing::propose(&program, &keys[0], &group);
        let processor = Processor::new(&program);

        let approve = Instruction::Approve {
            multisig: *group.id(),
            transaction: *tx.id(),
        };
        assert!(matches!(
            processor.process(&Request::unsigned(approve)),
            Err(MultisigError::Unauthenticated(_))
        ));
    }

    #[test]
    fn test_forged_credentials_rejected() {
        let (program, keys, group) = testing::two_of_three();
        let tx = testing::propose(&program, &keys[0], &group);
        let processor = Processor::new(&program);
        let outsider = KeyPair::generate();

        // Outsider signs but claims to be an owner
        let approve = Instruction::Approve {
            multisig: *group.id(),
            transaction: *tx.id(),
        };
        let mut request = Request::signed(approve.clone(), &outsider).unwrap();
        if let Some(credentials) = request.credentials.as_mut() {
            credentials.signer_pubkey = keys[1].public_key_hex();
        }
        assert!(matches!(
            processor.process(&request),
            Err(MultisigError::Unauthenticated(_))
        ));

        // Signature over a different instruction
        let mut request = Request::signed(approve, &keys[1]).unwrap();
        request.instruction = Instruction::Approve {
            multisig: *group.id(),
            transaction: Identity::from_seed("other"),
        };
        assert!(matches!(
            processor.process(&request),
            Err(MultisigError::Unauthenticated(_))
        ));

        assert_eq!(program.transaction(tx.id()).unwrap().approval_count(), 1);
    }

    #[test]
    fn test_authenticated_outsider_is_not_owner() {
        let (program, keys, group) = testing::two_of_three();
        let tx = testing::propose(&program, &keys[0], &group);
        let processor = Processor::new(&program);
        let outsider = KeyPair::generate();

        let approve = Instruction::Approve {
            multisig: *group.id(),
            transaction: *tx.id(),
        };
        let request = Request::signed(approve, &outsider).unwrap();
        assert!(matches!(
            processor.process(&request),
            Err(MultisigError::InvalidOwner(id)) if id == outsider.identity()
        ));
    }

    #[test]
    fn test_request_json_shape() {
        let keys = vec![KeyPair::generate()];
        let request = Request::signed(init_request(&keys, 1), &keys[0]).unwrap();

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["instruction"]["type"], "initialize");
        assert_eq!(json["instruction"]["threshold"], 1);

        assert_eq!(json["credentials"]["nonce"], request.credentials.as_ref().unwrap().nonce);

        let back: Request = serde_json::from_value(json).unwrap();
        assert_eq!(back, request);
        assert!(SignatureAuthenticator.authenticate(&back).is_ok());
    }

    #[test]
    fn test_replayed_request_rejected() {
        let (program, keys, group) = testing::two_of_three();
        let processor = Processor::new(&program);

        let propose = Instruction::CreateTransaction {
            multisig: *group.id(),
            program_id: testing::target_program(),
            accounts: testing::target_accounts(),
            data: vec![1],
        };
        let request = Request::signed(propose, &keys[0]).unwrap();
        processor.process(&request).unwrap();
        assert!(matches!(
            processor.process(&request),
            Err(MultisigError::Unauthenticated(_))
        ));
        assert_eq!(program.transactions_for(group.id()).unwrap().len(), 1);

        let request = Request::signed(init_request(&keys, 2), &keys[1]).unwrap();
        processor.process(&request).unwrap();
        assert!(matches!(
            processor.process(&request),
            Err(MultisigError::Unauthenticated(_))
        ));
        assert_eq!(program.groups().unwrap().len(), 2);
    }

    #[test]
    fn test_nonce_is_signed() {
        let (program, keys, group) = testing::two_of_three();
        let tx = testing::propose(&program, &keys[0], &group);
        let processor = Processor::new(&program);

        let approve = Instruction::Approve {
            multisig: *group.id(),
            transaction: *tx.id(),
        };
        let mut request = Request::signed_with_nonce(approve, &keys[1], 7).unwrap();
        processor.process(&request).unwrap();

        // Bumping the nonce on a captured request breaks its signature
        if let Some(credentials) = request.credentials.as_mut() {
            credentials.nonce = 8;
        }
        assert!(matches!(
            processor.process(&request),
            Err(MultisigError::Unauthenticated(_))
        ));
    }

    #[test]
    fn test_nonces_scoped_per_signer() {
        let (program, keys, group) = testing::two_of_three();
        let guard = Arc::new(ReplayGuard::new());
        let propose = |key: &KeyPair| {
            let instruction = Instruction::CreateTransaction {
                multisig: *group.id(),
                program_id: testing::target_program(),
                accounts: vec![],
                data: vec![],
            };
            Request::signed_with_nonce(instruction, key, 1).unwrap()
        };

        // Same nonce from two owners
        let processor = Processor::new(&program).with_replay_guard(guard.clone());
        processor.process(&propose(&keys[0])).unwrap();
        processor.process(&propose(&keys[1])).unwrap();

        // A second processor sharing the guard still refuses the replay
        let other = Processor::new(&program).with_replay_guard(guard.clone());
        assert!(matches!(
            other.process(&propose(&keys[0])),
            Err(MultisigError::Unauthenticated(_))
        ));
        assert_eq!(guard.entries().unwrap().len(), 2);

        let restored = ReplayGuard::from_entries(guard.entries().unwrap());
        assert!(restored.record(&keys[1].identity(), 1).is_err());
        assert!(restored.record(&keys[2].identity(), 1).is_ok());
    }
}
