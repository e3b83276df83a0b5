//! Multisig Engine: a threshold multi-signature authorization engine in Rust
//!
//! This crate provides:
//! - M-of-N owner groups with validated thresholds
//! - Pending transactions that collect approvals in a bitmap
//! - Exactly-once execution through a derived delegated authority
//! - Staleness tracking when a group's owner set changes
//! - Signed instructions (secp256k1) and an instruction processor
//! - A reference ledger host and JSON persistence
//!
//! # Example
//!
//! ```rust
//! use multisig_engine::crypto::KeyPair;
//! use multisig_engine::host::{encode_transfer, transfer_accounts, transfer_program_id, Ledger};
//! use multisig_engine::multisig::MultisigProgram;
//! use multisig_engine::storage::MemoryStore;
//! use multisig_engine::Identity;
//!
//! let program = MultisigProgram::with_defaults(MemoryStore::new(), Ledger::new());
//! let keys: Vec<KeyPair> = (0..3).map(|_| KeyPair::generate()).collect();
//! let owners: Vec<Identity> = keys.iter().map(|k| k.identity()).collect();
//!
//! // 2-of-3 group; fund its authority
//! let group = program.initialize(&owners[0], owners.clone(), 2, 0).unwrap();
//! program.host().fund(group.authority(), 100).unwrap();
//!
//! // Propose, approve, execute
//! let dest = Identity::from_seed("dest");
//! let accounts = transfer_accounts(*group.authority(), dest);
//! let tx = program
//!     .create_transaction(&owners[0], group.id(), transfer_program_id(), accounts.clone(), encode_transfer(40))
//!     .unwrap();
//! program.approve(&owners[1], group.id(), tx.id()).unwrap();
//! program.execute_transaction(group.id(), tx.id(), &accounts).unwrap();
//!
//! assert_eq!(program.host().balance(&dest).unwrap(), 40);
//! ```

pub mod cli;
pub mod config;
pub mod crypto;
pub mod host;
pub mod instruction;
pub mod keystore;
pub mod multisig;
pub mod storage;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use config::EngineConfig;
pub use crypto::{Identity, KeyPair};
pub use host::{ActionHost, HostError, Invocation, Ledger};
pub use instruction::{Instruction, InstructionOutcome, Processor, ReplayGuard, Request};
pub use multisig::{
    derive_authority, AuthorityToken, MultisigError, MultisigGroup, MultisigProgram,
    PendingTransaction, TransactionAccount, TransactionStatus,
};
pub use storage::{MemoryStore, RecordStore, Storage};
