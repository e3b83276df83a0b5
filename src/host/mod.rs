//! Host runtime interface
//!
//! The engine never runs target actions itself. Once a transaction clears
//! its checks, the engine hands the host an [`Invocation`] together with
//! the group's [`AuthorityToken`], and the host runs the action.
//!
//! [`ledger`] ships a small balance ledger that implements the interface
//! with a native transfer program.

pub mod ledger;

use crate::crypto::Identity;
use crate::multisig::{AuthorityToken, TransactionAccount};
use thiserror::Error;

pub use ledger::{encode_transfer, transfer_accounts, transfer_program_id, Ledger, LedgerState};

/// Errors reported by a host while running a target action
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("Unknown program: {0}")]
    UnknownProgram(Identity),
    #[error("Missing signature for account {0}")]
    MissingSignature(Identity),
    #[error("Authority token failed verification")]
    InvalidAuthority,
    #[error("Insufficient funds: have {have}, need {need}")]
    InsufficientFunds { have: u64, need: u64 },
    #[error("Invalid instruction data: {0}")]
    InvalidPayload(String),
    #[error("Invalid account layout: {0}")]
    InvalidAccounts(String),
    #[error("Action rejected: {0}")]
    Rejected(String),
}

/// A fully authorized call into a target program
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    pub program_id: Identity,
    pub accounts: Vec<TransactionAccount>,
    pub data: Vec<u8>,
}

/// Runtime that executes approved actions
pub trait ActionHost: Send + Sync {
    /// Run `invocation` signed by `authority`
    ///
    /// Must either fully apply the action or leave host state untouched.
    fn invoke(&self, invocation: &Invocation, authority: &AuthorityToken) -> Result<(), HostError>;
}

impl<T: ActionHost + ?Sized> ActionHost for std::sync::Arc<T> {
    fn invoke(&self, invocation: &Invocation, authority: &AuthorityToken) -> Result<(), HostError> {
        (**self).invoke(invocation, authority)
    }
}
