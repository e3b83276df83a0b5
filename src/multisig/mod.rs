//! Multi-signature authorization
//!
//! A group of owners must jointly approve an action before it runs:
//! - M-of-N threshold over a fixed owner list
//! - Proposals that collect approvals in a bitmap
//! - Exactly-once execution through a derived authority
//! - Staleness tracking when the owner set changes

pub mod approval;
pub mod authority;
pub mod error;
pub mod execution;
pub mod program;
pub mod proposal;
pub mod registry;
pub mod state;

pub use authority::{derive_authority, AuthorityToken};
pub use error::MultisigError;
pub use program::MultisigProgram;
pub use registry::validate_owner_set;
pub use state::{MultisigGroup, PendingTransaction, TransactionAccount, TransactionStatus};
