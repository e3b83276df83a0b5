//! Persisted multisig records
//!
//! [`MultisigGroup`] holds the owner set and threshold; a
//! [`PendingTransaction`] holds one proposed action and its approval bitmap.
//! Both are created only through the program's instructions, so their
//! fields are readable but not publicly writable.

use crate::crypto::{Identity, IDENTITY_LEN};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One account a target action touches, with the capability it needs
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionAccount {
    pub pubkey: Identity,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl TransactionAccount {
    pub fn new(pubkey: Identity, is_signer: bool, is_writable: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable,
        }
    }

    /// Writable account that must sign
    pub fn signer(pubkey: Identity) -> Self {
        Self::new(pubkey, true, true)
    }

    /// Writable, non-signing account
    pub fn writable(pubkey: Identity) -> Self {
        Self::new(pubkey, false, true)
    }

    /// Read-only, non-signing account
    pub fn readonly(pubkey: Identity) -> Self {
        Self::new(pubkey, false, false)
    }
}

/// Owner set and threshold for one multisig group
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultisigGroup {
    pub(crate) id: Identity,
    pub(crate) owners: Vec<Identity>,
    pub(crate) threshold: u64,
    pub(crate) nonce: u8,
    pub(crate) owners_version: u32,
    pub(crate) authority: Identity,
    pub(crate) created_by: Identity,
    pub(crate) created_at: DateTime<Utc>,
}

impl MultisigGroup {
    /// Stable group identifier
    pub fn id(&self) -> &Identity {
        &self.id
    }

    pub fn owners(&self) -> &[Identity] {
        &self.owners
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    /// Authority descriptor used to derive the delegated signer
    pub fn nonce(&self) -> u8 {
        self.nonce
    }

    pub fn owners_version(&self) -> u32 {
        self.owners_version
    }

    /// Derived identity that signs this group's executed transactions
    pub fn authority(&self) -> &Identity {
        &self.authority
    }

    pub fn created_by(&self) -> &Identity {
        &self.created_by
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Position of `identity` in the owner list
    pub fn owner_index(&self, identity: &Identity) -> Option<usize> {
        self.owners.iter().position(|owner| owner == identity)
    }

    pub fn is_owner(&self, identity: &Identity) -> bool {
        self.owner_index(identity).is_some()
    }

    pub fn owner_count(&self) -> usize {
        self.owners.len()
    }

    /// Get description like "2-of-3"
    pub fn description(&self) -> String {
        format!("{}-of-{}", self.threshold, self.owners.len())
    }

    /// Fixed record size for a group holding up to `max_owners` owners
    pub fn space(max_owners: usize) -> usize {
        IDENTITY_LEN + // id
        4 + IDENTITY_LEN * max_owners + // owners (length prefix + entries)
        8 + // threshold
        1 + // nonce
        4 + // owners_version
        IDENTITY_LEN + // authority
        IDENTITY_LEN + // created_by
        8 // created_at
    }
}

/// Lifecycle state of a pending transaction
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    /// Collecting approvals or waiting to be executed
    Pending,
    /// Target action ran; terminal
    Executed,
}

/// A proposed action awaiting owner approvals
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTransaction {
    pub(crate) id: Identity,
    pub(crate) multisig: Identity,
    pub(crate) program_id: Identity,
    pub(crate) accounts: Vec<TransactionAccount>,
    #[serde(with = "hex_bytes")]
    pub(crate) data: Vec<u8>,
    pub(crate) signers: Vec<bool>,
    pub(crate) executed_at: Option<DateTime<Utc>>,
    pub(crate) owners_version: u32,
    pub(crate) proposer: Identity,
    pub(crate) created_at: DateTime<Utc>,
}

impl PendingTransaction {
    pub fn id(&self) -> &Identity {
        &self.id
    }

    /// Group this transaction belongs to
    pub fn multisig(&self) -> &Identity {
        &self.multisig
    }

    /// Target action to invoke
    pub fn program_id(&self) -> &Identity {
        &self.program_id
    }

    pub fn accounts(&self) -> &[TransactionAccount] {
        &self.accounts
    }

    /// Opaque payload handed to the target action
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Approval bitmap aligned to the group's owner positions
    pub fn signers(&self) -> &[bool] {
        &self.signers
    }

    pub fn executed_at(&self) -> Option<DateTime<Utc>> {
        self.executed_at
    }

    /// Owner-set version captured at proposal time
    pub fn owners_version(&self) -> u32 {
        self.owners_version
    }

    pub fn proposer(&self) -> &Identity {
        &self.proposer
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn status(&self) -> TransactionStatus {
        if self.executed_at.is_some() {
            TransactionStatus::Executed
        } else {
            TransactionStatus::Pending
        }
    }

    pub fn is_executed(&self) -> bool {
        self.executed_at.is_some()
    }

    /// Number of owners who have approved
    pub fn approval_count(&self) -> usize {
        self.signers.iter().filter(|approved| **approved).count()
    }

    /// True once the group's owner set has moved past the snapshot
    pub fn is_stale(&self, group: &MultisigGroup) -> bool {
        self.owners_version != group.owners_version
    }

    /// Owners whose approval bit is set
    ///
    /// Only meaningful while the transaction is not stale.
    pub fn approvers(&self, group: &MultisigGroup) -> Vec<Identity> {
        group
            .owners
            .iter()
            .zip(&self.signers)
            .filter(|(_, approved)| **approved)
            .map(|(owner, _)| *owner)
            .collect()
    }

    /// Fixed record size for the given capacities
    pub fn space(max_accounts: usize, max_data: usize, max_owners: usize) -> usize {
        IDENTITY_LEN + // id
        IDENTITY_LEN + // multisig
        IDENTITY_LEN + // program_id
        4 + max_accounts * (IDENTITY_LEN + 1 + 1) + // accounts
        4 + max_data + // data
        4 + max_owners + // signers
        1 + 8 + // executed_at (tag + timestamp)
        4 + // owners_version
        IDENTITY_LEN + // proposer
        8 // created_at
    }
}

/// Hex text form for byte payloads in JSON records
pub(crate) mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        hex::decode(text).map_err(serde::de::Error::custom)
    }
}
