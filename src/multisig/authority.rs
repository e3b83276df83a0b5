//! Delegated execution authority
//!
//! Each group acts through an identity derived from the group's own id and
//! its nonce. No private key exists for it; the engine proves control by
//! handing the host an [`AuthorityToken`] during execution, and only this
//! crate can mint one.

use crate::crypto::Identity;
use crate::multisig::error::MultisigError;
use crate::multisig::state::MultisigGroup;

const AUTHORITY_DOMAIN: &str = "multisig-authority";

/// Derive the delegated authority for `(group, nonce)`
pub fn derive_authority(group: &Identity, nonce: u8) -> Identity {
    Identity::derive(AUTHORITY_DOMAIN, &[group.as_bytes(), &[nonce]])
}

/// Capability proving the bearer acts as a group's derived authority
///
/// Minted only inside `execute_transaction` for the single target
/// invocation it authorizes.
#[derive(Debug, PartialEq, Eq)]
pub struct AuthorityToken {
    group: Identity,
    nonce: u8,
    authority: Identity,
}

impl AuthorityToken {
    /// Mint a token for `group`, checking the stored authority still derives
    pub(crate) fn for_group(group: &MultisigGroup) -> Result<Self, MultisigError> {
        let authority = derive_authority(&group.id, group.nonce);
        if authority != group.authority {
            return Err(MultisigError::InvalidMultisig(format!(
                "stored authority for {} does not match its derivation",
                group.id
            )));
        }

        Ok(Self {
            group: group.id,
            nonce: group.nonce,
            authority,
        })
    }

    pub fn group(&self) -> &Identity {
        &self.group
    }

    pub fn nonce(&self) -> u8 {
        self.nonce
    }

    /// Identity the target action sees as signer
    pub fn authority(&self) -> &Identity {
        &self.authority
    }

    /// Re-derive the authority and compare
    pub fn verify(&self) -> bool {
        derive_authority(&self.group, self.nonce) == self.authority
    }
}
