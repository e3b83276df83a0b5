//! Owner registry
//!
//! Validates owner sets and creates groups. Also hosts the host-level
//! reconfiguration path, the only code that moves `owners_version`.

use crate::config::EngineConfig;
use crate::crypto::Identity;
use crate::host::ActionHost;
use crate::multisig::authority::derive_authority;
use crate::multisig::error::MultisigError;
use crate::multisig::program::MultisigProgram;
use crate::multisig::state::MultisigGroup;
use crate::storage::RecordStore;
use chrono::Utc;
use std::collections::HashSet;

const GROUP_DOMAIN: &str = "multisig-group";

/// Check an owner set and threshold against the configured limits
///
/// Checks run in a fixed order: empty set, capacity, threshold range,
/// then duplicates.
pub fn validate_owner_set(
    owners: &[Identity],
    threshold: u64,
    config: &EngineConfig,
) -> Result<(), MultisigError> {
    if owners.is_empty() {
        return Err(MultisigError::InvalidOwners(
            "owners list cannot be empty".to_string(),
        ));
    }

    if owners.len() > config.max_owners {
        return Err(MultisigError::TooManyOwners {
            count: owners.len(),
            max: config.max_owners,
        });
    }

    if threshold == 0 || threshold > owners.len() as u64 {
        return Err(MultisigError::InvalidThreshold {
            threshold,
            owners: owners.len(),
        });
    }

    let mut seen = HashSet::with_capacity(owners.len());
    if let Some(duplicate) = owners.iter().find(|owner| !seen.insert(**owner)) {
        return Err(MultisigError::InvalidOwners(format!(
            "duplicate owner {}",
            duplicate
        )));
    }

    Ok(())
}

impl<S: RecordStore, H: ActionHost> MultisigProgram<S, H> {
    /// Create a new multisig group
    ///
    /// `payer` is the authenticated creator; the group id is derived from
    /// it and a store sequence number. The delegated authority is derived
    /// from the new id and `nonce` and stored with the group.
    pub fn initialize(
        &self,
        payer: &Identity,
        owners: Vec<Identity>,
        threshold: u64,
        nonce: u8,
    ) -> Result<MultisigGroup, MultisigError> {
        validate_owner_set(&owners, threshold, &self.config)?;

        let sequence = self.store.next_sequence();
        let id = Identity::derive(GROUP_DOMAIN, &[payer.as_bytes(), &sequence.to_le_bytes()]);

        let group = MultisigGroup {
            id,
            owners,
            threshold,
            nonce,
            owners_version: 0,
            authority: derive_authority(&id, nonce),
            created_by: *payer,
            created_at: Utc::now(),
        };
        self.store.insert_group(group.clone())?;

        log::info!(
            "Initialized {} multisig {} (authority {})",
            group.description(),
            group.id,
            group.authority
        );
        Ok(group)
    }

    /// Replace a group's owners and threshold
    ///
    /// Not an instruction: this is the host's owner-management hook. Every
    /// successful call bumps `owners_version`, which makes all transactions
    /// proposed before it permanently unexecutable.
    pub fn reconfigure(
        &self,
        multisig: &Identity,
        owners: Vec<Identity>,
        threshold: u64,
    ) -> Result<u32, MultisigError> {
        validate_owner_set(&owners, threshold, &self.config)?;

        self.store
            .update_group(multisig, |group| -> Result<u32, MultisigError> {
                let version = group.owners_version.checked_add(1).ok_or_else(|| {
                    MultisigError::InvalidMultisig("owners version exhausted".to_string())
                })?;

                group.owners = owners;
                group.threshold = threshold;
                group.owners_version = version;

                log::info!(
                    "Reconfigured multisig {} to {} (owners version {})",
                    group.id,
                    group.description(),
                    version
                );
                Ok(version)
            })
    }
}
