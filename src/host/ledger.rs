//! In-memory balance ledger
//!
//! A minimal host with one native program, `transfer`, that moves a
//! balance from a signing source account to a destination. The source
//! must be the delegated authority presented with the invocation, so a
//! group can only spend what is held under its own authority.

use super::{ActionHost, HostError, Invocation};
use crate::crypto::Identity;
use crate::multisig::{AuthorityToken, TransactionAccount};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

const TRANSFER_SEED: &str = "native-transfer";

/// Identity of the native transfer program
pub fn transfer_program_id() -> Identity {
    Identity::from_seed(TRANSFER_SEED)
}

/// Encode a transfer payload (little-endian amount)
pub fn encode_transfer(amount: u64) -> Vec<u8> {
    amount.to_le_bytes().to_vec()
}

/// Account layout the transfer program expects
pub fn transfer_accounts(from: Identity, to: Identity) -> Vec<TransactionAccount> {
    vec![
        TransactionAccount::signer(from),
        TransactionAccount::writable(to),
    ]
}

fn decode_transfer(data: &[u8]) -> Result<u64, HostError> {
    let bytes: [u8; 8] = data.try_into().map_err(|_| {
        HostError::InvalidPayload(format!("expected 8 byte amount, got {} bytes", data.len()))
    })?;
    Ok(u64::from_le_bytes(bytes))
}

/// Serializable ledger contents
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerState {
    pub balances: BTreeMap<Identity, u64>,
}

/// Balance ledger host
#[derive(Debug, Default)]
pub struct Ledger {
    balances: RwLock<HashMap<Identity, u64>>,
}

impl Ledger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a ledger from saved state
    pub fn from_state(state: LedgerState) -> Self {
        Self {
            balances: RwLock::new(state.balances.into_iter().collect()),
        }
    }

    /// Export current balances
    pub fn state(&self) -> Result<LedgerState, HostError> {
        let balances = self.read()?;
        Ok(LedgerState {
            balances: balances.iter().map(|(k, v)| (*k, *v)).collect(),
        })
    }

    /// Credit an account out of thin air (test faucet)
    pub fn fund(&self, account: &Identity, amount: u64) -> Result<u64, HostError> {
        let mut balances = self.write()?;
        let balance = balances.entry(*account).or_insert(0);
        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| HostError::Rejected("balance overflow".to_string()))?;
        log::info!("Funded {} with {} (balance {})", account, amount, balance);
        Ok(*balance)
    }

    /// Current balance of an account
    pub fn balance(&self, account: &Identity) -> Result<u64, HostError> {
        Ok(self.read()?.get(account).copied().unwrap_or(0))
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<Identity, u64>>, HostError> {
        self.balances
            .read()
            .map_err(|_| HostError::Rejected("ledger lock poisoned".to_string()))
    }

    fn write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<Identity, u64>>, HostError> {
        self.balances
            .write()
            .map_err(|_| HostError::Rejected("ledger lock poisoned".to_string()))
    }

    fn transfer(&self, invocation: &Invocation) -> Result<(), HostError> {
        let [source, destination] = invocation.accounts.as_slice() else {
            return Err(HostError::InvalidAccounts(format!(
                "transfer takes 2 accounts, got {}",
                invocation.accounts.len()
            )));
        };
        if !source.is_writable || !destination.is_writable {
            return Err(HostError::InvalidAccounts(
                "transfer accounts must be writable".to_string(),
            ));
        }
        if !source.is_signer {
            return Err(HostError::MissingSignature(source.pubkey));
        }

        let amount = decode_transfer(&invocation.data)?;
        let mut balances = self.write()?;

        let have = balances.get(&source.pubkey).copied().unwrap_or(0);
        if have < amount {
            return Err(HostError::InsufficientFunds { have, need: amount });
        }
        let dest_balance = balances.get(&destination.pubkey).copied().unwrap_or(0);
        if source.pubkey != destination.pubkey {
            let credited = dest_balance
                .checked_add(amount)
                .ok_or_else(|| HostError::Rejected("balance overflow".to_string()))?;
            balances.insert(source.pubkey, have - amount);
            balances.insert(destination.pubkey, credited);
        }

        log::info!(
            "Transferred {} from {} to {}",
            amount,
            source.pubkey,
            destination.pubkey
        );
        Ok(())
    }
}

impl ActionHost for Ledger {
    fn invoke(&self, invocation: &Invocation, authority: &AuthorityToken) -> Result<(), HostError> {
        if !authority.verify() {
            return Err(HostError::InvalidAuthority);
        }

        // The delegated authority is the only key that can sign here
        if let Some(account) = invocation
            .accounts
            .iter()
            .find(|a| a.is_signer && a.pubkey != *authority.authority())
        {
            return Err(HostError::MissingSignature(account.pubkey));
        }

        if invocation.program_id == transfer_program_id() {
            self.transfer(invocation)
        } else {
            Err(HostError::UnknownProgram(invocation.program_id))
        }
    }
}
