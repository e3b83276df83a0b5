//! Local key store
//!
//! Owner key pairs kept as one JSON file per identity, so the CLI can sign
//! instructions on an owner's behalf.

use crate::crypto::{Identity, KeyError, KeyPair};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Key store errors
#[derive(Error, Debug)]
pub enum KeystoreError {
    #[error("No key stored for {0}")]
    UnknownKey(Identity),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Crypto error: {0}")]
    CryptoError(#[from] KeyError),
    #[error("Key file for {expected} holds the key of {found}")]
    IdentityMismatch { expected: Identity, found: Identity },
}

/// Serializable key data for persistence
#[derive(Debug, Serialize, Deserialize)]
struct KeyData {
    private_key_hex: String,
    identity: Identity,
    label: Option<String>,
}

impl KeyData {
    /// Decode the key pair and check it against the recorded identity
    fn into_stored(self) -> Result<StoredKey, KeystoreError> {
        let keypair = KeyPair::from_private_key_hex(&self.private_key_hex)?;
        let found = keypair.identity();
        if found != self.identity {
            return Err(KeystoreError::IdentityMismatch {
                expected: self.identity,
                found,
            });
        }
        Ok(StoredKey {
            keypair,
            label: self.label,
        })
    }
}

/// A stored key pair with its label
#[derive(Debug)]
pub struct StoredKey {
    pub keypair: KeyPair,
    pub label: Option<String>,
}

impl StoredKey {
    pub fn identity(&self) -> Identity {
        self.keypair.identity()
    }
}

/// Directory of owner keys
pub struct KeyStore {
    keys_dir: PathBuf,
}

impl KeyStore {
    /// Open (and create) a key directory
    pub fn new(keys_dir: &Path) -> Result<Self, KeystoreError> {
        fs::create_dir_all(keys_dir)?;
        Ok(Self {
            keys_dir: keys_dir.to_path_buf(),
        })
    }

    fn path_for(&self, identity: &Identity) -> PathBuf {
        self.keys_dir.join(format!("{}.json", identity))
    }

    /// Generate and save a new key pair
    pub fn generate(&self, label: Option<&str>) -> Result<StoredKey, KeystoreError> {
        let key = StoredKey {
            keypair: KeyPair::generate(),
            label: label.map(str::to_string),
        };
        self.save(&key)?;
        Ok(key)
    }

    /// Import a hex private key
    pub fn import(&self, private_key_hex: &str, label: Option<&str>) -> Result<StoredKey, KeystoreError> {
        let key = StoredKey {
            keypair: KeyPair::from_private_key_hex(private_key_hex)?,
            label: label.map(str::to_string),
        };
        self.save(&key)?;
        Ok(key)
    }

    fn save(&self, key: &StoredKey) -> Result<(), KeystoreError> {
        let data = KeyData {
            private_key_hex: key.keypair.private_key_hex(),
            identity: key.identity(),
            label: key.label.clone(),
        };

        let json = serde_json::to_string_pretty(&data)?;
        fs::write(self.path_for(&data.identity), json)?;
        log::debug!("Stored key for {}", data.identity);
        Ok(())
    }

    /// Load the key for `identity`
    pub fn load(&self, identity: &Identity) -> Result<StoredKey, KeystoreError> {
        let path = self.path_for(identity);
        if !path.exists() {
            return Err(KeystoreError::UnknownKey(*identity));
        }

        let json = fs::read_to_string(path)?;
        let data: KeyData = serde_json::from_str(&json)?;
        if data.identity != *identity {
            return Err(KeystoreError::IdentityMismatch {
                expected: *identity,
                found: data.identity,
            });
        }
        data.into_stored()
    }

    /// All stored identities, sorted
    pub fn list(&self) -> Result<Vec<StoredKey>, KeystoreError> {
        let mut keys = Vec::new();

        for entry in fs::read_dir(&self.keys_dir)? {
            let path = entry?.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                let json = fs::read_to_string(&path)?;
                let data: KeyData = serde_json::from_str(&json)?;
                keys.push(data.into_stored()?);
            }
        }

        keys.sort_by_key(|k| k.identity());
        Ok(keys)
    }
}
