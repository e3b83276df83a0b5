//! Engine configuration
//!
//! Capacity limits that keep group and transaction records within a
//! fixed size. Defaults match the record layout of the on-chain program
//! this engine authorizes for: 10 owners, 20 accounts, 256 payload bytes.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Default maximum number of owners per group
pub const DEFAULT_MAX_OWNERS: usize = 10;

/// Default maximum number of target accounts per transaction
pub const DEFAULT_MAX_ACCOUNTS: usize = 20;

/// Default maximum payload length in bytes
pub const DEFAULT_MAX_PAYLOAD_LEN: usize = 256;

/// Hard ceiling for `max_owners`
pub const MAX_OWNERS_LIMIT: usize = 64;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Capacity limits enforced by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub max_owners: usize,
    pub max_accounts: usize,
    pub max_payload_len: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_owners: DEFAULT_MAX_OWNERS,
            max_accounts: DEFAULT_MAX_ACCOUNTS,
            max_payload_len: DEFAULT_MAX_PAYLOAD_LEN,
        }
    }
}

impl EngineConfig {
    /// Load a JSON config file; absent fields keep their defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Check limits are usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_owners == 0 {
            return Err(ConfigError::Invalid(
                "max_owners must be at least 1".to_string(),
            ));
        }
        if self.max_owners > MAX_OWNERS_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "max_owners {} exceeds limit {}",
                self.max_owners, MAX_OWNERS_LIMIT
            )));
        }
        if self.max_accounts == 0 {
            return Err(ConfigError::Invalid(
                "max_accounts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
