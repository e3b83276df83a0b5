//! Stable 20-byte identities
//!
//! Every participant the engine talks about (owners, groups, pending
//! transactions, target programs, derived authorities) is addressed by an
//! [`Identity`]. Key holders get theirs from HASH160 of the compressed
//! public key; everything else is derived under a domain tag so different
//! kinds of record can never collide.
//!
//! The text form is Base58Check with a zero version byte, the same
//! encoding used for Bitcoin-style addresses.

use super::hash::{double_sha256, hash160};
use secp256k1::PublicKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Length of an identity in bytes
pub const IDENTITY_LEN: usize = 20;

const VERSION_BYTE: u8 = 0x00;

/// Errors produced while parsing an identity from text
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("Invalid base58 encoding")]
    InvalidEncoding,
    #[error("Invalid identity length: {0} bytes")]
    InvalidLength(usize),
    #[error("Unknown version byte: {0:#04x}")]
    UnknownVersion(u8),
    #[error("Checksum mismatch")]
    BadChecksum,
}

/// A verified or derived participant handle
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity([u8; IDENTITY_LEN]);

impl Identity {
    /// Wrap raw identity bytes
    pub const fn from_bytes(bytes: [u8; IDENTITY_LEN]) -> Self {
        Self(bytes)
    }

    /// Raw identity bytes
    pub fn as_bytes(&self) -> &[u8; IDENTITY_LEN] {
        &self.0
    }

    /// Identity of a key holder
    pub fn from_public_key(public_key: &PublicKey) -> Self {
        Self(hash160(&public_key.serialize()))
    }

    /// Derive an identity from a domain tag and ordered input parts
    ///
    /// Each part is length-prefixed, so `("ab", "c")` and `("a", "bc")`
    /// derive different identities.
    pub fn derive(domain: &str, parts: &[&[u8]]) -> Self {
        let mut preimage = Vec::with_capacity(64);
        push_prefixed(&mut preimage, domain.as_bytes());
        for part in parts {
            push_prefixed(&mut preimage, part);
        }
        Self(hash160(&preimage))
    }

    /// Well-known identity for a named program or fixture
    pub fn from_seed(seed: &str) -> Self {
        Self::derive("seed", &[seed.as_bytes()])
    }

    /// Base58Check text form
    pub fn to_base58(&self) -> String {
        let mut bytes = Vec::with_capacity(IDENTITY_LEN + 5);
        bytes.push(VERSION_BYTE);
        bytes.extend_from_slice(&self.0);
        let checksum = double_sha256(&bytes);
        bytes.extend_from_slice(&checksum[..4]);
        bs58::encode(bytes).into_string()
    }
}

fn push_prefixed(buf: &mut Vec<u8>, part: &[u8]) {
    buf.extend_from_slice(&(part.len() as u32).to_le_bytes());
    buf.extend_from_slice(part);
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base58())
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({})", self.to_base58())
    }
}

impl FromStr for Identity {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|_| IdentityError::InvalidEncoding)?;
        if bytes.len() != IDENTITY_LEN + 5 {
            return Err(IdentityError::InvalidLength(bytes.len()));
        }
        if bytes[0] != VERSION_BYTE {
            return Err(IdentityError::UnknownVersion(bytes[0]));
        }

        let (body, checksum) = bytes.split_at(IDENTITY_LEN + 1);
        if double_sha256(body)[..4] != *checksum {
            return Err(IdentityError::BadChecksum);
        }

        let mut out = [0u8; IDENTITY_LEN];
        out.copy_from_slice(&body[1..]);
        Ok(Self(out))
    }
}

impl TryFrom<String> for Identity {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Identity> for String {
    fn from(identity: Identity) -> Self {
        identity.to_base58()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;

    #[test]
    fn test_base58_roundtrip() {
        let id = Identity::from_seed("owner-a");
        let text = id.to_string();
        // Zero version byte encodes with a leading '1'
        assert!(text.starts_with('1'));
        assert_eq!(text.parse::<Identity>().unwrap(), id);
    }

    #[test]
    fn test_corrupted_text_rejected() {
        let mut text = Identity::from_seed("owner-a").to_string();
        let last = text.pop().unwrap();
        text.push(if last == '2' { '3' } else { '2' });
        assert!(text.parse::<Identity>().is_err());
        assert_eq!(
            "not-base58!".parse::<Identity>(),
            Err(IdentityError::InvalidEncoding)
        );
    }

    #[test]
    fn test_derivation_is_length_prefixed() {
        let a = Identity::derive("tag", &[b"ab", b"c"]);
        let b = Identity::derive("tag", &[b"a", b"bc"]);
        assert_ne!(a, b);
        assert_ne!(
            Identity::derive("tag", &[b"x"]),
            Identity::derive("other", &[b"x"])
        );
    }

    #[test]
    fn test_key_identity_matches_public_key() {
        let kp = KeyPair::generate();
        assert_eq!(kp.identity(), Identity::from_public_key(&kp.public_key));
    }

    #[test]
    fn test_serde_uses_text_form() {
        let id = Identity::from_seed("serde");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));
        let back: Identity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
