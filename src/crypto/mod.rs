//! Cryptographic utilities
//!
//! This module provides:
//! - SHA-256 / HASH160 hashing
//! - ECDSA key management (secp256k1)
//! - Identities and their Base58Check text form

pub mod hash;
pub mod identity;
pub mod keys;

pub use hash::{double_sha256, hash160, sha256};
pub use identity::{Identity, IdentityError, IDENTITY_LEN};
pub use keys::{public_key_from_hex, sign_message, verify_signature, KeyError, KeyPair};
