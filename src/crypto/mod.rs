//! Cryptographic primitives shared across the log front-end.
//!
//! - [`hash`] - SHA-256 hashing and key-hash derivation
//! - [`signing`] - Ed25519 signing and verification

pub mod hash;
pub mod signing;

pub use hash::{empty_tree_root, key_hash, sha256, Hash, HASH_SIZE};
pub use signing::{
    verify_signature, LogSigningKey, PublicKey32, SecretKey32, Signature64, Signer, SigningError,
    SIGNATURE_SIZE,
};
