//! SHA-256 hashing.
//!
//! Every hash in the protocol is 32 bytes. Witness and submitter identities
//! are the hash of their Ed25519 public key, and the signed tree-head form
//! binds the log's own key hash so heads cannot be replayed across logs.

use sha2::{Digest, Sha256};

/// Number of bytes in a protocol hash.
pub const HASH_SIZE: usize = 32;

/// 32-byte SHA-256 hash.
pub type Hash = [u8; HASH_SIZE];

/// Hash raw bytes with SHA-256.
pub fn sha256(data: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Identity hash of an Ed25519 public key.
pub fn key_hash(public_key: &[u8; 32]) -> Hash {
    sha256(public_key)
}

/// Root hash of the empty tree, `H("")`.
pub fn empty_tree_root() -> Hash {
    sha256(b"")
}
