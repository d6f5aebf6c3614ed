//! Log configuration and identity.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::crypto::{key_hash, Hash, LogSigningKey, PublicKey32};
use crate::infra::{LogError, Result};

/// Immutable log parameters, fixed at boot.
#[derive(Debug, Clone)]
pub struct Config {
    /// Hex-encoded hash of the log's public key.
    pub log_id: String,
    /// Merkle tree identifier at the storage node.
    pub tree_id: i64,
    /// URL path prefix in front of the versioned API, may be empty.
    pub prefix: String,
    /// Maximum number of leaves returned per `get-leaves` request.
    pub max_range: u64,
    /// Per-request deadline, also used for outbound calls.
    pub deadline: Duration,
    /// Tree-head rotation interval.
    pub interval: Duration,
    /// Smallest accepted shard hint.
    pub shard_start: u64,
    /// Trusted witnesses: key hash to public verification key.
    pub witnesses: HashMap<Hash, PublicKey32>,
}

impl Config {
    /// Assemble a config for the log identified by `public_key`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        public_key: &PublicKey32,
        tree_id: i64,
        prefix: String,
        max_range: u64,
        deadline: Duration,
        interval: Duration,
        shard_start: u64,
        witnesses: HashMap<Hash, PublicKey32>,
    ) -> Result<Self> {
        if max_range == 0 {
            return Err(LogError::Config("max-range must be positive".to_string()));
        }
        if interval.is_zero() || deadline.is_zero() {
            return Err(LogError::Config(
                "interval and deadline must be positive".to_string(),
            ));
        }
        if prefix.starts_with('/') || prefix.ends_with('/') {
            return Err(LogError::Config(
                "prefix must not contain leading or trailing slashes".to_string(),
            ));
        }
        Ok(Self {
            log_id: hex::encode(key_hash(public_key)),
            tree_id,
            prefix,
            max_range,
            deadline,
            interval,
            shard_start,
            witnesses,
        })
    }

    /// The log's key hash, bound into every signed tree head.
    pub fn log_key_hash(&self) -> Hash {
        let mut hash = [0u8; 32];
        // log_id is always valid hex of the right length by construction.
        if let Ok(bytes) = hex::decode(&self.log_id) {
            if bytes.len() == 32 {
                hash.copy_from_slice(&bytes);
            }
        }
        hash
    }

    /// Look up a witness key by its hash.
    pub fn witness_key(&self, witness_key_hash: &Hash) -> Option<&PublicKey32> {
        self.witnesses.get(witness_key_hash)
    }
}

/// Parse a witness file: one `key_hash public_key` hex pair per line, blank
/// lines and `#` comments allowed. Each key hash must equal the hash of its
/// public key.
pub fn parse_witness_file(content: &str) -> Result<HashMap<Hash, PublicKey32>> {
    let mut witnesses = HashMap::new();
    for (lineno, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.split_whitespace();
        let (Some(hash_hex), Some(key_hex), None) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(LogError::Config(format!(
                "witness file line {}: expected 'key_hash public_key'",
                lineno + 1
            )));
        };

        let hash: Hash = decode_fixed(hash_hex).ok_or_else(|| {
            LogError::Config(format!("witness file line {}: bad key hash", lineno + 1))
        })?;
        let key: PublicKey32 = decode_fixed(key_hex).ok_or_else(|| {
            LogError::Config(format!("witness file line {}: bad public key", lineno + 1))
        })?;
        if key_hash(&key) != hash {
            return Err(LogError::Config(format!(
                "witness file line {}: key hash does not match public key",
                lineno + 1
            )));
        }
        witnesses.insert(hash, key);
    }
    Ok(witnesses)
}

/// Load the log's Ed25519 signing key from a file holding a hex-encoded
/// 32-byte seed.
pub fn load_signing_key(path: &Path) -> Result<LogSigningKey> {
    let content = std::fs::read_to_string(path)?;
    LogSigningKey::from_hex(&content)
        .map_err(|e| LogError::Config(format!("{}: {e}", path.display())))
}

fn decode_fixed<const N: usize>(hex_str: &str) -> Option<[u8; N]> {
    hex::decode(hex_str).ok()?.try_into().ok()
}
