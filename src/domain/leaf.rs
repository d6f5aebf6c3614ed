//! Log leaves and the statements they carry.

use crate::ascii::{self, AsciiError, Document};
use crate::crypto::{sha256, verify_signature, Hash, PublicKey32, Signature64};
use crate::domain::CodecError;

/// Number of bytes in a binary-encoded statement.
pub const STATEMENT_LEN: usize = 40;

/// Number of bytes in a binary-encoded leaf.
pub const LEAF_LEN: usize = 136;

/// The message a submitter signs: a time-window tag plus a checksum of the
/// submitted preimage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Statement {
    pub shard_hint: u64,
    pub checksum: Hash,
}

impl Statement {
    /// Statement over a raw preimage: `checksum = H(preimage)`.
    pub fn from_preimage(shard_hint: u64, preimage: &[u8]) -> Self {
        Self {
            shard_hint,
            checksum: sha256(preimage),
        }
    }

    /// Fixed 40-byte encoding: `u64 shard_hint ‖ [32]checksum`, big-endian.
    pub fn to_binary(&self) -> [u8; STATEMENT_LEN] {
        let mut buf = [0u8; STATEMENT_LEN];
        buf[..8].copy_from_slice(&self.shard_hint.to_be_bytes());
        buf[8..].copy_from_slice(&self.checksum);
        buf
    }

    pub fn from_binary(buf: &[u8]) -> Result<Self, CodecError> {
        if buf.len() != STATEMENT_LEN {
            return Err(CodecError::InvalidSize {
                what: "statement",
                got: buf.len(),
                want: STATEMENT_LEN,
            });
        }
        let mut shard_hint = [0u8; 8];
        shard_hint.copy_from_slice(&buf[..8]);
        let mut checksum = [0u8; 32];
        checksum.copy_from_slice(&buf[8..]);
        Ok(Self {
            shard_hint: u64::from_be_bytes(shard_hint),
            checksum,
        })
    }

    /// Check the submitter's signature over this statement.
    pub fn verify(&self, public_key: &PublicKey32, signature: &Signature64) -> bool {
        verify_signature(public_key, &self.to_binary(), signature)
    }
}

/// An entry in the log: a statement, the submitter's signature over it, and
/// the hash of the submitter's public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Leaf {
    pub statement: Statement,
    pub signature: Signature64,
    pub key_hash: Hash,
}

impl Leaf {
    pub fn new(statement: Statement, signature: Signature64, key_hash: Hash) -> Self {
        Self {
            statement,
            signature,
            key_hash,
        }
    }

    /// Fixed 136-byte encoding: statement ‖ signature ‖ key hash.
    pub fn to_binary(&self) -> [u8; LEAF_LEN] {
        let mut buf = [0u8; LEAF_LEN];
        buf[..STATEMENT_LEN].copy_from_slice(&self.statement.to_binary());
        buf[STATEMENT_LEN..STATEMENT_LEN + 64].copy_from_slice(&self.signature);
        buf[STATEMENT_LEN + 64..].copy_from_slice(&self.key_hash);
        buf
    }

    pub fn from_binary(buf: &[u8]) -> Result<Self, CodecError> {
        if buf.len() != LEAF_LEN {
            return Err(CodecError::InvalidSize {
                what: "leaf",
                got: buf.len(),
                want: LEAF_LEN,
            });
        }
        let statement = Statement::from_binary(&buf[..STATEMENT_LEN])?;
        let mut signature = [0u8; 64];
        signature.copy_from_slice(&buf[STATEMENT_LEN..STATEMENT_LEN + 64]);
        let mut key_hash = [0u8; 32];
        key_hash.copy_from_slice(&buf[STATEMENT_LEN + 64..]);
        Ok(Self {
            statement,
            signature,
            key_hash,
        })
    }

    /// Append this leaf's ASCII group: `shard_hint`, `checksum`, `signature`,
    /// `key_hash`, in that order.
    pub fn to_ascii(&self, out: &mut String) {
        ascii::write_int(out, "shard_hint", self.statement.shard_hint);
        ascii::write_hex(out, "checksum", &self.statement.checksum);
        ascii::write_hex(out, "signature", &self.signature);
        ascii::write_hex(out, "key_hash", &self.key_hash);
    }

    /// Serialize a leaf list as repeated ASCII groups.
    pub fn list_to_ascii(leaves: &[Leaf]) -> String {
        let mut out = String::new();
        for leaf in leaves {
            leaf.to_ascii(&mut out);
        }
        out
    }

    /// Parse a leaf list from repeated ASCII groups, enforcing group order.
    pub fn list_from_ascii(doc: &Document) -> Result<Vec<Leaf>, AsciiError> {
        const GROUP: [&str; 4] = ["shard_hint", "checksum", "signature", "key_hash"];

        let pairs = doc.pairs();
        if pairs.len() % GROUP.len() != 0 {
            return Err(AsciiError::value("shard_hint", "truncated leaf group"));
        }
        let mut leaves = Vec::with_capacity(pairs.len() / GROUP.len());
        for group in pairs.chunks(GROUP.len()) {
            for (pair, want) in group.iter().zip(GROUP) {
                if pair.0 != want {
                    return Err(AsciiError::UnexpectedKey(pair.0.clone()));
                }
            }
            leaves.push(Leaf {
                statement: Statement {
                    shard_hint: ascii::parse_u64("shard_hint", &group[0].1)?,
                    checksum: ascii::parse_array("checksum", &group[1].1)?,
                },
                signature: ascii::parse_array("signature", &group[2].1)?,
                key_hash: ascii::parse_array("key_hash", &group[3].1)?,
            });
        }
        Ok(leaves)
    }
}
