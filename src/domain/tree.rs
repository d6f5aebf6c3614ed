//! Tree heads: unsigned, log-signed, and witness-cosigned.

use crate::ascii::{self, AsciiError, Document, FieldMap};
use crate::crypto::{empty_tree_root, verify_signature, Hash, PublicKey32, Signature64, Signer, SigningError};
use crate::domain::{unix_now, CodecError};

/// Number of bytes in the signed tree-head form.
pub const TREE_HEAD_LEN: usize = 80;

/// Number of bytes in a persisted signed tree head.
pub const SIGNED_TREE_HEAD_LEN: usize = TREE_HEAD_LEN + 64;

/// A snapshot of the Merkle tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeHead {
    /// Unix seconds at which the head was produced.
    pub timestamp: u64,
    pub tree_size: u64,
    pub root_hash: Hash,
}

impl TreeHead {
    /// Head of the empty tree, stamped now.
    pub fn zero() -> Self {
        Self {
            timestamp: unix_now(),
            tree_size: 0,
            root_hash: empty_tree_root(),
        }
    }

    /// Same tree, fresh timestamp.
    pub fn refresh(mut self) -> Self {
        self.timestamp = unix_now();
        self
    }

    /// The 80-byte form every signature covers:
    /// `u64 timestamp ‖ u64 tree_size ‖ [32]root_hash ‖ [32]log_key_hash`.
    ///
    /// The trailing log key hash makes heads non-transferable across logs.
    pub fn to_signed_bytes(&self, log_key_hash: &Hash) -> [u8; TREE_HEAD_LEN] {
        let mut buf = [0u8; TREE_HEAD_LEN];
        buf[..8].copy_from_slice(&self.timestamp.to_be_bytes());
        buf[8..16].copy_from_slice(&self.tree_size.to_be_bytes());
        buf[16..48].copy_from_slice(&self.root_hash);
        buf[48..].copy_from_slice(log_key_hash);
        buf
    }

    /// Sign this head with the log's key.
    pub fn sign(
        &self,
        signer: &dyn Signer,
        log_key_hash: &Hash,
    ) -> Result<SignedTreeHead, SigningError> {
        let signature = signer.sign(&self.to_signed_bytes(log_key_hash))?;
        Ok(SignedTreeHead {
            tree_head: *self,
            signature,
        })
    }

    /// ASCII form used on the storage-node wire: `timestamp`, `tree_size`,
    /// `root_hash`.
    pub fn to_ascii(&self) -> String {
        let mut out = String::new();
        ascii::write_int(&mut out, "timestamp", self.timestamp);
        ascii::write_int(&mut out, "tree_size", self.tree_size);
        ascii::write_hex(&mut out, "root_hash", &self.root_hash);
        out
    }

    pub fn from_ascii(buf: &[u8]) -> Result<Self, AsciiError> {
        let mut fields = Document::parse(buf)?.into_fields();
        let head = Self::take_fields(&mut fields)?;
        fields.done()?;
        Ok(head)
    }

    pub(crate) fn take_fields(fields: &mut FieldMap) -> Result<Self, AsciiError> {
        Ok(Self {
            timestamp: ascii::parse_u64("timestamp", &fields.take("timestamp")?)?,
            tree_size: ascii::parse_u64("tree_size", &fields.take("tree_size")?)?,
            root_hash: ascii::parse_array("root_hash", &fields.take("root_hash")?)?,
        })
    }
}

/// A tree head signed by the log's key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignedTreeHead {
    pub tree_head: TreeHead,
    pub signature: Signature64,
}

impl SignedTreeHead {
    /// Check the log signature under `public_key` with its key hash bound in.
    pub fn verify(&self, public_key: &PublicKey32, log_key_hash: &Hash) -> bool {
        verify_signature(
            public_key,
            &self.tree_head.to_signed_bytes(log_key_hash),
            &self.signature,
        )
    }

    /// 144-byte persisted form: signed tree-head form ‖ signature.
    pub fn to_binary(&self, log_key_hash: &Hash) -> [u8; SIGNED_TREE_HEAD_LEN] {
        let mut buf = [0u8; SIGNED_TREE_HEAD_LEN];
        buf[..TREE_HEAD_LEN].copy_from_slice(&self.tree_head.to_signed_bytes(log_key_hash));
        buf[TREE_HEAD_LEN..].copy_from_slice(&self.signature);
        buf
    }

    /// Parse the persisted form, checking the embedded key hash belongs to
    /// this log.
    pub fn from_binary(buf: &[u8], log_key_hash: &Hash) -> Result<Self, CodecError> {
        if buf.len() != SIGNED_TREE_HEAD_LEN {
            return Err(CodecError::InvalidSize {
                what: "signed tree head",
                got: buf.len(),
                want: SIGNED_TREE_HEAD_LEN,
            });
        }
        let mut timestamp = [0u8; 8];
        timestamp.copy_from_slice(&buf[..8]);
        let mut tree_size = [0u8; 8];
        tree_size.copy_from_slice(&buf[8..16]);
        let mut root_hash = [0u8; 32];
        root_hash.copy_from_slice(&buf[16..48]);
        if &buf[48..80] != log_key_hash {
            return Err(CodecError::KeyHashMismatch);
        }
        let mut signature = [0u8; 64];
        signature.copy_from_slice(&buf[80..]);
        Ok(Self {
            tree_head: TreeHead {
                timestamp: u64::from_be_bytes(timestamp),
                tree_size: u64::from_be_bytes(tree_size),
                root_hash,
            },
            signature,
        })
    }

    /// ASCII response form: `timestamp`, `tree_size`, `root_hash`,
    /// `signature`.
    pub fn to_ascii(&self) -> String {
        let mut out = String::new();
        self.write_ascii(&mut out);
        out
    }

    pub(crate) fn write_ascii(&self, out: &mut String) {
        ascii::write_int(out, "timestamp", self.tree_head.timestamp);
        ascii::write_int(out, "tree_size", self.tree_head.tree_size);
        ascii::write_hex(out, "root_hash", &self.tree_head.root_hash);
        ascii::write_hex(out, "signature", &self.signature);
    }

    pub fn from_ascii(buf: &[u8]) -> Result<Self, AsciiError> {
        let mut fields = Document::parse(buf)?.into_fields();
        let sth = Self::take_fields(&mut fields)?;
        fields.done()?;
        Ok(sth)
    }

    pub(crate) fn take_fields(fields: &mut FieldMap) -> Result<Self, AsciiError> {
        let tree_head = TreeHead::take_fields(fields)?;
        let signature = ascii::parse_array("signature", &fields.take("signature")?)?;
        Ok(Self {
            tree_head,
            signature,
        })
    }
}

/// A signed tree head plus the witness cosignatures collected for it.
///
/// `cosignatures` and `key_hashes` are parallel lists of equal length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CosignedTreeHead {
    pub signed_tree_head: SignedTreeHead,
    pub cosignatures: Vec<Signature64>,
    pub key_hashes: Vec<Hash>,
}

impl CosignedTreeHead {
    /// ASCII response form: the signed tree head followed by repeated
    /// `cosignature` and `key_hash` lines.
    pub fn to_ascii(&self) -> String {
        let mut out = String::new();
        self.signed_tree_head.write_ascii(&mut out);
        for cosignature in &self.cosignatures {
            ascii::write_hex(&mut out, "cosignature", cosignature);
        }
        for key_hash in &self.key_hashes {
            ascii::write_hex(&mut out, "key_hash", key_hash);
        }
        out
    }

    pub fn from_ascii(buf: &[u8]) -> Result<Self, AsciiError> {
        let mut fields = Document::parse(buf)?.into_fields();
        let signed_tree_head = SignedTreeHead::take_fields(&mut fields)?;
        let cosignatures = fields
            .take_all("cosignature")
            .iter()
            .map(|v| ascii::parse_array("cosignature", v))
            .collect::<Result<Vec<_>, _>>()?;
        let key_hashes = fields
            .take_all("key_hash")
            .iter()
            .map(|v| ascii::parse_array("key_hash", v))
            .collect::<Result<Vec<_>, _>>()?;
        fields.done()?;
        if cosignatures.len() != key_hashes.len() {
            return Err(AsciiError::value(
                "key_hash",
                "cosignature and key_hash counts differ",
            ));
        }
        if cosignatures.is_empty() {
            return Err(AsciiError::MissingKey("cosignature"));
        }
        Ok(Self {
            signed_tree_head,
            cosignatures,
            key_hashes,
        })
    }
}
