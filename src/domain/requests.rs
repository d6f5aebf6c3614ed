//! Typed request bodies for the POST endpoints.

use crate::ascii::{self, AsciiError, Document};
use crate::crypto::{Hash, PublicKey32, Signature64};

/// Body of `add-leaf`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddLeafRequest {
    pub shard_hint: u64,
    pub preimage: Hash,
    pub signature: Signature64,
    pub verification_key: PublicKey32,
    pub domain_hint: DomainHint,
}

/// A submitter's domain hint, bounded to a DNS name length.
pub type DomainHint = String;

impl AddLeafRequest {
    pub fn from_ascii(buf: &[u8]) -> Result<Self, AsciiError> {
        let mut fields = Document::parse(buf)?.into_fields();
        let request = Self {
            shard_hint: ascii::parse_u64("shard_hint", &fields.take("shard_hint")?)?,
            preimage: ascii::parse_array("preimage", &fields.take("preimage")?)?,
            signature: ascii::parse_array("signature", &fields.take("signature")?)?,
            verification_key: ascii::parse_array(
                "verification_key",
                &fields.take("verification_key")?,
            )?,
            domain_hint: fields.take("domain_hint")?,
        };
        fields.done()?;
        if request.domain_hint.is_empty() {
            return Err(AsciiError::value("domain_hint", "must not be empty"));
        }
        Ok(request)
    }

    pub fn to_ascii(&self) -> String {
        let mut out = String::new();
        ascii::write_int(&mut out, "shard_hint", self.shard_hint);
        ascii::write_hex(&mut out, "preimage", &self.preimage);
        ascii::write_hex(&mut out, "signature", &self.signature);
        ascii::write_hex(&mut out, "verification_key", &self.verification_key);
        ascii::write_str(&mut out, "domain_hint", &self.domain_hint);
        out
    }
}

/// Body of `add-cosignature`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddCosignatureRequest {
    pub cosignature: Signature64,
    pub key_hash: Hash,
}

impl AddCosignatureRequest {
    pub fn from_ascii(buf: &[u8]) -> Result<Self, AsciiError> {
        let mut fields = Document::parse(buf)?.into_fields();
        let request = Self {
            cosignature: ascii::parse_array("cosignature", &fields.take("cosignature")?)?,
            key_hash: ascii::parse_array("key_hash", &fields.take("key_hash")?)?,
        };
        fields.done()?;
        Ok(request)
    }

    pub fn to_ascii(&self) -> String {
        let mut out = String::new();
        ascii::write_hex(&mut out, "cosignature", &self.cosignature);
        ascii::write_hex(&mut out, "key_hash", &self.key_hash);
        out
    }
}

/// Body of `get-consistency-proof`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsistencyProofRequest {
    pub old_size: u64,
    pub new_size: u64,
}

impl ConsistencyProofRequest {
    pub fn from_ascii(buf: &[u8]) -> Result<Self, AsciiError> {
        let mut fields = Document::parse(buf)?.into_fields();
        let request = Self {
            old_size: ascii::parse_u64("old_size", &fields.take("old_size")?)?,
            new_size: ascii::parse_u64("new_size", &fields.take("new_size")?)?,
        };
        fields.done()?;
        Ok(request)
    }

    pub fn to_ascii(&self) -> String {
        let mut out = String::new();
        ascii::write_int(&mut out, "old_size", self.old_size);
        ascii::write_int(&mut out, "new_size", self.new_size);
        out
    }
}

/// Body of `get-proof-by-hash`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InclusionProofRequest {
    pub leaf_hash: Hash,
    pub tree_size: u64,
}

impl InclusionProofRequest {
    pub fn from_ascii(buf: &[u8]) -> Result<Self, AsciiError> {
        let mut fields = Document::parse(buf)?.into_fields();
        let request = Self {
            leaf_hash: ascii::parse_array("leaf_hash", &fields.take("leaf_hash")?)?,
            tree_size: ascii::parse_u64("tree_size", &fields.take("tree_size")?)?,
        };
        fields.done()?;
        Ok(request)
    }

    pub fn to_ascii(&self) -> String {
        let mut out = String::new();
        ascii::write_hex(&mut out, "leaf_hash", &self.leaf_hash);
        ascii::write_int(&mut out, "tree_size", self.tree_size);
        out
    }
}

/// Body of `get-leaves`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeavesRequest {
    pub start_size: u64,
    pub end_size: u64,
}

impl LeavesRequest {
    pub fn from_ascii(buf: &[u8]) -> Result<Self, AsciiError> {
        let mut fields = Document::parse(buf)?.into_fields();
        let request = Self {
            start_size: ascii::parse_u64("start_size", &fields.take("start_size")?)?,
            end_size: ascii::parse_u64("end_size", &fields.take("end_size")?)?,
        };
        fields.done()?;
        Ok(request)
    }

    pub fn to_ascii(&self) -> String {
        let mut out = String::new();
        ascii::write_int(&mut out, "start_size", self.start_size);
        ascii::write_int(&mut out, "end_size", self.end_size);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_leaf_roundtrip() {
        let request = AddLeafRequest {
            shard_hint: 10,
            preimage: [1u8; 32],
            signature: [2u8; 64],
            verification_key: [3u8; 32],
            domain_hint: "example.com".to_string(),
        };
        let body = request.to_ascii();
        assert_eq!(AddLeafRequest::from_ascii(body.as_bytes()).unwrap(), request);
    }

    #[test]
    fn add_leaf_rejects_unknown_key() {
        let mut body = AddLeafRequest {
            shard_hint: 10,
            preimage: [1u8; 32],
            signature: [2u8; 64],
            verification_key: [3u8; 32],
            domain_hint: "example.com".to_string(),
        }
        .to_ascii();
        body.push_str("extra=1\n");
        assert!(AddLeafRequest::from_ascii(body.as_bytes()).is_err());
    }

    #[test]
    fn add_leaf_rejects_missing_key() {
        assert!(AddLeafRequest::from_ascii(b"shard_hint=10\n").is_err());
    }

    #[test]
    fn add_leaf_rejects_empty_domain_hint() {
        let body = AddLeafRequest {
            shard_hint: 10,
            preimage: [1u8; 32],
            signature: [2u8; 64],
            verification_key: [3u8; 32],
            domain_hint: String::new(),
        }
        .to_ascii();
        assert!(AddLeafRequest::from_ascii(body.as_bytes()).is_err());
    }

    #[test]
    fn add_cosignature_roundtrip() {
        let request = AddCosignatureRequest {
            cosignature: [5u8; 64],
            key_hash: [6u8; 32],
        };
        let body = request.to_ascii();
        assert_eq!(
            AddCosignatureRequest::from_ascii(body.as_bytes()).unwrap(),
            request
        );
    }

    #[test]
    fn consistency_request_roundtrip() {
        let request = ConsistencyProofRequest {
            old_size: 1,
            new_size: 9,
        };
        let body = request.to_ascii();
        assert_eq!(
            ConsistencyProofRequest::from_ascii(body.as_bytes()).unwrap(),
            request
        );
    }

    #[test]
    fn inclusion_request_roundtrip() {
        let request = InclusionProofRequest {
            leaf_hash: [7u8; 32],
            tree_size: 3,
        };
        let body = request.to_ascii();
        assert_eq!(
            InclusionProofRequest::from_ascii(body.as_bytes()).unwrap(),
            request
        );
    }

    #[test]
    fn leaves_request_roundtrip() {
        let request = LeavesRequest {
            start_size: 0,
            end_size: 5,
        };
        let body = request.to_ascii();
        assert_eq!(LeavesRequest::from_ascii(body.as_bytes()).unwrap(), request);
    }

    #[test]
    fn garbage_body_is_rejected() {
        assert!(LeavesRequest::from_ascii(b"key=value\n").is_err());
        assert!(ConsistencyProofRequest::from_ascii(b"old_size=x\nnew_size=2\n").is_err());
    }
}
