//! Merkle audit proofs and their verification.
//!
//! The front-end never builds trees; it verifies proofs produced by the
//! storage node. Hashing follows RFC 6962: `H(0x00 ‖ data)` for leaves,
//! `H(0x01 ‖ left ‖ right)` for interior nodes, `H("")` for the empty tree.

use sha2::{Digest, Sha256};

use crate::ascii::{self, AsciiError, Document};
use crate::crypto::Hash;

/// Proof verification failure.
#[derive(Debug, thiserror::Error)]
pub enum ProofError {
    #[error("invalid proof range: old_size {old_size}, new_size {new_size}")]
    InvalidRange { old_size: u64, new_size: u64 },

    #[error("leaf index {leaf_index} outside tree of size {tree_size}")]
    IndexOutOfRange { leaf_index: u64, tree_size: u64 },

    #[error("proof path has wrong length")]
    PathLength,

    #[error("root mismatch")]
    RootMismatch,
}

/// RFC 6962 leaf hash.
pub fn leaf_hash(data: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update([0x00]);
    hasher.update(data);
    hasher.finalize().into()
}

/// RFC 6962 interior node hash.
pub fn node_hash(left: &Hash, right: &Hash) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update([0x01]);
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// Audit path showing the tree of `old_size` leaves is a prefix of the tree
/// of `new_size` leaves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsistencyProof {
    pub old_size: u64,
    pub new_size: u64,
    pub path: Vec<Hash>,
}

impl ConsistencyProof {
    /// Verify the proof against the two root hashes.
    pub fn verify(&self, old_root: &Hash, new_root: &Hash) -> Result<(), ProofError> {
        if self.old_size == 0 || self.old_size > self.new_size {
            return Err(ProofError::InvalidRange {
                old_size: self.old_size,
                new_size: self.new_size,
            });
        }
        if self.old_size == self.new_size {
            if !self.path.is_empty() {
                return Err(ProofError::PathLength);
            }
            if old_root != new_root {
                return Err(ProofError::RootMismatch);
            }
            return Ok(());
        }

        let mut fn_ = self.old_size - 1;
        let mut sn = self.new_size - 1;
        while fn_ & 1 == 1 {
            fn_ >>= 1;
            sn >>= 1;
        }

        let mut path = self.path.iter();
        let (mut old_acc, mut new_acc) = if fn_ != 0 {
            let first = path.next().ok_or(ProofError::PathLength)?;
            (*first, *first)
        } else {
            (*old_root, *old_root)
        };

        for node in path {
            if sn == 0 {
                return Err(ProofError::PathLength);
            }
            if fn_ & 1 == 1 || fn_ == sn {
                old_acc = node_hash(node, &old_acc);
                new_acc = node_hash(node, &new_acc);
                while fn_ != 0 && fn_ & 1 == 0 {
                    fn_ >>= 1;
                    sn >>= 1;
                }
            } else {
                new_acc = node_hash(&new_acc, node);
            }
            fn_ >>= 1;
            sn >>= 1;
        }

        if sn != 0 {
            return Err(ProofError::PathLength);
        }
        if old_acc != *old_root || new_acc != *new_root {
            return Err(ProofError::RootMismatch);
        }
        Ok(())
    }

    /// ASCII response form: repeated `consistency_path` lines. The sizes come
    /// from the request and are not echoed.
    pub fn to_ascii(&self) -> String {
        let mut out = String::new();
        for node in &self.path {
            ascii::write_hex(&mut out, "consistency_path", node);
        }
        out
    }

    pub fn from_ascii(buf: &[u8], old_size: u64, new_size: u64) -> Result<Self, AsciiError> {
        let mut fields = Document::parse(buf)?.into_fields();
        let path = fields
            .take_all("consistency_path")
            .iter()
            .map(|v| ascii::parse_array("consistency_path", v))
            .collect::<Result<Vec<_>, _>>()?;
        fields.done()?;
        Ok(Self {
            old_size,
            new_size,
            path,
        })
    }
}

/// Audit path showing a leaf is present at `leaf_index` in the tree of
/// `tree_size` leaves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InclusionProof {
    pub tree_size: u64,
    pub leaf_index: u64,
    pub path: Vec<Hash>,
}

impl InclusionProof {
    /// Verify the proof for a leaf hash against the root.
    pub fn verify(&self, leaf: &Hash, root: &Hash) -> Result<(), ProofError> {
        if self.leaf_index >= self.tree_size {
            return Err(ProofError::IndexOutOfRange {
                leaf_index: self.leaf_index,
                tree_size: self.tree_size,
            });
        }

        let mut fn_ = self.leaf_index;
        let mut sn = self.tree_size - 1;
        let mut acc = *leaf;
        for node in &self.path {
            if sn == 0 {
                return Err(ProofError::PathLength);
            }
            if fn_ & 1 == 1 || fn_ == sn {
                acc = node_hash(node, &acc);
                while fn_ != 0 && fn_ & 1 == 0 {
                    fn_ >>= 1;
                    sn >>= 1;
                }
            } else {
                acc = node_hash(&acc, node);
            }
            fn_ >>= 1;
            sn >>= 1;
        }

        if sn != 0 {
            return Err(ProofError::PathLength);
        }
        if acc != *root {
            return Err(ProofError::RootMismatch);
        }
        Ok(())
    }

    /// ASCII response form: `leaf_index` followed by repeated
    /// `inclusion_path` lines. The tree size comes from the request.
    pub fn to_ascii(&self) -> String {
        let mut out = String::new();
        ascii::write_int(&mut out, "leaf_index", self.leaf_index);
        for node in &self.path {
            ascii::write_hex(&mut out, "inclusion_path", node);
        }
        out
    }

    pub fn from_ascii(buf: &[u8], tree_size: u64) -> Result<Self, AsciiError> {
        let mut fields = Document::parse(buf)?.into_fields();
        let leaf_index = ascii::parse_u64("leaf_index", &fields.take("leaf_index")?)?;
        let path = fields
            .take_all("inclusion_path")
            .iter()
            .map(|v| ascii::parse_array("inclusion_path", v))
            .collect::<Result<Vec<_>, _>>()?;
        fields.done()?;
        Ok(Self {
            tree_size,
            leaf_index,
            path,
        })
    }
}

/// RFC 6962 reference construction, used only to exercise verification in
/// tests. The front-end itself never builds trees.
#[cfg(test)]
pub(crate) mod reference {
    use super::{leaf_hash, node_hash};
    use crate::crypto::Hash;

    pub fn mth(leaves: &[Vec<u8>]) -> Hash {
        match leaves.len() {
            0 => crate::crypto::empty_tree_root(),
            1 => leaf_hash(&leaves[0]),
            n => {
                let k = split_point(n);
                node_hash(&mth(&leaves[..k]), &mth(&leaves[k..]))
            }
        }
    }

    // Largest power of two strictly less than n.
    fn split_point(n: usize) -> usize {
        let next = n.next_power_of_two();
        if next == n {
            n / 2
        } else {
            next / 2
        }
    }

    pub fn inclusion_path(m: usize, leaves: &[Vec<u8>]) -> Vec<Hash> {
        let n = leaves.len();
        if n <= 1 {
            return Vec::new();
        }
        let k = split_point(n);
        if m < k {
            let mut path = inclusion_path(m, &leaves[..k]);
            path.push(mth(&leaves[k..]));
            path
        } else {
            let mut path = inclusion_path(m - k, &leaves[k..]);
            path.push(mth(&leaves[..k]));
            path
        }
    }

    fn subproof(m: usize, leaves: &[Vec<u8>], complete: bool) -> Vec<Hash> {
        let n = leaves.len();
        if m == n {
            return if complete {
                Vec::new()
            } else {
                vec![mth(leaves)]
            };
        }
        let k = split_point(n);
        if m <= k {
            let mut path = subproof(m, &leaves[..k], complete);
            path.push(mth(&leaves[k..]));
            path
        } else {
            let mut path = subproof(m - k, &leaves[k..], false);
            path.push(mth(&leaves[..k]));
            path
        }
    }

    pub fn consistency_path(m: usize, leaves: &[Vec<u8>]) -> Vec<Hash> {
        subproof(m, leaves, true)
    }

    pub fn sample_leaves(n: usize) -> Vec<Vec<u8>> {
        (0..n).map(|i| format!("leaf-{i}").into_bytes()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::reference::{consistency_path, inclusion_path, mth, sample_leaves};
    use super::*;

    #[test]
    fn inclusion_verifies_for_all_leaves_and_sizes() {
        for n in 1..=20usize {
            let leaves = sample_leaves(n);
            let root = mth(&leaves);
            for m in 0..n {
                let proof = InclusionProof {
                    tree_size: n as u64,
                    leaf_index: m as u64,
                    path: inclusion_path(m, &leaves),
                };
                proof
                    .verify(&leaf_hash(&leaves[m]), &root)
                    .unwrap_or_else(|e| panic!("inclusion {m}/{n}: {e}"));
            }
        }
    }

    #[test]
    fn inclusion_rejects_wrong_leaf() {
        let leaves = sample_leaves(7);
        let root = mth(&leaves);
        let proof = InclusionProof {
            tree_size: 7,
            leaf_index: 3,
            path: inclusion_path(3, &leaves),
        };
        assert!(proof.verify(&leaf_hash(b"not a member"), &root).is_err());
    }

    #[test]
    fn inclusion_rejects_index_out_of_range() {
        let proof = InclusionProof {
            tree_size: 4,
            leaf_index: 4,
            path: Vec::new(),
        };
        assert!(matches!(
            proof.verify(&[0u8; 32], &[0u8; 32]),
            Err(ProofError::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn consistency_verifies_for_all_size_pairs() {
        for n in 2..=20usize {
            let leaves = sample_leaves(n);
            let new_root = mth(&leaves);
            for m in 1..n {
                let old_root = mth(&leaves[..m]);
                let proof = ConsistencyProof {
                    old_size: m as u64,
                    new_size: n as u64,
                    path: consistency_path(m, &leaves),
                };
                proof
                    .verify(&old_root, &new_root)
                    .unwrap_or_else(|e| panic!("consistency {m}->{n}: {e}"));
            }
        }
    }

    #[test]
    fn consistency_rejects_forked_history() {
        let honest = sample_leaves(8);
        let mut forked = sample_leaves(8);
        forked[2] = b"tampered".to_vec();

        let proof = ConsistencyProof {
            old_size: 4,
            new_size: 8,
            path: consistency_path(4, &honest),
        };
        assert!(proof.verify(&mth(&forked[..4]), &mth(&honest)).is_err());
    }

    #[test]
    fn consistency_rejects_zero_old_size() {
        let proof = ConsistencyProof {
            old_size: 0,
            new_size: 4,
            path: Vec::new(),
        };
        assert!(matches!(
            proof.verify(&[0u8; 32], &[0u8; 32]),
            Err(ProofError::InvalidRange { .. })
        ));
    }

    #[test]
    fn consistency_equal_sizes_requires_equal_roots() {
        let leaves = sample_leaves(3);
        let root = mth(&leaves);
        let proof = ConsistencyProof {
            old_size: 3,
            new_size: 3,
            path: Vec::new(),
        };
        proof.verify(&root, &root).unwrap();
        assert!(proof.verify(&root, &[0u8; 32]).is_err());
    }

    #[test]
    fn consistency_rejects_truncated_path() {
        let leaves = sample_leaves(9);
        let mut path = consistency_path(3, &leaves);
        path.pop();
        let proof = ConsistencyProof {
            old_size: 3,
            new_size: 9,
            path,
        };
        assert!(proof.verify(&mth(&leaves[..3]), &mth(&leaves)).is_err());
    }

    #[test]
    fn consistency_ascii_roundtrip() {
        let leaves = sample_leaves(6);
        let proof = ConsistencyProof {
            old_size: 2,
            new_size: 6,
            path: consistency_path(2, &leaves),
        };
        let body = proof.to_ascii();
        assert_eq!(
            ConsistencyProof::from_ascii(body.as_bytes(), 2, 6).unwrap(),
            proof
        );
    }

    #[test]
    fn inclusion_ascii_roundtrip() {
        let leaves = sample_leaves(5);
        let proof = InclusionProof {
            tree_size: 5,
            leaf_index: 4,
            path: inclusion_path(4, &leaves),
        };
        let body = proof.to_ascii();
        assert_eq!(
            InclusionProof::from_ascii(body.as_bytes(), 5).unwrap(),
            proof
        );
    }
}
