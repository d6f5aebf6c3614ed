//! Core domain types: statements, leaves, tree heads, and proofs, with their
//! bit-exact binary encodings and the ASCII representations served over HTTP.

pub mod endpoint;
pub mod leaf;
pub mod proof;
pub mod requests;
pub mod tree;

pub use endpoint::Endpoint;
pub use leaf::{Leaf, Statement, LEAF_LEN, STATEMENT_LEN};
pub use proof::{ConsistencyProof, InclusionProof, ProofError};
pub use requests::{
    AddCosignatureRequest, AddLeafRequest, ConsistencyProofRequest, InclusionProofRequest,
    LeavesRequest,
};
pub use tree::{CosignedTreeHead, SignedTreeHead, TreeHead, SIGNED_TREE_HEAD_LEN, TREE_HEAD_LEN};

/// Error produced while decoding a binary encoding.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("invalid {what} size: got {got} bytes, want {want}")]
    InvalidSize {
        what: &'static str,
        got: usize,
        want: usize,
    },

    #[error("tree head was signed by a different log key")]
    KeyHashMismatch,
}

/// Current wall-clock time as unix seconds.
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
