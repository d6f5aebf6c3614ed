//! Trait definitions for the log front-end's external collaborators.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::domain::{ConsistencyProof, InclusionProof, Leaf, SignedTreeHead, TreeHead};

use super::Result;

/// Outcome of submitting a leaf to the storage node.
///
/// Submission is idempotent per leaf; resubmitting an accepted leaf reports
/// one of the duplicate outcomes instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddLeafOutcome {
    /// Accepted and waiting to be sequenced.
    Queued,
    /// Already submitted but not yet sequenced.
    AlreadyExists,
    /// Already sequenced into the tree.
    IsSequenced,
}

/// The Merkle storage node behind the front-end.
///
/// All calls run under the caller's deadline; cancellation drops the
/// in-flight request.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TreeBackend: Send + Sync {
    /// Submit a leaf for sequencing. Idempotent per leaf.
    async fn add_leaf(&self, leaf: &Leaf) -> Result<AddLeafOutcome>;

    /// Append already-sequenced leaves starting at `start_index`. Used by the
    /// secondary role while replicating the primary's tree.
    async fn add_sequenced_leaves(&self, leaves: &[Leaf], start_index: u64) -> Result<()>;

    /// Newest tree head known to the storage node.
    async fn get_tree_head(&self) -> Result<TreeHead>;

    /// Consistency proof between two tree sizes.
    async fn get_consistency_proof(&self, old_size: u64, new_size: u64)
        -> Result<ConsistencyProof>;

    /// Inclusion proof for a leaf hash in the tree of `tree_size` leaves.
    /// Fails with [`super::LogError::NotIncluded`] when the leaf is absent.
    async fn get_inclusion_proof(
        &self,
        leaf_hash: &crate::crypto::Hash,
        tree_size: u64,
    ) -> Result<InclusionProof>;

    /// Leaves `start_size..=end_size` in index order. May return fewer than
    /// requested only at the tail of the tree.
    async fn get_leaves(&self, start_size: u64, end_size: u64) -> Result<Vec<Leaf>>;
}

/// The secondary replica, as seen from the primary's rotation loop.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Replica: Send + Sync {
    /// Whether a replica is actually configured and reachable in principle.
    fn is_initiated(&self) -> bool;

    /// The tree head the replica is currently willing to cosign.
    async fn get_to_cosign_tree_head(&self) -> Result<SignedTreeHead>;
}

/// The primary log, as seen from a replicating secondary.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PrimaryLog: Send + Sync {
    /// The primary's published to-sign tree head.
    async fn to_cosign_tree_head(&self) -> Result<SignedTreeHead>;

    /// Sequenced leaves `start_size..=end_size` from the primary.
    async fn get_leaves(&self, start_size: u64, end_size: u64) -> Result<Vec<Leaf>>;
}
