//! Tree-head state management.
//!
//! - [`primary`] - the primary role: rotation loop, cosignature intake,
//!   optional replication gating
//! - [`replication`] - the secondary role: leaf replication and its own
//!   to-sign tree head

pub mod primary;
pub mod replication;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::crypto::{PublicKey32, Signature64};
use crate::domain::{CosignedTreeHead, SignedTreeHead};
use crate::infra::Result;

pub use primary::PrimaryState;
pub use replication::ReplicationState;

/// Bound on queued-but-undrained cosignature events.
pub const COSIGNATURE_QUEUE_BOUND: usize = 4096;

/// Read and write access to the published tree heads, as the endpoint
/// handlers see it.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait StateSource: Send + Sync {
    /// Snapshot of the tree head currently out for cosigning.
    async fn to_cosign_tree_head(&self) -> SignedTreeHead;

    /// The current cosigned tree head, or
    /// [`crate::infra::LogError::NoCosignatures`] when none exists.
    async fn cosigned_tree_head(&self) -> Result<CosignedTreeHead>;

    /// Validate and enqueue a witness cosignature over the published to-sign
    /// tree head. The caller has already checked the witness against the
    /// configured whitelist.
    async fn add_cosignature(
        &self,
        public_key: PublicKey32,
        cosignature: Signature64,
    ) -> Result<()>;
}
