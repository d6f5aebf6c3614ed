//! Secondary-role state manager.
//!
//! A secondary mirrors the primary's tree into its own storage node and
//! publishes the tree head it is willing to cosign. The primary polls that
//! head and never signs past it, which is what makes the secondary a usable
//! failover: everything the log ever signed is replicated here first.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::{timeout, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::crypto::{key_hash, Hash, PublicKey32, Signature64, Signer};
use crate::domain::{CosignedTreeHead, SignedTreeHead, TreeHead};
use crate::infra::{LogError, PrimaryLog, Result, ShutdownSignal, TreeBackend};

use super::StateSource;

/// State manager for a secondary node.
pub struct ReplicationState {
    backend: Arc<dyn TreeBackend>,
    primary: Arc<dyn PrimaryLog>,
    signer: Arc<dyn Signer>,
    log_key_hash: Hash,
    interval: Duration,
    deadline: Duration,
    /// Leaves fetched per replication request.
    batch: u64,

    head: RwLock<SignedTreeHead>,
}

impl ReplicationState {
    pub fn new(
        backend: Arc<dyn TreeBackend>,
        primary: Arc<dyn PrimaryLog>,
        signer: Arc<dyn Signer>,
        interval: Duration,
        deadline: Duration,
        batch: u64,
    ) -> Result<Self> {
        let log_key_hash = key_hash(&signer.public_key());
        let head = TreeHead::zero().sign(signer.as_ref(), &log_key_hash)?;
        Ok(Self {
            backend,
            primary,
            signer,
            log_key_hash,
            interval,
            deadline,
            batch: batch.max(1),
            head: RwLock::new(head),
        })
    }

    /// Run the replication loop until shutdown.
    pub async fn run(self: Arc<Self>, shutdown: ShutdownSignal) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.tick().await,
                _ = shutdown.wait() => {
                    info!("replication loop stopped");
                    return;
                }
            }
        }
    }

    /// One replication round: copy missing leaves, then publish the head of
    /// whatever our own storage node now holds.
    pub async fn tick(&self) {
        self.replicate().await;

        let local = match timeout(self.deadline, self.backend.get_tree_head()).await {
            Ok(Ok(head)) => head.refresh(),
            Ok(Err(e)) => {
                warn!(error = %e, "publish skipped: failed fetching local tree head");
                return;
            }
            Err(_) => {
                warn!("publish skipped: local tree head fetch timed out");
                return;
            }
        };
        match local.sign(self.signer.as_ref(), &self.log_key_hash) {
            Ok(sth) => {
                debug!(tree_size = sth.tree_head.tree_size, "published tree head");
                *self.head.write().await = sth;
            }
            Err(e) => warn!(error = %e, "publish skipped: failed signing tree head"),
        }
    }

    /// Best-effort copy of the primary's sequenced leaves into our storage
    /// node. A failure mid-range keeps whatever prefix made it in; the head
    /// published afterwards covers exactly what was stored.
    async fn replicate(&self) {
        let remote = match timeout(self.deadline, self.primary.to_cosign_tree_head()).await {
            Ok(Ok(sth)) => sth.tree_head,
            Ok(Err(e)) => {
                warn!(error = %e, "replication skipped: failed fetching primary tree head");
                return;
            }
            Err(_) => {
                warn!("replication skipped: primary tree head fetch timed out");
                return;
            }
        };
        let local = match timeout(self.deadline, self.backend.get_tree_head()).await {
            Ok(Ok(head)) => head,
            Ok(Err(e)) => {
                warn!(error = %e, "replication skipped: failed fetching local tree head");
                return;
            }
            Err(_) => {
                warn!("replication skipped: local tree head fetch timed out");
                return;
            }
        };

        let mut index = local.tree_size;
        while index < remote.tree_size {
            let end = remote.tree_size.min(index + self.batch) - 1;
            let leaves = match timeout(self.deadline, self.primary.get_leaves(index, end)).await {
                Ok(Ok(leaves)) => leaves,
                Ok(Err(e)) => {
                    warn!(error = %e, index, "replication interrupted: failed fetching leaves");
                    return;
                }
                Err(_) => {
                    warn!(index, "replication interrupted: leaf fetch timed out");
                    return;
                }
            };
            if leaves.is_empty() {
                warn!(index, "replication interrupted: primary returned no leaves");
                return;
            }
            if let Err(e) = timeout(
                self.deadline,
                self.backend.add_sequenced_leaves(&leaves, index),
            )
            .await
            .map_err(|_| LogError::Timeout)
            .and_then(|r| r)
            {
                warn!(error = %e, index, "replication interrupted: failed storing leaves");
                return;
            }
            index += leaves.len() as u64;
        }
        if index > local.tree_size {
            info!(
                from = local.tree_size,
                to = index,
                "replicated leaves from primary"
            );
        }
    }
}

#[async_trait]
impl StateSource for ReplicationState {
    async fn to_cosign_tree_head(&self) -> SignedTreeHead {
        *self.head.read().await
    }

    async fn cosigned_tree_head(&self) -> Result<CosignedTreeHead> {
        Err(LogError::NoCosignatures)
    }

    async fn add_cosignature(
        &self,
        _public_key: PublicKey32,
        _cosignature: Signature64,
    ) -> Result<()> {
        Err(LogError::Internal(
            "secondary role does not accept cosignatures".to_string(),
        ))
    }
}
