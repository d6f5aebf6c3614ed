//! Primary-role state manager.
//!
//! Owns the atomic pair of tree heads: the *to-sign* head currently out for
//! witness cosigning and the *cosigned* head assembled at the last rotation.
//! Endpoint handlers are readers; the rotation loop is the sole writer and
//! takes the write guard only for the pointer swap. Cosignatures are
//! verified under the read guard and handed to the rotation loop through a
//! bounded queue, so a signature verified against tree head *v* can only
//! ever be attached to *v*: the queue is drained under the write guard
//! before the swap, while *v* is still the published head.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::time::{timeout, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use async_trait::async_trait;

use crate::crypto::{key_hash, verify_signature, Hash, PublicKey32, Signature64, Signer};
use crate::domain::{CosignedTreeHead, SignedTreeHead, TreeHead};
use crate::infra::{LogError, Replica, Result, ShutdownSignal, TreeBackend};
use crate::metrics::{metric_names, Labels, MetricsRegistry};

use super::{StateSource, COSIGNATURE_QUEUE_BOUND};

/// A verified cosignature on its way to the rotation loop.
struct CosignatureEvent {
    key_hash: Hash,
    signature: Signature64,
}

/// The pair readers observe. Replaced atomically at rotation.
struct Heads {
    to_cosign: SignedTreeHead,
    cosigned: Option<CosignedTreeHead>,
}

/// State manager for a primary node.
pub struct PrimaryState {
    backend: Arc<dyn TreeBackend>,
    signer: Arc<dyn Signer>,
    replica: Option<Arc<dyn Replica>>,
    log_key_hash: Hash,
    log_id: String,
    interval: Duration,
    deadline: Duration,
    state_file: Option<PathBuf>,
    metrics: Arc<MetricsRegistry>,

    heads: RwLock<Heads>,
    events_tx: mpsc::Sender<CosignatureEvent>,
    events_rx: Mutex<Option<mpsc::Receiver<CosignatureEvent>>>,
}

impl PrimaryState {
    /// Set up the state manager. The initial to-sign head is the persisted
    /// one when present and verifiable, the zero head otherwise; either way
    /// it gets a fresh timestamp and signature.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        backend: Arc<dyn TreeBackend>,
        signer: Arc<dyn Signer>,
        replica: Option<Arc<dyn Replica>>,
        interval: Duration,
        deadline: Duration,
        state_file: Option<PathBuf>,
        metrics: Arc<MetricsRegistry>,
    ) -> Result<Self> {
        let public_key = signer.public_key();
        let log_key_hash = key_hash(&public_key);

        let head = match state_file
            .as_deref()
            .and_then(|path| Self::restore(path, &log_key_hash, &public_key))
        {
            Some(restored) => {
                info!(
                    tree_size = restored.tree_head.tree_size,
                    "restored persisted tree head"
                );
                restored.tree_head.refresh()
            }
            None => TreeHead::zero(),
        };
        let to_cosign = head.sign(signer.as_ref(), &log_key_hash)?;

        let (events_tx, events_rx) = mpsc::channel(COSIGNATURE_QUEUE_BOUND);
        Ok(Self {
            backend,
            signer,
            replica,
            log_key_hash,
            log_id: hex::encode(log_key_hash),
            interval,
            deadline,
            state_file,
            metrics,
            heads: RwLock::new(Heads {
                to_cosign,
                cosigned: None,
            }),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
        })
    }

    /// Attempt one rotation before serving, so the published head reflects
    /// the storage node as early as possible. A failure here is recovered at
    /// the next tick.
    pub async fn startup_rotate(&self) {
        let mut guard = self.events_rx.lock().await;
        if let Some(events) = guard.as_mut() {
            let mut pending = HashMap::new();
            self.try_rotate(&mut pending, events).await;
        }
    }

    /// Run the rotation loop until shutdown. Persists the to-sign head on
    /// exit.
    pub async fn run(self: Arc<Self>, shutdown: ShutdownSignal) {
        let mut events = match self.events_rx.lock().await.take() {
            Some(events) => events,
            None => {
                warn!("rotation loop is already running");
                return;
            }
        };
        let mut pending: HashMap<Hash, Signature64> = HashMap::new();
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // An interval's first tick completes immediately; the startup
        // rotation already covered it.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.try_rotate(&mut pending, &mut events).await;
                }
                Some(event) = events.recv() => {
                    debug!(witness = %hex::encode(event.key_hash), "handling cosignature event");
                    pending.insert(event.key_hash, event.signature);
                }
                _ = shutdown.wait() => {
                    let to_cosign = self.heads.read().await.to_cosign;
                    self.persist(&to_cosign);
                    info!("rotation loop stopped");
                    return;
                }
            }
        }
    }

    /// One rotation attempt. Any failure leaves the published pair
    /// untouched.
    async fn try_rotate(
        &self,
        pending: &mut HashMap<Hash, Signature64>,
        events: &mut mpsc::Receiver<CosignatureEvent>,
    ) {
        let proposed = match timeout(self.deadline, self.backend.get_tree_head()).await {
            Ok(Ok(head)) => head.refresh(),
            Ok(Err(e)) => {
                warn!(error = %e, "rotation skipped: failed fetching tree head");
                return;
            }
            Err(_) => {
                warn!("rotation skipped: tree head fetch timed out");
                return;
            }
        };

        let current = self.heads.read().await.to_cosign;
        let chosen = self.choose_tree(proposed, &current).await;
        let next = match chosen.sign(self.signer.as_ref(), &self.log_key_hash) {
            Ok(sth) => sth,
            Err(e) => {
                warn!(error = %e, "rotation skipped: failed signing tree head");
                return;
            }
        };
        debug!(
            wanted = proposed.tree_size,
            chose = next.tree_head.tree_size,
            "rotating tree heads"
        );

        {
            let mut heads = self.heads.write().await;

            // Everything queued was verified against the outgoing to-sign
            // head; later arrivals verify against the head published below.
            while let Ok(event) = events.try_recv() {
                pending.insert(event.key_hash, event.signature);
            }

            // A repeated head keeps its witnesses across rotations.
            if let Some(cosigned) = &heads.cosigned {
                if cosigned.signed_tree_head == heads.to_cosign {
                    debug!("to-sign tree head repeated, merging cosignatures");
                    for (witness, signature) in
                        cosigned.key_hashes.iter().zip(&cosigned.cosignatures)
                    {
                        pending.entry(*witness).or_insert(*signature);
                    }
                }
            }

            heads.cosigned = build_cosigned(&heads.to_cosign, pending);
            heads.to_cosign = next;
            pending.clear();
        }

        let labels = Labels::new().log(&self.log_id);
        self.metrics
            .set_gauge(
                metric_names::LAST_STH_TIMESTAMP,
                labels.clone(),
                next.tree_head.timestamp,
            )
            .await;
        self.metrics
            .set_gauge(metric_names::LAST_STH_SIZE, labels, next.tree_head.tree_size)
            .await;

        self.persist(&next);
    }

    /// Pick the tree to publish, taking a configured secondary into account.
    /// Never advances past what the secondary has replicated.
    async fn choose_tree(&self, proposed: TreeHead, current: &SignedTreeHead) -> TreeHead {
        let Some(replica) = &self.replica else {
            return proposed;
        };
        if !replica.is_initiated() {
            return proposed;
        }

        let secondary = match timeout(self.deadline, replica.get_to_cosign_tree_head()).await {
            Ok(Ok(sth)) => sth.tree_head,
            Ok(Err(e)) => {
                warn!(error = %e, "failed fetching tree head from secondary");
                return current.tree_head.refresh();
            }
            Err(_) => {
                warn!("secondary tree head fetch timed out");
                return current.tree_head.refresh();
            }
        };

        if secondary.tree_size > proposed.tree_size {
            error!(
                secondary = secondary.tree_size,
                proposed = proposed.tree_size,
                "secondary is ahead of us"
            );
            return current.tree_head.refresh();
        }
        if secondary.tree_size == proposed.tree_size {
            if secondary.root_hash != proposed.root_hash {
                error!(
                    tree_size = secondary.tree_size,
                    "secondary root hash does not match ours"
                );
                return current.tree_head.refresh();
            }
            return proposed;
        }
        // The secondary is behind the proposed tree. An empty secondary
        // cannot be checked for consistency; hold the line at what we
        // already signed.
        if secondary.tree_size == 0 {
            return current.tree_head.refresh();
        }
        if let Err(e) = self.verify_replication(&current.tree_head, &secondary).await {
            error!(error = %e, "secondary tree not consistent with ours");
            return current.tree_head.refresh();
        }
        if secondary.tree_size <= current.tree_head.tree_size {
            warn!(
                secondary = secondary.tree_size,
                signed = current.tree_head.tree_size,
                "secondary is behind what we already signed"
            );
            return current.tree_head.refresh();
        }

        debug!(tree_size = secondary.tree_size, "using secondary tree head");
        secondary.refresh()
    }

    /// Fetch and verify a consistency proof from our last signed size to the
    /// secondary's size.
    async fn verify_replication(&self, current: &TreeHead, secondary: &TreeHead) -> Result<()> {
        let proof = timeout(
            self.deadline,
            self.backend
                .get_consistency_proof(current.tree_size, secondary.tree_size),
        )
        .await
        .map_err(|_| LogError::Timeout)??;
        proof.verify(&current.root_hash, &secondary.root_hash)?;
        debug!(
            old_size = current.tree_size,
            new_size = secondary.tree_size,
            "consistency proof verified"
        );
        Ok(())
    }

    fn restore(path: &Path, log_key_hash: &Hash, public_key: &PublicKey32) -> Option<SignedTreeHead> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(error = %e, path = %path.display(), "failed reading persisted tree head");
                return None;
            }
        };
        let sth = match SignedTreeHead::from_binary(&bytes, log_key_hash) {
            Ok(sth) => sth,
            Err(e) => {
                warn!(error = %e, path = %path.display(), "persisted tree head is unusable");
                return None;
            }
        };
        if !sth.verify(public_key, log_key_hash) {
            warn!(path = %path.display(), "persisted tree head signature does not verify");
            return None;
        }
        Some(sth)
    }

    fn persist(&self, to_cosign: &SignedTreeHead) {
        let Some(path) = &self.state_file else {
            return;
        };
        let tmp = path.with_extension("tmp");
        let result = std::fs::write(&tmp, to_cosign.to_binary(&self.log_key_hash))
            .and_then(|_| std::fs::rename(&tmp, path));
        if let Err(e) = result {
            warn!(error = %e, path = %path.display(), "failed persisting tree head");
        }
    }
}

#[async_trait]
impl StateSource for PrimaryState {
    async fn to_cosign_tree_head(&self) -> SignedTreeHead {
        self.heads.read().await.to_cosign
    }

    async fn cosigned_tree_head(&self) -> Result<CosignedTreeHead> {
        self.heads
            .read()
            .await
            .cosigned
            .clone()
            .ok_or(LogError::NoCosignatures)
    }

    async fn add_cosignature(
        &self,
        public_key: PublicKey32,
        cosignature: Signature64,
    ) -> Result<()> {
        // Verify and enqueue under the read guard: rotation holds the write
        // guard across drain-and-swap, so this event cannot land on a later
        // head than the one it was verified against.
        let heads = self.heads.read().await;
        let message = heads.to_cosign.tree_head.to_signed_bytes(&self.log_key_hash);
        if !verify_signature(&public_key, &message, &cosignature) {
            return Err(LogError::InvalidCosignature);
        }
        let event = CosignatureEvent {
            key_hash: key_hash(&public_key),
            signature: cosignature,
        };
        self.events_tx
            .send_timeout(event, self.deadline)
            .await
            .map_err(|_| LogError::Timeout)
    }
}

/// Assemble the cosigned head from the outgoing to-sign head and the pending
/// set. Entries are ordered by witness key hash so responses are stable.
fn build_cosigned(
    to_cosign: &SignedTreeHead,
    pending: &HashMap<Hash, Signature64>,
) -> Option<CosignedTreeHead> {
    if pending.is_empty() {
        return None;
    }
    let mut entries: Vec<(Hash, Signature64)> =
        pending.iter().map(|(k, s)| (*k, *s)).collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    Some(CosignedTreeHead {
        signed_tree_head: *to_cosign,
        key_hashes: entries.iter().map(|e| e.0).collect(),
        cosignatures: entries.iter().map(|e| e.1).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{empty_tree_root, LogSigningKey};
    use crate::domain::proof::reference;
    use crate::domain::ConsistencyProof;
    use crate::infra::traits::{MockReplica, MockTreeBackend};
    use mockall::Sequence;

    struct Fixture {
        state: PrimaryState,
        log_key: LogSigningKey,
    }

    fn fixture_with(
        backend: MockTreeBackend,
        replica: Option<MockReplica>,
        state_file: Option<PathBuf>,
    ) -> Fixture {
        let log_key = LogSigningKey::generate();
        let state = PrimaryState::new(
            Arc::new(backend),
            Arc::new(log_key.clone()),
            replica.map(|r| Arc::new(r) as Arc<dyn Replica>),
            Duration::from_secs(10),
            Duration::from_millis(200),
            state_file,
            Arc::new(MetricsRegistry::new()),
        )
        .unwrap();
        Fixture { state, log_key }
    }

    fn fixture(backend: MockTreeBackend) -> Fixture {
        fixture_with(backend, None, None)
    }

    async fn rotate(state: &PrimaryState) {
        state.startup_rotate().await;
    }

    fn backend_returning(head: TreeHead) -> MockTreeBackend {
        let mut backend = MockTreeBackend::new();
        backend.expect_get_tree_head().returning(move || Ok(head));
        backend
    }

    fn head(tree_size: u64, root_hash: Hash) -> TreeHead {
        TreeHead {
            timestamp: 0,
            tree_size,
            root_hash,
        }
    }

    fn cosign(witness: &LogSigningKey, sth: &SignedTreeHead, namespace: &Hash) -> Signature64 {
        witness
            .sign(&sth.tree_head.to_signed_bytes(namespace))
            .unwrap()
    }

    #[tokio::test]
    async fn cold_start_publishes_signed_zero_head() {
        let backend = backend_returning(head(0, empty_tree_root()));
        let f = fixture(backend);
        rotate(&f.state).await;

        let sth = f.state.to_cosign_tree_head().await;
        assert_eq!(sth.tree_head.tree_size, 0);
        assert_eq!(sth.tree_head.root_hash, empty_tree_root());
        assert!(sth.verify(
            &f.log_key.public_key_bytes(),
            &key_hash(&f.log_key.public_key_bytes())
        ));
        assert!(matches!(
            f.state.cosigned_tree_head().await,
            Err(LogError::NoCosignatures)
        ));
    }

    #[tokio::test]
    async fn rotation_publishes_backend_head() {
        let root = crate::crypto::sha256(b"R");
        let f = fixture(backend_returning(head(5, root)));
        rotate(&f.state).await;

        let sth = f.state.to_cosign_tree_head().await;
        assert_eq!(sth.tree_head.tree_size, 5);
        assert_eq!(sth.tree_head.root_hash, root);
        assert!(f.state.cosigned_tree_head().await.is_err());
    }

    #[tokio::test]
    async fn backend_failure_keeps_previous_head() {
        let mut backend = MockTreeBackend::new();
        let mut seq = Sequence::new();
        let root = crate::crypto::sha256(b"R");
        backend
            .expect_get_tree_head()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move || Ok(head(5, root)));
        backend
            .expect_get_tree_head()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Err(LogError::Backend("unreachable".to_string())));

        let f = fixture(backend);
        rotate(&f.state).await;
        let before = f.state.to_cosign_tree_head().await;
        rotate(&f.state).await;
        assert_eq!(f.state.to_cosign_tree_head().await, before);
    }

    #[tokio::test]
    async fn single_witness_cosigns_and_rotation_publishes_cth() {
        let root = crate::crypto::sha256(b"R");
        let f = fixture(backend_returning(head(5, root)));
        rotate(&f.state).await;

        let witness = LogSigningKey::generate();
        let namespace = key_hash(&f.log_key.public_key_bytes());
        let published = f.state.to_cosign_tree_head().await;
        let signature = cosign(&witness, &published, &namespace);
        f.state
            .add_cosignature(witness.public_key_bytes(), signature)
            .await
            .unwrap();

        rotate(&f.state).await;

        let cth = f.state.cosigned_tree_head().await.unwrap();
        assert_eq!(cth.signed_tree_head, published);
        assert_eq!(cth.cosignatures, vec![signature]);
        assert_eq!(
            cth.key_hashes,
            vec![key_hash(&witness.public_key_bytes())]
        );
    }

    #[tokio::test]
    async fn stale_cosignature_is_rejected() {
        let mut backend = MockTreeBackend::new();
        let mut seq = Sequence::new();
        backend
            .expect_get_tree_head()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(head(5, crate::crypto::sha256(b"R5"))));
        backend
            .expect_get_tree_head()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(head(6, crate::crypto::sha256(b"R6"))));

        let f = fixture(backend);
        rotate(&f.state).await;

        let witness = LogSigningKey::generate();
        let namespace = key_hash(&f.log_key.public_key_bytes());
        let stale = f.state.to_cosign_tree_head().await;
        let signature = cosign(&witness, &stale, &namespace);

        rotate(&f.state).await;

        assert!(matches!(
            f.state
                .add_cosignature(witness.public_key_bytes(), signature)
                .await,
            Err(LogError::InvalidCosignature)
        ));
    }

    #[tokio::test]
    async fn duplicate_cosignature_leaves_single_entry() {
        let root = crate::crypto::sha256(b"R");
        let f = fixture(backend_returning(head(5, root)));
        rotate(&f.state).await;

        let witness = LogSigningKey::generate();
        let namespace = key_hash(&f.log_key.public_key_bytes());
        let published = f.state.to_cosign_tree_head().await;
        let signature = cosign(&witness, &published, &namespace);

        f.state
            .add_cosignature(witness.public_key_bytes(), signature)
            .await
            .unwrap();
        f.state
            .add_cosignature(witness.public_key_bytes(), signature)
            .await
            .unwrap();

        rotate(&f.state).await;

        let cth = f.state.cosigned_tree_head().await.unwrap();
        assert_eq!(cth.cosignatures.len(), 1);
        assert_eq!(cth.key_hashes.len(), 1);
    }

    #[tokio::test]
    async fn repeated_head_merges_cosignatures_across_rotations() {
        let root = crate::crypto::sha256(b"R");
        let f = fixture(backend_returning(head(5, root)));
        rotate(&f.state).await;

        let namespace = key_hash(&f.log_key.public_key_bytes());
        let published = f.state.to_cosign_tree_head().await;

        // First witness already made it into a cosigned head for this exact
        // to-sign head (a stalled tick republished the same bytes).
        let witness1 = LogSigningKey::generate();
        let signature1 = cosign(&witness1, &published, &namespace);
        {
            let mut pending = HashMap::new();
            pending.insert(key_hash(&witness1.public_key_bytes()), signature1);
            let mut heads = f.state.heads.write().await;
            heads.cosigned = build_cosigned(&published, &pending);
        }

        // Second witness cosigns the still-current head.
        let witness2 = LogSigningKey::generate();
        let signature2 = cosign(&witness2, &published, &namespace);
        f.state
            .add_cosignature(witness2.public_key_bytes(), signature2)
            .await
            .unwrap();

        rotate(&f.state).await;

        let cth = f.state.cosigned_tree_head().await.unwrap();
        assert_eq!(cth.signed_tree_head, published);
        assert_eq!(cth.cosignatures.len(), 2);
        let mut witnesses = cth.key_hashes.clone();
        witnesses.sort();
        let mut expected = vec![
            key_hash(&witness1.public_key_bytes()),
            key_hash(&witness2.public_key_bytes()),
        ];
        expected.sort();
        assert_eq!(witnesses, expected);
    }

    #[tokio::test]
    async fn full_queue_times_out() {
        let root = crate::crypto::sha256(b"R");
        let f = fixture(backend_returning(head(5, root)));
        rotate(&f.state).await;

        let witness = LogSigningKey::generate();
        let namespace = key_hash(&f.log_key.public_key_bytes());
        let published = f.state.to_cosign_tree_head().await;
        let signature = cosign(&witness, &published, &namespace);

        for _ in 0..COSIGNATURE_QUEUE_BOUND {
            f.state
                .add_cosignature(witness.public_key_bytes(), signature)
                .await
                .unwrap();
        }
        assert!(matches!(
            f.state
                .add_cosignature(witness.public_key_bytes(), signature)
                .await,
            Err(LogError::Timeout)
        ));
    }

    #[tokio::test]
    async fn unreachable_secondary_refreshes_current_head() {
        let mut backend = MockTreeBackend::new();
        let mut seq = Sequence::new();
        let root2 = crate::crypto::sha256(b"R2");
        backend
            .expect_get_tree_head()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move || Ok(head(2, root2)));
        backend
            .expect_get_tree_head()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(head(10, crate::crypto::sha256(b"R10"))));

        let mut replica = MockReplica::new();
        let mut rseq = Sequence::new();
        replica.expect_is_initiated().return_const(true);
        // First rotation: secondary agrees at size 2.
        replica
            .expect_get_to_cosign_tree_head()
            .times(1)
            .in_sequence(&mut rseq)
            .returning(move || {
                Ok(SignedTreeHead {
                    tree_head: head(2, root2),
                    signature: [0u8; 64],
                })
            });
        // Second rotation: secondary is down.
        replica
            .expect_get_to_cosign_tree_head()
            .times(1)
            .in_sequence(&mut rseq)
            .returning(|| Err(LogError::Backend("down".to_string())));

        let f = fixture_with(backend, Some(replica), None);
        rotate(&f.state).await;
        assert_eq!(f.state.to_cosign_tree_head().await.tree_head.tree_size, 2);

        rotate(&f.state).await;
        let sth = f.state.to_cosign_tree_head().await;
        assert_eq!(sth.tree_head.tree_size, 2);
        assert_eq!(sth.tree_head.root_hash, root2);
    }

    #[tokio::test]
    async fn secondary_behind_with_valid_proof_caps_published_size() {
        // Honest tree of 10 leaves; primary proposes 10, secondary has 4,
        // we last signed 2.
        let leaves = reference::sample_leaves(10);
        let root2 = reference::mth(&leaves[..2]);
        let root4 = reference::mth(&leaves[..4]);
        let root10 = reference::mth(&leaves);
        let proof_path = reference::consistency_path(2, &leaves[..4]);

        let mut backend = MockTreeBackend::new();
        let mut seq = Sequence::new();
        backend
            .expect_get_tree_head()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move || Ok(head(2, root2)));
        backend
            .expect_get_tree_head()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move || Ok(head(10, root10)));
        backend
            .expect_get_consistency_proof()
            .withf(|old, new| *old == 2 && *new == 4)
            .returning(move |old_size, new_size| {
                Ok(ConsistencyProof {
                    old_size,
                    new_size,
                    path: proof_path.clone(),
                })
            });

        let mut replica = MockReplica::new();
        let mut rseq = Sequence::new();
        replica.expect_is_initiated().return_const(true);
        replica
            .expect_get_to_cosign_tree_head()
            .times(1)
            .in_sequence(&mut rseq)
            .returning(move || {
                Ok(SignedTreeHead {
                    tree_head: head(2, root2),
                    signature: [0u8; 64],
                })
            });
        replica
            .expect_get_to_cosign_tree_head()
            .times(1)
            .in_sequence(&mut rseq)
            .returning(move || {
                Ok(SignedTreeHead {
                    tree_head: head(4, root4),
                    signature: [0u8; 64],
                })
            });

        let f = fixture_with(backend, Some(replica), None);
        rotate(&f.state).await;
        assert_eq!(f.state.to_cosign_tree_head().await.tree_head.tree_size, 2);

        rotate(&f.state).await;
        let sth = f.state.to_cosign_tree_head().await;
        assert_eq!(sth.tree_head.tree_size, 4);
        assert_eq!(sth.tree_head.root_hash, root4);
    }

    #[tokio::test]
    async fn diverging_secondary_refreshes_current_head() {
        let leaves = reference::sample_leaves(10);
        let root2 = reference::mth(&leaves[..2]);
        let root10 = reference::mth(&leaves);

        let mut backend = MockTreeBackend::new();
        let mut seq = Sequence::new();
        backend
            .expect_get_tree_head()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move || Ok(head(2, root2)));
        backend
            .expect_get_tree_head()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move || Ok(head(10, root10)));
        backend
            .expect_get_consistency_proof()
            .returning(|old_size, new_size| {
                Ok(ConsistencyProof {
                    old_size,
                    new_size,
                    path: vec![[0u8; 32]],
                })
            });

        let mut replica = MockReplica::new();
        let mut rseq = Sequence::new();
        replica.expect_is_initiated().return_const(true);
        replica
            .expect_get_to_cosign_tree_head()
            .times(1)
            .in_sequence(&mut rseq)
            .returning(move || {
                Ok(SignedTreeHead {
                    tree_head: head(2, root2),
                    signature: [0u8; 64],
                })
            });
        // A forked secondary at size 4.
        replica
            .expect_get_to_cosign_tree_head()
            .times(1)
            .in_sequence(&mut rseq)
            .returning(|| {
                Ok(SignedTreeHead {
                    tree_head: head(4, crate::crypto::sha256(b"forked")),
                    signature: [0u8; 64],
                })
            });

        let f = fixture_with(backend, Some(replica), None);
        rotate(&f.state).await;
        rotate(&f.state).await;

        let sth = f.state.to_cosign_tree_head().await;
        assert_eq!(sth.tree_head.tree_size, 2);
        assert_eq!(sth.tree_head.root_hash, root2);
    }

    #[tokio::test]
    async fn persisted_head_is_restored_on_boot() {
        let state_file = std::env::temp_dir().join(format!(
            "lantern-state-{}-{:?}",
            std::process::id(),
            std::thread::current().id()
        ));
        std::fs::remove_file(&state_file).ok();

        let root = crate::crypto::sha256(b"R");
        let log_key = LogSigningKey::generate();

        {
            let state = PrimaryState::new(
                Arc::new(backend_returning(head(7, root))),
                Arc::new(log_key.clone()),
                None,
                Duration::from_secs(10),
                Duration::from_millis(200),
                Some(state_file.clone()),
                Arc::new(MetricsRegistry::new()),
            )
            .unwrap();
            state.startup_rotate().await;
            assert_eq!(state.to_cosign_tree_head().await.tree_head.tree_size, 7);
        }

        // A fresh instance with an unreachable backend starts from the
        // persisted head.
        let mut backend = MockTreeBackend::new();
        backend
            .expect_get_tree_head()
            .returning(|| Err(LogError::Backend("down".to_string())));
        let state = PrimaryState::new(
            Arc::new(backend),
            Arc::new(log_key.clone()),
            None,
            Duration::from_secs(10),
            Duration::from_millis(200),
            Some(state_file.clone()),
            Arc::new(MetricsRegistry::new()),
        )
        .unwrap();
        state.startup_rotate().await;

        let sth = state.to_cosign_tree_head().await;
        assert_eq!(sth.tree_head.tree_size, 7);
        assert_eq!(sth.tree_head.root_hash, root);

        std::fs::remove_file(&state_file).ok();
    }

    #[tokio::test]
    async fn corrupt_state_file_falls_back_to_zero_head() {
        let state_file = std::env::temp_dir().join(format!(
            "lantern-corrupt-{}-{:?}",
            std::process::id(),
            std::thread::current().id()
        ));
        std::fs::write(&state_file, b"not a tree head").unwrap();

        let f = fixture_with(MockTreeBackend::new(), None, Some(state_file.clone()));
        let sth = f.state.to_cosign_tree_head().await;
        assert_eq!(sth.tree_head.tree_size, 0);
        assert_eq!(sth.tree_head.root_hash, empty_tree_root());

        std::fs::remove_file(&state_file).ok();
    }
}
