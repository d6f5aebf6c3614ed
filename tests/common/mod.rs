//! Shared test support: an RFC 6962 reference tree builder.
//!
//! The log front-end only verifies Merkle proofs; these helpers construct
//! trees and proofs the way the storage node would, so verification can be
//! exercised against honest and dishonest histories.

use lantern_log::crypto::Hash;
use lantern_log::domain::proof::{leaf_hash, node_hash};

/// Merkle tree head over `leaves`, per RFC 6962.
pub fn mth(leaves: &[Vec<u8>]) -> Hash {
    match leaves.len() {
        0 => lantern_log::crypto::empty_tree_root(),
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

/// Inclusion audit path for leaf `m`.
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
        return if complete { Vec::new() } else { vec![mth(leaves)] };
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

/// Consistency proof from the tree of `m` leaves to the full tree.
pub fn consistency_path(m: usize, leaves: &[Vec<u8>]) -> Vec<Hash> {
    subproof(m, leaves, true)
}
