//! Lantern Log
//!
//! Front-end of a witness-cosigned transparency log: accepts signed leaf
//! submissions, publishes a signed tree head on a fixed interval, collects
//! witness cosignatures over it, and serves inclusion/consistency proofs
//! from the Merkle storage node behind it.
//!
//! ## Modules
//!
//! - [`domain`] - statements, leaves, tree heads, proofs, and their codecs
//! - [`ascii`] - the `key=value` request/response framing
//! - [`crypto`] - SHA-256 and Ed25519 primitives
//! - [`state`] - tree-head rotation, cosignature intake, replication
//! - [`api`] - HTTP endpoint dispatcher
//! - [`infra`] - external-seam traits and their HTTP clients
//! - [`dns`] - domain-hint verification
//! - [`config`] - log parameters and identity
//! - [`metrics`] - labeled metrics with Prometheus export
//! - [`server`] - process bootstrap for the primary and secondary roles

pub mod api;
pub mod ascii;
pub mod config;
pub mod crypto;
pub mod dns;
pub mod domain;
pub mod infra;
pub mod metrics;
pub mod server;
pub mod state;

pub use config::Config;
pub use infra::{LogError, Result};
