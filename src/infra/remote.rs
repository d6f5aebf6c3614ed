//! HTTP client for another log node.
//!
//! The primary uses this to poll its secondary's to-sign tree head before
//! rotating; the secondary uses it to pull sequenced leaves from the
//! primary. Either way the remote node's published head is authenticated
//! under its configured public key before anything trusts it.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;

use crate::ascii::Document;
use crate::crypto::{key_hash, Hash, PublicKey32};
use crate::domain::{Endpoint, Leaf, LeavesRequest, SignedTreeHead};

use super::traits::{PrimaryLog, Replica};
use super::{LogError, Result};

/// HTTP client for a remote log node, realizing both [`Replica`] and
/// [`PrimaryLog`].
pub struct RemoteLog {
    http: HttpClient,
    base_url: String,
    prefix: String,
    public_key: PublicKey32,
    remote_key_hash: Hash,
}

impl RemoteLog {
    /// Client for the node at `base_url` serving under `prefix`, whose tree
    /// heads are signed by `public_key`.
    pub fn new(
        base_url: &str,
        prefix: &str,
        public_key: PublicKey32,
        timeout: Duration,
    ) -> Result<Self> {
        let http = HttpClient::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            prefix: prefix.to_string(),
            public_key,
            remote_key_hash: key_hash(&public_key),
        })
    }

    fn url(&self, endpoint: Endpoint) -> String {
        format!("{}{}", self.base_url, endpoint.path(&self.prefix))
    }

    async fn fetch_tree_head(&self) -> Result<SignedTreeHead> {
        let response = self
            .http
            .get(self.url(Endpoint::GetTreeHeadToSign))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LogError::Backend(format!(
                "get-tree-head-to-sign: remote answered {status}"
            )));
        }
        let bytes = response.bytes().await?;
        let sth = SignedTreeHead::from_ascii(&bytes)
            .map_err(|e| LogError::Backend(format!("get-tree-head-to-sign: {e}")))?;
        if !sth.verify(&self.public_key, &self.remote_key_hash) {
            return Err(LogError::Backend(
                "get-tree-head-to-sign: tree head signature does not verify".to_string(),
            ));
        }
        Ok(sth)
    }
}

#[async_trait]
impl Replica for RemoteLog {
    fn is_initiated(&self) -> bool {
        true
    }

    async fn get_to_cosign_tree_head(&self) -> Result<SignedTreeHead> {
        self.fetch_tree_head().await
    }
}

#[async_trait]
impl PrimaryLog for RemoteLog {
    async fn to_cosign_tree_head(&self) -> Result<SignedTreeHead> {
        self.fetch_tree_head().await
    }

    async fn get_leaves(&self, start_size: u64, end_size: u64) -> Result<Vec<Leaf>> {
        let request = LeavesRequest {
            start_size,
            end_size,
        };
        let response = self
            .http
            .post(self.url(Endpoint::GetLeaves))
            .body(request.to_ascii())
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LogError::Backend(format!(
                "get-leaves: remote answered {status}"
            )));
        }
        let bytes = response.bytes().await?;
        let doc = Document::parse(&bytes)
            .map_err(|e| LogError::Backend(format!("get-leaves: {e}")))?;
        Leaf::list_from_ascii(&doc).map_err(|e| LogError::Backend(format!("get-leaves: {e}")))
    }
}
