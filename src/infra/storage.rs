//! HTTP client for the Merkle storage node.
//!
//! The storage node sequences leaves and computes proofs; the front-end
//! talks to it over a small internal HTTP API that reuses the public ASCII
//! framing. Paths are `/{base}/storage/v0/{tree_id}/{operation}`.
//!
//! The `add-leaf` response carries one `status=` line whose value is
//! `queued`, `duplicate`, or `sequenced`; `get-proof-by-hash` answers 404
//! when the leaf hash is not included in the requested tree.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client as HttpClient, StatusCode};

use crate::ascii::{self, Document};
use crate::crypto::Hash;
use crate::domain::{
    ConsistencyProof, InclusionProof, Leaf, LeavesRequest, TreeHead,
};
use crate::domain::requests::{ConsistencyProofRequest, InclusionProofRequest};

use super::traits::{AddLeafOutcome, TreeBackend};
use super::{LogError, Result};

/// HTTP realization of [`TreeBackend`].
pub struct StorageClient {
    http: HttpClient,
    base_url: String,
    tree_id: i64,
}

impl StorageClient {
    /// Create a client for the storage node at `base_url`, scoped to one
    /// Merkle tree. The transport timeout is a backstop; every call is also
    /// bounded by the caller's request deadline.
    pub fn new(base_url: &str, tree_id: i64, timeout: Duration) -> Result<Self> {
        let http = HttpClient::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            tree_id,
        })
    }

    fn url(&self, operation: &str) -> String {
        format!("{}/storage/v0/{}/{}", self.base_url, self.tree_id, operation)
    }

    async fn post(&self, operation: &str, body: String) -> Result<(StatusCode, Vec<u8>)> {
        let response = self.http.post(self.url(operation)).body(body).send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        Ok((status, bytes.to_vec()))
    }

    fn backend_error(operation: &str, status: StatusCode) -> LogError {
        LogError::Backend(format!("{operation}: storage node answered {status}"))
    }
}

#[async_trait]
impl TreeBackend for StorageClient {
    async fn add_leaf(&self, leaf: &Leaf) -> Result<AddLeafOutcome> {
        let body = Leaf::list_to_ascii(std::slice::from_ref(leaf));
        let (status, bytes) = self.post("add-leaf", body).await?;
        if !status.is_success() {
            return Err(Self::backend_error("add-leaf", status));
        }

        let mut fields = Document::parse(&bytes)
            .map_err(|e| LogError::Backend(format!("add-leaf: {e}")))?
            .into_fields();
        let value = fields
            .take("status")
            .map_err(|e| LogError::Backend(format!("add-leaf: {e}")))?;
        match value.as_str() {
            "queued" => Ok(AddLeafOutcome::Queued),
            "duplicate" => Ok(AddLeafOutcome::AlreadyExists),
            "sequenced" => Ok(AddLeafOutcome::IsSequenced),
            other => Err(LogError::Backend(format!(
                "add-leaf: unknown status {other:?}"
            ))),
        }
    }

    async fn add_sequenced_leaves(&self, leaves: &[Leaf], start_index: u64) -> Result<()> {
        let mut body = String::new();
        ascii::write_int(&mut body, "start_index", start_index);
        for leaf in leaves {
            leaf.to_ascii(&mut body);
        }
        let (status, _) = self.post("add-sequenced-leaves", body).await?;
        if !status.is_success() {
            return Err(Self::backend_error("add-sequenced-leaves", status));
        }
        Ok(())
    }

    async fn get_tree_head(&self) -> Result<TreeHead> {
        let response = self.http.get(self.url("get-tree-head")).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Self::backend_error("get-tree-head", status));
        }
        let bytes = response.bytes().await?;
        TreeHead::from_ascii(&bytes).map_err(|e| LogError::Backend(format!("get-tree-head: {e}")))
    }

    async fn get_consistency_proof(
        &self,
        old_size: u64,
        new_size: u64,
    ) -> Result<ConsistencyProof> {
        let request = ConsistencyProofRequest { old_size, new_size };
        let (status, bytes) = self
            .post("get-consistency-proof", request.to_ascii())
            .await?;
        if !status.is_success() {
            return Err(Self::backend_error("get-consistency-proof", status));
        }
        ConsistencyProof::from_ascii(&bytes, old_size, new_size)
            .map_err(|e| LogError::Backend(format!("get-consistency-proof: {e}")))
    }

    async fn get_inclusion_proof(
        &self,
        leaf_hash: &Hash,
        tree_size: u64,
    ) -> Result<InclusionProof> {
        let request = InclusionProofRequest {
            leaf_hash: *leaf_hash,
            tree_size,
        };
        let (status, bytes) = self.post("get-proof-by-hash", request.to_ascii()).await?;
        if status == StatusCode::NOT_FOUND {
            return Err(LogError::NotIncluded);
        }
        if !status.is_success() {
            return Err(Self::backend_error("get-proof-by-hash", status));
        }
        InclusionProof::from_ascii(&bytes, tree_size)
            .map_err(|e| LogError::Backend(format!("get-proof-by-hash: {e}")))
    }

    async fn get_leaves(&self, start_size: u64, end_size: u64) -> Result<Vec<Leaf>> {
        let request = LeavesRequest {
            start_size,
            end_size,
        };
        let (status, bytes) = self.post("get-leaves", request.to_ascii()).await?;
        if !status.is_success() {
            return Err(Self::backend_error("get-leaves", status));
        }
        let doc = Document::parse(&bytes)
            .map_err(|e| LogError::Backend(format!("get-leaves: {e}")))?;
        Leaf::list_from_ascii(&doc).map_err(|e| LogError::Backend(format!("get-leaves: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::{get, post};
    use axum::Router;
    use std::net::SocketAddr;

    async fn serve(router: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    fn client(addr: SocketAddr) -> StorageClient {
        StorageClient::new(&format!("http://{addr}"), 7, Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn get_tree_head_parses_ascii_answer() {
        let head = TreeHead {
            timestamp: 11,
            tree_size: 5,
            root_hash: [9u8; 32],
        };
        let body = head.to_ascii();
        let router = Router::new().route(
            "/storage/v0/7/get-tree-head",
            get(move || async move { body.clone() }),
        );
        let addr = serve(router).await;

        assert_eq!(client(addr).get_tree_head().await.unwrap(), head);
    }

    #[tokio::test]
    async fn get_tree_head_rejects_short_root_hash() {
        let router = Router::new().route(
            "/storage/v0/7/get-tree-head",
            get(|| async { "timestamp=1\ntree_size=1\nroot_hash=11\n" }),
        );
        let addr = serve(router).await;

        assert!(matches!(
            client(addr).get_tree_head().await,
            Err(LogError::Backend(_))
        ));
    }

    #[tokio::test]
    async fn add_leaf_maps_status_line() {
        let router = Router::new().route(
            "/storage/v0/7/add-leaf",
            post(|| async { "status=duplicate\n" }),
        );
        let addr = serve(router).await;

        let leaf = Leaf::new(
            crate::domain::Statement::from_preimage(1, b"p"),
            [0u8; 64],
            [0u8; 32],
        );
        assert_eq!(
            client(addr).add_leaf(&leaf).await.unwrap(),
            AddLeafOutcome::AlreadyExists
        );
    }

    #[tokio::test]
    async fn inclusion_proof_not_found_maps_to_not_included() {
        let router = Router::new().route(
            "/storage/v0/7/get-proof-by-hash",
            post(|| async { (StatusCode::NOT_FOUND, "error=not included\n") }),
        );
        let addr = serve(router).await;

        assert!(matches!(
            client(addr).get_inclusion_proof(&[0u8; 32], 2).await,
            Err(LogError::NotIncluded)
        ));
    }

    #[tokio::test]
    async fn backend_failure_surfaces_status() {
        let router = Router::new().route(
            "/storage/v0/7/get-leaves",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "error=boom\n") }),
        );
        let addr = serve(router).await;

        match client(addr).get_leaves(0, 1).await {
            Err(LogError::Backend(message)) => assert!(message.contains("500")),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
