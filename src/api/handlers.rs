//! Endpoint handler implementations.
//!
//! Each handler parses its ASCII body, validates, calls the backend or state
//! manager, and serializes the ASCII response. Validation failures answer
//! 400 without touching the backend.

use std::future::Future;
use std::pin::Pin;

use axum::body::Bytes;

use crate::crypto::key_hash;
use crate::domain::{
    unix_now, AddCosignatureRequest, AddLeafRequest, ConsistencyProofRequest,
    InclusionProofRequest, Leaf, LeavesRequest, Statement,
};
use super::error::ApiError;
use super::AppState;

/// A handler's future: the ASCII response body on success.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<String, ApiError>> + Send>>;

/// Plain-function handler signature, dispatched by the router.
pub type HandlerFn = fn(AppState, Bytes) -> HandlerFuture;

pub(super) fn add_leaf(state: AppState, body: Bytes) -> HandlerFuture {
    Box::pin(async move {
        let request = AddLeafRequest::from_ascii(&body)?;

        let now = unix_now();
        if request.shard_hint < state.config.shard_start || request.shard_hint > now {
            return Err(ApiError::bad_request(format!(
                "shard hint {} outside [{}, {}]",
                request.shard_hint, state.config.shard_start, now
            )));
        }

        let statement = Statement::from_preimage(request.shard_hint, &request.preimage);
        if !statement.verify(&request.verification_key, &request.signature) {
            return Err(ApiError::bad_request("invalid submitter signature"));
        }

        state
            .dns
            .verify(&request.domain_hint, &request.verification_key)
            .await
            .map_err(|e| ApiError::bad_request(format!("domain hint: {e}")))?;

        let leaf = Leaf::new(
            statement,
            request.signature,
            key_hash(&request.verification_key),
        );
        state.backend.add_leaf(&leaf).await?;
        Ok(String::new())
    })
}

pub(super) fn add_cosignature(state: AppState, body: Bytes) -> HandlerFuture {
    Box::pin(async move {
        let request = AddCosignatureRequest::from_ascii(&body)?;

        let Some(public_key) = state.config.witness_key(&request.key_hash) else {
            return Err(ApiError::bad_request(format!(
                "unknown witness: {}",
                hex::encode(request.key_hash)
            )));
        };

        state
            .state
            .add_cosignature(*public_key, request.cosignature)
            .await
            .map_err(|e| ApiError::bad_request(e.to_string()))?;
        Ok(String::new())
    })
}

pub(super) fn get_tree_head_to_sign(state: AppState, _body: Bytes) -> HandlerFuture {
    Box::pin(async move { Ok(state.state.to_cosign_tree_head().await.to_ascii()) })
}

pub(super) fn get_tree_head_cosigned(state: AppState, _body: Bytes) -> HandlerFuture {
    Box::pin(async move {
        let cosigned = state.state.cosigned_tree_head().await?;
        Ok(cosigned.to_ascii())
    })
}

pub(super) fn get_tree_head_latest(state: AppState, _body: Bytes) -> HandlerFuture {
    Box::pin(async move {
        let to_cosign = state.state.to_cosign_tree_head().await;
        // The to-sign head is never older than the cosigned one; compare
        // anyway and let ties go to the to-sign head.
        match state.state.cosigned_tree_head().await {
            Ok(cosigned)
                if cosigned.signed_tree_head.tree_head.timestamp
                    > to_cosign.tree_head.timestamp =>
            {
                Ok(cosigned.signed_tree_head.to_ascii())
            }
            _ => Ok(to_cosign.to_ascii()),
        }
    })
}

pub(super) fn get_consistency_proof(state: AppState, body: Bytes) -> HandlerFuture {
    Box::pin(async move {
        let request = ConsistencyProofRequest::from_ascii(&body)?;
        if request.old_size == 0 {
            return Err(ApiError::bad_request("old_size must be larger than zero"));
        }
        if request.old_size >= request.new_size {
            return Err(ApiError::bad_request(
                "new_size must be larger than old_size",
            ));
        }
        let current = state.state.to_cosign_tree_head().await.tree_head.tree_size;
        if request.new_size > current {
            return Err(ApiError::bad_request(format!(
                "new_size {} is past the current tree size {}",
                request.new_size, current
            )));
        }

        let proof = state
            .backend
            .get_consistency_proof(request.old_size, request.new_size)
            .await?;
        Ok(proof.to_ascii())
    })
}

pub(super) fn get_proof_by_hash(state: AppState, body: Bytes) -> HandlerFuture {
    Box::pin(async move {
        let request = InclusionProofRequest::from_ascii(&body)?;
        if request.tree_size < 2 {
            return Err(ApiError::bad_request(
                "tree_size must be larger than one",
            ));
        }

        let proof = state
            .backend
            .get_inclusion_proof(&request.leaf_hash, request.tree_size)
            .await?;
        Ok(proof.to_ascii())
    })
}

pub(super) fn get_leaves(state: AppState, body: Bytes) -> HandlerFuture {
    Box::pin(async move {
        let request = LeavesRequest::from_ascii(&body)?;
        if request.start_size > request.end_size {
            return Err(ApiError::bad_request(
                "start_size must not be larger than end_size",
            ));
        }
        // Prune the range so a response never exceeds max_range leaves.
        let end_size = request
            .end_size
            .min(request.start_size.saturating_add(state.config.max_range - 1));

        let leaves = state.backend.get_leaves(request.start_size, end_size).await?;
        Ok(Leaf::list_to_ascii(&leaves))
    })
}
