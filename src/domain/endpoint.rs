//! Public endpoint names and their URL paths.

/// The log's public endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    AddLeaf,
    AddCosignature,
    GetTreeHeadToSign,
    GetTreeHeadCosigned,
    GetTreeHeadLatest,
    GetConsistencyProof,
    GetProofByHash,
    GetLeaves,
}

impl Endpoint {
    /// Wire name of the endpoint.
    pub fn name(&self) -> &'static str {
        match self {
            Endpoint::AddLeaf => "add-leaf",
            Endpoint::AddCosignature => "add-cosignature",
            Endpoint::GetTreeHeadToSign => "get-tree-head-to-sign",
            Endpoint::GetTreeHeadCosigned => "get-tree-head-cosigned",
            Endpoint::GetTreeHeadLatest => "get-tree-head-latest",
            Endpoint::GetConsistencyProof => "get-consistency-proof",
            Endpoint::GetProofByHash => "get-proof-by-hash",
            Endpoint::GetLeaves => "get-leaves",
        }
    }

    /// URL path under an optional prefix: `/{prefix?}/sigsum/v0/{name}`.
    pub fn path(&self, prefix: &str) -> String {
        if prefix.is_empty() {
            format!("/sigsum/v0/{}", self.name())
        } else {
            format!("/{}/sigsum/v0/{}", prefix, self.name())
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
