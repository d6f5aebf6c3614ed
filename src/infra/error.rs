//! Error type for the log front-end.

use thiserror::Error;

use crate::ascii::AsciiError;
use crate::crypto::SigningError;
use crate::domain::{CodecError, ProofError};

/// Errors that can occur in the log front-end.
#[derive(Error, Debug)]
pub enum LogError {
    /// Malformed ASCII request or response body.
    #[error("ascii: {0}")]
    Ascii(#[from] AsciiError),

    /// Malformed binary encoding.
    #[error("codec: {0}")]
    Codec(#[from] CodecError),

    /// Signing key failure.
    #[error("signing: {0}")]
    Signing(#[from] SigningError),

    /// Merkle proof did not verify.
    #[error("proof: {0}")]
    Proof(#[from] ProofError),

    /// A cosignature did not verify against the published tree head.
    #[error("invalid cosignature")]
    InvalidCosignature,

    /// The operation did not complete within the request deadline.
    #[error("request timeout")]
    Timeout,

    /// No witness cosignatures have been collected for any tree head.
    #[error("no cosignatures available")]
    NoCosignatures,

    /// The requested leaf hash is not included in the given tree.
    #[error("leaf hash not included in tree")]
    NotIncluded,

    /// The storage node failed or returned an unusable answer.
    #[error("backend: {0}")]
    Backend(String),

    /// Outbound HTTP transport failure.
    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),

    /// Invalid configuration.
    #[error("configuration: {0}")]
    Config(String),

    /// Filesystem failure (key material, persisted state).
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error.
    #[error("internal: {0}")]
    Internal(String),
}

/// Result type for log front-end operations.
pub type Result<T> = std::result::Result<T, LogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let err = LogError::Backend("connection refused".to_string());
        assert!(err.to_string().contains("backend"));
        assert!(err.to_string().contains("connection refused"));

        assert_eq!(LogError::Timeout.to_string(), "request timeout");
        assert_eq!(
            LogError::NoCosignatures.to_string(),
            "no cosignatures available"
        );
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<LogError>();
    }
}
