//! Ed25519 signing and verification.
//!
//! The log signs tree heads, submitters sign statements, and witnesses
//! cosign published tree heads. All three use plain Ed25519 over the binary
//! encodings in [`crate::domain`].

use ed25519_dalek::{
    Signature, Signer as DalekSigner, SigningKey, Verifier, VerifyingKey, PUBLIC_KEY_LENGTH,
    SECRET_KEY_LENGTH, SIGNATURE_LENGTH,
};
use rand::rngs::OsRng;

use crate::crypto::hash::key_hash;

/// Number of bytes in an Ed25519 signature.
pub const SIGNATURE_SIZE: usize = SIGNATURE_LENGTH;

/// Ed25519 signature (64 bytes).
pub type Signature64 = [u8; SIGNATURE_LENGTH];

/// Ed25519 public key (32 bytes).
pub type PublicKey32 = [u8; PUBLIC_KEY_LENGTH];

/// Ed25519 secret key seed (32 bytes).
pub type SecretKey32 = [u8; SECRET_KEY_LENGTH];

/// Error type for signing operations.
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    #[error("invalid secret key format")]
    InvalidSecretKeyFormat,

    #[error("invalid public key format")]
    InvalidPublicKeyFormat,

    #[error("signing failed: {0}")]
    SigningFailed(String),
}

/// Access to the log's private key.
///
/// The key may live in process memory or behind a custodian; the state
/// manager only depends on this interface and treats a signing failure as a
/// skipped rotation tick.
pub trait Signer: Send + Sync {
    /// Public key matching the signatures this signer produces.
    fn public_key(&self) -> PublicKey32;

    /// Sign an arbitrary message.
    fn sign(&self, message: &[u8]) -> Result<Signature64, SigningError>;
}

/// In-process Ed25519 signing key.
#[derive(Clone)]
pub struct LogSigningKey {
    signing_key: SigningKey,
}

impl LogSigningKey {
    /// Generate a new random signing key.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self { signing_key }
    }

    /// Create from secret key seed bytes.
    pub fn from_bytes(bytes: &SecretKey32) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(bytes),
        }
    }

    /// Create from a hex-encoded 32-byte seed.
    pub fn from_hex(hex_str: &str) -> Result<Self, SigningError> {
        let bytes = hex::decode(hex_str.trim()).map_err(|_| SigningError::InvalidSecretKeyFormat)?;
        let seed: SecretKey32 = bytes
            .try_into()
            .map_err(|_| SigningError::InvalidSecretKeyFormat)?;
        Ok(Self::from_bytes(&seed))
    }

    /// Secret key seed bytes.
    pub fn to_bytes(&self) -> SecretKey32 {
        self.signing_key.to_bytes()
    }

    /// Public key bytes.
    pub fn public_key_bytes(&self) -> PublicKey32 {
        self.signing_key.verifying_key().to_bytes()
    }
}

impl Signer for LogSigningKey {
    fn public_key(&self) -> PublicKey32 {
        self.public_key_bytes()
    }

    fn sign(&self, message: &[u8]) -> Result<Signature64, SigningError> {
        Ok(self.signing_key.sign(message).to_bytes())
    }
}

impl std::fmt::Debug for LogSigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogSigningKey")
            .field("key_hash", &hex::encode(key_hash(&self.public_key_bytes())))
            .finish_non_exhaustive()
    }
}

/// Verify an Ed25519 signature given raw key and signature bytes.
///
/// A malformed public key counts as a failed verification.
pub fn verify_signature(
    public_key: &PublicKey32,
    message: &[u8],
    signature: &Signature64,
) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_bytes(public_key) else {
        return false;
    };
    verifying_key
        .verify(message, &Signature::from_bytes(signature))
        .is_ok()
}
