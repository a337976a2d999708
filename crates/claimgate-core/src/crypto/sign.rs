//! Ed25519 signing and verification.

use ed25519_dalek::{Signer as _, SigningKey};
use rand::rngs::OsRng;
use thiserror::Error;

pub use ed25519_dalek::{Signature, VerifyingKey};

/// Size of an Ed25519 public key in bytes.
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Size of an Ed25519 signature in bytes.
pub const SIGNATURE_SIZE: usize = 64;

/// Errors from signing-related operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SignerError {
    /// The public key bytes could not be parsed.
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    /// The signature bytes have the wrong length.
    #[error("invalid signature encoding: got {got} bytes, expected {expected}")]
    InvalidSignatureLength {
        /// The length that was provided.
        got: usize,
        /// The length that was required.
        expected: usize,
    },

    /// The signature did not verify against the message and key.
    #[error("signature verification failed")]
    VerificationFailed,
}

/// An Ed25519 signing keypair.
///
/// Held by voucher authors (issuers), never by the engine itself — the
/// engine only verifies.
pub struct Signer {
    signing_key: SigningKey,
}

impl Signer {
    /// Generates a fresh keypair from the OS entropy source.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Constructs a signer from a 32-byte seed.
    ///
    /// Useful for deterministic fixtures; production keys should use
    /// [`Signer::generate`].
    #[must_use]
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Signs a message, returning the detached signature.
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }

    /// Returns the verifying (public) key for this signer.
    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Returns the raw public key bytes.
    #[must_use]
    pub fn public_key_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.signing_key.verifying_key().to_bytes()
    }
}

/// Parses a verifying key from raw bytes.
///
/// # Errors
///
/// Returns `InvalidPublicKey` if the bytes are the wrong length or do not
/// encode a valid curve point.
pub fn parse_verifying_key(bytes: &[u8]) -> Result<VerifyingKey, SignerError> {
    let arr: [u8; PUBLIC_KEY_SIZE] = bytes
        .try_into()
        .map_err(|_| SignerError::InvalidPublicKey(format!("got {} bytes", bytes.len())))?;
    VerifyingKey::from_bytes(&arr).map_err(|e| SignerError::InvalidPublicKey(e.to_string()))
}

/// Parses a detached signature from raw bytes.
///
/// # Errors
///
/// Returns `InvalidSignatureLength` if the input is not exactly
/// [`SIGNATURE_SIZE`] bytes.
pub fn parse_signature(bytes: &[u8]) -> Result<Signature, SignerError> {
    let arr: [u8; SIGNATURE_SIZE] =
        bytes
            .try_into()
            .map_err(|_| SignerError::InvalidSignatureLength {
                got: bytes.len(),
                expected: SIGNATURE_SIZE,
            })?;
    Ok(Signature::from_bytes(&arr))
}

/// Verifies a signature over a message.
///
/// Uses strict verification, which accepts a single canonical signature
/// form per message/key pair and rejects malleable encodings.
///
/// # Errors
///
/// Returns `VerificationFailed` if the signature is invalid.
pub fn verify_signature(
    key: &VerifyingKey,
    message: &[u8],
    signature: &Signature,
) -> Result<(), SignerError> {
    key.verify_strict(message, signature)
        .map_err(|_| SignerError::VerificationFailed)
}
