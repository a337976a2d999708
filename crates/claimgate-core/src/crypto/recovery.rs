//! Signer recovery over signature bundles.
//!
//! A signature bundle is `verifying_key (32 bytes) || signature (64 bytes)`.
//! Recovery verifies the signature over the exact message presented and only
//! then derives the signer identity from the embedded key. Verification is
//! keyed to the message: a bundle produced over a different message fails
//! outright rather than recovering some other identity.

use super::sign::{
    PUBLIC_KEY_SIZE, SIGNATURE_SIZE, SignerError, parse_signature, parse_verifying_key,
    verify_signature,
};
use crate::identity::IdentityId;

/// Total size of a signature bundle: public key followed by signature.
pub const SIGNATURE_BUNDLE_SIZE: usize = PUBLIC_KEY_SIZE + SIGNATURE_SIZE;

/// Recovers the identity that signed a message.
///
/// This is the narrow seam between the claim engine and the signature
/// scheme; tests substitute a deterministic implementation without real
/// key material.
pub trait SignerRecovery: Send + Sync {
    /// Recovers the signer of `message` from `signature_bundle`.
    ///
    /// # Errors
    ///
    /// Fails if the bundle is malformed or the signature does not verify
    /// over this exact message.
    fn recover(&self, message: &[u8], signature_bundle: &[u8])
    -> Result<IdentityId, SignerError>;
}

/// Production recovery backed by Ed25519 strict verification.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Recovery;

impl SignerRecovery for Ed25519Recovery {
    fn recover(
        &self,
        message: &[u8],
        signature_bundle: &[u8],
    ) -> Result<IdentityId, SignerError> {
        if signature_bundle.len() != SIGNATURE_BUNDLE_SIZE {
            return Err(SignerError::InvalidSignatureLength {
                got: signature_bundle.len(),
                expected: SIGNATURE_BUNDLE_SIZE,
            });
        }

        let (key_bytes, sig_bytes) = signature_bundle.split_at(PUBLIC_KEY_SIZE);
        let verifying_key = parse_verifying_key(key_bytes)?;
        let signature = parse_signature(sig_bytes)?;

        // The embedded key only counts if the signature over this exact
        // message verifies against it.
        verify_signature(&verifying_key, message, &signature)?;

        Ok(IdentityId::from_verifying_key(&verifying_key))
    }
}

/// Produces the signature bundle a voucher author attaches to a claim.
///
/// Counterpart of [`Ed25519Recovery`]: `recover(message, bundle)` returns
/// the signer's identity.
#[must_use]
pub fn signature_bundle(signer: &super::sign::Signer, message: &[u8]) -> Vec<u8> {
    let mut bundle = Vec::with_capacity(SIGNATURE_BUNDLE_SIZE);
    bundle.extend_from_slice(&signer.public_key_bytes());
    bundle.extend_from_slice(&signer.sign(message).to_bytes());
    bundle
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Signer;

    #[test]
    fn recover_returns_signer_identity() {
        let signer = Signer::generate();
        let message = b"claim message";
        let bundle = signature_bundle(&signer, message);

        let recovered = Ed25519Recovery.recover(message, &bundle).unwrap();
        assert_eq!(recovered, IdentityId::from_verifying_key(&signer.verifying_key()));
    }

    #[test]
    fn recover_rejects_wrong_message() {
        let signer = Signer::generate();
        let bundle = signature_bundle(&signer, b"message one");

        let result = Ed25519Recovery.recover(b"message two", &bundle);
        assert!(matches!(result, Err(SignerError::VerificationFailed)));
    }

    #[test]
    fn recover_rejects_truncated_bundle() {
        let signer = Signer::generate();
        let mut bundle = signature_bundle(&signer, b"message");
        bundle.truncate(40);

        let result = Ed25519Recovery.recover(b"message", &bundle);
        assert!(matches!(
            result,
            Err(SignerError::InvalidSignatureLength { got: 40, .. })
        ));
    }

    #[test]
    fn recover_rejects_bit_flipped_signature() {
        let signer = Signer::generate();
        let message = b"message";
        let mut bundle = signature_bundle(&signer, message);
        let last = bundle.len() - 1;
        bundle[last] ^= 0x01;

        assert!(Ed25519Recovery.recover(message, &bundle).is_err());
    }

    #[test]
    fn recover_rejects_swapped_key() {
        let signer = Signer::generate();
        let other = Signer::generate();
        let message = b"message";

        // Valid signature from `signer`, but bundle claims `other`'s key.
        let mut bundle = other.public_key_bytes().to_vec();
        bundle.extend_from_slice(&signer.sign(message).to_bytes());

        assert!(Ed25519Recovery.recover(message, &bundle).is_err());
    }
}
