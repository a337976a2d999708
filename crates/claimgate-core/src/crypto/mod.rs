//! Cryptographic primitives for the claim engine.
//!
//! This module provides the two capabilities the authorization core consumes:
//!
//! - **BLAKE3 hashing**: content addressing for canonical voucher messages
//!   and identity derivation
//! - **Ed25519 signatures**: voucher authentication and signer recovery
//!
//! # Signer Recovery
//!
//! Ed25519 has no native public-key recovery, so a voucher signature travels
//! as a *bundle*: the author's verifying key followed by the signature. The
//! [`SignerRecovery`] seam verifies the signature over the exact message and,
//! only if it verifies, derives the signer's identity from the embedded key.
//! A bundle that fails verification never yields an identity, so there is no
//! way to produce a false-positive signer for a mismatched message.

mod hash;
mod recovery;
mod sign;

pub use hash::{HASH_SIZE, Hash, hash_content};
pub use recovery::{Ed25519Recovery, SIGNATURE_BUNDLE_SIZE, SignerRecovery, signature_bundle};
pub use sign::{
    PUBLIC_KEY_SIZE, SIGNATURE_SIZE, Signature, Signer, SignerError, VerifyingKey,
    parse_signature, parse_verifying_key, verify_signature,
};
