//! Vouchers and the canonical claim message.
//!
//! A voucher binds a holder identity to an item. Both the off-line author
//! and the on-line verifier build the same message: the packed encoding of
//! `(holder, item)` is content-addressed with BLAKE3, and the digest is
//! framed with a domain separator so a voucher signature cannot be replayed
//! in any other signing context.

use serde::{Deserialize, Serialize};

use crate::crypto::{Hash, Signer, hash_content, signature_bundle};
use crate::identity::{IDENTITY_BINARY_LEN, IdentityId};

/// Domain prefix for voucher signing messages.
pub const VOUCHER_DOMAIN_PREFIX: &[u8] = b"CLAIMGATE_VOUCHER:";

/// Identifier of a unique claimable item.
///
/// No uniqueness constraint on the identifier space itself; uniqueness of
/// claims is enforced per `(holder, item)` by the ledger.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ItemId(pub u64);

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ItemId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Content address of the packed `(holder, item)` encoding.
///
/// The packed form is the holder's 33-byte binary identity followed by the
/// item identifier in big-endian order.
#[must_use]
pub fn voucher_digest(holder: &IdentityId, item: ItemId) -> Hash {
    let mut packed = Vec::with_capacity(IDENTITY_BINARY_LEN + 8);
    packed.extend_from_slice(holder.as_bytes());
    packed.extend_from_slice(&item.0.to_be_bytes());
    hash_content(&packed)
}

/// The exact byte string a voucher author signs: domain prefix plus digest.
#[must_use]
pub fn voucher_signing_message(holder: &IdentityId, item: ItemId) -> Vec<u8> {
    let digest = voucher_digest(holder, item);
    let mut message = Vec::with_capacity(VOUCHER_DOMAIN_PREFIX.len() + digest.len());
    message.extend_from_slice(VOUCHER_DOMAIN_PREFIX);
    message.extend_from_slice(&digest);
    message
}

/// One claim request: the ephemeral voucher input to the engine.
///
/// Never persisted as an entity. `extra_payload` and `verification_tag`
/// are carried through untouched into the claim record and receipt so
/// downstream systems can correlate the claim with off-core metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimRequest {
    /// The identity redeeming the voucher.
    pub holder: IdentityId,

    /// The item being claimed.
    pub item: ItemId,

    /// Opaque payload, not interpreted by the core.
    pub extra_payload: Vec<u8>,

    /// Opaque external reference, not interpreted by the core.
    pub verification_tag: String,

    /// Signature bundle over the canonical voucher message.
    pub signature: Vec<u8>,
}

impl ClaimRequest {
    /// Builds a request carrying an already-produced signature bundle.
    #[must_use]
    pub fn new(
        holder: IdentityId,
        item: ItemId,
        extra_payload: Vec<u8>,
        verification_tag: impl Into<String>,
        signature: Vec<u8>,
    ) -> Self {
        Self {
            holder,
            item,
            extra_payload,
            verification_tag: verification_tag.into(),
            signature,
        }
    }

    /// Builds a request and signs the canonical voucher message with
    /// `issuer`.
    ///
    /// This is the voucher-author side of the protocol, provided for
    /// collaborators and tests; the engine itself only verifies.
    #[must_use]
    pub fn signed(
        issuer: &Signer,
        holder: IdentityId,
        item: ItemId,
        extra_payload: Vec<u8>,
        verification_tag: impl Into<String>,
    ) -> Self {
        let message = voucher_signing_message(&holder, item);
        let signature = signature_bundle(issuer, &message);
        Self::new(holder, item, extra_payload, verification_tag, signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{Ed25519Recovery, SignerRecovery};
    use crate::identity::AlgorithmTag;

    fn holder(seed: u8) -> IdentityId {
        IdentityId::from_key_bytes(AlgorithmTag::Ed25519, &[seed; 32])
    }

    #[test]
    fn digest_binds_holder_and_item() {
        let h = holder(1);
        let base = voucher_digest(&h, ItemId(42));

        assert_ne!(base, voucher_digest(&h, ItemId(43)));
        assert_ne!(base, voucher_digest(&holder(2), ItemId(42)));
        assert_eq!(base, voucher_digest(&h, ItemId(42)));
    }

    #[test]
    fn signing_message_is_domain_framed() {
        let message = voucher_signing_message(&holder(1), ItemId(7));
        assert!(message.starts_with(VOUCHER_DOMAIN_PREFIX));
        assert_eq!(
            message.len(),
            VOUCHER_DOMAIN_PREFIX.len() + crate::crypto::HASH_SIZE
        );
    }

    #[test]
    fn signed_request_recovers_to_issuer() {
        let issuer = Signer::generate();
        let h = holder(1);
        let request = ClaimRequest::signed(&issuer, h, ItemId(42), vec![], "tag");

        let message = voucher_signing_message(&request.holder, request.item);
        let recovered = Ed25519Recovery.recover(&message, &request.signature).unwrap();
        assert_eq!(recovered, IdentityId::from_verifying_key(&issuer.verifying_key()));
    }

    #[test]
    fn signature_does_not_transfer_to_other_item() {
        let issuer = Signer::generate();
        let h = holder(1);
        let request = ClaimRequest::signed(&issuer, h, ItemId(42), vec![], "tag");

        // Same bundle presented against a different item's message.
        let other_message = voucher_signing_message(&h, ItemId(43));
        assert!(Ed25519Recovery.recover(&other_message, &request.signature).is_err());
    }
}
