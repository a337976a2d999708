//! The claim engine: the single authorization boundary.
//!
//! Every mutation funnels through [`ClaimEngine`], which checks the caller
//! against the role registry before touching any state. The components it
//! composes (registry, pause gate, ledger) are deliberately dumb; policy
//! lives here and nowhere else.
//!
//! The claim path checks, in order: pause state, replay, signature
//! recovery, issuer authority. Only when all four pass does the claim
//! commit to the ledger. The ordering is part of the contract: a paused
//! item reports `ItemPaused` even when the signature is garbage, and a
//! replay reports `AlreadyClaimed` before any cryptography runs.

// Mutex poisoning indicates a panic in another thread, which is unrecoverable.
#![allow(clippy::missing_panics_doc)]

use std::sync::{Arc, Mutex, RwLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::config::{EngineConfig, PauseAuthority};
use crate::crypto::{Ed25519Recovery, SignerError, SignerRecovery};
use crate::identity::IdentityId;
use crate::ledger::{ClaimLedger, ClaimRecord, LedgerError};
use crate::pause::PauseGate;
use crate::registry::{RoleId, RoleRegistry};
use crate::voucher::{ClaimRequest, ItemId, voucher_signing_message};

/// Errors returned by engine operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    /// The caller does not hold the role the operation requires.
    #[error("unauthorized: {caller} does not hold role {role}")]
    Unauthorized {
        /// The role the operation requires.
        role: RoleId,
        /// The identity that attempted the operation.
        caller: IdentityId,
    },

    /// The voucher signature failed verification or decoding.
    #[error("invalid voucher signature: {0}")]
    InvalidSignature(#[from] SignerError),

    /// The item is paused for claims.
    #[error("item {item} is paused")]
    ItemPaused {
        /// The paused item.
        item: ItemId,
    },

    /// A claim already exists for this `(holder, item)` key.
    #[error("already claimed: holder {holder}, item {item}")]
    AlreadyClaimed {
        /// The holder of the existing claim.
        holder: IdentityId,
        /// The item of the existing claim.
        item: ItemId,
    },

    /// An admin tried to revoke its own admin role while self-revoke
    /// protection is enabled.
    #[error("admin self-revoke blocked for {caller}")]
    SelfRevokeBlocked {
        /// The admin that attempted the revoke.
        caller: IdentityId,
    },

    /// The ledger failed for a reason other than replay.
    #[error("ledger error: {0}")]
    Ledger(#[source] LedgerError),
}

// Not #[from]: the ledger's own replay rejection must surface as the
// engine's AlreadyClaimed, not as an opaque ledger failure.
impl From<LedgerError> for EngineError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::AlreadyClaimed { holder, item } => {
                Self::AlreadyClaimed { holder, item }
            },
            other => Self::Ledger(other),
        }
    }
}

/// The result of a successful claim, handed to sinks and returned to the
/// caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimReceipt {
    /// The identity that claimed the item.
    pub holder: IdentityId,

    /// The claimed item.
    pub item: ItemId,

    /// The identity recovered from the voucher signature.
    pub issuer: IdentityId,

    /// Opaque payload carried through from the request.
    pub extra_payload: Vec<u8>,

    /// Opaque external reference carried through from the request.
    pub verification_tag: String,

    /// Monotone sequence number assigned by the ledger.
    pub claim_seq: u64,

    /// Commit timestamp in nanoseconds since the Unix epoch.
    pub claimed_at_ns: u64,
}

impl ClaimReceipt {
    fn from_record(record: ClaimRecord) -> Self {
        Self {
            holder: record.holder,
            item: record.item,
            issuer: record.issuer,
            extra_payload: record.extra_payload,
            verification_tag: record.verification_tag,
            claim_seq: record.claim_seq,
            claimed_at_ns: record.claimed_at_ns,
        }
    }
}

/// Observer notified after each committed claim.
///
/// Sinks run after the ledger commit; they cannot veto a claim.
pub trait ClaimSink: Send + Sync {
    /// Called once per committed claim.
    fn on_claim(&self, receipt: &ClaimReceipt);
}

/// A sink that discards every receipt.
#[derive(Debug, Default)]
pub struct NoopClaimSink;

impl ClaimSink for NoopClaimSink {
    fn on_claim(&self, _receipt: &ClaimReceipt) {}
}

/// A sink that buffers receipts in memory, mainly for tests.
#[derive(Debug, Default)]
pub struct InMemoryClaimSink {
    receipts: Mutex<Vec<ClaimReceipt>>,
}

impl InMemoryClaimSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the receipts observed so far.
    #[must_use]
    pub fn receipts(&self) -> Vec<ClaimReceipt> {
        self.receipts.lock().unwrap().clone()
    }
}

impl ClaimSink for InMemoryClaimSink {
    fn on_claim(&self, receipt: &ClaimReceipt) {
        self.receipts.lock().unwrap().push(receipt.clone());
    }
}

/// Voucher-authorized claim engine.
///
/// Construction grants the initializer both `admin` and `minter`; this is
/// the only implicit grant. All further membership changes go through
/// [`grant_role`](Self::grant_role) / [`revoke_role`](Self::revoke_role)
/// under admin authority.
pub struct ClaimEngine {
    config: EngineConfig,
    registry: RwLock<RoleRegistry>,
    gate: RwLock<PauseGate>,
    ledger: ClaimLedger,
    recovery: Arc<dyn SignerRecovery>,
    sink: Arc<dyn ClaimSink>,
}

impl ClaimEngine {
    /// Creates an engine with default policy, Ed25519 recovery, and no
    /// claim sink.
    #[must_use]
    pub fn new(initializer: IdentityId, ledger: ClaimLedger) -> Self {
        Self::with_components(
            EngineConfig::default(),
            initializer,
            ledger,
            Arc::new(Ed25519Recovery),
            Arc::new(NoopClaimSink),
        )
    }

    /// Creates an engine with explicit policy configuration.
    #[must_use]
    pub fn with_config(config: EngineConfig, initializer: IdentityId, ledger: ClaimLedger) -> Self {
        Self::with_components(
            config,
            initializer,
            ledger,
            Arc::new(Ed25519Recovery),
            Arc::new(NoopClaimSink),
        )
    }

    /// Creates an engine with every component supplied by the caller.
    #[must_use]
    pub fn with_components(
        config: EngineConfig,
        initializer: IdentityId,
        ledger: ClaimLedger,
        recovery: Arc<dyn SignerRecovery>,
        sink: Arc<dyn ClaimSink>,
    ) -> Self {
        let mut registry = RoleRegistry::new();
        registry.grant(RoleId::admin(), initializer);
        registry.grant(RoleId::minter(), initializer);

        info!(initializer = %initializer, "claim engine initialized");

        Self {
            config,
            registry: RwLock::new(registry),
            gate: RwLock::new(PauseGate::new()),
            ledger,
            recovery,
            sink,
        }
    }

    /// Returns whether `identity` holds `role`.
    #[must_use]
    pub fn has_role(&self, role: RoleId, identity: &IdentityId) -> bool {
        self.registry.read().unwrap().has_role(role, identity)
    }

    /// Returns whether `item` is paused.
    #[must_use]
    pub fn is_paused(&self, item: ItemId) -> bool {
        self.gate.read().unwrap().is_paused(item)
    }

    /// Returns whether `holder` has claimed `item`.
    ///
    /// # Errors
    ///
    /// Returns `Ledger` if the lookup fails.
    pub fn has_claimed(&self, holder: &IdentityId, item: ItemId) -> Result<bool, EngineError> {
        Ok(self.ledger.has_claimed(holder, item)?)
    }

    /// Fetches the committed claim record for `(holder, item)`, if any.
    ///
    /// # Errors
    ///
    /// Returns `Ledger` if the lookup fails.
    pub fn get_claim(
        &self,
        holder: &IdentityId,
        item: ItemId,
    ) -> Result<Option<ClaimRecord>, EngineError> {
        Ok(self.ledger.get_claim(holder, item)?)
    }

    /// Returns the total number of committed claims.
    ///
    /// # Errors
    ///
    /// Returns `Ledger` if the lookup fails.
    pub fn claim_count(&self) -> Result<u64, EngineError> {
        Ok(self.ledger.claim_count()?)
    }

    /// Grants `role` to `grantee`. Admin only. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` if `caller` does not hold the admin role.
    pub fn grant_role(
        &self,
        caller: &IdentityId,
        role: RoleId,
        grantee: IdentityId,
    ) -> Result<(), EngineError> {
        let mut registry = self.registry.write().unwrap();
        Self::ensure_role(&registry, RoleId::admin(), caller)?;

        if registry.grant(role, grantee) {
            info!(caller = %caller, role = %role, grantee = %grantee, "role granted");
        }
        Ok(())
    }

    /// Revokes `role` from `revokee`. Admin only. Idempotent.
    ///
    /// An admin may revoke its own admin role unless
    /// [`EngineConfig::protect_admin_self_revoke`] is set, in which case the
    /// attempt fails with `SelfRevokeBlocked` before any state changes.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` if `caller` does not hold the admin role, or
    /// `SelfRevokeBlocked` per the policy above.
    pub fn revoke_role(
        &self,
        caller: &IdentityId,
        role: RoleId,
        revokee: &IdentityId,
    ) -> Result<(), EngineError> {
        let mut registry = self.registry.write().unwrap();
        Self::ensure_role(&registry, RoleId::admin(), caller)?;

        if self.config.protect_admin_self_revoke && role == RoleId::admin() && revokee == caller {
            return Err(EngineError::SelfRevokeBlocked { caller: *caller });
        }

        if registry.revoke(role, revokee) {
            info!(caller = %caller, role = %role, revokee = %revokee, "role revoked");
        }
        Ok(())
    }

    /// Pauses `item`. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` if `caller` lacks pause authority.
    pub fn pause(&self, caller: &IdentityId, item: ItemId) -> Result<(), EngineError> {
        self.ensure_pause_authority(caller)?;

        if self.gate.write().unwrap().pause(item) {
            info!(caller = %caller, item = %item, "item paused");
        }
        Ok(())
    }

    /// Unpauses `item`. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` if `caller` lacks pause authority.
    pub fn unpause(&self, caller: &IdentityId, item: ItemId) -> Result<(), EngineError> {
        self.ensure_pause_authority(caller)?;

        if self.gate.write().unwrap().unpause(item) {
            info!(caller = %caller, item = %item, "item unpaused");
        }
        Ok(())
    }

    /// Redeems a voucher: verifies it end to end and commits the claim.
    ///
    /// On success the receipt carries the recovered issuer and the payload
    /// fields passed through untouched; the sink observes the same receipt
    /// after commit.
    ///
    /// # Errors
    ///
    /// In check order: `ItemPaused`, `AlreadyClaimed`, `InvalidSignature`
    /// (malformed bundle or signature not matching the canonical message
    /// for this exact `(holder, item)`), `Unauthorized` (recovered issuer
    /// lacks the minter role), or `Ledger`. A lost commit race also
    /// surfaces as `AlreadyClaimed`, with no partial effects.
    pub fn claim(&self, request: &ClaimRequest) -> Result<ClaimReceipt, EngineError> {
        if self.is_paused(request.item) {
            return Err(EngineError::ItemPaused { item: request.item });
        }

        if self.ledger.has_claimed(&request.holder, request.item)? {
            return Err(EngineError::AlreadyClaimed {
                holder: request.holder,
                item: request.item,
            });
        }

        let message = voucher_signing_message(&request.holder, request.item);
        let issuer = self.recovery.recover(&message, &request.signature)?;

        if !self.has_role(RoleId::minter(), &issuer) {
            return Err(EngineError::Unauthorized {
                role: RoleId::minter(),
                caller: issuer,
            });
        }

        let record = self.ledger.record_claim(
            &request.holder,
            request.item,
            &issuer,
            &request.extra_payload,
            &request.verification_tag,
        )?;

        let receipt = ClaimReceipt::from_record(record);
        info!(
            holder = %receipt.holder,
            item = %receipt.item,
            issuer = %receipt.issuer,
            claim_seq = receipt.claim_seq,
            "claim committed"
        );
        self.sink.on_claim(&receipt);

        Ok(receipt)
    }

    fn ensure_role(
        registry: &RoleRegistry,
        role: RoleId,
        caller: &IdentityId,
    ) -> Result<(), EngineError> {
        if registry.has_role(role, caller) {
            Ok(())
        } else {
            Err(EngineError::Unauthorized {
                role,
                caller: *caller,
            })
        }
    }

    fn ensure_pause_authority(&self, caller: &IdentityId) -> Result<(), EngineError> {
        let registry = self.registry.read().unwrap();

        let authorized = match self.config.pause_authority {
            PauseAuthority::AdminOnly => registry.has_role(RoleId::admin(), caller),
            PauseAuthority::AdminOrMinter => {
                registry.has_role(RoleId::admin(), caller)
                    || registry.has_role(RoleId::minter(), caller)
            },
        };

        if authorized {
            Ok(())
        } else {
            Err(EngineError::Unauthorized {
                role: RoleId::admin(),
                caller: *caller,
            })
        }
    }
}
