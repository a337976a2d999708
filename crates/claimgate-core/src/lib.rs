//! Voucher-authorized claim engine.
//!
//! An authorized issuer signs a voucher off-line binding a holder identity
//! to an item. The holder later redeems it: the engine recovers the issuer
//! from the signature, checks the issuer's authority at redemption time,
//! enforces per-item pausing and per-`(holder, item)` replay protection,
//! and commits the claim to a durable ledger.
//!
//! # Components
//!
//! - [`identity`]: canonical identifiers for principals
//! - [`registry`]: role membership (`admin`, `minter`)
//! - [`crypto`]: BLAKE3 hashing, Ed25519 signing, and issuer recovery
//! - [`voucher`]: the canonical signed claim message
//! - [`pause`]: per-item claim freezing
//! - [`ledger`]: durable, replay-protected claim records
//! - [`engine`]: the single authorization boundary composing the above
//!
//! # Example
//!
//! ```rust,no_run
//! use claimgate_core::crypto::Signer;
//! use claimgate_core::engine::ClaimEngine;
//! use claimgate_core::identity::IdentityId;
//! use claimgate_core::ledger::ClaimLedger;
//! use claimgate_core::voucher::{ClaimRequest, ItemId};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // The initializer holds admin and minter from the start.
//! let issuer = Signer::generate();
//! let issuer_id = IdentityId::from_verifying_key(&issuer.verifying_key());
//! let engine = ClaimEngine::new(issuer_id, ClaimLedger::open("claims.db")?);
//!
//! // Issue a voucher off-line, then redeem it.
//! let holder: IdentityId = "id1:01aa…".parse()?;
//! let request = ClaimRequest::signed(&issuer, holder, ItemId(42), vec![], "tag");
//! let receipt = engine.claim(&request)?;
//! assert_eq!(receipt.issuer, issuer_id);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod crypto;
pub mod engine;
pub mod identity;
pub mod ledger;
pub mod pause;
pub mod registry;
pub mod voucher;

pub use config::{EngineConfig, PauseAuthority};
pub use crypto::{Ed25519Recovery, Signer, SignerError, SignerRecovery};
pub use engine::{ClaimEngine, ClaimReceipt, ClaimSink, EngineError};
pub use identity::{AlgorithmTag, IdentityError, IdentityId};
pub use ledger::{ClaimLedger, ClaimRecord, LedgerError};
pub use registry::RoleId;
pub use voucher::{ClaimRequest, ItemId};
