//! Durable claim ledger backed by `SQLite`.
//!
//! The ledger is the sole source of truth for replay protection: a claim
//! for a `(holder, item)` key commits exactly once, enforced by a unique
//! constraint so concurrent attempts for the same key serialize inside the
//! database and the loser surfaces as [`LedgerError::AlreadyClaimed`] with
//! no partial effects. Records are only ever inserted, never updated or
//! deleted.
//!
//! WAL mode allows concurrent reads while a claim commits.

// SQLite returns i64 for row IDs and counts, but they're always non-negative.
// Mutex poisoning indicates a panic in another thread, which is unrecoverable.
#![allow(
    clippy::cast_sign_loss,
    clippy::cast_possible_truncation,
    clippy::missing_panics_doc
)]

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identity::IdentityId;
use crate::voucher::ItemId;

/// Schema SQL embedded at compile time.
const SCHEMA_SQL: &str = include_str!("schema.sql");

// SQLite INTEGER is signed; item ids above i64::MAX would fail the u64
// ToSql range check. Store the two's-complement reinterpretation so the
// full u64 domain binds losslessly.
fn item_to_sql(item: ItemId) -> i64 {
    i64::from_ne_bytes(item.0.to_ne_bytes())
}

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LedgerError {
    /// Database error from `SQLite`.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A claim already exists for this `(holder, item)` key.
    #[error("claim already recorded: holder {holder}, item {item}")]
    AlreadyClaimed {
        /// The holder of the existing claim.
        holder: IdentityId,
        /// The item of the existing claim.
        item: ItemId,
    },

    /// A stored record could not be decoded.
    #[error("corrupt claim record at seq {claim_seq}: {details}")]
    CorruptRecord {
        /// The sequence number of the bad record.
        claim_seq: u64,
        /// What failed to decode.
        details: String,
    },
}

/// A committed claim.
///
/// `claim_seq` starts at 1 and strictly increases, so it serves as the
/// non-zero marker the replay check relies on. Once written a record is
/// read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimRecord {
    /// Monotone, non-zero sequence number assigned on commit.
    pub claim_seq: u64,

    /// The identity that claimed the item.
    pub holder: IdentityId,

    /// The claimed item.
    pub item: ItemId,

    /// The identity whose voucher authorized the claim.
    pub issuer: IdentityId,

    /// Opaque payload carried through from the voucher.
    #[serde(with = "serde_bytes_hex")]
    pub extra_payload: Vec<u8>,

    /// Opaque external reference carried through from the voucher.
    pub verification_tag: String,

    /// Commit timestamp in nanoseconds since the Unix epoch.
    pub claimed_at_ns: u64,
}

/// Serde helper: hex encoding for opaque payload bytes.
mod serde_bytes_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s).map_err(serde::de::Error::custom)
    }
}

/// The durable claim ledger.
pub struct ClaimLedger {
    conn: Arc<Mutex<Connection>>,
}

impl ClaimLedger {
    /// Opens or creates a ledger at the specified path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let conn = Connection::open_with_flags(
            path.as_ref(),
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Self::initialize_connection(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Creates an in-memory ledger, mainly for tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn in_memory() -> Result<Self, LedgerError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_connection(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn initialize_connection(conn: &Connection) -> Result<(), LedgerError> {
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    /// Returns whether a claim exists for `(holder, item)`. Pure lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn has_claimed(&self, holder: &IdentityId, item: ItemId) -> Result<bool, LedgerError> {
        let conn = self.conn.lock().unwrap();

        let found: Option<i64> = conn
            .query_row(
                "SELECT claim_seq FROM claims WHERE holder = ?1 AND item = ?2",
                params![holder.as_bytes().as_slice(), item_to_sql(item)],
                |row| row.get(0),
            )
            .optional()?;

        Ok(found.is_some())
    }

    /// Records a claim for `(holder, item)` atomically.
    ///
    /// The unique constraint on the key makes this the single commit point:
    /// the first insert wins, any later attempt (including a raced one)
    /// fails with `AlreadyClaimed` and changes nothing.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyClaimed` if a record exists for the key, or a
    /// database error otherwise.
    pub fn record_claim(
        &self,
        holder: &IdentityId,
        item: ItemId,
        issuer: &IdentityId,
        extra_payload: &[u8],
        verification_tag: &str,
    ) -> Result<ClaimRecord, LedgerError> {
        let claimed_at_ns = now_ns();
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "INSERT INTO claims (holder, item, issuer, extra_payload, verification_tag, claimed_at_ns)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                holder.as_bytes().as_slice(),
                item_to_sql(item),
                issuer.as_bytes().as_slice(),
                extra_payload,
                verification_tag,
                claimed_at_ns,
            ],
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(err, _)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                LedgerError::AlreadyClaimed {
                    holder: *holder,
                    item,
                }
            },
            other => LedgerError::Database(other),
        })?;

        Ok(ClaimRecord {
            claim_seq: conn.last_insert_rowid() as u64,
            holder: *holder,
            item,
            issuer: *issuer,
            extra_payload: extra_payload.to_vec(),
            verification_tag: verification_tag.to_string(),
            claimed_at_ns,
        })
    }

    /// Fetches the claim record for `(holder, item)`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the stored record is corrupt.
    pub fn get_claim(
        &self,
        holder: &IdentityId,
        item: ItemId,
    ) -> Result<Option<ClaimRecord>, LedgerError> {
        let conn = self.conn.lock().unwrap();

        let row: Option<(u64, Vec<u8>, Vec<u8>, String, u64)> = conn
            .query_row(
                "SELECT claim_seq, issuer, extra_payload, verification_tag, claimed_at_ns
                 FROM claims WHERE holder = ?1 AND item = ?2",
                params![holder.as_bytes().as_slice(), item_to_sql(item)],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)? as u64,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get::<_, i64>(4)? as u64,
                    ))
                },
            )
            .optional()?;

        let Some((claim_seq, issuer_bytes, extra_payload, verification_tag, claimed_at_ns)) = row
        else {
            return Ok(None);
        };

        let issuer =
            IdentityId::from_binary(&issuer_bytes).map_err(|e| LedgerError::CorruptRecord {
                claim_seq,
                details: e.to_string(),
            })?;

        Ok(Some(ClaimRecord {
            claim_seq,
            holder: *holder,
            item,
            issuer,
            extra_payload,
            verification_tag,
            claimed_at_ns,
        }))
    }

    /// Returns the total number of committed claims.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn claim_count(&self) -> Result<u64, LedgerError> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM claims", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Verifies that WAL mode is enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the journal mode cannot be queried.
    pub fn verify_wal_mode(&self) -> Result<bool, LedgerError> {
        let conn = self.conn.lock().unwrap();
        let mode: String = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?;
        Ok(mode.eq_ignore_ascii_case("wal"))
    }
}

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::identity::AlgorithmTag;

    fn identity(seed: u8) -> IdentityId {
        IdentityId::from_key_bytes(AlgorithmTag::Ed25519, &[seed; 32])
    }

    #[test]
    fn fresh_ledger_has_no_claims() {
        let ledger = ClaimLedger::in_memory().unwrap();
        assert!(!ledger.has_claimed(&identity(1), ItemId(42)).unwrap());
        assert_eq!(ledger.claim_count().unwrap(), 0);
    }

    #[test]
    fn record_then_replay_fails() {
        let ledger = ClaimLedger::in_memory().unwrap();
        let holder = identity(1);
        let issuer = identity(2);

        let record = ledger
            .record_claim(&holder, ItemId(42), &issuer, b"payload", "tag")
            .unwrap();
        assert!(record.claim_seq > 0);
        assert!(record.claimed_at_ns > 0);
        assert!(ledger.has_claimed(&holder, ItemId(42)).unwrap());

        let replay = ledger.record_claim(&holder, ItemId(42), &issuer, b"payload", "tag");
        assert!(matches!(
            replay,
            Err(LedgerError::AlreadyClaimed { item: ItemId(42), .. })
        ));
        assert_eq!(ledger.claim_count().unwrap(), 1);
    }

    #[test]
    fn same_item_different_holders_both_claim() {
        let ledger = ClaimLedger::in_memory().unwrap();
        let issuer = identity(9);

        ledger
            .record_claim(&identity(1), ItemId(7), &issuer, b"", "a")
            .unwrap();
        ledger
            .record_claim(&identity(2), ItemId(7), &issuer, b"", "b")
            .unwrap();

        assert_eq!(ledger.claim_count().unwrap(), 2);
    }

    #[test]
    fn item_ids_above_i64_max_round_trip() {
        let ledger = ClaimLedger::in_memory().unwrap();
        let holder = identity(1);
        let issuer = identity(2);

        for item in [ItemId(u64::MAX), ItemId(1 << 63), ItemId(i64::MAX as u64)] {
            ledger.record_claim(&holder, item, &issuer, b"", "").unwrap();
            assert!(ledger.has_claimed(&holder, item).unwrap());

            let record = ledger.get_claim(&holder, item).unwrap().unwrap();
            assert_eq!(record.item, item);

            let replay = ledger.record_claim(&holder, item, &issuer, b"", "");
            assert!(matches!(replay, Err(LedgerError::AlreadyClaimed { .. })));
        }

        // The reinterpreted ids stay distinct from small ones.
        assert!(!ledger.has_claimed(&holder, ItemId(0)).unwrap());
        assert_eq!(ledger.claim_count().unwrap(), 3);
    }

    #[test]
    fn claim_seq_is_monotone() {
        let ledger = ClaimLedger::in_memory().unwrap();
        let issuer = identity(9);

        let first = ledger
            .record_claim(&identity(1), ItemId(1), &issuer, b"", "")
            .unwrap();
        let second = ledger
            .record_claim(&identity(1), ItemId(2), &issuer, b"", "")
            .unwrap();

        assert!(second.claim_seq > first.claim_seq);
    }

    #[test]
    fn get_claim_round_trips_payload_and_tag() {
        let ledger = ClaimLedger::in_memory().unwrap();
        let holder = identity(1);
        let issuer = identity(2);

        ledger
            .record_claim(&holder, ItemId(5), &issuer, b"\x01\x02", "ipfs://cid")
            .unwrap();

        let record = ledger.get_claim(&holder, ItemId(5)).unwrap().unwrap();
        assert_eq!(record.issuer, issuer);
        assert_eq!(record.extra_payload, b"\x01\x02");
        assert_eq!(record.verification_tag, "ipfs://cid");

        assert!(ledger.get_claim(&holder, ItemId(6)).unwrap().is_none());
    }

    #[test]
    fn on_disk_ledger_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("claims.db");
        let holder = identity(1);
        let issuer = identity(2);

        {
            let ledger = ClaimLedger::open(&path).unwrap();
            assert!(ledger.verify_wal_mode().unwrap());
            ledger
                .record_claim(&holder, ItemId(3), &issuer, b"", "tag")
                .unwrap();
        }

        let reopened = ClaimLedger::open(&path).unwrap();
        assert!(reopened.has_claimed(&holder, ItemId(3)).unwrap());
    }

    proptest! {
        /// Replaying any schedule of claims commits each unique key exactly
        /// once; every repeat is rejected.
        #[test]
        fn replay_protection_holds(keys in proptest::collection::vec((0u8..8, 0u64..8), 1..40)) {
            let ledger = ClaimLedger::in_memory().unwrap();
            let issuer = identity(0xFF);
            let mut seen = std::collections::HashSet::new();

            for (seed, item) in keys {
                let holder = identity(seed);
                let result = ledger.record_claim(&holder, ItemId(item), &issuer, b"", "");
                if seen.insert((seed, item)) {
                    prop_assert!(result.is_ok());
                } else {
                    let already_claimed = matches!(result, Err(LedgerError::AlreadyClaimed { .. }));
                    prop_assert!(already_claimed);
                }
            }

            prop_assert_eq!(ledger.claim_count().unwrap(), seen.len() as u64);
        }
    }
}
