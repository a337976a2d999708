//! `IdentityId` — canonical identifier for an externally-verifiable principal.
//!
//! # Binary Form
//!
//! ```text
//! +------------------+----------------------------+
//! | algorithm_tag    | key_hash                   |
//! | (1 byte)         | (32 bytes, BLAKE3)         |
//! +------------------+----------------------------+
//! ```
//!
//! # Text Form
//!
//! ```text
//! id1:<hex(algorithm_tag || key_hash)>
//! ```
//!
//! Unknown algorithm tags are rejected (fail-closed). Equality is
//! constant-time: identities gate authorization decisions.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::crypto::VerifyingKey;

/// Length of the binary identity form: tag byte plus 32-byte hash.
pub const IDENTITY_BINARY_LEN: usize = 33;

/// Prefix for the identity text form.
const PREFIX: &str = "id1:";

/// Domain separation string for BLAKE3 identity hashing.
const DOMAIN_SEPARATION: &[u8] = b"claimgate:idv1\0";

/// Errors from identity parsing.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum IdentityError {
    /// The binary form has the wrong length.
    #[error("invalid identity length: got {got} bytes, expected {expected}")]
    InvalidLength {
        /// The length that was provided.
        got: usize,
        /// The length that was required.
        expected: usize,
    },

    /// The algorithm tag is not recognized.
    #[error("unknown identity algorithm tag: {tag:#04x}")]
    UnknownAlgorithmTag {
        /// The rejected tag byte.
        tag: u8,
    },

    /// The text form has the wrong prefix.
    #[error("wrong identity prefix: expected {expected:?}, got {got:?}")]
    WrongPrefix {
        /// The expected prefix.
        expected: &'static str,
        /// What was found instead.
        got: String,
    },

    /// The hex payload could not be decoded.
    #[error("invalid identity hex payload: {0}")]
    InvalidHex(String),
}

/// Known algorithm tag values.
///
/// Unknown values are rejected at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AlgorithmTag {
    /// Ed25519 signing algorithm.
    Ed25519 = 0x01,
}

impl AlgorithmTag {
    /// Parses an algorithm tag from a raw byte.
    ///
    /// # Errors
    ///
    /// Returns `UnknownAlgorithmTag` for unrecognized values.
    pub const fn from_byte(byte: u8) -> Result<Self, IdentityError> {
        match byte {
            0x01 => Ok(Self::Ed25519),
            other => Err(IdentityError::UnknownAlgorithmTag { tag: other }),
        }
    }

    /// Returns the canonical byte representation.
    #[must_use]
    pub const fn to_byte(self) -> u8 {
        self as u8
    }

    /// Returns the human-readable algorithm name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ed25519 => "ed25519",
        }
    }
}

/// A canonical identifier for a principal: holder, issuer, or caller.
///
/// Cheaply copyable (33 bytes inline). Construct with
/// [`IdentityId::from_verifying_key`] for key-backed principals, or
/// [`IdentityId::from_binary`] / [`IdentityId::parse_text`] when the
/// identity arrives from outside.
#[derive(Clone, Copy)]
pub struct IdentityId {
    binary: [u8; IDENTITY_BINARY_LEN],
}

impl IdentityId {
    /// Derives an identity from an Ed25519 verifying key.
    #[must_use]
    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        Self::from_key_bytes(AlgorithmTag::Ed25519, key.as_bytes())
    }

    /// Derives an identity from raw public key bytes.
    ///
    /// Computes `blake3("claimgate:idv1\0" || algorithm_name || "\n" || key_bytes)`.
    #[must_use]
    pub fn from_key_bytes(algorithm: AlgorithmTag, key_bytes: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(DOMAIN_SEPARATION);
        hasher.update(algorithm.name().as_bytes());
        hasher.update(b"\n");
        hasher.update(key_bytes);
        let hash = hasher.finalize();

        let mut binary = [0u8; IDENTITY_BINARY_LEN];
        binary[0] = algorithm.to_byte();
        binary[1..].copy_from_slice(hash.as_bytes());
        Self { binary }
    }

    /// Constructs an identity from its binary form.
    ///
    /// # Errors
    ///
    /// Rejects wrong lengths and unknown algorithm tags.
    pub fn from_binary(bytes: &[u8]) -> Result<Self, IdentityError> {
        if bytes.len() != IDENTITY_BINARY_LEN {
            return Err(IdentityError::InvalidLength {
                got: bytes.len(),
                expected: IDENTITY_BINARY_LEN,
            });
        }

        let _algorithm = AlgorithmTag::from_byte(bytes[0])?;

        let mut binary = [0u8; IDENTITY_BINARY_LEN];
        binary.copy_from_slice(bytes);
        Ok(Self { binary })
    }

    /// Parses an identity from its canonical text form.
    ///
    /// # Errors
    ///
    /// Rejects wrong prefixes, bad hex, wrong lengths, and unknown tags.
    pub fn parse_text(input: &str) -> Result<Self, IdentityError> {
        let payload = input
            .strip_prefix(PREFIX)
            .ok_or_else(|| IdentityError::WrongPrefix {
                expected: PREFIX,
                got: input.chars().take(PREFIX.len()).collect(),
            })?;

        let decoded =
            hex::decode(payload).map_err(|e| IdentityError::InvalidHex(e.to_string()))?;
        Self::from_binary(&decoded)
    }

    /// Returns the canonical text form: `id1:<hex>`.
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut result = String::with_capacity(PREFIX.len() + IDENTITY_BINARY_LEN * 2);
        result.push_str(PREFIX);
        result.push_str(&hex::encode(self.binary));
        result
    }

    /// Returns a reference to the raw binary form.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; IDENTITY_BINARY_LEN] {
        &self.binary
    }
}

impl PartialEq for IdentityId {
    fn eq(&self, other: &Self) -> bool {
        self.binary.as_slice().ct_eq(other.binary.as_slice()).into()
    }
}

impl Eq for IdentityId {}

impl std::hash::Hash for IdentityId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.binary.hash(state);
    }
}

impl fmt::Debug for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityId")
            .field("text", &self.to_text())
            .finish()
    }
}

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl std::str::FromStr for IdentityId {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_text(s)
    }
}

impl Serialize for IdentityId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_text())
    }
}

impl<'de> Deserialize<'de> for IdentityId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        Self::parse_text(&text).map_err(serde::de::Error::custom)
    }
}
