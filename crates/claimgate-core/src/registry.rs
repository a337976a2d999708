//! Identity and role registry.
//!
//! A [`RoleId`] is the BLAKE3 hash of a domain-separated role name, so role
//! identifiers are stable across processes. Two roles are well known:
//! `admin` manages membership of every role (including itself), `minter`
//! authorizes voucher issuance.
//!
//! The registry is plain data: grant and revoke mutate membership without
//! checking the caller. Authorization is enforced uniformly by the engine
//! before any mutation reaches this type.

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::identity::IdentityId;

/// Domain separation string for role name hashing.
const ROLE_DOMAIN: &[u8] = b"claimgate:role:v1\0";

/// A stable 32-byte role identifier derived from a role name.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RoleId([u8; 32]);

impl RoleId {
    /// Derives the role identifier for a named role.
    #[must_use]
    pub fn named(name: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(ROLE_DOMAIN);
        hasher.update(name.as_bytes());
        Self(*hasher.finalize().as_bytes())
    }

    /// The administrator role: manages membership of all roles.
    #[must_use]
    pub fn admin() -> Self {
        Self::named("admin")
    }

    /// The minter role: authorizes voucher issuance.
    #[must_use]
    pub fn minter() -> Self {
        Self::named("minter")
    }

    /// Returns the raw role identifier bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RoleId({})", hex::encode(self.0))
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Membership relation from roles to identities.
///
/// Starts empty; the engine grants the initializer `admin` and `minter` at
/// construction, the only implicit grant. Membership is only ever toggled,
/// never destroyed.
#[derive(Debug, Default)]
pub struct RoleRegistry {
    members: HashMap<RoleId, HashSet<IdentityId>>,
}

impl RoleRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether `identity` holds `role`. Pure lookup.
    #[must_use]
    pub fn has_role(&self, role: RoleId, identity: &IdentityId) -> bool {
        self.members
            .get(&role)
            .is_some_and(|set| set.contains(identity))
    }

    /// Adds `identity` to `role`'s membership.
    ///
    /// Idempotent; returns `true` if the membership was newly added.
    pub fn grant(&mut self, role: RoleId, identity: IdentityId) -> bool {
        self.members.entry(role).or_default().insert(identity)
    }

    /// Removes `identity` from `role`'s membership.
    ///
    /// Idempotent; returns `true` if the membership was present.
    pub fn revoke(&mut self, role: RoleId, identity: &IdentityId) -> bool {
        self.members
            .get_mut(&role)
            .is_some_and(|set| set.remove(identity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::AlgorithmTag;

    fn identity(seed: u8) -> IdentityId {
        IdentityId::from_key_bytes(AlgorithmTag::Ed25519, &[seed; 32])
    }

    #[test]
    fn role_ids_are_stable_and_distinct() {
        assert_eq!(RoleId::admin(), RoleId::named("admin"));
        assert_ne!(RoleId::admin(), RoleId::minter());
    }

    #[test]
    fn empty_registry_has_no_members() {
        let registry = RoleRegistry::new();
        assert!(!registry.has_role(RoleId::admin(), &identity(1)));
    }

    #[test]
    fn grant_then_revoke() {
        let mut registry = RoleRegistry::new();
        let alice = identity(1);

        assert!(registry.grant(RoleId::minter(), alice));
        assert!(registry.has_role(RoleId::minter(), &alice));
        // Granting a held role is a no-op.
        assert!(!registry.grant(RoleId::minter(), alice));

        assert!(registry.revoke(RoleId::minter(), &alice));
        assert!(!registry.has_role(RoleId::minter(), &alice));
        // Revoking an absent role is a no-op.
        assert!(!registry.revoke(RoleId::minter(), &alice));
    }

    #[test]
    fn roles_are_independent() {
        let mut registry = RoleRegistry::new();
        let alice = identity(1);

        registry.grant(RoleId::admin(), alice);
        assert!(!registry.has_role(RoleId::minter(), &alice));
    }
}
