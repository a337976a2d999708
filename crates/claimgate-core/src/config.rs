//! Engine policy configuration.

use serde::{Deserialize, Serialize};

/// Who may pause and unpause items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PauseAuthority {
    /// Only holders of the admin role.
    #[default]
    AdminOnly,
    /// Holders of either the admin or the minter role.
    AdminOrMinter,
}

/// Policy knobs for the claim engine.
///
/// Defaults match the minimal observed behavior: admin-only pausing and no
/// protection against an admin revoking its own admin role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Which roles may pause and unpause items.
    pub pause_authority: PauseAuthority,

    /// When `true`, an admin revoking its own admin membership fails with
    /// a typed error instead of silently allowing permanent lockout.
    pub protect_admin_self_revoke: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pause_authority: PauseAuthority::AdminOnly,
            protect_admin_self_revoke: false,
        }
    }
}
