//! Per-item pause gate.
//!
//! A paused item rejects every claim regardless of voucher validity, until
//! it is unpaused. Pause state is independent of claim state and reversible.
//! Like the role registry, this is plain data; the engine enforces who may
//! flip the flag (see [`crate::config::PauseAuthority`]).

use std::collections::HashSet;

use crate::voucher::ItemId;

/// Set of items currently frozen for claims.
#[derive(Debug, Default)]
pub struct PauseGate {
    frozen: HashSet<ItemId>,
}

impl PauseGate {
    /// Creates a gate with no paused items.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether `item` is paused. Pure lookup.
    #[must_use]
    pub fn is_paused(&self, item: ItemId) -> bool {
        self.frozen.contains(&item)
    }

    /// Pauses `item`. Idempotent; returns `true` if newly paused.
    pub fn pause(&mut self, item: ItemId) -> bool {
        self.frozen.insert(item)
    }

    /// Unpauses `item`. Idempotent; returns `true` if it was paused.
    pub fn unpause(&mut self, item: ItemId) -> bool {
        self.frozen.remove(&item)
    }
}
