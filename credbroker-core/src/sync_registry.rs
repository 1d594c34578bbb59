//! Per-account sync authority settings.
//!
//! Tracks, for each (account, content authority) pair, whether the authority
//! is syncable and whether automatic sync is enabled. Setters follow the
//! set-then-read-back contract the host sync framework exposes: the returned
//! bool is the value actually stored, read back after the write.

use parking_lot::RwLock;
use std::collections::HashMap;

use crate::model::AccountId;

/// Sync flags for one (account, authority) pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncState {
    /// Whether the authority is syncable for the account at all.
    pub syncable: bool,

    /// Whether the authority syncs automatically.
    pub auto_sync: bool,
}

/// Registry of sync authority settings.
///
/// # Thread Safety
///
/// Guarded by a coarse `RwLock`; operations are plain map reads/writes and
/// the lock is never held across an await.
pub struct SyncRegistry {
    entries: RwLock<HashMap<(AccountId, String), SyncState>>,
}

impl SyncRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Mark an authority (not) syncable for an account.
    ///
    /// Upserts the entry and returns the stored value read back. Repeated
    /// identical calls are no-ops beyond the first.
    pub fn set_syncable(&self, id: &AccountId, authority: &str, value: bool) -> bool {
        let mut entries = self.entries.write();
        let state = entries
            .entry((id.clone(), authority.to_string()))
            .or_default();
        state.syncable = value;
        state.syncable
    }

    /// Enable or disable automatic sync of an authority for an account.
    ///
    /// Upserts the entry and returns the stored value read back.
    pub fn set_auto_sync(&self, id: &AccountId, authority: &str, value: bool) -> bool {
        let mut entries = self.entries.write();
        let state = entries
            .entry((id.clone(), authority.to_string()))
            .or_default();
        state.auto_sync = value;
        state.auto_sync
    }

    /// Whether the authority is syncable for the account. `false` when the
    /// pair was never configured.
    pub fn is_syncable(&self, id: &AccountId, authority: &str) -> bool {
        self.entries
            .read()
            .get(&(id.clone(), authority.to_string()))
            .map(|s| s.syncable)
            .unwrap_or(false)
    }

    /// Whether the authority auto-syncs for the account.
    pub fn auto_sync(&self, id: &AccountId, authority: &str) -> bool {
        self.entries
            .read()
            .get(&(id.clone(), authority.to_string()))
            .map(|s| s.auto_sync)
            .unwrap_or(false)
    }

    /// Remove every row belonging to the given account.
    ///
    /// Returns the number of rows removed. Used when the account is deleted.
    pub fn purge_account(&self, id: &AccountId) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|(account, _), _| account != id);
        before - entries.len()
    }

    /// Number of configured (account, authority) pairs.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Default for SyncRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SyncRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncRegistry")
            .field("entries", &self.entries.read().len())
            .finish()
    }
}
