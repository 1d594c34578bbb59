//! In-memory cache of issued access tokens.
//!
//! This module provides:
//! - [`CachedToken`] - A token value with issuance and expiry metadata
//! - [`TokenCache`] - Per-[`TokenKey`] storage with lazy expiry eviction
//!
//! Expired entries are evicted on read: a token whose expiry has passed is
//! reported as a miss and removed. Tokens stored without an expiry (manually
//! set ones) are never evicted by time, only by explicit invalidation.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;

use crate::model::{AccountId, TokenKey};
use crate::store::Secret;

/// A cached access token with its metadata.
#[derive(Debug, Clone)]
pub struct CachedToken {
    /// The token value.
    pub value: Secret,

    /// When the token was stored.
    pub issued_at: DateTime<Utc>,

    /// When this token expires (None if unknown or non-expiring).
    pub expires_at: Option<DateTime<Utc>>,
}

impl CachedToken {
    /// Create a new token without an expiry.
    pub fn new(value: impl Into<Secret>) -> Self {
        Self {
            value: value.into(),
            issued_at: Utc::now(),
            expires_at: None,
        }
    }

    /// Create a token with an expiration time.
    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Check if this token is expired at the given instant.
    ///
    /// A token is expired once `now >= expires_at`. Returns `false` if no
    /// expiration is set.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|exp| now >= exp).unwrap_or(false)
    }

    /// Check if this token has expired.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// Per-key cache of access tokens.
///
/// # Thread Safety
///
/// All operations take a lock scoped to the map access; the lock is never
/// held across an external call.
pub struct TokenCache {
    entries: Mutex<HashMap<TokenKey, CachedToken>>,
}

impl TokenCache {
    /// Create a new empty cache.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Look up a token.
    ///
    /// Returns `None` if absent or expired; expired entries are evicted
    /// before returning.
    pub fn get(&self, key: &TokenKey) -> Option<CachedToken> {
        let mut entries = self.entries.lock();

        match entries.get(key) {
            Some(token) if token.is_expired() => {
                tracing::debug!("evicting expired token for {}", key);
                entries.remove(key);
                None
            }
            Some(token) => Some(token.clone()),
            None => None,
        }
    }

    /// Store a token, replacing any existing entry (last write wins).
    pub fn put(&self, key: TokenKey, token: CachedToken) {
        tracing::debug!("caching token for {}", key);
        self.entries.lock().insert(key, token);
    }

    /// Explicitly remove a token.
    ///
    /// Returns `true` if an entry was present.
    pub fn invalidate(&self, key: &TokenKey) -> bool {
        self.entries.lock().remove(key).is_some()
    }

    /// Remove every token belonging to the given account.
    ///
    /// Returns the number of entries removed. Used when the account is
    /// deleted, so no token outlives its identity.
    pub fn purge_account(&self, id: &AccountId) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|key, _| &key.account != id);
        before - entries.len()
    }

    /// Number of live entries, expired ones included until evicted.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TokenCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCache")
            .field("entries", &self.entries.lock().len())
            .finish()
    }
}
