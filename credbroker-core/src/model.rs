//! Domain model types for credbroker.
//!
//! This module defines the core types used throughout the broker:
//! - [`AccountName`] - Identifier for an account within an account kind
//! - [`AccountKind`] - Identifier for the kind (owning application) of an account
//! - [`AccountId`] - Full account identity: a (name, kind) pair
//! - [`CredentialRecord`] - Registry entry for a configured account
//! - [`TokenKey`] - Cache key for access tokens: (account, token type)
//! - [`AccessToken`] - A token handed back to facade callers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::store::Secret;

/// Identifier for an account within an account kind (e.g., "alice", "work").
///
/// Names are compared exactly; `"Alice"` and `"alice"` are different accounts.
///
/// # Examples
///
/// ```
/// use credbroker_core::AccountName;
///
/// let personal = AccountName::new("personal");
/// let work = AccountName::new("work");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountName(String);

impl AccountName {
    /// Create a new account name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the account name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AccountName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for AccountName {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Identifier for the kind of an account (e.g., "com.example.app").
///
/// The kind is the namespace an application registers its accounts under,
/// so two applications can both own an account named "personal".
/// Kinds are matched exactly, case included.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountKind(String);

impl AccountKind {
    /// Create a new account kind.
    pub fn new(kind: impl Into<String>) -> Self {
        Self(kind.into())
    }

    /// Get the account kind as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AccountKind {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for AccountKind {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Full account identity.
///
/// An account is uniquely identified by its (name, kind) pair; two identities
/// are equal iff both fields match exactly.
///
/// # Examples
///
/// ```
/// use credbroker_core::AccountId;
///
/// let a = AccountId::new("alice", "com.example.app");
/// let b = AccountId::new("alice", "com.example.app");
/// assert_eq!(a, b);
///
/// let c = AccountId::new("Alice", "com.example.app");
/// assert_ne!(a, c);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId {
    /// The account name within its kind.
    pub name: AccountName,

    /// The kind (owning application namespace) of the account.
    pub kind: AccountKind,
}

impl AccountId {
    /// Create a new account identity.
    pub fn new(name: impl Into<AccountName>, kind: impl Into<AccountKind>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
        }
    }

    /// Create a unique storage key for this account.
    ///
    /// Keys follow the pattern: `{kind}/{name}`
    pub fn key(&self) -> String {
        format!("{}/{}", self.kind, self.name)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.name)
    }
}

/// Registry entry for a configured account.
///
/// Holds the non-secret half of an account: identity, user data, and
/// timestamps. Password material is kept in the secret store and never
/// appears in this record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// The identity of the account this record belongs to.
    pub id: AccountId,

    /// Free-form string key/value pairs attached at registration.
    #[serde(default)]
    pub user_data: HashMap<String, String>,

    /// When the account was first registered.
    pub created_at: DateTime<Utc>,

    /// When a token was last issued for the account.
    pub last_used: Option<DateTime<Utc>>,
}

impl CredentialRecord {
    /// Create a new record with the current timestamp.
    pub fn new(id: AccountId, user_data: HashMap<String, String>) -> Self {
        Self {
            id,
            user_data,
            created_at: Utc::now(),
            last_used: None,
        }
    }
}

/// Cache key for access tokens.
///
/// Tokens are scoped per account *and* per token type, so one account can
/// hold e.g. a "bearer" and a "refresh" token side by side.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenKey {
    /// The account the token belongs to.
    pub account: AccountId,

    /// The token type requested by the caller (e.g., "bearer").
    pub token_type: String,
}

impl TokenKey {
    /// Create a new token key.
    pub fn new(account: AccountId, token_type: impl Into<String>) -> Self {
        Self {
            account,
            token_type: token_type.into(),
        }
    }
}

impl fmt::Display for TokenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.account, self.token_type)
    }
}

/// An access token handed back to facade callers.
///
/// Pairs the token value with the type it was requested under, mirroring
/// what transports marshal back to the application layer.
#[derive(Debug, Clone)]
pub struct AccessToken {
    /// The token type the caller asked for.
    pub token_type: String,

    /// The token value.
    pub value: Secret,
}
