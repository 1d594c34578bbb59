//! Account registry persistence.
//!
//! This module provides disk-backed storage for account records using JSON
//! serialization and platform-specific configuration directories. Password
//! material is never written to the registry file; it is delegated to the
//! [`SecretStore`] the store is constructed with.
//!
//! # Storage Location
//!
//! Records are stored at `~/.config/credbroker/accounts.json` on Linux/macOS
//! and `%APPDATA%\credbroker\accounts.json` on Windows.
//!
//! # Example
//!
//! ```rust,ignore
//! use credbroker_core::account_store::AccountStore;
//! use credbroker_core::{AccountId, store::create_store};
//!
//! let store = AccountStore::load(create_store(true))?;
//! let id = AccountId::new("alice", "com.example.app");
//! store.add(id, Some("hunter2".into()), Default::default()).await?;
//! ```

use crate::model::{AccountId, CredentialRecord};
use crate::store::{Secret, SecretStore, StoreError};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

/// Error type for account store operations.
#[derive(Debug, Error)]
pub enum AccountError {
    /// No account matches the given identity.
    #[error("account {account} not found")]
    NotFound { account: String },

    /// The account exists but has no password set.
    #[error("no password set for account {account}")]
    NoPassword { account: String },

    /// The account exists but has no user data under the given key.
    #[error("no user data under key {key:?} for account {account}")]
    NoSuchKey { account: String, key: String },

    /// I/O error reading or writing the registry.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error from the secret store backing password material.
    #[error("secret store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration directory not available.
    #[error("configuration directory not available")]
    ConfigDirUnavailable,
}

/// Internal storage format for the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RegistryData {
    /// Version of the registry format (for future migrations).
    version: u32,

    /// All stored account records, in insertion order.
    accounts: Vec<CredentialRecord>,
}

impl Default for RegistryData {
    fn default() -> Self {
        Self {
            version: 1,
            accounts: Vec::new(),
        }
    }
}

/// Disk-backed account registry.
///
/// Owns the mapping from [`AccountId`] to [`CredentialRecord`] and enforces
/// identity uniqueness: at most one record per identity, never overwritten.
///
/// # Thread Safety
///
/// This implementation uses interior mutability via `RwLock` and is safe to
/// share across threads via `Arc`. The lock is never held across an await;
/// secret-store calls happen after registry mutations are flushed.
pub struct AccountStore {
    /// Path to the registry JSON file.
    path: PathBuf,

    /// In-memory cache of registry data.
    data: RwLock<RegistryData>,

    /// Backend holding password material, keyed per account.
    secrets: Box<dyn SecretStore>,
}

impl AccountStore {
    /// Get the default storage path for the registry.
    pub fn default_path() -> Result<PathBuf, AccountError> {
        let dirs = directories::ProjectDirs::from("dev", "credbroker", "credbroker")
            .ok_or(AccountError::ConfigDirUnavailable)?;

        Ok(dirs.config_dir().join("accounts.json"))
    }

    /// Load the registry from the default location.
    ///
    /// Creates the file and parent directories if they don't exist.
    pub fn load(secrets: Box<dyn SecretStore>) -> Result<Self, AccountError> {
        let path = Self::default_path()?;
        Self::load_from_path(path, secrets)
    }

    /// Load the registry from a specific path.
    ///
    /// Creates the file and parent directories if they don't exist.
    pub fn load_from_path(
        path: PathBuf,
        secrets: Box<dyn SecretStore>,
    ) -> Result<Self, AccountError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let data = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            RegistryData::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
            secrets,
        })
    }

    /// Save the current state to disk.
    fn save(&self) -> Result<(), AccountError> {
        let data = self.data.read();
        let contents = serde_json::to_string_pretty(&*data)?;
        fs::write(&self.path, contents)?;

        Ok(())
    }

    /// Storage key for an account's password in the secret store.
    fn password_key(id: &AccountId) -> String {
        format!("credbroker/{}/{}/password", id.kind, id.name)
    }

    /// Register a new account.
    ///
    /// Returns `Ok(false)` without touching anything if an account with the
    /// same identity already exists; existing records are never overwritten.
    pub async fn add(
        &self,
        id: AccountId,
        password: Option<Secret>,
        user_data: HashMap<String, String>,
    ) -> Result<bool, AccountError> {
        {
            let mut data = self.data.write();

            if data.accounts.iter().any(|r| r.id == id) {
                tracing::debug!("account {} already exists, not overwriting", id);
                return Ok(false);
            }

            data.accounts.push(CredentialRecord::new(id.clone(), user_data));
        }

        self.save()?;

        if let Some(password) = password {
            self.secrets.set(&Self::password_key(&id), &password).await?;
        }

        tracing::info!("registered account {}", id);
        Ok(true)
    }

    /// Remove an account and its password material.
    ///
    /// Returns `Ok(true)` if a record was deleted, `Ok(false)` if no account
    /// matched. Removal of an absent account has no side effects.
    pub async fn remove(&self, id: &AccountId) -> Result<bool, AccountError> {
        {
            let mut data = self.data.write();

            let initial_len = data.accounts.len();
            data.accounts.retain(|r| &r.id != id);

            if data.accounts.len() == initial_len {
                return Ok(false);
            }
        }

        self.save()?;
        self.secrets.delete(&Self::password_key(id)).await?;

        tracing::info!("removed account {}", id);
        Ok(true)
    }

    /// List all account identities.
    ///
    /// Returns a snapshot in insertion order.
    pub fn list(&self) -> Vec<AccountId> {
        self.data.read().accounts.iter().map(|r| r.id.clone()).collect()
    }

    /// Look up the record for an account.
    ///
    /// Returns `None` if the account doesn't exist.
    pub fn find(&self, id: &AccountId) -> Option<CredentialRecord> {
        self.data.read().accounts.iter().find(|r| &r.id == id).cloned()
    }

    /// Check whether an account is registered.
    pub fn contains(&self, id: &AccountId) -> bool {
        self.data.read().accounts.iter().any(|r| &r.id == id)
    }

    /// Get the password for an account.
    pub async fn password(&self, id: &AccountId) -> Result<Secret, AccountError> {
        if !self.contains(id) {
            return Err(AccountError::NotFound {
                account: id.to_string(),
            });
        }

        self.secrets
            .get(&Self::password_key(id))
            .await?
            .ok_or_else(|| AccountError::NoPassword {
                account: id.to_string(),
            })
    }

    /// Replace the password for an account.
    ///
    /// Returns `Ok(false)` if the account doesn't exist.
    pub async fn set_password(&self, id: &AccountId, password: Secret) -> Result<bool, AccountError> {
        if !self.contains(id) {
            return Ok(false);
        }

        self.secrets.set(&Self::password_key(id), &password).await?;
        Ok(true)
    }

    /// Get a user-data value for an account.
    pub fn user_data(&self, id: &AccountId, key: &str) -> Result<String, AccountError> {
        let data = self.data.read();

        let record = data
            .accounts
            .iter()
            .find(|r| &r.id == id)
            .ok_or_else(|| AccountError::NotFound {
                account: id.to_string(),
            })?;

        record
            .user_data
            .get(key)
            .cloned()
            .ok_or_else(|| AccountError::NoSuchKey {
                account: id.to_string(),
                key: key.to_string(),
            })
    }

    /// Upsert a single user-data key for an account.
    ///
    /// Returns `Ok(false)` if the account doesn't exist.
    pub fn set_user_data(
        &self,
        id: &AccountId,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<bool, AccountError> {
        {
            let mut data = self.data.write();

            let Some(record) = data.accounts.iter_mut().find(|r| &r.id == id) else {
                return Ok(false);
            };

            record.user_data.insert(key.into(), value.into());
        }

        self.save()?;
        Ok(true)
    }

    /// Update the last_used timestamp for an account.
    ///
    /// Called when a token is issued for the account.
    pub fn touch(&self, id: &AccountId) -> Result<(), AccountError> {
        {
            let mut data = self.data.write();

            let record = data
                .accounts
                .iter_mut()
                .find(|r| &r.id == id)
                .ok_or_else(|| AccountError::NotFound {
                    account: id.to_string(),
                })?;

            record.last_used = Some(chrono::Utc::now());
        }

        self.save()
    }

    /// Get the storage path for this store.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl std::fmt::Debug for AccountStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountStore")
            .field("path", &self.path)
            .field("accounts", &self.data.read().accounts.len())
            .finish()
    }
}
