//! # Credbroker Core
//!
//! Core library for the credbroker account and credential broker.
//!
//! This crate provides:
//! - Domain types for account identities, credential records, and tokens
//! - A durable account registry with secret-store-backed password material
//! - A per-key token cache with lazy expiry eviction
//! - A single-flight token issuer coalescing concurrent mints per key
//! - A sync authority registry with read-back setters
//! - The [`Broker`] facade composing all of the above behind one validated
//!   operation surface
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use credbroker_core::{AccountId, Broker, NewAccount};
//!
//! async fn issue(broker: &Broker) -> Result<(), credbroker_core::BrokerError> {
//!     let id = AccountId::new("alice", "com.example.app");
//!     broker.add_account(NewAccount::new("alice", "com.example.app")).await?;
//!     let token = broker.try_access_token(&id, "bearer", None).await?;
//!     println!("token type: {}", token.token_type);
//!     Ok(())
//! }
//! ```

pub mod model;
pub mod store;
pub mod error;
pub mod account_store;
pub mod token_cache;
pub mod token_issuer;
pub mod sync_registry;
pub mod provider;
pub mod broker;
pub mod config;

// Re-export commonly used types at crate root
pub use model::{
    AccessToken,
    AccountId,
    AccountKind,
    AccountName,
    CredentialRecord,
    TokenKey,
};

pub use store::{
    Secret,
    SecretStore,
    StoreError,
    MemoryStore,
    create_store,
};

#[cfg(feature = "keyring-store")]
pub use store::KeyringStore;

pub use account_store::{
    AccountStore,
    AccountError,
};

pub use token_cache::{
    CachedToken,
    TokenCache,
};

pub use token_issuer::{
    IssueError,
    TokenIssuer,
};

pub use sync_registry::{
    SyncRegistry,
    SyncState,
};

pub use provider::{
    CredentialProvider,
    MintedToken,
    ProviderError,
};

pub use broker::{
    Broker,
    NewAccount,
};

pub use config::{
    BrokerConfig,
    ConfigError,
    load_config,
};

pub use error::BrokerError;
