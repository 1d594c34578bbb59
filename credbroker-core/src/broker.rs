//! The broker facade.
//!
//! [`Broker`] is the public operation surface transports bind to: account
//! registration and removal, password and user-data access, token issuance,
//! and sync authority configuration. It validates inputs before touching any
//! store, maps component errors into the unified [`BrokerError`] taxonomy,
//! and enforces the cascade on account removal.
//!
//! # Example
//!
//! ```rust,ignore
//! use credbroker_core::{Broker, NewAccount, load_config};
//! use std::sync::Arc;
//!
//! let config = load_config()?;
//! let broker = Broker::open(&config, provider)?;
//!
//! let added = broker
//!     .add_account(
//!         NewAccount::new("alice", "com.example.app")
//!             .with_password("hunter2")
//!             .with_authorities(vec!["contacts".into()]),
//!     )
//!     .await?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::account_store::AccountStore;
use crate::config::BrokerConfig;
use crate::error::BrokerError;
use crate::model::{AccessToken, AccountId, TokenKey};
use crate::provider::CredentialProvider;
use crate::store::{Secret, create_store};
use crate::sync_registry::SyncRegistry;
use crate::token_cache::{CachedToken, TokenCache};
use crate::token_issuer::{DEFAULT_MINT_TIMEOUT, TokenIssuer};

/// Parameters for registering an account.
///
/// # Example
///
/// ```
/// use credbroker_core::NewAccount;
///
/// let account = NewAccount::new("alice", "com.example.app")
///     .with_password("hunter2")
///     .with_authorities(vec!["contacts".to_string()]);
/// ```
#[derive(Debug, Clone)]
pub struct NewAccount {
    /// Identity of the account to register.
    pub id: AccountId,

    /// Password to associate with the account, if any.
    pub password: Option<Secret>,

    /// Initial user-data key/value pairs.
    pub user_data: HashMap<String, String>,

    /// Content authorities to mark syncable and auto-syncing on success.
    pub authorities: Vec<String>,
}

impl NewAccount {
    /// Start building a registration for the given identity.
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: AccountId::new(name.into(), kind.into()),
            password: None,
            user_data: HashMap::new(),
            authorities: Vec::new(),
        }
    }

    /// Set the password.
    pub fn with_password(mut self, password: impl Into<Secret>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the initial user data.
    pub fn with_user_data(mut self, user_data: HashMap<String, String>) -> Self {
        self.user_data = user_data;
        self
    }

    /// Set the content authorities configured on success.
    pub fn with_authorities(mut self, authorities: Vec<String>) -> Self {
        self.authorities = authorities;
        self
    }
}

/// The account and credential broker.
///
/// Composes the account store, token cache, token issuer, and sync registry
/// behind one validated surface. The underlying stores are private; the only
/// mutation paths are the operations declared here.
pub struct Broker {
    accounts: Arc<AccountStore>,
    cache: Arc<TokenCache>,
    issuer: TokenIssuer,
    sync: SyncRegistry,
}

impl Broker {
    /// Create a broker over a prepared account store, with the default mint
    /// timeout.
    pub fn new(accounts: AccountStore, provider: Arc<dyn CredentialProvider>) -> Self {
        Self::with_mint_timeout(accounts, provider, DEFAULT_MINT_TIMEOUT)
    }

    /// Create a broker with a custom bound on provider mint calls.
    pub fn with_mint_timeout(
        accounts: AccountStore,
        provider: Arc<dyn CredentialProvider>,
        mint_timeout: Duration,
    ) -> Self {
        let accounts = Arc::new(accounts);
        let cache = Arc::new(TokenCache::new());
        let issuer = TokenIssuer::with_mint_timeout(
            accounts.clone(),
            cache.clone(),
            provider,
            mint_timeout,
        );

        Self {
            accounts,
            cache,
            issuer,
            sync: SyncRegistry::new(),
        }
    }

    /// Open a broker from configuration: registry under the configured data
    /// directory, passwords in the preferred secret store backend.
    pub fn open(
        config: &BrokerConfig,
        provider: Arc<dyn CredentialProvider>,
    ) -> Result<Self, BrokerError> {
        let secrets = create_store(config.prefer_keyring);
        let accounts = AccountStore::load_from_path(config.accounts_path(), secrets)?;
        Ok(Self::with_mint_timeout(
            accounts,
            provider,
            config.mint_timeout(),
        ))
    }

    /// Register a new account.
    ///
    /// Returns `Ok(false)` if an account with the same identity already
    /// exists. On success, every requested authority is marked syncable and
    /// auto-syncing for the new account.
    pub async fn add_account(&self, new_account: NewAccount) -> Result<bool, BrokerError> {
        Self::validate_id(&new_account.id)?;
        for authority in &new_account.authorities {
            Self::validate_authority(authority)?;
        }

        let NewAccount {
            id,
            password,
            user_data,
            authorities,
        } = new_account;

        let added = self.accounts.add(id.clone(), password, user_data).await?;

        if added {
            for authority in &authorities {
                self.sync.set_syncable(&id, authority, true);
                self.sync.set_auto_sync(&id, authority, true);
            }
        }

        Ok(added)
    }

    /// List all registered account identities.
    pub fn accounts(&self) -> Vec<AccountId> {
        self.accounts.list()
    }

    /// Remove an account.
    ///
    /// Returns `Ok(true)` if the account existed. Removal cascades: the
    /// credential record, its password material, every cached token, and
    /// every sync registry row for the identity are deleted together.
    pub async fn remove_account(&self, id: &AccountId) -> Result<bool, BrokerError> {
        Self::validate_id(id)?;

        let removed = self.accounts.remove(id).await?;

        if removed {
            let tokens = self.cache.purge_account(id);
            let rows = self.sync.purge_account(id);
            tracing::debug!(
                "cascade for {}: {} cached tokens, {} sync rows",
                id,
                tokens,
                rows
            );
        }

        Ok(removed)
    }

    /// Get the password for an account.
    pub async fn password(&self, id: &AccountId) -> Result<Secret, BrokerError> {
        Self::validate_id(id)?;
        Ok(self.accounts.password(id).await?)
    }

    /// Replace the password for an account.
    ///
    /// Returns `Ok(false)` if the account doesn't exist.
    pub async fn set_password(
        &self,
        id: &AccountId,
        password: impl Into<Secret>,
    ) -> Result<bool, BrokerError> {
        Self::validate_id(id)?;
        Ok(self.accounts.set_password(id, password.into()).await?)
    }

    /// Get a user-data value for an account.
    pub fn user_data(&self, id: &AccountId, key: &str) -> Result<String, BrokerError> {
        Self::validate_id(id)?;
        Self::validate_key(key)?;
        Ok(self.accounts.user_data(id, key)?)
    }

    /// Upsert a single user-data key for an account.
    ///
    /// Returns `Ok(false)` if the account doesn't exist.
    pub fn set_user_data(
        &self,
        id: &AccountId,
        key: &str,
        value: impl Into<String>,
    ) -> Result<bool, BrokerError> {
        Self::validate_id(id)?;
        Self::validate_key(key)?;
        Ok(self.accounts.set_user_data(id, key, value.into())?)
    }

    /// Get an access token, minting through the provider on a cache miss.
    ///
    /// The full-taxonomy twin of [`access_token`](Self::access_token).
    /// `deadline` bounds how long this caller waits on another caller's
    /// in-flight mint.
    pub async fn try_access_token(
        &self,
        id: &AccountId,
        token_type: &str,
        deadline: Option<Duration>,
    ) -> Result<AccessToken, BrokerError> {
        Self::validate_id(id)?;
        Self::validate_token_type(token_type)?;

        let key = TokenKey::new(id.clone(), token_type);
        let token = self.issuer.get_or_mint(&key, deadline).await?;

        Ok(AccessToken {
            token_type: token_type.to_string(),
            value: token.value,
        })
    }

    /// Get an access token, or `None` if one could not be obtained.
    ///
    /// Legacy lossy boundary: every failure kind collapses to `None`. The
    /// discarded error is logged; callers that need it should use
    /// [`try_access_token`](Self::try_access_token).
    pub async fn access_token(&self, id: &AccountId, token_type: &str) -> Option<AccessToken> {
        match self.try_access_token(id, token_type, None).await {
            Ok(token) => Some(token),
            Err(e) => {
                tracing::warn!("could not obtain {} token for {}: {}", token_type, id, e);
                None
            }
        }
    }

    /// Manually store an access token for an account.
    ///
    /// The token has no expiry and stays cached until explicitly invalidated
    /// or the account is removed. Returns `Ok(false)` if the account doesn't
    /// exist; nothing is cached in that case.
    pub fn set_access_token(
        &self,
        id: &AccountId,
        token_type: &str,
        value: impl Into<Secret>,
    ) -> Result<bool, BrokerError> {
        Self::validate_id(id)?;
        Self::validate_token_type(token_type)?;

        if !self.accounts.contains(id) {
            return Ok(false);
        }

        self.cache
            .put(TokenKey::new(id.clone(), token_type), CachedToken::new(value.into()));
        Ok(true)
    }

    /// Drop a cached access token, forcing the next request to mint.
    ///
    /// Returns `Ok(true)` if a token was cached.
    pub fn invalidate_access_token(
        &self,
        id: &AccountId,
        token_type: &str,
    ) -> Result<bool, BrokerError> {
        Self::validate_id(id)?;
        Self::validate_token_type(token_type)?;

        Ok(self.cache.invalidate(&TokenKey::new(id.clone(), token_type)))
    }

    /// Mark an authority (not) syncable for an account.
    ///
    /// Returns the stored value read back after the write.
    pub fn set_is_syncable(
        &self,
        id: &AccountId,
        authority: &str,
        value: bool,
    ) -> Result<bool, BrokerError> {
        Self::validate_id(id)?;
        Self::validate_authority(authority)?;

        Ok(self.sync.set_syncable(id, authority, value))
    }

    /// Enable or disable automatic sync of an authority for an account.
    ///
    /// Returns the stored value read back after the write.
    pub fn set_sync_automatically(
        &self,
        id: &AccountId,
        authority: &str,
        value: bool,
    ) -> Result<bool, BrokerError> {
        Self::validate_id(id)?;
        Self::validate_authority(authority)?;

        Ok(self.sync.set_auto_sync(id, authority, value))
    }

    /// Whether an authority is syncable for an account.
    pub fn is_syncable(&self, id: &AccountId, authority: &str) -> Result<bool, BrokerError> {
        Self::validate_id(id)?;
        Self::validate_authority(authority)?;

        Ok(self.sync.is_syncable(id, authority))
    }

    /// Whether an authority syncs automatically for an account.
    pub fn sync_automatically(&self, id: &AccountId, authority: &str) -> Result<bool, BrokerError> {
        Self::validate_id(id)?;
        Self::validate_authority(authority)?;

        Ok(self.sync.auto_sync(id, authority))
    }

    fn validate_id(id: &AccountId) -> Result<(), BrokerError> {
        if id.name.as_str().is_empty() {
            return Err(BrokerError::InvalidArgument {
                message: "account name must not be empty".to_string(),
            });
        }
        if id.kind.as_str().is_empty() {
            return Err(BrokerError::InvalidArgument {
                message: "account kind must not be empty".to_string(),
            });
        }
        Ok(())
    }

    fn validate_authority(authority: &str) -> Result<(), BrokerError> {
        if authority.is_empty() {
            return Err(BrokerError::InvalidArgument {
                message: "authority must not be empty".to_string(),
            });
        }
        if authority.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(BrokerError::InvalidArgument {
                message: format!("authority {:?} contains invalid characters", authority),
            });
        }
        Ok(())
    }

    fn validate_token_type(token_type: &str) -> Result<(), BrokerError> {
        if token_type.is_empty() {
            return Err(BrokerError::InvalidArgument {
                message: "token type must not be empty".to_string(),
            });
        }
        Ok(())
    }

    fn validate_key(key: &str) -> Result<(), BrokerError> {
        if key.is_empty() {
            return Err(BrokerError::InvalidArgument {
                message: "user data key must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for Broker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broker")
            .field("accounts", &self.accounts)
            .field("cache", &self.cache)
            .field("sync", &self.sync)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{CredentialProvider, MintedToken, ProviderError};
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct StaticProvider;

    #[async_trait]
    impl CredentialProvider for StaticProvider {
        async fn mint(
            &self,
            account: &AccountId,
            token_type: &str,
        ) -> Result<MintedToken, ProviderError> {
            Ok(MintedToken::new(format!("minted-{}-{}", account, token_type)))
        }
    }

    fn test_broker() -> (Broker, TempDir) {
        let temp = TempDir::new().unwrap();
        let accounts = AccountStore::load_from_path(
            temp.path().join("accounts.json"),
            Box::new(MemoryStore::new()),
        )
        .unwrap();
        (Broker::new(accounts, Arc::new(StaticProvider)), temp)
    }

    fn alice() -> AccountId {
        AccountId::new("alice", "com.example.app")
    }

    #[tokio::test]
    async fn test_empty_identity_rejected_before_stores() {
        let (broker, _temp) = test_broker();

        let result = broker.add_account(NewAccount::new("", "com.example.app")).await;
        assert!(matches!(result, Err(BrokerError::InvalidArgument { .. })));

        let result = broker.add_account(NewAccount::new("alice", "")).await;
        assert!(matches!(result, Err(BrokerError::InvalidArgument { .. })));

        assert!(broker.accounts().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_authority_rejected() {
        let (broker, _temp) = test_broker();

        let result = broker
            .add_account(
                NewAccount::new("alice", "com.example.app")
                    .with_authorities(vec!["con tacts".to_string()]),
            )
            .await;
        assert!(matches!(result, Err(BrokerError::InvalidArgument { .. })));

        // Rejected before any store was touched
        assert!(broker.accounts().is_empty());

        let result = broker.set_is_syncable(&alice(), "", true);
        assert!(matches!(result, Err(BrokerError::InvalidArgument { .. })));
    }

    #[tokio::test]
    async fn test_add_account_configures_authorities() {
        let (broker, _temp) = test_broker();

        let added = broker
            .add_account(
                NewAccount::new("alice", "com.example.app")
                    .with_authorities(vec!["contacts".to_string(), "calendar".to_string()]),
            )
            .await
            .unwrap();
        assert!(added);

        assert!(broker.is_syncable(&alice(), "contacts").unwrap());
        assert!(broker.sync_automatically(&alice(), "contacts").unwrap());
        assert!(broker.is_syncable(&alice(), "calendar").unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_add_does_not_reconfigure_authorities() {
        let (broker, _temp) = test_broker();

        broker
            .add_account(NewAccount::new("alice", "com.example.app"))
            .await
            .unwrap();

        let added = broker
            .add_account(
                NewAccount::new("alice", "com.example.app")
                    .with_authorities(vec!["contacts".to_string()]),
            )
            .await
            .unwrap();
        assert!(!added);
        assert!(!broker.is_syncable(&alice(), "contacts").unwrap());
    }

    #[tokio::test]
    async fn test_remove_account_cascades_everything() {
        let (broker, _temp) = test_broker();
        let id = alice();

        broker
            .add_account(NewAccount::new("alice", "com.example.app").with_password("p1"))
            .await
            .unwrap();
        broker.set_access_token(&id, "bearer", "tok1").unwrap();
        broker.set_is_syncable(&id, "contacts", true).unwrap();

        assert!(broker.remove_account(&id).await.unwrap());

        assert!(broker.cache.is_empty());
        assert!(broker.sync.is_empty());
        assert!(matches!(
            broker.password(&id).await,
            Err(BrokerError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_set_access_token_unknown_account() {
        let (broker, _temp) = test_broker();

        let stored = broker.set_access_token(&alice(), "bearer", "tok1").unwrap();
        assert!(!stored);
        assert!(broker.cache.is_empty());
    }

    #[tokio::test]
    async fn test_manual_token_served_without_mint() {
        let (broker, _temp) = test_broker();
        let id = alice();

        broker
            .add_account(NewAccount::new("alice", "com.example.app"))
            .await
            .unwrap();
        broker.set_access_token(&id, "bearer", "manual").unwrap();

        let token = broker.access_token(&id, "bearer").await.unwrap();
        assert_eq!(token.value.expose(), "manual");
        assert_eq!(token.token_type, "bearer");
    }

    #[tokio::test]
    async fn test_invalidate_forces_fresh_mint() {
        let (broker, _temp) = test_broker();
        let id = alice();

        broker
            .add_account(NewAccount::new("alice", "com.example.app"))
            .await
            .unwrap();
        broker.set_access_token(&id, "bearer", "manual").unwrap();

        assert!(broker.invalidate_access_token(&id, "bearer").unwrap());

        let token = broker.access_token(&id, "bearer").await.unwrap();
        assert!(token.value.expose().starts_with("minted-"));
    }

    #[tokio::test]
    async fn test_access_token_unknown_account_is_none() {
        let (broker, _temp) = test_broker();

        assert!(broker.access_token(&alice(), "bearer").await.is_none());

        let result = broker.try_access_token(&alice(), "bearer", None).await;
        assert!(matches!(result, Err(BrokerError::NotFound { .. })));
    }
}
