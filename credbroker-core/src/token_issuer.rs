//! Single-flight token issuance.
//!
//! This module provides [`TokenIssuer`], which obtains a valid access token
//! for a [`TokenKey`]: from the [`TokenCache`] when a live entry exists,
//! otherwise by minting through the external [`CredentialProvider`], with at
//! most one in-flight mint per key no matter how many callers ask
//! concurrently.
//!
//! # Coalescing protocol
//!
//! The issuer keeps an in-flight table keyed by [`TokenKey`]. The first
//! caller to miss the cache installs a `watch` channel and becomes the
//! winner; it performs the mint under a bounded timeout and publishes the
//! result (success or failure) to the channel. Every other caller finds the
//! channel in the table and awaits the published value instead of minting.
//! The table entry is removed by an RAII guard, so a winner that is dropped
//! mid-mint cannot wedge the key: its waiters observe the closed channel and
//! re-enter the protocol from the cache check.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::timeout;

use crate::account_store::AccountStore;
use crate::model::TokenKey;
use crate::provider::{CredentialProvider, ProviderError};
use crate::token_cache::{CachedToken, TokenCache};

/// Default bound on a single provider mint call.
pub const DEFAULT_MINT_TIMEOUT: Duration = Duration::from_secs(10);

/// Error type for token issuance.
///
/// Cloneable: the winner's failure is handed to every coalesced waiter
/// verbatim.
#[derive(Debug, Clone, Error)]
pub enum IssueError {
    /// No account matches the token key's identity.
    #[error("account {account} not found")]
    NotFound { account: String },

    /// The external provider failed to mint.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// A deadline elapsed, either around the provider call or while waiting
    /// on another caller's in-flight mint.
    #[error("timed out during {operation}")]
    Timeout { operation: String },
}

type MintResult = Result<CachedToken, IssueError>;

/// Coalescing token issuer.
///
/// Cheap to share: hold it in an `Arc` alongside the cache and account store
/// it composes.
pub struct TokenIssuer {
    accounts: Arc<AccountStore>,
    cache: Arc<TokenCache>,
    provider: Arc<dyn CredentialProvider>,
    mint_timeout: Duration,
    inflight: Mutex<HashMap<TokenKey, watch::Receiver<Option<MintResult>>>>,
}

/// Removes the in-flight entry for a key when the winner finishes or is
/// dropped mid-mint.
struct InflightGuard<'a> {
    issuer: &'a TokenIssuer,
    key: &'a TokenKey,
}

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        self.issuer.inflight.lock().remove(self.key);
    }
}

/// What a caller turned out to be for one pass of the protocol.
enum Role {
    Winner(watch::Sender<Option<MintResult>>),
    Waiter(watch::Receiver<Option<MintResult>>),
}

impl TokenIssuer {
    /// Create a new issuer with the default mint timeout.
    pub fn new(
        accounts: Arc<AccountStore>,
        cache: Arc<TokenCache>,
        provider: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self::with_mint_timeout(accounts, cache, provider, DEFAULT_MINT_TIMEOUT)
    }

    /// Create a new issuer with a custom bound on provider mint calls.
    pub fn with_mint_timeout(
        accounts: Arc<AccountStore>,
        cache: Arc<TokenCache>,
        provider: Arc<dyn CredentialProvider>,
        mint_timeout: Duration,
    ) -> Self {
        Self {
            accounts,
            cache,
            provider,
            mint_timeout,
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Get a valid token for the key, minting through the provider on a miss.
    ///
    /// `deadline` bounds how long this caller is willing to wait on another
    /// caller's in-flight mint; when it elapses the caller fails locally with
    /// [`IssueError::Timeout`] without cancelling the mint or disturbing
    /// other waiters. The winner's own provider call is bounded by the
    /// issuer's mint timeout regardless of `deadline`.
    pub async fn get_or_mint(
        &self,
        key: &TokenKey,
        deadline: Option<Duration>,
    ) -> Result<CachedToken, IssueError> {
        loop {
            if let Some(token) = self.cache.get(key) {
                tracing::debug!("using cached token for {}", key);
                return Ok(token);
            }

            let role = {
                let mut inflight = self.inflight.lock();
                match inflight.get(key) {
                    Some(rx) => Role::Waiter(rx.clone()),
                    None => {
                        let (tx, rx) = watch::channel(None);
                        inflight.insert(key.clone(), rx);
                        Role::Winner(tx)
                    }
                }
            };

            match role {
                Role::Winner(tx) => {
                    let _guard = InflightGuard { issuer: self, key };
                    let result = self.mint(key).await;
                    // The table still holds a receiver, so the send cannot fail
                    // before the guard drops.
                    let _ = tx.send(Some(result.clone()));
                    return result;
                }
                Role::Waiter(rx) => match self.await_winner(key, rx, deadline).await? {
                    Some(result) => return result,
                    // Winner dropped without publishing; start over.
                    None => continue,
                },
            }
        }
    }

    /// Wait for the in-flight winner to publish.
    ///
    /// Returns `Ok(None)` if the winner was dropped before publishing, and
    /// `Err(Timeout)` if the caller's own deadline elapsed first.
    async fn await_winner(
        &self,
        key: &TokenKey,
        mut rx: watch::Receiver<Option<MintResult>>,
        deadline: Option<Duration>,
    ) -> Result<Option<MintResult>, IssueError> {
        tracing::debug!("joining in-flight mint for {}", key);

        let wait = async {
            loop {
                if let Some(result) = rx.borrow_and_update().clone() {
                    return Some(result);
                }
                if rx.changed().await.is_err() {
                    // Sender gone; pick up a value published right before the
                    // drop, if any.
                    return rx.borrow().clone();
                }
            }
        };

        match deadline {
            Some(limit) => timeout(limit, wait).await.map_err(|_| IssueError::Timeout {
                operation: "wait for in-flight mint".to_string(),
            }),
            None => Ok(wait.await),
        }
    }

    /// Perform the actual mint: validate the account, call the provider under
    /// the mint timeout, and cache the result.
    async fn mint(&self, key: &TokenKey) -> MintResult {
        if !self.accounts.contains(&key.account) {
            return Err(IssueError::NotFound {
                account: key.account.to_string(),
            });
        }

        tracing::info!("minting token for {}", key);

        let minted = match timeout(
            self.mint_timeout,
            self.provider.mint(&key.account, &key.token_type),
        )
        .await
        {
            Ok(Ok(minted)) => minted,
            Ok(Err(e)) => {
                tracing::error!("provider failed to mint token for {}: {}", key, e);
                return Err(IssueError::Provider(e));
            }
            Err(_) => {
                tracing::error!(
                    "mint for {} exceeded {:?} timeout",
                    key,
                    self.mint_timeout
                );
                return Err(IssueError::Timeout {
                    operation: "mint".to_string(),
                });
            }
        };

        let mut token = CachedToken::new(minted.value);
        if let Some(expires_at) = minted.expires_at {
            token = token.with_expiry(expires_at);
        }

        self.cache.put(key.clone(), token.clone());

        if let Err(e) = self.accounts.touch(&key.account) {
            // The token is already issued; a bookkeeping failure (account
            // racing removal, registry I/O) must not fail the mint.
            tracing::warn!("failed to record token use for {}: {}", key.account, e);
        }

        Ok(token)
    }

    /// The configured bound on provider mint calls.
    pub fn mint_timeout(&self) -> Duration {
        self.mint_timeout
    }
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("mint_timeout", &self.mint_timeout)
            .field("inflight", &self.inflight.lock().len())
            .finish()
    }
}
