//! External credential provider contract.
//!
//! This module provides:
//! - [`CredentialProvider`] - Trait the token issuer mints through
//! - [`MintedToken`] - A freshly issued token value with optional expiry
//! - [`ProviderError`] - Failures reported by the provider
//!
//! The provider represents the network/identity-provider call that actually
//! authenticates and issues a token. It is a fixed external interface: the
//! broker never retries a failed mint on its own, and enforces its timeout
//! around the returned future.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::AccountId;
use crate::store::Secret;

/// Error type for provider mint operations.
///
/// Cloneable so one failure can be fanned out verbatim to every caller
/// coalesced on the same mint.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// The provider rejected the credentials for this account.
    #[error("authentication denied: {message}")]
    Denied { message: String },

    /// The provider could not be reached.
    #[error("provider unavailable: {message}")]
    Unavailable { message: String },

    /// Any other provider-side failure.
    #[error("provider failure: {message}")]
    Failed { message: String },
}

/// A freshly minted token.
#[derive(Debug, Clone)]
pub struct MintedToken {
    /// The token value.
    pub value: Secret,

    /// When this token expires (None if the provider didn't say).
    pub expires_at: Option<DateTime<Utc>>,
}

impl MintedToken {
    /// Create a new minted token without an expiry.
    pub fn new(value: impl Into<Secret>) -> Self {
        Self {
            value: value.into(),
            expires_at: None,
        }
    }

    /// Create a minted token with an expiration time.
    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }
}

/// Trait for the external credential provider the issuer mints through.
///
/// # Example
///
/// ```rust,ignore
/// use credbroker_core::provider::{CredentialProvider, MintedToken, ProviderError};
///
/// struct StaticProvider;
///
/// #[async_trait::async_trait]
/// impl CredentialProvider for StaticProvider {
///     async fn mint(
///         &self,
///         account: &credbroker_core::AccountId,
///         token_type: &str,
///     ) -> Result<MintedToken, ProviderError> {
///         Ok(MintedToken::new(format!("{}-{}", account, token_type)))
///     }
/// }
/// ```
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Authenticate the account and issue a token of the requested type.
    async fn mint(
        &self,
        account: &AccountId,
        token_type: &str,
    ) -> Result<MintedToken, ProviderError>;
}
