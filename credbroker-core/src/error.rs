//! Top-level error taxonomy for credbroker.
//!
//! Facade operations return [`BrokerError`]; component-level errors
//! ([`AccountError`], [`IssueError`], [`StoreError`], [`ConfigError`])
//! convert into it so callers see one taxonomy.

use thiserror::Error;

use crate::account_store::AccountError;
use crate::config::ConfigError;
use crate::store::StoreError;
use crate::token_issuer::IssueError;

/// Unified error type for broker facade operations.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// Malformed identity, authority, or key input. Rejected before any
    /// store is touched.
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    /// No account matches the given identity.
    #[error("account {account} not found")]
    NotFound { account: String },

    /// The account exists but has no password set.
    #[error("no password set for account {account}")]
    NoPassword { account: String },

    /// The account exists but has no user data under the given key.
    #[error("no user data under key {key:?}")]
    NoSuchKey { key: String },

    /// The external credential provider failed to mint a token.
    #[error("provider error: {message}")]
    Provider { message: String },

    /// A deadline elapsed waiting for a mint or for an in-flight waiter.
    #[error("timed out during {operation}")]
    Timeout { operation: String },

    /// Error from secret storage.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Error loading or parsing configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Registry persistence error (I/O, serialization).
    #[error("account registry error: {0}")]
    Registry(AccountError),
}

impl From<AccountError> for BrokerError {
    fn from(e: AccountError) -> Self {
        match e {
            AccountError::NotFound { account } => Self::NotFound { account },
            AccountError::NoPassword { account } => Self::NoPassword { account },
            AccountError::NoSuchKey { key, .. } => Self::NoSuchKey { key },
            AccountError::Store(e) => Self::Store(e),
            other => Self::Registry(other),
        }
    }
}

impl From<IssueError> for BrokerError {
    fn from(e: IssueError) -> Self {
        match e {
            IssueError::NotFound { account } => Self::NotFound { account },
            IssueError::Provider(e) => Self::Provider {
                message: e.to_string(),
            },
            IssueError::Timeout { operation } => Self::Timeout { operation },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_error_mapping() {
        let e: BrokerError = AccountError::NotFound {
            account: "com.example.app/alice".to_string(),
        }
        .into();
        assert!(matches!(e, BrokerError::NotFound { .. }));

        let e: BrokerError = AccountError::NoSuchKey {
            account: "com.example.app/alice".to_string(),
            key: "theme".to_string(),
        }
        .into();
        assert!(matches!(e, BrokerError::NoSuchKey { .. }));
    }

    #[test]
    fn test_issue_error_mapping() {
        let e: BrokerError = IssueError::Timeout {
            operation: "mint".to_string(),
        }
        .into();
        assert!(matches!(e, BrokerError::Timeout { .. }));
    }
}
