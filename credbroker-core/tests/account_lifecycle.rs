//! Integration tests for account lifecycle operations.
//!
//! These tests verify the end-to-end behavior of the broker facade:
//! - Adding accounts (including duplicate handling)
//! - Listing accounts
//! - Password and user-data access
//! - Removing accounts and the delete cascade
//! - Registry persistence across reloads

use credbroker_core::{
    AccountId, AccountStore, Broker, BrokerError, CredentialProvider, MemoryStore, MintedToken,
    NewAccount, ProviderError,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

/// Provider that counts how often it is asked to mint.
struct CountingProvider {
    mints: AtomicUsize,
}

impl CountingProvider {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            mints: AtomicUsize::new(0),
        })
    }

    fn mint_count(&self) -> usize {
        self.mints.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl CredentialProvider for CountingProvider {
    async fn mint(
        &self,
        account: &AccountId,
        token_type: &str,
    ) -> Result<MintedToken, ProviderError> {
        self.mints.fetch_add(1, Ordering::SeqCst);
        Ok(MintedToken::new(format!("tok-{}-{}", account, token_type)))
    }
}

/// Helper to create a broker backed by a temporary registry.
fn test_broker(provider: Arc<CountingProvider>) -> (Broker, TempDir) {
    let temp = TempDir::new().unwrap();
    let accounts = AccountStore::load_from_path(
        temp.path().join("accounts.json"),
        Box::new(MemoryStore::new()),
    )
    .unwrap();
    (Broker::new(accounts, provider), temp)
}

fn alice() -> AccountId {
    AccountId::new("alice", "app")
}

#[tokio::test]
async fn test_add_account_happy_path() {
    let (broker, _temp) = test_broker(CountingProvider::new());

    let added = broker
        .add_account(NewAccount::new("alice", "app").with_password("p1"))
        .await
        .unwrap();

    assert!(added, "Should successfully add account");
    assert_eq!(broker.accounts(), vec![alice()]);
    assert_eq!(broker.password(&alice()).await.unwrap().expose(), "p1");
}

#[tokio::test]
async fn test_add_twice_second_returns_false() {
    let (broker, _temp) = test_broker(CountingProvider::new());

    assert!(broker.add_account(NewAccount::new("alice", "app")).await.unwrap());
    assert!(!broker.add_account(NewAccount::new("alice", "app")).await.unwrap());

    assert_eq!(
        broker.accounts().len(),
        1,
        "Store should still have exactly one record"
    );
}

#[tokio::test]
async fn test_remove_nonexistent_has_no_side_effects() {
    let (broker, _temp) = test_broker(CountingProvider::new());

    broker.add_account(NewAccount::new("bob", "app")).await.unwrap();

    let removed = broker.remove_account(&alice()).await.unwrap();

    assert!(!removed, "Should return false for nonexistent account");
    assert_eq!(broker.accounts().len(), 1, "Other accounts untouched");
}

#[tokio::test]
async fn test_full_lifecycle_scenario() {
    // add -> duplicate add -> getPassword -> remove -> getPassword
    let (broker, _temp) = test_broker(CountingProvider::new());
    let id = alice();

    assert!(broker
        .add_account(NewAccount::new("alice", "app").with_password("p1"))
        .await
        .unwrap());
    assert!(!broker
        .add_account(NewAccount::new("alice", "app").with_password("p2"))
        .await
        .unwrap());

    assert_eq!(broker.password(&id).await.unwrap().expose(), "p1");

    assert!(broker.remove_account(&id).await.unwrap());

    let result = broker.password(&id).await;
    assert!(matches!(result, Err(BrokerError::NotFound { .. })));
}

#[tokio::test]
async fn test_remove_cascades_tokens_and_sync_state() {
    let provider = CountingProvider::new();
    let (broker, _temp) = test_broker(provider.clone());
    let id = alice();

    broker.add_account(NewAccount::new("alice", "app")).await.unwrap();
    broker.access_token(&id, "bearer").await.unwrap();
    broker.set_access_token(&id, "manual", "tok").unwrap();
    broker.set_is_syncable(&id, "contacts", true).unwrap();
    broker.set_sync_automatically(&id, "contacts", true).unwrap();
    assert_eq!(provider.mint_count(), 1);

    assert!(broker.remove_account(&id).await.unwrap());

    // Re-register the same identity: nothing from the previous life may
    // leak through.
    broker.add_account(NewAccount::new("alice", "app")).await.unwrap();

    assert!(!broker.is_syncable(&id, "contacts").unwrap());
    assert!(!broker.sync_automatically(&id, "contacts").unwrap());

    let token = broker.access_token(&id, "bearer").await.unwrap();
    assert!(token.value.expose().starts_with("tok-"));
    assert_eq!(
        provider.mint_count(),
        2,
        "Cached token must not survive removal"
    );
    assert!(broker.access_token(&id, "manual").await.is_some());
    assert_eq!(
        provider.mint_count(),
        3,
        "Manually set token must not survive removal"
    );
}

#[tokio::test]
async fn test_user_data_access() {
    let (broker, _temp) = test_broker(CountingProvider::new());
    let id = alice();

    let mut user_data = HashMap::new();
    user_data.insert("display_name".to_string(), "Alice".to_string());

    broker
        .add_account(NewAccount::new("alice", "app").with_user_data(user_data))
        .await
        .unwrap();

    assert_eq!(broker.user_data(&id, "display_name").unwrap(), "Alice");

    let missing = broker.user_data(&id, "missing");
    assert!(matches!(missing, Err(BrokerError::NoSuchKey { .. })));

    let unknown = broker.user_data(&AccountId::new("bob", "app"), "display_name");
    assert!(matches!(unknown, Err(BrokerError::NotFound { .. })));
}

#[tokio::test]
async fn test_set_user_data_and_password() {
    let (broker, _temp) = test_broker(CountingProvider::new());
    let id = alice();

    broker.add_account(NewAccount::new("alice", "app")).await.unwrap();

    let no_password = broker.password(&id).await;
    assert!(matches!(no_password, Err(BrokerError::NoPassword { .. })));

    assert!(broker.set_password(&id, "p2").await.unwrap());
    assert_eq!(broker.password(&id).await.unwrap().expose(), "p2");

    assert!(broker.set_user_data(&id, "theme", "dark").unwrap());
    assert_eq!(broker.user_data(&id, "theme").unwrap(), "dark");
}

#[tokio::test]
async fn test_registry_persists_across_reload() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("accounts.json");

    {
        let accounts =
            AccountStore::load_from_path(path.clone(), Box::new(MemoryStore::new())).unwrap();
        let broker = Broker::new(accounts, CountingProvider::new());

        broker.add_account(NewAccount::new("alice", "app")).await.unwrap();
        broker.add_account(NewAccount::new("bob", "app")).await.unwrap();
    }

    {
        let accounts = AccountStore::load_from_path(path, Box::new(MemoryStore::new())).unwrap();
        let broker = Broker::new(accounts, CountingProvider::new());

        assert_eq!(
            broker.accounts(),
            vec![alice(), AccountId::new("bob", "app")]
        );
    }
}

#[tokio::test]
async fn test_sync_read_back_toggling() {
    let (broker, _temp) = test_broker(CountingProvider::new());
    let id = alice();

    assert!(broker.set_is_syncable(&id, "contacts", true).unwrap());
    assert!(broker.is_syncable(&id, "contacts").unwrap());

    assert!(!broker.set_is_syncable(&id, "contacts", false).unwrap());
    assert!(!broker.is_syncable(&id, "contacts").unwrap());
}
