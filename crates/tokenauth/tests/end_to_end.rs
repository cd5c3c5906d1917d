//! End-to-end tests: issuing and validating tokens against the sled store.
//!
//! These tests exercise the full pipeline from audience creation through
//! expiry: the persistent backend, the janitor sweep, store replacement and
//! races between validation and the sweep.
#![allow(clippy::expect_used, clippy::panic)]

use std::{sync::Arc, time::Duration};

use tempfile::TempDir;
use tokenauth::{
    AuthError, DEFAULT_BACKEND, DefaultProvider, TokenAuth, ValidationError, default_registry,
};
use tokenauth_store::{JanitorConfig, StoreConfig, TokenStore};
use tokenauth_store_sled::SledTokenStore;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn config_in(dir: &TempDir, name: &str) -> StoreConfig {
    StoreConfig::builder().path(dir.path().join(name)).build().expect("valid config")
}

async fn sled_auth(dir: &TempDir, token_period: u64) -> TokenAuth {
    let store = SledTokenStore::new();
    store.open(&config_in(dir, "tokens.db")).await.expect("open");
    TokenAuth::builder().store(Arc::new(store)).token_period(token_period).build()
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn audience_and_token_round_trip_on_disk() {
    let dir = TempDir::new().expect("tempdir");
    let auth = sled_auth(&dir, 60).await;
    let provider = DefaultProvider::default();

    let audience = auth.new_audience("billing", &provider).await.expect("audience");
    let token = auth.new_token(&audience, &provider).await.expect("token");

    let store = auth.store();
    assert_eq!(store.get_audience(&audience.id).await.expect("get"), Some(audience.clone()));
    assert_eq!(auth.validate_token(&token.value).await.expect("valid"), token);
    assert_eq!(store.list_audience_tokens(&audience.id).await.expect("list"), vec![token]);
}

#[tokio::test]
async fn expiry_is_reported_then_token_is_gone() {
    let dir = TempDir::new().expect("tempdir");
    let auth = sled_auth(&dir, 1).await;
    let provider = DefaultProvider::default();
    let audience = auth.new_audience("short", &provider).await.expect("audience");
    let token = auth.new_token(&audience, &provider).await.expect("token");

    assert!(auth.validate_token(&token.value).await.is_ok());
    tokio::time::sleep(Duration::from_millis(2_100)).await;

    let err = auth.validate_token(&token.value).await.expect_err("expired");
    assert_eq!(err.validation_error(), Some(ValidationError::TOKEN_EXPIRED));
    assert_eq!(err.expired_token().expect("stale record").value, token.value);

    let err = auth.validate_token(&token.value).await.expect_err("gone");
    assert_eq!(err.validation_error(), Some(ValidationError::INVALID_TOKEN));
}

#[tokio::test]
async fn deleting_audience_invalidates_its_tokens() {
    let dir = TempDir::new().expect("tempdir");
    let auth = sled_auth(&dir, 60).await;
    let provider = DefaultProvider::default();
    let audience = auth.new_audience("doomed", &provider).await.expect("audience");
    let mut values = Vec::new();
    for _ in 0..5 {
        values.push(auth.new_token(&audience, &provider).await.expect("token").value);
    }

    auth.store().delete_audience(&audience.id).await.expect("delete");
    for value in values {
        assert!(matches!(auth.validate_token(&value).await, Err(AuthError::InvalidToken)));
    }
}

#[tokio::test]
async fn replace_store_switches_databases() {
    let dir = TempDir::new().expect("tempdir");
    let first = Arc::new(SledTokenStore::new());
    first.open(&config_in(&dir, "first.db")).await.expect("open first");
    let auth = TokenAuth::builder().store(Arc::clone(&first) as Arc<dyn TokenStore>).build();
    let provider = DefaultProvider::default();
    let old = auth.new_audience("old", &provider).await.expect("audience");

    let second = SledTokenStore::new();
    second.open(&config_in(&dir, "second.db")).await.expect("open second");
    auth.replace_store(Arc::new(second)).await.expect("replace");

    assert!(!first.is_open());
    assert!(auth.store().get_audience(&old.id).await.expect("get").is_none());
    let new = auth.new_audience("new", &provider).await.expect("audience");
    assert!(auth.store().get_audience(&new.id).await.expect("get").is_some());
}

// ---------------------------------------------------------------------------
// Janitor
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn janitor_purges_expired_tokens() {
    let dir = TempDir::new().expect("tempdir");
    let registry = default_registry().expect("registry");
    let janitor =
        JanitorConfig::builder().interval(Duration::from_millis(300)).build().expect("config");
    let managed = registry
        .open_with_janitor(DEFAULT_BACKEND, &config_in(&dir, "swept.db"), janitor)
        .await
        .expect("open");
    let auth = TokenAuth::builder().store(managed.store()).token_period(1).build();
    let provider = DefaultProvider::default();

    let audience = auth.new_audience("swept", &provider).await.expect("audience");
    let token = auth.new_token(&audience, &provider).await.expect("token");
    let single = auth.new_single_token("user-1", &audience, &provider).await.expect("single");

    tokio::time::sleep(Duration::from_millis(2_600)).await;

    let store = auth.store();
    assert!(store.get_token(&token.value).await.expect("get").is_none());
    assert!(store.get_token(&single.value).await.expect("get").is_none());
    assert!(managed.janitor().expect("janitor").removed_count() >= 2);
    managed.close().await.expect("close");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn validation_racing_sweep_reports_expiry_or_absence() {
    let dir = TempDir::new().expect("tempdir");
    let auth = Arc::new(sled_auth(&dir, 1).await);
    let provider = DefaultProvider::default();
    let audience = auth.new_audience("race", &provider).await.expect("audience");
    let mut values = Vec::new();
    for _ in 0..20 {
        values.push(auth.new_token(&audience, &provider).await.expect("token").value);
    }
    tokio::time::sleep(Duration::from_millis(2_100)).await;

    let sweeper = {
        let store = auth.store();
        tokio::spawn(async move { store.delete_expired().await })
    };
    let mut checks = Vec::new();
    for value in values.clone() {
        let auth = Arc::clone(&auth);
        checks.push(tokio::spawn(async move { auth.validate_token(&value).await }));
    }

    for check in checks {
        match check.await.expect("join") {
            Err(AuthError::TokenExpired { .. } | AuthError::InvalidToken) => {},
            other => panic!("unexpected validation outcome: {other:?}"),
        }
    }
    sweeper.await.expect("join").expect("sweep");

    let store = auth.store();
    for value in values {
        assert!(store.get_token(&value).await.expect("get").is_none());
    }
    assert!(store.list_audience_tokens(&audience.id).await.expect("list").is_empty());
}
