#![allow(clippy::expect_used, clippy::panic)]
//! Integration tests for fail-point injection in the sled store.
//!
//! These tests require the `failpoints` feature:
//! ```bash
//! cargo test -p tokenauth-store-sled --features failpoints --test failpoint_tests
//! ```

use std::time::Duration;

use tempfile::TempDir;
use tokenauth_store::{StoreConfig, TokenStore, testutil::audience_with_period};
use tokenauth_store_sled::SledTokenStore;

async fn store_with_expiring_tokens(dir: &TempDir, count: usize) -> SledTokenStore {
    let store = SledTokenStore::new();
    let config = StoreConfig::builder().path(dir.path().join("fp.db")).build().expect("config");
    store.open(&config).await.expect("open");

    let audience = audience_with_period("fp", 1);
    store.save_audience(&audience).await.expect("save audience");
    let now = chrono::Utc::now().timestamp();
    for i in 0..count {
        let token = tokenauth_store::Token::for_audience(&audience, format!("fp-{i}"), now);
        store.save_token(&token).await.expect("save token");
    }
    tokio::time::sleep(Duration::from_millis(1_100)).await;
    store
}

#[tokio::test]
async fn sweep_failpoint_skips_every_token() {
    let dir = TempDir::new().expect("tempdir");
    let store = store_with_expiring_tokens(&dir, 3).await;

    let scenario = fail::FailScenario::setup();
    fail::cfg("sweep-delete-token", "return").expect("failed to configure fail point");

    let stats = store.delete_expired().await.expect("sweep is best-effort");
    assert_eq!(stats.scanned, 3);
    assert_eq!(stats.removed, 0);
    assert_eq!(stats.skipped, 3);
    assert_eq!(store.list_audience_tokens("fp").await.expect("list").len(), 3);

    scenario.teardown();

    let stats = store.delete_expired().await.expect("sweep");
    assert_eq!(stats.removed, 3, "next sweep should pick the tokens up");
    assert!(store.list_audience_tokens("fp").await.expect("list").is_empty());
}

#[tokio::test]
async fn sweep_failpoint_once_skips_one_token() {
    let dir = TempDir::new().expect("tempdir");
    let store = store_with_expiring_tokens(&dir, 3).await;

    let scenario = fail::FailScenario::setup();
    fail::cfg("sweep-delete-token", "1*return").expect("failed to configure fail point");

    let stats = store.delete_expired().await.expect("sweep");
    assert_eq!(stats.removed, 2);
    assert_eq!(stats.skipped, 1);

    scenario.teardown();
}
