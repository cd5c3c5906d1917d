//! Conformance test suite for [`TokenStore`] implementations.
//!
//! This module provides async check functions that validate whether a
//! [`TokenStore`] implementation satisfies the trait contract. Every store,
//! in-memory or on-disk, runs the same suite.
//!
//! # Usage
//!
//! Enable the `testutil` feature and call each check with an opened store:
//!
//! ```no_run
//! use tokenauth_store::conformance;
//! use tokenauth_store::MemoryTokenStore;
//!
//! #[tokio::test]
//! async fn cascading_delete() {
//!     conformance::cascading_delete_removes_tokens(&MemoryTokenStore::new()).await;
//! }
//! ```
//!
//! Each check uses its own audience IDs and token values, so the whole suite
//! can share one store.
//!
//! # Test Categories
//!
//! | Category | Contract aspect |
//! |----------|-----------------|
//! | Round trip | Saved records read back deep-equal |
//! | Absence | Missing records are `Ok(None)`, never errors |
//! | Validation | Empty IDs, broken tokens and expired tokens are rejected and not persisted |
//! | Index | Cascading delete, overwrite reset, single-slot exclusivity |
//! | Expiry | Sweeps remove only tokens past their deadline |
//! | Concurrent | Index integrity under parallel writers |

use std::{sync::Arc, time::Duration};

use crate::{
    error::StoreError,
    store::TokenStore,
    testutil::{audience_token, audience_with_period, make_value, sample_audience, single_token},
    token::Token,
};

// ============================================================================
// Round trip
// ============================================================================

/// A saved audience reads back deep-equal.
pub async fn audience_round_trip<S: TokenStore + ?Sized>(store: &S) {
    let audience = sample_audience("rt-aud");
    store.save_audience(&audience).await.expect("save audience");
    let loaded = store.get_audience("rt-aud").await.expect("get audience");
    assert_eq!(loaded, Some(audience));
}

/// Saved audience and single-slot tokens read back deep-equal.
pub async fn token_round_trip<S: TokenStore + ?Sized>(store: &S) {
    let audience = sample_audience("rt-tok");
    store.save_audience(&audience).await.expect("save audience");

    let token = audience_token(&audience, "rt-tok-value");
    store.save_token(&token).await.expect("save token");
    assert_eq!(store.get_token("rt-tok-value").await.expect("get"), Some(token.clone()));
    assert_eq!(store.list_audience_tokens("rt-tok").await.expect("list"), vec![token]);

    let single = single_token("rt-slot", "rt-single-value");
    store.save_token(&single).await.expect("save single");
    assert_eq!(store.get_token("rt-single-value").await.expect("get"), Some(single));
}

/// Re-saving the same audience replaces its fields.
pub async fn audience_overwrite_updates_record<S: TokenStore + ?Sized>(store: &S) {
    let mut audience = sample_audience("rt-rotate");
    store.save_audience(&audience).await.expect("save audience");
    audience.set_secret("rotated");
    audience.token_period = 60;
    store.save_audience(&audience).await.expect("overwrite audience");

    let loaded = store.get_audience("rt-rotate").await.expect("get").expect("present");
    assert_eq!(loaded.secret.as_str(), "rotated");
    assert_eq!(loaded.token_period, 60);
}

// ============================================================================
// Absence
// ============================================================================

/// Missing audiences and tokens are `Ok(None)`; the empty value is absent.
pub async fn missing_records_are_none<S: TokenStore + ?Sized>(store: &S) {
    assert_eq!(store.get_audience("absent-aud").await.expect("get audience"), None);
    assert_eq!(store.get_token("absent-token").await.expect("get token"), None);
    assert_eq!(store.get_token("").await.expect("get empty token"), None);
    let listed = store.list_audience_tokens("absent-aud").await.expect("list");
    assert!(listed.is_empty());
}

/// Deleting an unknown audience is a silent no-op.
pub async fn delete_unknown_audience_is_noop<S: TokenStore + ?Sized>(store: &S) {
    store.delete_audience("never-saved").await.expect("delete unknown audience");
}

// ============================================================================
// Validation
// ============================================================================

/// Empty audience IDs are rejected by every audience operation.
pub async fn empty_audience_id_rejected<S: TokenStore + ?Sized>(store: &S) {
    let audience = sample_audience("");
    assert!(matches!(
        store.save_audience(&audience).await,
        Err(StoreError::InvalidAudience { .. })
    ));
    assert!(matches!(store.delete_audience("").await, Err(StoreError::InvalidAudience { .. })));
    assert!(matches!(store.get_audience("").await, Err(StoreError::InvalidAudience { .. })));
}

/// Tokens with an empty value or no classification are rejected.
pub async fn invalid_token_rejected<S: TokenStore + ?Sized>(store: &S) {
    let audience = sample_audience("val-aud");
    store.save_audience(&audience).await.expect("save audience");

    let empty_value = audience_token(&audience, "");
    assert!(matches!(store.save_token(&empty_value).await, Err(StoreError::InvalidToken { .. })));

    let unclassified = Token { value: "val-orphan".into(), ..Token::default() };
    assert!(matches!(store.save_token(&unclassified).await, Err(StoreError::InvalidToken { .. })));
    assert_eq!(store.get_token("val-orphan").await.expect("get"), None);
}

/// A token already past its deadline is rejected and not persisted.
pub async fn expired_token_rejected<S: TokenStore + ?Sized>(store: &S) {
    let audience = sample_audience("val-expired");
    store.save_audience(&audience).await.expect("save audience");

    let stale = Token {
        client_id: "val-expired".into(),
        value: "val-expired-token".into(),
        dead_line: 1,
        ..Token::default()
    };
    assert!(matches!(store.save_token(&stale).await, Err(StoreError::TokenExpired { .. })));
    assert_eq!(store.get_token("val-expired-token").await.expect("get"), None);
}

/// Audience tokens cannot be saved before their audience.
pub async fn token_requires_audience<S: TokenStore + ?Sized>(store: &S) {
    let token = audience_token(&sample_audience("val-unsaved"), "val-unsaved-token");
    assert!(matches!(store.save_token(&token).await, Err(StoreError::AudienceNotFound { .. })));
    assert_eq!(store.get_token("val-unsaved-token").await.expect("get"), None);
}

/// `delete_token` rejects the empty value and reports unknown values.
pub async fn delete_token_semantics<S: TokenStore + ?Sized>(store: &S) {
    assert!(matches!(store.delete_token("").await, Err(StoreError::InvalidToken { .. })));
    assert!(matches!(
        store.delete_token("del-missing").await,
        Err(StoreError::TokenNotFound { .. })
    ));

    let audience = sample_audience("del-aud");
    store.save_audience(&audience).await.expect("save audience");
    store.save_token(&audience_token(&audience, "del-a")).await.expect("save token");
    store.save_token(&single_token("del-slot", "del-s")).await.expect("save single");

    store.delete_token("del-a").await.expect("delete audience token");
    store.delete_token("del-s").await.expect("delete single token");
    assert_eq!(store.get_token("del-a").await.expect("get"), None);
    assert!(store.list_audience_tokens("del-aud").await.expect("list").is_empty());

    // Second delete reports absence without corrupting anything.
    assert!(matches!(store.delete_token("del-a").await, Err(StoreError::TokenNotFound { .. })));

    // The freed slot accepts a new occupant.
    store.save_token(&single_token("del-slot", "del-s2")).await.expect("reuse slot");
}

// ============================================================================
// Index maintenance
// ============================================================================

/// Deleting an audience removes it and every token indexed under it.
pub async fn cascading_delete_removes_tokens<S: TokenStore + ?Sized>(store: &S) {
    let audience = sample_audience("cascade");
    store.save_audience(&audience).await.expect("save audience");
    for i in 0..8 {
        let token = audience_token(&audience, &make_value("cascade", i));
        store.save_token(&token).await.expect("save");
    }
    let survivor = single_token("cascade-slot", "cascade-survivor");
    store.save_token(&survivor).await.expect("save single");

    store.delete_audience("cascade").await.expect("delete audience");

    assert_eq!(store.get_audience("cascade").await.expect("get audience"), None);
    for i in 0..8 {
        let value = make_value("cascade", i);
        assert_eq!(store.get_token(&value).await.expect("get"), None, "{value} should be gone");
    }
    assert_eq!(store.get_token("cascade-survivor").await.expect("get"), Some(survivor));
}

/// Saving an audience again makes its previous tokens unreachable.
pub async fn overwrite_resets_index<S: TokenStore + ?Sized>(store: &S) {
    let audience = sample_audience("reset");
    store.save_audience(&audience).await.expect("save audience");
    for i in 0..4 {
        let token = audience_token(&audience, &make_value("reset", i));
        store.save_token(&token).await.expect("save");
    }

    store.save_audience(&audience).await.expect("overwrite audience");

    assert!(store.get_audience("reset").await.expect("get").is_some());
    assert!(store.list_audience_tokens("reset").await.expect("list").is_empty());
    for i in 0..4 {
        assert_eq!(store.get_token(&make_value("reset", i)).await.expect("get"), None);
    }
}

/// Saving T1..Tn for one single ID leaves only Tn retrievable.
pub async fn single_slot_exclusivity<S: TokenStore + ?Sized>(store: &S) {
    let values: Vec<String> = (0..5).map(|i| make_value("slot", i)).collect();
    for value in &values {
        store.save_token(&single_token("exclusive", value)).await.expect("save single");
    }

    let (last, earlier) = values.split_last().expect("non-empty");
    assert!(store.get_token(last).await.expect("get").is_some());
    for value in earlier {
        assert_eq!(store.get_token(value).await.expect("get"), None, "{value} should be gone");
    }
}

/// Saving a value that already exists moves it to the new index.
pub async fn resaved_value_is_displaced<S: TokenStore + ?Sized>(store: &S) {
    let audience = sample_audience("displace");
    store.save_audience(&audience).await.expect("save audience");
    store.save_token(&audience_token(&audience, "displaced")).await.expect("save");

    let moved = single_token("displace-slot", "displaced");
    store.save_token(&moved).await.expect("resave as single");

    assert_eq!(store.get_token("displaced").await.expect("get"), Some(moved));
    assert!(store.list_audience_tokens("displace").await.expect("list").is_empty());

    // Cascading the old audience must not touch the moved record.
    store.delete_audience("displace").await.expect("delete audience");
    assert!(store.get_token("displaced").await.expect("get").is_some());
}

// ============================================================================
// Expiry
// ============================================================================

/// Sweeps remove expired tokens and leave live and non-expiring ones.
///
/// Sleeps past a two-second deadline, so this check takes a little over
/// two seconds.
pub async fn sweep_removes_only_expired<S: TokenStore + ?Sized>(store: &S) {
    let short = audience_with_period("sweep-short", 2);
    let forever = audience_with_period("sweep-forever", 0);
    store.save_audience(&short).await.expect("save audience");
    store.save_audience(&forever).await.expect("save audience");

    let doomed = audience_token(&short, "sweep-doomed");
    let eternal = audience_token(&forever, "sweep-eternal");
    assert_eq!(eternal.dead_line, 0);
    store.save_token(&doomed).await.expect("save doomed");
    store.save_token(&eternal).await.expect("save eternal");
    assert!(store.get_token("sweep-doomed").await.expect("get").is_some());

    tokio::time::sleep(Duration::from_millis(2_100)).await;

    let stats = store.delete_expired().await.expect("sweep");
    assert!(stats.removed >= 1, "sweep should remove the doomed token: {stats:?}");
    assert_eq!(store.get_token("sweep-doomed").await.expect("get"), None);
    assert!(store.list_audience_tokens("sweep-short").await.expect("list").is_empty());
    assert_eq!(store.get_token("sweep-eternal").await.expect("get"), Some(eternal));
}

// ============================================================================
// Concurrent
// ============================================================================

/// Concurrent saves to one single slot leave exactly one reachable token.
pub async fn concurrent_single_slot_saves<S: TokenStore + 'static>(store: Arc<S>) {
    let mut handles = Vec::new();
    for i in 0..20 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            let value = make_value("race-slot", i);
            store.save_token(&single_token("race-slot", &value)).await.expect("concurrent save");
            value
        }));
    }

    let mut values = Vec::new();
    for handle in handles {
        values.push(handle.await.expect("task join"));
    }

    let mut live = 0;
    for value in &values {
        if store.get_token(value).await.expect("get").is_some() {
            live += 1;
        }
    }
    assert_eq!(live, 1, "exactly one token should occupy the slot");
}

/// Token saves racing an audience delete never leave a dangling record.
///
/// Every save either commits before the cascade (and is removed by it) or
/// after it (and fails with `AudienceNotFound`).
pub async fn concurrent_delete_audience_vs_save_token<S: TokenStore + 'static>(store: Arc<S>) {
    let audience = sample_audience("race-aud");
    store.save_audience(&audience).await.expect("save audience");

    let mut handles = Vec::new();
    for i in 0..20 {
        let store = Arc::clone(&store);
        let token = audience_token(&audience, &make_value("race-aud", i));
        handles.push(tokio::spawn(async move { store.save_token(&token).await }));
    }
    let deleter = {
        let store = Arc::clone(&store);
        tokio::spawn(async move { store.delete_audience("race-aud").await })
    };

    for handle in handles {
        match handle.await.expect("task join") {
            Ok(()) | Err(StoreError::AudienceNotFound { .. }) => {},
            Err(e) => panic!("unexpected error: {e:?}"),
        }
    }
    deleter.await.expect("task join").expect("delete audience");

    for i in 0..20 {
        let value = make_value("race-aud", i);
        assert_eq!(store.get_token(&value).await.expect("get"), None, "{value} is dangling");
    }
}

// ============================================================================
// Convenience runner
// ============================================================================

/// Run the full conformance suite against the given store.
///
/// ```no_run
/// use std::sync::Arc;
/// use tokenauth_store::conformance;
/// use tokenauth_store::MemoryTokenStore;
///
/// #[tokio::test]
/// async fn memory_store_conformance() {
///     conformance::run_all(Arc::new(MemoryTokenStore::new())).await;
/// }
/// ```
pub async fn run_all<S: TokenStore + 'static>(store: Arc<S>) {
    // Round trip
    audience_round_trip(store.as_ref()).await;
    token_round_trip(store.as_ref()).await;
    audience_overwrite_updates_record(store.as_ref()).await;

    // Absence
    missing_records_are_none(store.as_ref()).await;
    delete_unknown_audience_is_noop(store.as_ref()).await;

    // Validation
    empty_audience_id_rejected(store.as_ref()).await;
    invalid_token_rejected(store.as_ref()).await;
    expired_token_rejected(store.as_ref()).await;
    token_requires_audience(store.as_ref()).await;
    delete_token_semantics(store.as_ref()).await;

    // Index
    cascading_delete_removes_tokens(store.as_ref()).await;
    overwrite_resets_index(store.as_ref()).await;
    single_slot_exclusivity(store.as_ref()).await;
    resaved_value_is_displaced(store.as_ref()).await;

    // Expiry
    sweep_removes_only_expired(store.as_ref()).await;

    // Concurrent
    concurrent_single_slot_saves(Arc::clone(&store)).await;
    concurrent_delete_audience_vs_save_token(Arc::clone(&store)).await;
}
