//! Shared test utilities for token store testing.
//!
//! This module provides helpers for building audiences and tokens and for
//! asserting on [`StoreResult`] values. It is feature-gated behind
//! `testutil` to prevent leaking into production builds.
//!
//! # Usage
//!
//! In integration tests, enable the feature in `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! tokenauth-store = { path = "../store", features = ["testutil"] }
//! ```
//!
//! Then import helpers:
//!
//! ```no_run
//! // Requires the `testutil` feature to be enabled.
//! use tokenauth_store::testutil::{audience_token, populated_store, sample_audience};
//! ```

use chrono::Utc;

use crate::{
    audience::Audience,
    error::{StoreError, StoreResult},
    memory::MemoryTokenStore,
    store::TokenStore,
    token::Token,
};

/// Current unix time in seconds.
#[must_use]
pub fn unix_now() -> i64 {
    Utc::now().timestamp()
}

/// Create an audience with the default token period.
///
/// The secret is derived from the ID so that distinct audiences never share
/// one.
#[must_use]
pub fn sample_audience(id: &str) -> Audience {
    Audience::builder().name(format!("audience {id}")).id(id).secret(format!("secret-{id}")).build()
}

/// Create an audience whose tokens live for `period` seconds.
#[must_use]
pub fn audience_with_period(id: &str, period: u64) -> Audience {
    Audience { token_period: period, ..sample_audience(id) }
}

/// Create an audience token issued now.
#[must_use]
pub fn audience_token(audience: &Audience, value: &str) -> Token {
    Token::for_audience(audience, value, unix_now())
}

/// Create a single-slot token issued now, living for the default period.
#[must_use]
pub fn single_token(single_id: &str, value: &str) -> Token {
    Token::single(single_id, &sample_audience("single"), value, unix_now())
}

/// Create a token value tagged with a prefix and index, like `"tok-a1-0042"`.
#[must_use]
pub fn make_value(prefix: &str, idx: usize) -> String {
    format!("tok-{prefix}-{idx:04}")
}

/// Create a [`MemoryTokenStore`] holding one audience with `count` tokens.
///
/// Token values are produced by [`make_value`] with the audience ID as prefix.
///
/// # Panics
///
/// Panics if any save fails (should not happen with `MemoryTokenStore`).
pub async fn populated_store(id: &str, count: usize) -> MemoryTokenStore {
    let store = MemoryTokenStore::new();
    let audience = sample_audience(id);
    store.save_audience(&audience).await.expect("populate audience failed");
    for i in 0..count {
        let token = audience_token(&audience, &make_value(id, i));
        store.save_token(&token).await.expect("populate token failed");
    }
    store
}

/// Assert that a [`StoreResult`] is a not-found error
/// ([`StoreError::AudienceNotFound`] or [`StoreError::TokenNotFound`]).
///
/// # Examples
///
/// ```no_run
/// // Requires the `testutil` feature to be enabled.
/// use tokenauth_store::assert_not_found;
/// use tokenauth_store::{StoreError, StoreResult};
///
/// let result: StoreResult<()> = Err(StoreError::token_not_found("missing"));
/// assert_not_found!(result);
/// ```
#[macro_export]
macro_rules! assert_not_found {
    ($result:expr) => {
        assert!(
            matches!(&$result, Err(e) if e.is_not_found()),
            "expected a not-found StoreError, got: {:?}",
            $result,
        );
    };
    ($result:expr, $msg:expr) => {
        assert!(
            matches!(&$result, Err(e) if e.is_not_found()),
            "{}: expected a not-found StoreError, got: {:?}",
            $msg,
            $result,
        );
    };
}

/// Assert that a [`StoreResult`] is a validation error
/// ([`StoreError::InvalidAudience`], [`StoreError::InvalidToken`] or
/// [`StoreError::TokenExpired`]).
#[macro_export]
macro_rules! assert_validation {
    ($result:expr) => {
        assert!(
            matches!(&$result, Err(e) if e.is_validation()),
            "expected a validation StoreError, got: {:?}",
            $result,
        );
    };
    ($result:expr, $msg:expr) => {
        assert!(
            matches!(&$result, Err(e) if e.is_validation()),
            "{}: expected a validation StoreError, got: {:?}",
            $msg,
            $result,
        );
    };
}

/// Assert that a [`StoreResult`] is `Ok`.
///
/// Returns the inner value on success, panics with a descriptive message
/// on failure.
#[macro_export]
macro_rules! assert_store_ok {
    ($result:expr) => {
        match $result {
            Ok(val) => val,
            Err(e) => panic!("expected Ok, got StoreError: {e:?}"),
        }
    };
    ($result:expr, $msg:expr) => {
        match $result {
            Ok(val) => val,
            Err(e) => panic!("{}: expected Ok, got StoreError: {e:?}", $msg),
        }
    };
}

/// Helper to verify that a result is an `AudienceNotFound` error.
pub fn is_audience_not_found<T>(result: &StoreResult<T>) -> bool {
    matches!(result, Err(StoreError::AudienceNotFound { .. }))
}

/// Helper to verify that a result is a `TokenNotFound` error.
pub fn is_token_not_found<T>(result: &StoreResult<T>) -> bool {
    matches!(result, Err(StoreError::TokenNotFound { .. }))
}
