//! In-memory token store.
//!
//! This module provides [`MemoryTokenStore`], an in-memory implementation of
//! [`TokenStore`] suitable for testing and development.
//!
//! # Features
//!
//! - **Thread-safe**: a single [`parking_lot::RwLock`] guards all three buckets, so every write
//!   operation is atomic with respect to every other
//! - **Ordered storage**: buckets are [`BTreeMap`]s, so sweeps and listings are deterministic
//! - **No open required**: the store is usable straight away; [`open`](TokenStore::open) only
//!   records the configured location
//!
//! # Example
//!
//! ```
//! use tokenauth_store::{Audience, MemoryTokenStore, Token, TokenStore};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = MemoryTokenStore::new();
//!     let audience = Audience::builder().name("svc").id("a1").secret("s".to_owned()).build();
//!     store.save_audience(&audience).await.unwrap();
//!
//!     let token = Token::for_audience(&audience, "abc", chrono::Utc::now().timestamp());
//!     store.save_token(&token).await.unwrap();
//!
//!     assert_eq!(store.get_token("abc").await.unwrap(), Some(token));
//! }
//! ```
//!
//! # Limitations
//!
//! - Data is not persisted; all data is lost when the process exits
//! - Expired tokens linger until [`delete_expired`](TokenStore::delete_expired) runs

use std::{
    collections::{BTreeMap, BTreeSet},
    path::PathBuf,
    sync::Arc,
};

use async_trait::async_trait;
use chrono::Utc;
use fail::fail_point;
use parking_lot::RwLock;

use crate::{
    audience::Audience,
    config::StoreConfig,
    error::{StoreError, StoreResult},
    store::TokenStore,
    token::{Token, TokenKind},
    types::SweepStats,
};

/// One audience bucket: the audience record and its token index.
#[derive(Debug, Clone)]
struct AudienceEntry {
    audience: Audience,
    tokens: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct State {
    audiences: BTreeMap<String, AudienceEntry>,
    tokens: BTreeMap<String, Token>,
    single_ids: BTreeMap<String, String>,
}

impl State {
    /// Removes a token record and whichever index entry points at it.
    fn remove_token(&mut self, value: &str) -> Option<Token> {
        let token = self.tokens.remove(value)?;
        self.unindex(&token);
        Some(token)
    }

    fn unindex(&mut self, token: &Token) {
        match token.kind() {
            Some(TokenKind::Audience(id)) => {
                if let Some(entry) = self.audiences.get_mut(id) {
                    entry.tokens.remove(&token.value);
                }
            },
            Some(TokenKind::Single(sid)) => {
                if self.single_ids.get(sid).is_some_and(|v| *v == token.value) {
                    self.single_ids.remove(sid);
                }
            },
            None => {},
        }
    }

    /// Removes an audience bucket and the token records it indexes.
    fn remove_audience(&mut self, id: &str) -> usize {
        let Some(entry) = self.audiences.remove(id) else {
            return 0;
        };
        for value in &entry.tokens {
            self.tokens.remove(value);
        }
        entry.tokens.len()
    }
}

/// In-memory token store.
///
/// # Cloning
///
/// `MemoryTokenStore` is cheaply cloneable via [`Arc`]. All clones share the
/// same buckets.
#[derive(Clone, Default)]
pub struct MemoryTokenStore {
    state: Arc<RwLock<State>>,
    location: Arc<RwLock<Option<PathBuf>>>,
}

impl MemoryTokenStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the location recorded by the last [`open`](TokenStore::open),
    /// or `None` if the store is closed.
    #[must_use]
    pub fn location(&self) -> Option<PathBuf> {
        self.location.read().clone()
    }

    /// Returns the number of stored token records.
    #[must_use]
    pub fn token_count(&self) -> usize {
        self.state.read().tokens.len()
    }

    /// Returns the value occupying a single slot, if any.
    #[must_use]
    pub fn single_slot(&self, single_id: &str) -> Option<String> {
        self.state.read().single_ids.get(single_id).cloned()
    }
}

impl std::fmt::Debug for MemoryTokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("MemoryTokenStore")
            .field("audiences", &state.audiences.len())
            .field("tokens", &state.tokens.len())
            .field("single_ids", &state.single_ids.len())
            .finish()
    }
}

/// Removes one expired token on behalf of a sweep.
fn sweep_one(state: &mut State, value: &str) -> StoreResult<bool> {
    fail_point!("sweep-delete-token", |_| Err(StoreError::internal("injected sweep failure")));
    Ok(state.remove_token(value).is_some())
}

fn require_id(id: &str) -> StoreResult<()> {
    if id.is_empty() {
        return Err(StoreError::invalid_audience("audience id is empty"));
    }
    Ok(())
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    #[tracing::instrument(skip_all, fields(path = %config.path().display()))]
    async fn open(&self, config: &StoreConfig) -> StoreResult<()> {
        *self.location.write() = Some(config.path().to_path_buf());
        Ok(())
    }

    #[tracing::instrument(skip_all)]
    async fn close(&self) -> StoreResult<()> {
        *self.location.write() = None;
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(audience = %audience.id))]
    async fn save_audience(&self, audience: &Audience) -> StoreResult<()> {
        audience.validate()?;
        let mut state = self.state.write();
        let dropped = state.remove_audience(&audience.id);
        if dropped > 0 {
            tracing::debug!(audience = %audience.id, dropped, "audience overwritten");
        }
        state.audiences.insert(
            audience.id.clone(),
            AudienceEntry { audience: audience.clone(), tokens: BTreeSet::new() },
        );
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn delete_audience(&self, id: &str) -> StoreResult<()> {
        require_id(id)?;
        self.state.write().remove_audience(id);
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn get_audience(&self, id: &str) -> StoreResult<Option<Audience>> {
        require_id(id)?;
        Ok(self.state.read().audiences.get(id).map(|entry| entry.audience.clone()))
    }

    #[tracing::instrument(skip_all)]
    async fn save_token(&self, token: &Token) -> StoreResult<()> {
        let kind = token.validate_at(Utc::now().timestamp())?;
        let mut state = self.state.write();

        if let TokenKind::Audience(id) = kind {
            if !state.audiences.contains_key(id) {
                return Err(StoreError::audience_not_found(id));
            }
        }

        // A record with the same value is replaced wholesale.
        state.remove_token(&token.value);

        match kind {
            TokenKind::Audience(id) => {
                if let Some(entry) = state.audiences.get_mut(id) {
                    entry.tokens.insert(token.value.clone());
                }
            },
            TokenKind::Single(sid) => {
                if let Some(previous) = state.single_ids.get(sid).cloned() {
                    state.remove_token(&previous);
                }
                state.single_ids.insert(sid.to_owned(), token.value.clone());
            },
        }
        state.tokens.insert(token.value.clone(), token.clone());
        Ok(())
    }

    #[tracing::instrument(skip_all)]
    async fn delete_token(&self, value: &str) -> StoreResult<()> {
        if value.is_empty() {
            return Err(StoreError::invalid_token("token value is empty"));
        }
        match self.state.write().remove_token(value) {
            Some(_) => Ok(()),
            None => Err(StoreError::token_not_found(value)),
        }
    }

    #[tracing::instrument(skip_all)]
    async fn get_token(&self, value: &str) -> StoreResult<Option<Token>> {
        Ok(self.state.read().tokens.get(value).cloned())
    }

    #[tracing::instrument(skip(self))]
    async fn list_audience_tokens(&self, id: &str) -> StoreResult<Vec<Token>> {
        require_id(id)?;
        let state = self.state.read();
        let Some(entry) = state.audiences.get(id) else {
            return Ok(Vec::new());
        };
        Ok(entry.tokens.iter().filter_map(|value| state.tokens.get(value).cloned()).collect())
    }

    #[tracing::instrument(skip_all)]
    async fn delete_expired(&self) -> StoreResult<SweepStats> {
        let now = Utc::now().timestamp();
        let mut state = self.state.write();
        let expired: Vec<String> = state
            .tokens
            .values()
            .filter(|token| token.is_expired_at(now))
            .map(|token| token.value.clone())
            .collect();

        let mut stats = SweepStats { scanned: state.tokens.len(), ..SweepStats::default() };
        for value in expired {
            match sweep_one(&mut state, &value) {
                Ok(true) => stats.removed += 1,
                Ok(false) => {},
                Err(e) => {
                    tracing::warn!(error = %e, "failed to delete expired token");
                    stats.skipped += 1;
                },
            }
        }
        tracing::debug!(
            scanned = stats.scanned,
            removed = stats.removed,
            skipped = stats.skipped,
            "expired tokens swept"
        );
        Ok(stats)
    }
}
