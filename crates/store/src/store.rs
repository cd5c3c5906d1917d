//! The token store contract.
//!
//! This module defines the [`TokenStore`] trait, the operation set every
//! backend implements. Each operation runs as one atomic transaction against
//! the backing engine: index entries and primary records change together or
//! not at all.
//!
//! # Logical Layout
//!
//! ```text
//! ┌──────────────────────────┐   ┌────────────────────────┐   ┌──────────────────────┐
//! │ audience bucket (per ID) │   │ token bucket (global)  │   │ single-slot bucket   │
//! │  info    → Audience      │   │  value → Token         │   │  single_id → value   │
//! │  tokens/ → {value: ""}   │──►│                        │◄──│                      │
//! └──────────────────────────┘   └────────────────────────┘   └──────────────────────┘
//! ```
//!
//! Every token reachable from an index entry exists in the token bucket and
//! every token in the token bucket is reachable from exactly one index.
//!
//! # Implementing a Store
//!
//! 1. Implement [`TokenStore`]
//! 2. Map engine errors to [`StoreError`](crate::StoreError)
//! 3. Run the [`conformance`](crate::conformance) suite against it
//!
//! See [`MemoryTokenStore`](crate::MemoryTokenStore) for a reference
//! implementation.

use async_trait::async_trait;

use crate::{
    audience::Audience, config::StoreConfig, error::StoreResult, token::Token, types::SweepStats,
};

/// Persistence for audiences and the tokens issued against them.
///
/// Stores are shared (`Send + Sync`) between foreground callers and the
/// [`Janitor`](crate::Janitor); all methods take `&self`.
///
/// # Key Operations
///
/// | Method | Description |
/// |--------|-------------|
/// | [`open`](TokenStore::open) | Attach to the storage location |
/// | [`save_audience`](TokenStore::save_audience) | Create or overwrite an audience, dropping its tokens |
/// | [`delete_audience`](TokenStore::delete_audience) | Remove an audience and its tokens |
/// | [`save_token`](TokenStore::save_token) | Persist a token and index it |
/// | [`get_token`](TokenStore::get_token) | Look a token up by value |
/// | [`delete_expired`](TokenStore::delete_expired) | Sweep tokens past their deadline |
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Opens the store at the configured location.
    ///
    /// Re-opening the location that is already open is a no-op. Opening a
    /// different location closes the previous connection first; if that
    /// close fails the new connection is closed too and the error returned.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Storage`](crate::StoreError::Storage) if the
    /// location cannot be created or opened, or the previous connection
    /// cannot be closed.
    async fn open(&self, config: &StoreConfig) -> StoreResult<()>;

    /// Closes the store. Safe to call on a store that was never opened.
    async fn close(&self) -> StoreResult<()>;

    /// Saves an audience, overwriting any audience with the same ID.
    ///
    /// Overwriting first cascade-deletes the previous audience's tokens, so
    /// the audience starts over with an empty token index.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidAudience`](crate::StoreError::InvalidAudience)
    /// if the ID is empty.
    async fn save_audience(&self, audience: &Audience) -> StoreResult<()>;

    /// Deletes an audience and every audience token indexed under it.
    ///
    /// Deleting an unknown audience is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidAudience`](crate::StoreError::InvalidAudience)
    /// if `id` is empty.
    async fn delete_audience(&self, id: &str) -> StoreResult<()>;

    /// Retrieves an audience by ID.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(audience))` if the audience exists
    /// - `Ok(None)` if it does not
    /// - `Err(...)` if `id` is empty or on storage errors
    async fn get_audience(&self, id: &str) -> StoreResult<Option<Audience>>;

    /// Saves a token and records it in the matching index.
    ///
    /// For a single-slot token, any token currently occupying the slot is
    /// deleted first. For an audience token the audience must exist.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidToken`](crate::StoreError::InvalidToken) if the value is empty or
    ///   the classification invariant is broken
    /// - [`StoreError::TokenExpired`](crate::StoreError::TokenExpired) if the deadline has passed
    /// - [`StoreError::AudienceNotFound`](crate::StoreError::AudienceNotFound) if the audience of
    ///   an audience token was never saved
    async fn save_token(&self, token: &Token) -> StoreResult<()>;

    /// Deletes a token and its index entry.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidToken`](crate::StoreError::InvalidToken) if `value` is empty
    /// - [`StoreError::TokenNotFound`](crate::StoreError::TokenNotFound) if no such token exists
    async fn delete_token(&self, value: &str) -> StoreResult<()>;

    /// Retrieves a token by value.
    ///
    /// Absence and expiry are not errors here; expiry policy belongs to the
    /// validation layer.
    async fn get_token(&self, value: &str) -> StoreResult<Option<Token>>;

    /// Lists the tokens currently indexed under an audience.
    ///
    /// An unknown audience yields an empty list.
    async fn list_audience_tokens(&self, id: &str) -> StoreResult<Vec<Token>>;

    /// Deletes every token whose deadline has passed.
    ///
    /// Best-effort: undecodable records and per-token failures are counted
    /// in [`SweepStats::skipped`] and never abort the sweep.
    async fn delete_expired(&self) -> StoreResult<SweepStats>;
}
