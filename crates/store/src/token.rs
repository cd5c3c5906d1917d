//! Token record and its classification.
//!
//! A token is either an **audience token** (`client_id` set, indexed under
//! that audience) or a **single-slot token** (`single_id` set, at most one
//! live token per `single_id`). Exactly one of the two fields is non-empty.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    audience::Audience,
    error::{StoreError, StoreResult},
};

/// Classification of a token by the index it belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind<'a> {
    /// Indexed under the audience with this ID.
    Audience(&'a str),
    /// Occupies the single slot with this ID.
    Single(&'a str),
}

/// An opaque bearer token bound to an audience or a single slot.
///
/// Field names are serialized as `ClientID`, `SingleID`, `Value` and
/// `DeadLine`. Tokens are immutable once stored.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// ID of the owning audience, empty for single-slot tokens.
    #[serde(rename = "ClientID", default)]
    pub client_id: String,

    /// Single-slot identifier, empty for audience tokens.
    #[serde(rename = "SingleID", default)]
    pub single_id: String,

    /// The token string; globally unique lookup key.
    #[serde(rename = "Value")]
    pub value: String,

    /// Expiry as unix seconds; zero never expires.
    #[serde(rename = "DeadLine", default)]
    pub dead_line: i64,
}

/// Computes the deadline for a token issued at `now` with the given period.
///
/// A zero period yields a zero (never expiring) deadline.
#[must_use]
pub fn dead_line_for(token_period: u64, now: i64) -> i64 {
    if token_period == 0 {
        return 0;
    }
    now.saturating_add(i64::try_from(token_period).unwrap_or(i64::MAX))
}

impl Token {
    /// Builds an audience token issued at `now`.
    #[must_use]
    pub fn for_audience(audience: &Audience, value: impl Into<String>, now: i64) -> Self {
        Self {
            client_id: audience.id.clone(),
            single_id: String::new(),
            value: value.into(),
            dead_line: dead_line_for(audience.token_period, now),
        }
    }

    /// Builds a single-slot token issued at `now`, taking its lifetime from
    /// `audience`.
    #[must_use]
    pub fn single(
        single_id: impl Into<String>,
        audience: &Audience,
        value: impl Into<String>,
        now: i64,
    ) -> Self {
        Self {
            client_id: String::new(),
            single_id: single_id.into(),
            value: value.into(),
            dead_line: dead_line_for(audience.token_period, now),
        }
    }

    /// Returns `true` if the deadline has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now().timestamp())
    }

    /// Returns `true` if the deadline has passed at `now` (unix seconds).
    #[must_use]
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.dead_line != 0 && now >= self.dead_line
    }

    /// Returns `true` for a single-slot token.
    #[must_use]
    pub fn is_single(&self) -> bool {
        self.client_id.is_empty() && !self.single_id.is_empty()
    }

    /// Classifies the token, or `None` if neither or both of `client_id` and
    /// `single_id` are set.
    #[must_use]
    pub fn kind(&self) -> Option<TokenKind<'_>> {
        match (self.client_id.is_empty(), self.single_id.is_empty()) {
            (false, true) => Some(TokenKind::Audience(&self.client_id)),
            (true, false) => Some(TokenKind::Single(&self.single_id)),
            _ => None,
        }
    }

    /// Returns the deadline as a timestamp, or `None` for non-expiring tokens.
    #[must_use]
    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        if self.dead_line == 0 {
            return None;
        }
        DateTime::from_timestamp(self.dead_line, 0)
    }

    /// Checks that the token may be persisted at `now` and returns its kind.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidToken`] if the value is empty or the classification invariant is
    ///   broken
    /// - [`StoreError::TokenExpired`] if the deadline has already passed
    pub fn validate_at(&self, now: i64) -> StoreResult<TokenKind<'_>> {
        if self.value.is_empty() {
            return Err(StoreError::invalid_token("token value is empty"));
        }
        let Some(kind) = self.kind() else {
            return Err(StoreError::invalid_token(
                "exactly one of client id and single id must be set",
            ));
        };
        if self.is_expired_at(now) {
            return Err(StoreError::token_expired(self.dead_line));
        }
        Ok(kind)
    }
}
