//! Authentication error types.
//!
//! Token validation failures carry a stable numeric code alongside their
//! message so that callers can hand them to clients unchanged:
//!
//! | Code | Meaning |
//! |------|---------|
//! | `40001` | The token is unknown |
//! | `41001` | No token was presented |
//! | `42001` | The token is past its deadline |

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokenauth_store::{RegistryError, StoreError, Token};

/// A coded validation failure, serialized as `{"errcode": ..., "errmsg": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{code}:{message}")]
pub struct ValidationError {
    /// Stable numeric code.
    #[serde(rename = "errcode")]
    pub code: Cow<'static, str>,
    /// Human readable message.
    #[serde(rename = "errmsg")]
    pub message: Cow<'static, str>,
}

impl ValidationError {
    /// The presented token is unknown.
    pub const INVALID_TOKEN: Self = Self::new("40001", "Invalid token");
    /// No token was presented.
    pub const TOKEN_EMPTY: Self = Self::new("41001", "Token is empty");
    /// The presented token is past its deadline.
    pub const TOKEN_EXPIRED: Self = Self::new("42001", "Token is expired");

    const fn new(code: &'static str, message: &'static str) -> Self {
        Self { code: Cow::Borrowed(code), message: Cow::Borrowed(message) }
    }
}

/// Authentication errors.
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]`. New variants may be added in
/// future minor releases without a semver-breaking change. Downstream match
/// expressions must include a wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    /// The presented token string was empty.
    #[error("{}", ValidationError::TOKEN_EMPTY)]
    TokenEmpty,

    /// The presented token is not in the store.
    #[error("{}", ValidationError::INVALID_TOKEN)]
    InvalidToken,

    /// The token was found past its deadline and has been deleted.
    ///
    /// Carries the stale record so callers can report its deadline.
    #[error("{}", ValidationError::TOKEN_EXPIRED)]
    TokenExpired {
        /// The deleted token.
        token: Box<Token>,
    },

    /// The store failed.
    ///
    /// Wraps the original [`StoreError`] to preserve the full error source
    /// chain for debugging and structured logging.
    #[error("Token store error: {0}")]
    Store(
        /// The underlying store error.
        #[source]
        StoreError,
    ),

    /// The store could not be constructed or opened by name.
    #[error("Token store registry error: {0}")]
    Registry(#[from] RegistryError),
}

impl AuthError {
    /// Returns the coded form of a validation failure, or `None` for store
    /// failures.
    #[must_use]
    pub fn validation_error(&self) -> Option<ValidationError> {
        match self {
            Self::TokenEmpty => Some(ValidationError::TOKEN_EMPTY),
            Self::InvalidToken => Some(ValidationError::INVALID_TOKEN),
            Self::TokenExpired { .. } => Some(ValidationError::TOKEN_EXPIRED),
            _ => None,
        }
    }

    /// Returns the stale record carried by [`AuthError::TokenExpired`].
    #[must_use]
    pub fn expired_token(&self) -> Option<&Token> {
        match self {
            Self::TokenExpired { token } => Some(token),
            _ => None,
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        AuthError::Store(err)
    }
}

/// Result type alias for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(AuthError::TokenEmpty.to_string(), "41001:Token is empty");
        assert_eq!(AuthError::InvalidToken.to_string(), "40001:Invalid token");

        let err = AuthError::TokenExpired { token: Box::default() };
        assert_eq!(err.to_string(), "42001:Token is expired");

        let err = AuthError::from(StoreError::NotOpen);
        assert_eq!(err.to_string(), "Token store error: Store is not open");
    }

    #[test]
    fn test_validation_error_wire_format() {
        let json = serde_json::to_value(ValidationError::TOKEN_EXPIRED).unwrap();
        assert_eq!(json, serde_json::json!({"errcode": "42001", "errmsg": "Token is expired"}));

        let parsed: ValidationError =
            serde_json::from_str(r#"{"errcode":"40001","errmsg":"Invalid token"}"#).unwrap();
        assert_eq!(parsed, ValidationError::INVALID_TOKEN);
    }

    #[test]
    fn test_validation_error_classification() {
        assert_eq!(AuthError::TokenEmpty.validation_error(), Some(ValidationError::TOKEN_EMPTY));
        assert!(AuthError::from(StoreError::NotOpen).validation_error().is_none());

        let token = Token { value: "stale".into(), dead_line: 7, ..Token::default() };
        let err = AuthError::TokenExpired { token: Box::new(token) };
        assert_eq!(err.expired_token().map(|t| t.dead_line), Some(7));
        assert!(AuthError::InvalidToken.expired_token().is_none());
    }

    #[test]
    fn test_store_error_source_preserved() {
        use std::error::Error as _;

        let err = AuthError::from(StoreError::token_not_found("x"));
        assert_eq!(err.source().unwrap().to_string(), "Token not found: x");
    }
}
