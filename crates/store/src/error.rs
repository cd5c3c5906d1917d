//! Store error types and result alias.
//!
//! Every [`TokenStore`](crate::TokenStore) implementation maps its engine
//! failures to [`StoreError`]. Absence is never an error for get-style
//! operations: those return `Ok(None)`.
//!
//! # Error Types
//!
//! - [`StoreError::Config`] - Backend configuration rejected by `open`
//! - [`StoreError::InvalidAudience`] / [`StoreError::InvalidToken`] / [`StoreError::TokenExpired`] -
//!   The caller handed the store a record it must not persist
//! - [`StoreError::AudienceNotFound`] / [`StoreError::TokenNotFound`] - A write referenced a record
//!   that does not exist
//! - [`StoreError::NotOpen`] - The store has no open engine handle
//! - [`StoreError::Serialization`] - A stored record could not be encoded or decoded
//! - [`StoreError::Storage`] - Engine-level failure (I/O, transaction failure)
//! - [`StoreError::Internal`] - Anything else
//!
//! # Example
//!
//! ```
//! use tokenauth_store::{StoreError, StoreResult};
//!
//! fn lookup(value: &str) -> StoreResult<()> {
//!     Err(StoreError::token_not_found(value))
//! }
//!
//! assert!(lookup("abc").is_err());
//! ```

use std::{borrow::Cow, sync::Arc};

use thiserror::Error;

/// A boxed error type for source chain tracking.
pub type BoxError = Arc<dyn std::error::Error + Send + Sync>;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised while validating store or janitor configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The configuration payload was empty.
    #[error("store config is empty")]
    Empty,

    /// The configuration payload could not be parsed.
    #[error("malformed store config: {message}")]
    Malformed {
        /// Parser message.
        message: String,
        /// The underlying parse failure.
        #[source]
        source: Option<BoxError>,
    },

    /// A required field was absent or empty.
    #[error("store config has no {field}")]
    MissingField {
        /// Name of the missing field.
        field: &'static str,
    },

    /// A numeric or duration field is below its minimum.
    #[error("{field} must be at least {min}, got {value}")]
    BelowMinimum {
        /// Name of the offending field.
        field: &'static str,
        /// Smallest accepted value.
        min: String,
        /// The rejected value.
        value: String,
    },
}

impl ConfigError {
    /// Creates a `Malformed` error wrapping the parser failure.
    #[must_use]
    pub fn malformed(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Malformed { message: source.to_string(), source: Some(Arc::new(source)) }
    }
}

/// Errors that can occur during store operations.
///
/// Errors preserve their source chain via the `#[source]` attribute.
///
/// # Non-exhaustive
///
/// New variants may be added without a semver-breaking change. Downstream
/// match expressions must include a wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// The store configuration was rejected.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The audience cannot be saved (missing or malformed ID).
    #[error("Invalid audience: {message}")]
    InvalidAudience {
        /// What is wrong with the audience.
        message: Cow<'static, str>,
    },

    /// The token cannot be saved (empty value, broken classification).
    #[error("Invalid token: {message}")]
    InvalidToken {
        /// What is wrong with the token.
        message: Cow<'static, str>,
    },

    /// The token was already past its deadline when it was presented.
    #[error("Token is expired: deadline {dead_line}")]
    TokenExpired {
        /// The deadline the token carried.
        dead_line: i64,
    },

    /// An audience token referenced an audience that was never saved.
    #[error("Audience not found: {id}")]
    AudienceNotFound {
        /// The missing audience ID.
        id: String,
    },

    /// The token to delete does not exist.
    #[error("Token not found: {value}")]
    TokenNotFound {
        /// The missing token value.
        value: String,
    },

    /// The store has not been opened, or has been closed.
    #[error("Store is not open")]
    NotOpen,

    /// A record could not be encoded or decoded.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Description of the serialization error.
        message: String,
        /// The underlying error.
        #[source]
        source: Option<BoxError>,
    },

    /// The storage engine failed.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the engine failure.
        message: String,
        /// The underlying engine error.
        #[source]
        source: Option<BoxError>,
    },

    /// Catch-all for failures outside the engine.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
        /// The underlying error.
        #[source]
        source: Option<BoxError>,
    },
}

impl StoreError {
    /// Creates an `InvalidAudience` error.
    #[must_use]
    pub fn invalid_audience(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidAudience { message: message.into() }
    }

    /// Creates an `InvalidToken` error.
    #[must_use]
    pub fn invalid_token(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidToken { message: message.into() }
    }

    /// Creates a `TokenExpired` error.
    #[must_use]
    pub fn token_expired(dead_line: i64) -> Self {
        Self::TokenExpired { dead_line }
    }

    /// Creates an `AudienceNotFound` error.
    #[must_use]
    pub fn audience_not_found(id: impl Into<String>) -> Self {
        Self::AudienceNotFound { id: id.into() }
    }

    /// Creates a `TokenNotFound` error.
    #[must_use]
    pub fn token_not_found(value: impl Into<String>) -> Self {
        Self::TokenNotFound { value: value.into() }
    }

    /// Creates a `Serialization` error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization { message: message.into(), source: None }
    }

    /// Creates a `Serialization` error with a message and source error.
    #[must_use]
    pub fn serialization_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Serialization { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a `Storage` error with the given message.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage { message: message.into(), source: None }
    }

    /// Creates a `Storage` error with a message and source error.
    #[must_use]
    pub fn storage_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates an `Internal` error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into(), source: None }
    }

    /// Creates an `Internal` error with a message and source error.
    #[must_use]
    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Internal { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Returns `true` if the caller handed the store a record or key it
    /// must reject, as opposed to a storage-layer failure.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidAudience { .. } | Self::InvalidToken { .. } | Self::TokenExpired { .. }
        )
    }

    /// Returns `true` if the error reports a missing record.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::AudienceNotFound { .. } | Self::TokenNotFound { .. })
    }
}

/// Errors raised by the [`StoreRegistry`](crate::StoreRegistry).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RegistryError {
    /// A backend was registered under the empty name.
    #[error("backend name is empty")]
    EmptyName,

    /// A backend is already registered under this name.
    #[error("backend {name:?} is already registered")]
    Duplicate {
        /// The contested name.
        name: String,
    },

    /// No backend is registered under this name.
    #[error("unknown store backend {name:?}")]
    UnknownBackend {
        /// The requested name.
        name: String,
    },

    /// The backend configuration was rejected.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The constructed store failed to open.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization_with_source(err.to_string(), err)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(StoreError::token_not_found("abc").to_string(), "Token not found: abc");
        assert_eq!(StoreError::NotOpen.to_string(), "Store is not open");
        assert_eq!(
            StoreError::invalid_audience("audience id is empty").to_string(),
            "Invalid audience: audience id is empty"
        );
        assert_eq!(
            StoreError::from(ConfigError::MissingField { field: "path" }).to_string(),
            "Configuration error: store config has no path"
        );
    }

    #[test]
    fn test_validation_classification() {
        assert!(StoreError::invalid_token("empty").is_validation());
        assert!(StoreError::token_expired(1).is_validation());
        assert!(!StoreError::storage("disk full").is_validation());
        assert!(!StoreError::audience_not_found("a").is_validation());
        assert!(StoreError::audience_not_found("a").is_not_found());
    }

    #[test]
    fn test_source_chain_preserved() {
        let io = std::io::Error::other("disk gone");
        let err = StoreError::storage_with_source("flush failed", io);
        let source = err.source().expect("source should be preserved");
        assert_eq!(source.to_string(), "disk gone");
    }

    #[test]
    fn test_registry_error_display() {
        assert_eq!(
            RegistryError::UnknownBackend { name: "redis".into() }.to_string(),
            "unknown store backend \"redis\""
        );
        let wrapped = RegistryError::from(StoreError::NotOpen);
        assert_eq!(wrapped.to_string(), "Store is not open");
    }

    #[test]
    fn test_json_error_maps_to_serialization() {
        let err: StoreError = serde_json::from_str::<u8>("nope").unwrap_err().into();
        assert!(matches!(err, StoreError::Serialization { source: Some(_), .. }));
    }
}
