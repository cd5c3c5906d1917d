//! Store and janitor configuration.
//!
//! [`StoreConfig`] names the storage location handed to
//! [`TokenStore::open`](crate::TokenStore::open). It is usually parsed from a
//! small JSON payload:
//!
//! ```
//! use tokenauth_store::StoreConfig;
//!
//! let config = StoreConfig::from_json(r#"{"path":"./data/tokendb.bolt"}"#)?;
//! assert_eq!(config.path().to_str(), Some("./data/tokendb.bolt"));
//! # Ok::<(), tokenauth_store::ConfigError>(())
//! ```

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default janitor sweep interval (five minutes).
pub const DEFAULT_JANITOR_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Location of a store's backing data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Storage location. Its parent directory is created on open.
    path: PathBuf,
}

#[bon::bon]
impl StoreConfig {
    /// Creates a new configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] if `path` is empty.
    #[builder]
    pub fn new(#[builder(into)] path: PathBuf) -> Result<Self, ConfigError> {
        if path.as_os_str().is_empty() {
            return Err(ConfigError::MissingField { field: "path" });
        }
        Ok(Self { path })
    }

    /// Parses a JSON payload of the form `{"path": "..."}`.
    ///
    /// Unknown keys are ignored so that payloads written for earlier
    /// deployments keep working.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::Empty`] if the payload is empty
    /// - [`ConfigError::Malformed`] if it is not a JSON object
    /// - [`ConfigError::MissingField`] if `path` is absent or empty
    pub fn from_json(payload: &str) -> Result<Self, ConfigError> {
        if payload.trim().is_empty() {
            return Err(ConfigError::Empty);
        }

        #[derive(Deserialize)]
        struct Raw {
            path: Option<PathBuf>,
        }

        let raw: Raw = serde_json::from_str(payload).map_err(ConfigError::malformed)?;
        let path = raw.path.ok_or(ConfigError::MissingField { field: "path" })?;
        Self::builder().path(path).build()
    }

    /// Returns the storage location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Configuration for the background [`Janitor`](crate::Janitor).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JanitorConfig {
    interval: Duration,
}

impl Default for JanitorConfig {
    fn default() -> Self {
        Self { interval: DEFAULT_JANITOR_INTERVAL }
    }
}

#[bon::bon]
impl JanitorConfig {
    /// Creates a janitor configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::BelowMinimum`] if `interval` is zero.
    #[builder]
    pub fn new(
        #[builder(default = DEFAULT_JANITOR_INTERVAL)] interval: Duration,
    ) -> Result<Self, ConfigError> {
        if interval.is_zero() {
            return Err(ConfigError::BelowMinimum {
                field: "interval",
                min: "1ns".into(),
                value: "0s".into(),
            });
        }
        Ok(Self { interval })
    }

    /// Returns the sweep interval.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::empty("")]
    #[case::blank("   ")]
    fn test_empty_payload_rejected(#[case] payload: &str) {
        assert!(matches!(StoreConfig::from_json(payload), Err(ConfigError::Empty)));
    }

    #[rstest]
    #[case::not_json("path")]
    #[case::array("[]")]
    #[case::wrong_type(r#"{"path":7}"#)]
    fn test_malformed_payload_rejected(#[case] payload: &str) {
        assert!(matches!(StoreConfig::from_json(payload), Err(ConfigError::Malformed { .. })));
    }

    #[rstest]
    #[case::empty_object("{}")]
    #[case::other_key(r#"{"goodpath":""}"#)]
    #[case::empty_path(r#"{"path":""}"#)]
    fn test_missing_path_rejected(#[case] payload: &str) {
        assert!(matches!(
            StoreConfig::from_json(payload),
            Err(ConfigError::MissingField { field: "path" })
        ));
    }

    #[test]
    fn test_valid_payload() {
        let config = StoreConfig::from_json(r#"{"path":"/tmp/x/tokens.db","alias":"x"}"#).unwrap();
        assert_eq!(config.path(), Path::new("/tmp/x/tokens.db"));
    }

    #[test]
    fn test_janitor_defaults_and_minimum() {
        assert_eq!(JanitorConfig::default().interval(), DEFAULT_JANITOR_INTERVAL);
        assert_eq!(JanitorConfig::builder().build().unwrap().interval(), DEFAULT_JANITOR_INTERVAL);
        assert!(matches!(
            JanitorConfig::builder().interval(Duration::ZERO).build(),
            Err(ConfigError::BelowMinimum { field: "interval", .. })
        ));
    }
}
