//! Audience record: the client principal tokens are issued against.

use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::{StoreError, StoreResult};

/// Default token lifetime in seconds (two hours).
pub const DEFAULT_TOKEN_PERIOD: u64 = 7200;

/// A client principal against which tokens are issued.
///
/// The `id` is unique and never changes once the audience is saved. The
/// `secret` may be rotated by overwriting it and saving the audience again,
/// which also discards every token previously issued under this audience.
///
/// Field names are serialized as `Name`, `ID`, `Secret` and `TokenPeriod`.
///
/// # Example
///
/// ```
/// use tokenauth_store::{Audience, DEFAULT_TOKEN_PERIOD};
///
/// let audience = Audience::builder()
///     .name("billing")
///     .id("5f1c0e6a9b3d2c1a0e6a9b3d")
///     .secret("s3cr3t".to_owned())
///     .build();
///
/// assert_eq!(audience.token_period, DEFAULT_TOKEN_PERIOD);
/// assert!(audience.validate().is_ok());
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
pub struct Audience {
    /// Human readable name.
    #[serde(rename = "Name")]
    #[builder(into)]
    pub name: String,

    /// Unique, immutable identifier.
    #[serde(rename = "ID")]
    #[builder(into)]
    pub id: String,

    /// Secret handed to the token provider; zeroed on drop.
    #[serde(rename = "Secret")]
    #[builder(into)]
    pub secret: Zeroizing<String>,

    /// Lifetime of tokens issued for this audience, in seconds. Zero means
    /// tokens never expire.
    #[serde(rename = "TokenPeriod")]
    #[builder(default = DEFAULT_TOKEN_PERIOD)]
    pub token_period: u64,
}

impl Audience {
    /// Checks that the audience can be persisted.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidAudience`] if the ID is empty or contains
    /// a NUL byte (reserved as the bucket key separator).
    pub fn validate(&self) -> StoreResult<()> {
        if self.id.is_empty() {
            return Err(StoreError::invalid_audience("audience id is empty"));
        }
        if self.id.contains('\0') {
            return Err(StoreError::invalid_audience("audience id contains a NUL byte"));
        }
        Ok(())
    }

    /// Replaces the secret in place.
    pub fn set_secret(&mut self, secret: impl Into<String>) {
        self.secret = Zeroizing::new(secret.into());
    }
}

impl fmt::Debug for Audience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Audience")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("secret", &"[REDACTED]")
            .field("token_period", &self.token_period)
            .finish()
    }
}
