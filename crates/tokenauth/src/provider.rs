//! Secret and token string providers.
//!
//! [`TokenAuth`](crate::TokenAuth) never invents secrets or token values on
//! its own; it asks a [`SecretProvider`] and a [`TokenProvider`]. Any
//! closure of the right shape is a provider:
//!
//! ```
//! use tokenauth::{SecretProvider, TokenProvider};
//! use tokenauth_store::Audience;
//!
//! let secrets = |_client_id: &str| "one secret for everyone".to_owned();
//! let tokens = |audience: &Audience| format!("{}-fixed", audience.id);
//!
//! assert_eq!(secrets.generate_secret("a1"), "one secret for everyone");
//! # let audience = Audience::builder().name("n").id("a1").secret("s".to_owned()).build();
//! assert_eq!(tokens.generate_token(&audience), "a1-fixed");
//! ```
//!
//! Provider output is opaque: neither the issuer nor the store checks its
//! format.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tokenauth_store::Audience;

use crate::random::generate_random_string;

/// Length of secrets produced by [`DefaultProvider`].
pub const SECRET_LENGTH: usize = 32;

/// Length of the random salt mixed into each default token.
const TOKEN_SALT_LENGTH: usize = 6;

type HmacSha256 = Hmac<Sha256>;

/// Produces the secret for a newly created audience.
pub trait SecretProvider: Send + Sync {
    /// Returns a secret for the audience with ID `client_id`.
    fn generate_secret(&self, client_id: &str) -> String;
}

/// Produces the value of a newly issued token.
pub trait TokenProvider: Send + Sync {
    /// Returns a token value for `audience`.
    fn generate_token(&self, audience: &Audience) -> String;
}

impl<F> SecretProvider for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn generate_secret(&self, client_id: &str) -> String {
        self(client_id)
    }
}

impl<F> TokenProvider for F
where
    F: Fn(&Audience) -> String + Send + Sync,
{
    fn generate_token(&self, audience: &Audience) -> String {
        self(audience)
    }
}

/// Random secrets and HMAC-SHA256 token values.
///
/// Secrets are [`SECRET_LENGTH`] random alphanumerics. A token value is the
/// standard base64 encoding of `HMAC-SHA256(secret, "{id}:{salt}:{unix}")`
/// where `salt` is six fresh random alphanumerics, so two tokens issued in
/// the same second still differ.
#[derive(Debug, Clone, Default)]
pub struct DefaultProvider {
    /// Free-form label, useful when several providers are in play.
    pub name: String,
}

impl DefaultProvider {
    /// Creates a provider with the given label.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl SecretProvider for DefaultProvider {
    fn generate_secret(&self, _client_id: &str) -> String {
        generate_random_string(SECRET_LENGTH)
    }
}

impl TokenProvider for DefaultProvider {
    fn generate_token(&self, audience: &Audience) -> String {
        let info = format!(
            "{}:{}:{}",
            audience.id,
            generate_random_string(TOKEN_SALT_LENGTH),
            Utc::now().timestamp()
        );
        sign(audience.secret.as_bytes(), info.as_bytes())
    }
}

fn sign(secret: &[u8], payload: &[u8]) -> String {
    // HMAC accepts keys of any length; an empty value is rejected by the store.
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return String::new();
    };
    mac.update(payload);
    STANDARD.encode(mac.finalize().into_bytes())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::collections::HashSet;

    use proptest::prelude::*;
    use tokenauth_store::testutil::sample_audience;

    use super::*;

    #[test]
    fn test_secret_shape() {
        let secret = DefaultProvider::default().generate_secret("a1");
        assert_eq!(secret.len(), SECRET_LENGTH);
        assert!(secret.bytes().all(|b| b.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_token_is_base64_sha256() {
        let token = DefaultProvider::new("test").generate_token(&sample_audience("a1"));
        let raw = STANDARD.decode(&token).unwrap();
        assert_eq!(raw.len(), 32);
    }

    #[test]
    fn test_sign_known_vector() {
        // RFC 4231 test case 2.
        let mac = sign(b"Jefe", b"what do ya want for nothing?");
        let raw = STANDARD.decode(mac).unwrap();
        assert_eq!(
            hex::encode(raw),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_closure_providers() {
        let secrets = |id: &str| format!("secret-for-{id}");
        let tokens = |audience: &Audience| audience.name.clone();
        assert_eq!(secrets.generate_secret("x"), "secret-for-x");
        assert_eq!(tokens.generate_token(&sample_audience("x")), "audience x");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        /// Secrets and tokens from the default provider never collide.
        #[test]
        fn default_output_is_unique(n in 2usize..64) {
            let provider = DefaultProvider::default();
            let audience = sample_audience("uniq");
            let secrets: HashSet<String> =
                (0..n).map(|_| provider.generate_secret("uniq")).collect();
            let tokens: HashSet<String> =
                (0..n).map(|_| provider.generate_token(&audience)).collect();
            prop_assert_eq!(secrets.len(), n);
            prop_assert_eq!(tokens.len(), n);
        }
    }
}
