//! # tokenauth
//!
//! Opaque bearer tokens bound to audiences, on top of a pluggable
//! [`TokenStore`](tokenauth_store::TokenStore).
//!
//! This crate provides:
//! - **Issuing**: [`TokenAuth`] creates audiences, rotates their secrets and issues audience or
//!   single-slot tokens
//! - **Validation**: presented tokens are looked up, expired ones deleted, and failures reported
//!   with stable codes ([`ValidationError`])
//! - **Providers**: [`DefaultProvider`] for random secrets and HMAC-SHA256 token values, or any
//!   closure
//! - **Stock backends**: [`default_registry`] and [`open_default_store`]
//!
//! ## Example
//!
//! ```no_run
//! use tokenauth::{DEFAULT_STORE_PATH, DefaultProvider, TokenAuth, open_default_store};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let managed = open_default_store(DEFAULT_STORE_PATH).await?;
//! let auth = TokenAuth::builder().store(managed.store()).build();
//!
//! let provider = DefaultProvider::default();
//! let client = auth.new_audience_not_store("globalClient", &provider);
//! let token = auth.new_single_token("singleID", &client, &provider).await?;
//!
//! match auth.validate_token(&token.value).await {
//!     Ok(checked) => println!("token valid until {}", checked.dead_line),
//!     Err(e) => println!("token check did not pass: {e}"),
//! }
//!
//! managed.close().await?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Stock backend registry.
pub mod defaults;
/// Authentication error types.
pub mod error;
/// Audience and token issuing.
pub mod issuer;
/// Audience identifiers.
pub mod object_id;
/// Secret and token providers.
pub mod provider;
/// Random strings.
pub mod random;

// Re-export key types for convenience
pub use defaults::{
    DEFAULT_BACKEND, DEFAULT_STORE_PATH, MEMORY_BACKEND, default_registry, open_default_store,
};
pub use error::{AuthError, Result, ValidationError};
pub use issuer::TokenAuth;
pub use object_id::{ObjectId, ObjectIdError};
pub use provider::{DefaultProvider, SECRET_LENGTH, SecretProvider, TokenProvider};
pub use random::generate_random_string;
