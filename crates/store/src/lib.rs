//! Token and audience storage for bearer-token authentication.
//!
//! This crate provides the [`TokenStore`] trait and the types that flow
//! through it: [`Audience`] records, the [`Token`]s issued against them,
//! configuration, errors, the background [`Janitor`] that purges expired
//! tokens, and the [`StoreRegistry`] that constructs stores by name.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      tokenauth                              │
//! │   (audience/token construction, validation, providers)      │
//! ├─────────────────────────────────────────────────────────────┤
//! │                   tokenauth-store                           │
//! │        TokenStore trait · Janitor · StoreRegistry           │
//! ├──────────────────┬──────────────────────────────────────────┤
//! │ MemoryTokenStore │         SledTokenStore                   │
//! │   (testing)      │  (in `tokenauth-store-sled`, on disk)    │
//! └──────────────────┴──────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```
//! use tokenauth_store::{Audience, MemoryTokenStore, Token, TokenStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MemoryTokenStore::new();
//!
//!     let audience = Audience::builder().name("billing").id("a1").secret("s".to_owned()).build();
//!     store.save_audience(&audience).await?;
//!
//!     let now = chrono::Utc::now().timestamp();
//!     store.save_token(&Token::for_audience(&audience, "t1", now)).await?;
//!
//!     // Deleting the audience cascades to its tokens.
//!     store.delete_audience("a1").await?;
//!     assert!(store.get_token("t1").await?.is_none());
//!     Ok(())
//! }
//! ```
//!
//! # Available Stores
//!
//! | Store | Use Case | Persistence |
//! |-------|----------|-------------|
//! | [`MemoryTokenStore`] | Testing, development | No |
//! | `SledTokenStore` (in `tokenauth-store-sled`) | Production | Yes |
//!
//! # Feature Flags
//!
//! - **`testutil`**: Enables the `testutil` and `conformance` modules (record builders, assertion
//!   macros, the shared contract suite). Enable this in `[dev-dependencies]` for integration
//!   tests.
//! - **`failpoints`**: Compiles in `fail` injection points (`sweep-delete-token`).

#![deny(unsafe_code)]

pub mod audience;
pub mod config;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used, clippy::panic)]
pub mod conformance;
pub mod error;
pub mod janitor;
pub mod memory;
pub mod registry;
pub mod store;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used)]
pub mod testutil;
pub mod token;
pub mod types;

// Re-export primary types at crate root for convenience
pub use audience::{Audience, DEFAULT_TOKEN_PERIOD};
pub use config::{DEFAULT_JANITOR_INTERVAL, JanitorConfig, StoreConfig};
pub use error::{BoxError, ConfigError, RegistryError, StoreError, StoreResult};
pub use janitor::Janitor;
pub use memory::MemoryTokenStore;
pub use registry::{ManagedStore, StoreFactory, StoreRegistry};
pub use store::TokenStore;
pub use token::{Token, TokenKind, dead_line_for};
pub use types::SweepStats;
