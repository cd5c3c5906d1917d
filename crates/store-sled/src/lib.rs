//! Sled-backed implementation of [`TokenStore`](tokenauth_store::TokenStore).
//!
//! This crate provides [`SledTokenStore`], the persistent token store. One
//! database file holds every audience, every token, and the single-slot
//! table; writes touching several of them commit in one transaction.
//!
//! # Features
//!
//! - **Atomic writes**: cascades, slot replacement and index updates commit together
//! - **Switchable location**: `open` on a new path closes the previous database first
//! - **Tolerant sweep**: corrupt records are skipped and counted, never fatal
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     TokenAuth / Janitor                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │                     SledTokenStore                          │
//! │         (implements TokenStore, blocking pool bridge)       │
//! ├─────────────────────────────────────────────────────────────┤
//! │                     sled::Db                                │
//! │   bk_audiences │ bk_all_tokeninfo │ bk_token_singleIDs      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```no_run
//! use tokenauth_store::{Audience, StoreConfig, Token, TokenStore};
//! use tokenauth_store_sled::SledTokenStore;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = SledTokenStore::new();
//!     store.open(&StoreConfig::builder().path("./data/tokendb.bolt").build()?).await?;
//!
//!     let audience = Audience::builder().name("billing").id("a1").secret("s".to_owned()).build();
//!     store.save_audience(&audience).await?;
//!
//!     let now = chrono::Utc::now().timestamp();
//!     store.save_token(&Token::for_audience(&audience, "t1", now)).await?;
//!     assert_eq!(store.list_audience_tokens("a1").await?.len(), 1);
//!
//!     store.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Feature Flags
//!
//! - **`failpoints`**: Compiles in the `sweep-delete-token` injection point.

#![deny(unsafe_code)]

mod backend;
mod config;
mod error;
mod keys;

pub use backend::SledTokenStore;
pub use config::{SledOptions, StorageMode};
pub use error::SledStoreError;
