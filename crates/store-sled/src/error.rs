//! Error types for the sled token store.
//!
//! This module provides [`SledStoreError`] and its mapping onto the generic
//! [`StoreError`](tokenauth_store::StoreError) type.

use sled::transaction::TransactionError;
use thiserror::Error;
use tokenauth_store::StoreError;

/// Result type alias for sled store internals.
pub type Result<T> = std::result::Result<T, SledStoreError>;

/// Errors specific to the sled token store.
#[derive(Debug, Error)]
pub enum SledStoreError {
    /// Error from the sled engine.
    #[error("sled error: {0}")]
    Engine(#[from] sled::Error),

    /// The multi-tree transaction aborted.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// A record could not be encoded or decoded.
    #[error("Codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// A stored key or value is not in the expected layout.
    #[error("Key encoding error: {0}")]
    KeyEncoding(String),

    /// The storage directory could not be prepared.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SledStoreError {
    /// Returns `true` when another handle still holds the database file
    /// lock, which clears once that handle's background threads exit.
    pub(crate) fn is_lock_contention(&self) -> bool {
        match self {
            Self::Engine(sled::Error::Io(source)) | Self::Io(source) => {
                source.kind() == std::io::ErrorKind::WouldBlock
                    || source.to_string().contains("could not acquire lock")
            },
            _ => false,
        }
    }
}

impl From<TransactionError<()>> for SledStoreError {
    fn from(err: TransactionError<()>) -> Self {
        match err {
            TransactionError::Abort(()) => Self::Transaction("aborted".to_owned()),
            TransactionError::Storage(source) => Self::Engine(source),
        }
    }
}

impl From<SledStoreError> for StoreError {
    fn from(err: SledStoreError) -> Self {
        match err {
            SledStoreError::Engine(source) => engine_error_to_store_error(source),
            SledStoreError::Transaction(message) => {
                StoreError::storage(format!("Transaction: {message}"))
            },
            SledStoreError::Codec(source) => {
                StoreError::serialization_with_source(source.to_string(), source)
            },
            SledStoreError::KeyEncoding(message) => StoreError::serialization(message),
            SledStoreError::Io(source) => {
                StoreError::storage_with_source(format!("I/O: {source}"), source)
            },
        }
    }
}

/// Converts an engine error to a store error, keeping the source chain.
fn engine_error_to_store_error(err: sled::Error) -> StoreError {
    match &err {
        sled::Error::Corruption { .. } => {
            tracing::error!(error = %err, "sled reported corruption");
            StoreError::storage_with_source("storage file is corrupt", err)
        },
        sled::Error::Unsupported(message) => {
            StoreError::internal(format!("unsupported engine operation: {message}"))
        },
        _ => StoreError::storage_with_source(err.to_string(), err),
    }
}
