//! The stock backend registry.

use std::{path::PathBuf, sync::Arc};

use tokenauth_store::{
    ManagedStore, MemoryTokenStore, RegistryError, StoreConfig, StoreRegistry, TokenStore,
};
use tokenauth_store_sled::SledTokenStore;

use crate::error::Result;

/// Name of the persistent sled backend.
pub const DEFAULT_BACKEND: &str = "default";

/// Name of the in-memory backend.
pub const MEMORY_BACKEND: &str = "memory";

/// Location used by deployments that never configured one.
pub const DEFAULT_STORE_PATH: &str = "./data/tokendb.bolt";

/// Returns a registry holding [`DEFAULT_BACKEND`] (sled) and
/// [`MEMORY_BACKEND`].
///
/// # Errors
///
/// Returns [`AuthError::Registry`](crate::AuthError::Registry) only if the
/// stock names collide, which is a build defect.
pub fn default_registry() -> Result<StoreRegistry> {
    let mut registry = StoreRegistry::new();
    registry.register(DEFAULT_BACKEND, || Arc::new(SledTokenStore::new()) as Arc<dyn TokenStore>)?;
    registry
        .register(MEMORY_BACKEND, || Arc::new(MemoryTokenStore::new()) as Arc<dyn TokenStore>)?;
    Ok(registry)
}

/// Opens the [`DEFAULT_BACKEND`] at `path` with a janitor attached.
///
/// # Errors
///
/// Returns [`AuthError::Registry`](crate::AuthError::Registry) wrapping
/// - [`RegistryError::Config`] if `path` is empty
/// - [`RegistryError::Store`] if the database cannot be opened
pub async fn open_default_store(path: impl Into<PathBuf>) -> Result<ManagedStore> {
    let config = StoreConfig::builder().path(path).build().map_err(RegistryError::from)?;
    let managed = default_registry()?.open(DEFAULT_BACKEND, &config).await?;
    Ok(managed)
}
