//! Name-keyed store construction.
//!
//! A [`StoreRegistry`] maps backend names to factories. The application
//! builds one at startup, registers the backends it links, and hands it to
//! whichever component opens stores by name:
//!
//! ```no_run
//! use std::sync::Arc;
//! use tokenauth_store::{MemoryTokenStore, StoreConfig, StoreRegistry, TokenStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut registry = StoreRegistry::new();
//! registry.register("memory", || Arc::new(MemoryTokenStore::new()) as Arc<dyn TokenStore>)?;
//!
//! let config = StoreConfig::from_json(r#"{"path":"./data/tokens.db"}"#)?;
//! let managed = registry.open("memory", &config).await?;
//! // ... use managed.store() ...
//! managed.close().await?;
//! # Ok(())
//! # }
//! ```

use std::{collections::BTreeMap, fmt, ops::Deref, sync::Arc};

use crate::{
    config::{JanitorConfig, StoreConfig},
    error::{RegistryError, StoreResult},
    janitor::Janitor,
    store::TokenStore,
};

/// Constructs a fresh, unopened store.
pub type StoreFactory = Arc<dyn Fn() -> Arc<dyn TokenStore> + Send + Sync>;

/// Registry of store backends keyed by name.
#[derive(Clone, Default)]
pub struct StoreRegistry {
    factories: BTreeMap<String, StoreFactory>,
}

impl StoreRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a backend factory under `name`.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::EmptyName`] if `name` is empty
    /// - [`RegistryError::Duplicate`] if `name` is already taken
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> Result<(), RegistryError>
    where
        F: Fn() -> Arc<dyn TokenStore> + Send + Sync + 'static,
    {
        let name = name.into();
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if self.factories.contains_key(&name) {
            return Err(RegistryError::Duplicate { name });
        }
        tracing::debug!(backend = %name, "store backend registered");
        self.factories.insert(name, Arc::new(factory));
        Ok(())
    }

    /// Returns `true` if a backend is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Iterates over registered backend names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Constructs an unopened store from the named backend.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownBackend`] if nothing is registered
    /// under `name`.
    pub fn create(&self, name: &str) -> Result<Arc<dyn TokenStore>, RegistryError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| RegistryError::UnknownBackend { name: name.to_owned() })?;
        Ok(factory())
    }

    /// Constructs, opens and attaches a janitor with the default interval.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::UnknownBackend`] if nothing is registered under `name`
    /// - [`RegistryError::Store`] if the store fails to open
    pub async fn open(
        &self,
        name: &str,
        config: &StoreConfig,
    ) -> Result<ManagedStore, RegistryError> {
        self.open_with_janitor(name, config, JanitorConfig::default()).await
    }

    /// Like [`open`](Self::open) with an explicit janitor configuration.
    ///
    /// # Errors
    ///
    /// See [`open`](Self::open).
    #[tracing::instrument(skip(self, config, janitor), fields(path = %config.path().display()))]
    pub async fn open_with_janitor(
        &self,
        name: &str,
        config: &StoreConfig,
        janitor: JanitorConfig,
    ) -> Result<ManagedStore, RegistryError> {
        let store = self.create(name)?;
        store.open(config).await?;
        let janitor = Janitor::start(Arc::clone(&store), janitor);
        Ok(ManagedStore { store, janitor: Some(janitor) })
    }
}

impl fmt::Debug for StoreRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let backends: Vec<&str> = self.names().collect();
        f.debug_struct("StoreRegistry").field("backends", &backends).finish()
    }
}

/// An opened store with its attached janitor.
///
/// Dereferences to the store. [`close`](Self::close) stops the janitor
/// before closing the store; dropping without closing only cancels the
/// janitor.
pub struct ManagedStore {
    store: Arc<dyn TokenStore>,
    janitor: Option<Janitor>,
}

impl ManagedStore {
    /// Returns a shareable handle to the store.
    #[must_use]
    pub fn store(&self) -> Arc<dyn TokenStore> {
        Arc::clone(&self.store)
    }

    /// Returns the attached janitor.
    #[must_use]
    pub fn janitor(&self) -> Option<&Janitor> {
        self.janitor.as_ref()
    }

    /// Stops the janitor, then closes the store.
    ///
    /// # Errors
    ///
    /// Returns the store's close error.
    pub async fn close(mut self) -> StoreResult<()> {
        if let Some(janitor) = self.janitor.take() {
            janitor.stop().await;
        }
        self.store.close().await
    }
}

impl Deref for ManagedStore {
    type Target = dyn TokenStore;

    fn deref(&self) -> &Self::Target {
        self.store.as_ref()
    }
}

impl fmt::Debug for ManagedStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedStore").field("janitor", &self.janitor).finish_non_exhaustive()
    }
}
