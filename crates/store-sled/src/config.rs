//! Engine tuning for the sled token store.
//!
//! [`SledOptions`] carries the knobs handed to [`sled::Config`] each time
//! the store opens a location. The location itself comes from
//! [`StoreConfig`](tokenauth_store::StoreConfig).

use std::path::Path;

use serde::{Deserialize, Serialize};
use tokenauth_store::ConfigError;

/// Default page cache size (64 MiB).
const DEFAULT_CACHE_CAPACITY: u64 = 64 * 1024 * 1024;

/// Default background flush period in milliseconds.
const DEFAULT_FLUSH_EVERY_MS: u64 = 500;

/// Smallest accepted page cache.
const MIN_CACHE_CAPACITY: u64 = 1024 * 1024;

/// Engine tuning for [`SledTokenStore`](crate::SledTokenStore).
///
/// # Example
///
/// ```
/// use tokenauth_store_sled::{SledOptions, StorageMode};
///
/// let options = SledOptions::builder()
///     .cache_capacity(16 * 1024 * 1024)
///     .mode(StorageMode::LowSpace)
///     .build()?;
/// assert_eq!(options.flush_every_ms(), Some(500));
/// # Ok::<(), tokenauth_store::ConfigError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SledOptions {
    /// Page cache size in bytes.
    #[serde(default = "default_cache_capacity")]
    cache_capacity: u64,

    /// Background flush period in milliseconds; zero disables periodic
    /// flushing.
    #[serde(default = "default_flush_every_ms")]
    flush_every_ms: u64,

    /// Space/throughput trade-off.
    #[serde(default)]
    mode: StorageMode,
}

fn default_cache_capacity() -> u64 {
    DEFAULT_CACHE_CAPACITY
}

fn default_flush_every_ms() -> u64 {
    DEFAULT_FLUSH_EVERY_MS
}

/// Serializable engine mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageMode {
    /// Favor a small on-disk footprint.
    #[default]
    LowSpace,
    /// Favor write throughput.
    HighThroughput,
}

impl From<StorageMode> for sled::Mode {
    fn from(mode: StorageMode) -> Self {
        match mode {
            StorageMode::LowSpace => sled::Mode::LowSpace,
            StorageMode::HighThroughput => sled::Mode::HighThroughput,
        }
    }
}

impl Default for SledOptions {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            flush_every_ms: DEFAULT_FLUSH_EVERY_MS,
            mode: StorageMode::default(),
        }
    }
}

#[bon::bon]
impl SledOptions {
    /// Creates engine options.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::BelowMinimum`] if `cache_capacity` is below
    /// 1 MiB.
    #[builder]
    pub fn new(
        #[builder(default = DEFAULT_CACHE_CAPACITY)] cache_capacity: u64,
        #[builder(default = DEFAULT_FLUSH_EVERY_MS)] flush_every_ms: u64,
        #[builder(default)] mode: StorageMode,
    ) -> Result<Self, ConfigError> {
        let options = Self { cache_capacity, flush_every_ms, mode };
        options.validate()?;
        Ok(options)
    }

    /// Checks the options, for values that bypassed the builder through
    /// deserialization.
    ///
    /// # Errors
    ///
    /// See [`new`](Self::new).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_capacity < MIN_CACHE_CAPACITY {
            return Err(ConfigError::BelowMinimum {
                field: "cache_capacity",
                min: MIN_CACHE_CAPACITY.to_string(),
                value: self.cache_capacity.to_string(),
            });
        }
        Ok(())
    }

    /// Page cache size in bytes.
    #[must_use]
    pub fn cache_capacity(&self) -> u64 {
        self.cache_capacity
    }

    /// Background flush period in milliseconds, `None` when disabled.
    #[must_use]
    pub fn flush_every_ms(&self) -> Option<u64> {
        (self.flush_every_ms > 0).then_some(self.flush_every_ms)
    }

    /// Engine mode.
    #[must_use]
    pub fn mode(&self) -> StorageMode {
        self.mode
    }

    /// Builds the engine configuration for `path`.
    pub(crate) fn to_sled_config(&self, path: &Path) -> sled::Config {
        sled::Config::new()
            .path(path)
            .cache_capacity(self.cache_capacity)
            .flush_every_ms(self.flush_every_ms())
            .mode(self.mode.into())
    }
}
