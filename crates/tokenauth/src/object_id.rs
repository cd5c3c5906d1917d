//! Twelve-byte, time-ordered identifiers for audiences.
//!
//! Layout, big-endian throughout:
//!
//! ```text
//! ┌──────────────┬─────────────────────┬────────────┐
//! │ unix seconds │ process-random bytes│  counter   │
//! │   4 bytes    │       5 bytes       │  3 bytes   │
//! └──────────────┴─────────────────────┴────────────┘
//! ```
//!
//! The process bytes are drawn once per process; the counter starts at a
//! random value and wraps at 2^24.

use std::{
    fmt,
    str::FromStr,
    sync::{
        OnceLock,
        atomic::{AtomicU32, Ordering},
    },
};

use chrono::{DateTime, Utc};
use thiserror::Error;

const COUNTER_MASK: u32 = 0x00ff_ffff;

static PROCESS_BYTES: OnceLock<[u8; 5]> = OnceLock::new();
static COUNTER: OnceLock<AtomicU32> = OnceLock::new();

/// Error parsing an [`ObjectId`] from its hex form.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ObjectIdError {
    /// The input is not 24 hex characters.
    #[error("invalid object id {input:?}: expected 24 hex characters")]
    Invalid {
        /// The rejected input.
        input: String,
    },
}

/// A unique identifier, rendered as 24 lowercase hex characters.
///
/// # Example
///
/// ```
/// use tokenauth::ObjectId;
///
/// let a = ObjectId::new();
/// let b = ObjectId::new();
/// assert_ne!(a, b);
/// assert_eq!(a.hex().len(), 24);
/// assert_eq!(a.hex().parse::<ObjectId>()?, a);
/// # Ok::<(), tokenauth::ObjectIdError>(())
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId([u8; 12]);

impl ObjectId {
    /// Generates a fresh identifier stamped with the current time.
    #[must_use]
    pub fn new() -> Self {
        Self::at(Utc::now().timestamp())
    }

    fn at(unix: i64) -> Self {
        let secs = u32::try_from(unix).unwrap_or(0);
        let counter = COUNTER
            .get_or_init(|| AtomicU32::new(rand::random::<u32>() & COUNTER_MASK))
            .fetch_add(1, Ordering::Relaxed)
            & COUNTER_MASK;

        let mut bytes = [0u8; 12];
        bytes[..4].copy_from_slice(&secs.to_be_bytes());
        bytes[4..9].copy_from_slice(PROCESS_BYTES.get_or_init(rand::random));
        bytes[9..].copy_from_slice(&counter.to_be_bytes()[1..]);
        Self(bytes)
    }

    /// Wraps raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    /// Raw bytes.
    #[must_use]
    pub const fn bytes(&self) -> [u8; 12] {
        self.0
    }

    /// Lowercase hex rendering.
    #[must_use]
    pub fn hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Seconds part of the identifier.
    #[must_use]
    pub fn timestamp(&self) -> u32 {
        u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }

    /// Creation instant, at one-second resolution.
    #[must_use]
    pub fn time(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(i64::from(self.timestamp()), 0).unwrap_or_default()
    }

    /// The per-process random bytes.
    #[must_use]
    pub fn process_bytes(&self) -> [u8; 5] {
        [self.0[4], self.0[5], self.0[6], self.0[7], self.0[8]]
    }

    /// The 24-bit counter value.
    #[must_use]
    pub fn counter(&self) -> u32 {
        u32::from_be_bytes([0, self.0[9], self.0[10], self.0[11]])
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.hex())
    }
}

impl FromStr for ObjectId {
    type Err = ObjectIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 12];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|_| ObjectIdError::Invalid { input: s.to_owned() })?;
        Ok(Self(bytes))
    }
}
