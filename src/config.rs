//! Driver configuration.

use std::path::PathBuf;

use crate::cache::DEFAULT_CAPACITY;

/// Settings applied to every scheme registered through a
/// [`Registry`](crate::Registry).
///
/// ```rust
/// use anyfs_stream::DriverConfig;
///
/// let config = DriverConfig::default()
///     .with_cache_capacity(64)
///     .with_cache_ttl_secs(30)
///     .with_write_buffer(8 * 1024);
/// assert_eq!(config.cache_capacity, 64);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DriverConfig {
    /// Maximum entries in a default metadata cache.
    pub cache_capacity: usize,
    /// Lifetime of cached stat records in seconds; `0` never expires.
    pub cache_ttl_secs: u64,
    /// Directory holding advisory lock files. `None` uses the temp dir.
    pub lock_dir: Option<PathBuf>,
    /// Default implicit flush threshold for new stream sessions.
    pub write_buffer: Option<usize>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CAPACITY,
            cache_ttl_secs: 0,
            lock_dir: None,
            write_buffer: None,
        }
    }
}

impl DriverConfig {
    /// Set the default cache capacity.
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// Set the stat cache TTL.
    pub fn with_cache_ttl_secs(mut self, ttl: u64) -> Self {
        self.cache_ttl_secs = ttl;
        self
    }

    /// Set the lock directory.
    pub fn with_lock_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.lock_dir = Some(dir.into());
        self
    }

    /// Set the default write buffer threshold.
    pub fn with_write_buffer(mut self, threshold: usize) -> Self {
        self.write_buffer = Some(threshold);
        self
    }

    /// Lock directory with the default applied.
    pub fn lock_dir(&self) -> PathBuf {
        self.lock_dir.clone().unwrap_or_else(crate::lock::default_lock_dir)
    }

    /// Parse a JSON document. Missing fields take their defaults.
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> Result<Self, crate::FsError> {
        serde_json::from_str(json).map_err(|e| crate::FsError::Deserialization(e.to_string()))
    }
}
