//! # Metadata Cache
//!
//! Bounded, recency-ordered cache from normalized backend paths to stat
//! records, with optional per-entry expiry.
//!
//! ## Ordering
//!
//! Entries are kept in an [`IndexMap`] from least to most recently touched.
//! A live `get` and every `set` move the key to the back; eviction pops
//! from the front until the map is back within capacity.
//!
//! ## Expiry
//!
//! A TTL of `0` never expires. An entry found expired by `get` is dropped
//! and reported as a miss.
//!
//! ```rust
//! use anyfs_stream::{LruCache, MetadataCache, StatRecord};
//!
//! let cache = LruCache::new(2);
//! cache.set("a", StatRecord::file(0, 0, 1), 0);
//! cache.set("b", StatRecord::file(0, 0, 2), 0);
//! cache.get("a"); // "b" is now the oldest
//! cache.set("c", StatRecord::file(0, 0, 3), 0);
//!
//! assert!(cache.get("b").is_none());
//! assert_eq!(cache.count(), 2);
//! ```

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::{Clock, StatRecord, SystemClock};

/// Default number of entries kept per scheme.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Cache of stat records keyed by normalized backend path.
///
/// Shared by every session of a scheme, so implementations must be safe to
/// use concurrently and must never expose a half-written entry.
pub trait MetadataCache: Send + Sync {
    /// Look up a live entry, promoting it to most recently used.
    fn get(&self, key: &str) -> Option<StatRecord>;

    /// Store an entry. `ttl_secs == 0` means it never expires.
    fn set(&self, key: &str, value: StatRecord, ttl_secs: u64);

    /// Drop an entry. Missing keys are ignored.
    fn remove(&self, key: &str);

    /// Drop `prefix` and every entry below it. The empty prefix clears the cache.
    fn remove_prefix(&self, prefix: &str);

    /// Number of stored entries, including ones not yet found expired.
    fn count(&self) -> usize;
}

/// A cached value with its expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CacheEntry<V> {
    /// The cached value.
    pub value: V,
    /// Expiry in epoch seconds; `None` never expires.
    pub expires_at: Option<i64>,
}

impl<V> CacheEntry<V> {
    fn is_live(&self, now: i64) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

/// Least-recently-used cache with optional TTL.
pub struct LruCache<V = StatRecord> {
    capacity: usize,
    entries: Mutex<IndexMap<String, CacheEntry<V>>>,
    clock: Arc<dyn Clock>,
}

impl<V> std::fmt::Debug for LruCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LruCache")
            .field("capacity", &self.capacity)
            .field("len", &self.entries.lock().len())
            .finish()
    }
}

impl<V> Default for LruCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl<V> LruCache<V> {
    /// Create an empty cache holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self::with_clock(capacity, Arc::new(SystemClock))
    }

    /// Create an empty cache reading time from `clock`.
    pub fn with_clock(capacity: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            capacity,
            entries: Mutex::new(IndexMap::new()),
            clock,
        }
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Drop an entry. Missing keys are ignored.
    pub fn remove(&self, key: &str) {
        self.entries.lock().shift_remove(key);
    }

    /// Drop `prefix` and every entry below it.
    pub fn remove_prefix(&self, prefix: &str) {
        let mut entries = self.entries.lock();
        if prefix.is_empty() {
            entries.clear();
            return;
        }
        let nested = format!("{prefix}/");
        entries.retain(|key, _| key != prefix && !key.starts_with(&nested));
    }

    /// Store an entry. `ttl_secs == 0` means it never expires.
    pub fn set(&self, key: &str, value: V, ttl_secs: u64) {
        let expires_at = if ttl_secs == 0 {
            None
        } else {
            let ttl = i64::try_from(ttl_secs).unwrap_or(i64::MAX);
            Some(self.clock.now().saturating_add(ttl))
        };
        self.insert(key.to_string(), CacheEntry { value, expires_at });
    }

    fn insert(&self, key: String, entry: CacheEntry<V>) {
        let mut entries = self.entries.lock();
        entries.shift_remove(&key);
        entries.insert(key, entry);

        while entries.len() > self.capacity {
            entries.shift_remove_index(0);
        }
    }
}

impl<V: Clone> LruCache<V> {
    /// Look up a live entry, promoting it to most recently used.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        let entry = entries.shift_remove(key)?;

        if !entry.is_live(now) {
            return None;
        }

        let value = entry.value.clone();
        entries.insert(key.to_string(), entry);
        Some(value)
    }
}

impl MetadataCache for LruCache<StatRecord> {
    fn get(&self, key: &str) -> Option<StatRecord> {
        LruCache::get(self, key)
    }

    fn set(&self, key: &str, value: StatRecord, ttl_secs: u64) {
        LruCache::set(self, key, value, ttl_secs)
    }

    fn remove(&self, key: &str) {
        LruCache::remove(self, key)
    }

    fn remove_prefix(&self, prefix: &str) {
        LruCache::remove_prefix(self, prefix)
    }

    fn count(&self) -> usize {
        self.len()
    }
}

#[cfg(feature = "serde")]
#[derive(serde::Serialize, serde::Deserialize)]
struct Snapshot<V> {
    key: String,
    #[serde(flatten)]
    entry: CacheEntry<V>,
}

#[cfg(feature = "serde")]
impl<V> LruCache<V>
where
    V: Clone + serde::Serialize + serde::de::DeserializeOwned,
{
    /// Serialize all entries, oldest first, to JSON.
    pub fn to_json(&self) -> Result<String, crate::FsError> {
        let snapshot: Vec<Snapshot<V>> = self
            .entries
            .lock()
            .iter()
            .map(|(key, entry)| Snapshot {
                key: key.clone(),
                entry: entry.clone(),
            })
            .collect();
        serde_json::to_string(&snapshot).map_err(|e| crate::FsError::Serialization(e.to_string()))
    }

    /// Load entries produced by [`to_json`](Self::to_json).
    ///
    /// Entries already expired are skipped; loaded entries become the most
    /// recently used, in their stored order, and capacity still applies.
    pub fn load_json(&self, json: &str) -> Result<usize, crate::FsError> {
        let snapshot: Vec<Snapshot<V>> = serde_json::from_str(json)
            .map_err(|e| crate::FsError::Deserialization(e.to_string()))?;
        let now = self.clock.now();
        let mut loaded = 0;

        for item in snapshot {
            if item.entry.is_live(now) {
                self.insert(item.key, item.entry);
                loaded += 1;
            }
        }
        Ok(loaded)
    }
}
