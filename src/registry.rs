//! # Protocol Registry
//!
//! Binds scheme names to a backend, its metadata cache and its identity
//! source. A registry is an explicit object shared by reference (usually an
//! `Arc<Registry>`) with every [`Driver`](crate::Driver); there is no hidden
//! global table.
//!
//! ```rust
//! use anyfs_stream::{identity, MemoryStorage, Registry};
//!
//! let registry = Registry::new();
//! assert!(registry.register("fly", MemoryStorage::new(), None, identity::detect()));
//! assert!(!registry.register("fly", MemoryStorage::new(), None, identity::detect()));
//! assert!(registry.unregister("fly"));
//! assert!(!registry.unregister("fly"));
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::{
    Clock, DriverConfig, FsError, Identity, LockManager, LruCache, MetadataCache, StatRecord,
    Storage, SystemClock,
};

/// Everything a session needs from its scheme.
///
/// Sessions hold an `Arc<Mount>`, so unregistering a scheme does not pull
/// the backend out from under handles that are still open.
pub struct Mount {
    scheme: String,
    backend: Arc<dyn Storage>,
    cache: Arc<dyn MetadataCache>,
    identity: Arc<dyn Identity>,
    locks: LockManager,
    clock: Arc<dyn Clock>,
    cache_ttl_secs: u64,
    write_buffer: Option<usize>,
}

impl Mount {
    /// The scheme this mount is registered under.
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// The storage backend.
    pub fn backend(&self) -> &dyn Storage {
        self.backend.as_ref()
    }

    /// The shared metadata cache.
    pub fn cache(&self) -> &dyn MetadataCache {
        self.cache.as_ref()
    }

    /// The owner reported in stat records.
    pub fn identity(&self) -> &dyn Identity {
        self.identity.as_ref()
    }

    /// Lock manager for advisory locks.
    pub fn locks(&self) -> &LockManager {
        &self.locks
    }

    /// Time source for emulated access times.
    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// TTL applied to cached stat records.
    pub fn cache_ttl_secs(&self) -> u64 {
        self.cache_ttl_secs
    }

    /// Default write buffer threshold for new sessions.
    pub fn write_buffer(&self) -> Option<usize> {
        self.write_buffer
    }
}

impl std::fmt::Debug for Mount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mount")
            .field("scheme", &self.scheme)
            .field("cached", &self.cache.count())
            .field("locks", &self.locks)
            .finish()
    }
}

/// Scheme table.
pub struct Registry {
    mounts: RwLock<HashMap<String, Arc<Mount>>>,
    config: DriverConfig,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("schemes", &self.schemes())
            .field("config", &self.config)
            .finish()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Empty registry with the default configuration.
    pub fn new() -> Self {
        Self::with_config(DriverConfig::default())
    }

    /// Empty registry applying `config` to every registration.
    pub fn with_config(config: DriverConfig) -> Self {
        Self {
            mounts: RwLock::new(HashMap::new()),
            config,
            clock: Arc::new(SystemClock),
        }
    }

    /// Use `clock` for default caches and emulated times.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Bind `scheme` to a backend.
    ///
    /// Without a `cache`, a fresh [`LruCache`] sized from the configuration
    /// is created. Returns `false` if the scheme is already bound.
    pub fn register<S: Storage + 'static>(
        &self,
        scheme: &str,
        backend: S,
        cache: Option<Arc<dyn MetadataCache>>,
        identity: Arc<dyn Identity>,
    ) -> bool {
        match self.try_register(scheme, backend, cache, identity) {
            Ok(()) => true,
            Err(error) => {
                tracing::error!(scheme, %error, "register failed");
                false
            }
        }
    }

    /// Like [`register`](Self::register), reporting why it failed.
    ///
    /// # Errors
    ///
    /// - [`FsError::AlreadyRegistered`] if the scheme is bound
    /// - [`FsError::InvalidPath`] if the scheme is empty or contains `:`/`/`
    pub fn try_register<S: Storage + 'static>(
        &self,
        scheme: &str,
        backend: S,
        cache: Option<Arc<dyn MetadataCache>>,
        identity: Arc<dyn Identity>,
    ) -> Result<(), FsError> {
        if scheme.is_empty() || scheme.contains([':', '/']) {
            return Err(FsError::InvalidPath {
                path: scheme.to_string(),
                reason: "invalid scheme name",
            });
        }

        let mut mounts = self.mounts.write();
        if mounts.contains_key(scheme) {
            return Err(FsError::AlreadyRegistered {
                scheme: scheme.to_string(),
            });
        }

        let cache = cache.unwrap_or_else(|| {
            Arc::new(LruCache::<StatRecord>::with_clock(
                self.config.cache_capacity,
                self.clock.clone(),
            ))
        });

        let mount = Mount {
            scheme: scheme.to_string(),
            backend: Arc::new(backend),
            cache,
            identity,
            locks: LockManager::new(self.config.lock_dir()),
            clock: self.clock.clone(),
            cache_ttl_secs: self.config.cache_ttl_secs,
            write_buffer: self.config.write_buffer,
        };
        mounts.insert(scheme.to_string(), Arc::new(mount));
        tracing::debug!(scheme, "registered");
        Ok(())
    }

    /// Remove the binding for `scheme`. Returns `false` if it was not bound.
    pub fn unregister(&self, scheme: &str) -> bool {
        let removed = self.mounts.write().remove(scheme).is_some();
        if removed {
            tracing::debug!(scheme, "unregistered");
        }
        removed
    }

    /// Look up the mount for `scheme`.
    ///
    /// # Errors
    ///
    /// - [`FsError::NotRegistered`] if the scheme is not bound
    pub fn resolve(&self, scheme: &str) -> Result<Arc<Mount>, FsError> {
        self.mounts
            .read()
            .get(scheme)
            .cloned()
            .ok_or_else(|| FsError::NotRegistered {
                scheme: scheme.to_string(),
            })
    }

    /// Returns `true` if `scheme` is bound.
    pub fn is_registered(&self, scheme: &str) -> bool {
        self.mounts.read().contains_key(scheme)
    }

    /// Bound scheme names, sorted.
    pub fn schemes(&self) -> Vec<String> {
        let mut schemes: Vec<String> = self.mounts.read().keys().cloned().collect();
        schemes.sort();
        schemes
    }
}
