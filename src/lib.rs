//! # anyfs-stream
//!
//! Scheme-based stream driver for **pluggable storage backends**.
//!
//! Register a backend under a scheme name and address its objects with URLs
//! like `fly://uploads/2024/a.txt`. The driver emulates file streams,
//! directory iteration, stat records and advisory locks on top of backends
//! that only know how to read, write and list whole objects.
//!
//! ---
//!
//! ## Quick Start
//!
//! ```rust
//! use anyfs_stream::{Driver, MemoryStorage, OpenMode, OpenOptions, Registry};
//! use anyfs_stream::identity;
//! use std::sync::Arc;
//!
//! let registry = Arc::new(Registry::new());
//! registry.register("fly", MemoryStorage::new(), None, identity::detect());
//!
//! let driver = Driver::new(registry);
//! let mut out = driver.open("fly://notes/a.txt", OpenMode::Write, OpenOptions::default())?;
//! out.write(b"hello")?;
//! out.close()?;
//!
//! let mut input = driver.open("fly://notes/a.txt", OpenMode::Read, OpenOptions::default())?;
//! assert_eq!(input.read(64)?, b"hello");
//! assert_eq!(driver.stat("fly://notes/a.txt")?.size, 5);
//! # Ok::<(), anyfs_stream::FsError>(())
//! ```
//!
//! ---
//!
//! ## Core Types
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`Registry`] | Scheme to backend bindings, with per-scheme cache and identity |
//! | [`Driver`] | URL-level operations: open, opendir, mkdir, rmdir, rename, unlink, stat |
//! | [`StreamSession`] | One open stream: buffered writes, seek emulation, locks |
//! | [`DirSession`] | Restartable directory iteration |
//! | [`Storage`] | What a backend implements |
//! | [`MetadataCache`] | Stat record cache; [`LruCache`] is the default |
//! | [`StatRecord`] | Emulated POSIX stat fields |
//! | [`FsError`] | Error type with context |
//!
//! ---
//!
//! ## Backend Contract
//!
//! ```text
//! StorageRead + StorageWrite + StorageDir = Storage
//! ```
//!
//! [`Storage`] has a blanket implementation; implement the three component
//! traits and the backend can be registered. [`MemoryStorage`] is a complete
//! in-process backend, handy in tests.
//!
//! ---
//!
//! ## Error Handling
//!
//! All operations return `Result<T, FsError>`. Failures at the driver surface
//! are also logged with `tracing`: caller misuse (unknown scheme, closed
//! session) at `error`, everything else at `warn`.
//!
//! ```rust
//! use anyfs_stream::FsError;
//!
//! let err = FsError::NotRegistered { scheme: "fly".into() };
//! assert!(err.is_programmer_error());
//! assert_eq!(err.to_string(), "scheme not registered: fly");
//! ```
//!
//! ---
//!
//! ## Thread Safety
//!
//! Backends, caches and the registry are `Send + Sync` and shared through
//! `Arc`. Sessions are owned by one caller at a time and hold an `Arc` to
//! their mount, so unregistering a scheme never invalidates an open session.
//!
//! ---
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `serde` | Serialization for records and config, JSON helpers, cache snapshots |

// Private modules
mod cache;
mod clock;
mod config;
mod dir;
mod driver;
mod error;
mod ext;
mod layer;
mod lock;
mod memory;
mod registry;
mod stat;
mod stream;
mod traits;
mod types;

// Public modules
pub mod identity;
pub mod path;

// Public re-exports - error types
pub use error::FsError;

// Public re-exports - core types
pub use types::{
    DIR_READABLE_MODE, DIR_WRITABLE_MODE, FILE_READABLE_MODE, FILE_WRITABLE_MODE, FileKind,
    ListEntry, LockOperation, Metadata, OpenMode, OpenOptions, PUBLIC_MASK, StatRecord,
    Visibility,
};

// Public re-exports - backend contract
pub use traits::{Listing, ReadSeek, ReadStream, Storage, StorageDir, StorageRead, StorageWrite};

// Public re-exports - driver surface
pub use dir::DirSession;
pub use driver::Driver;
pub use registry::{Mount, Registry};
pub use stream::StreamSession;

// Public re-exports - infrastructure
pub use cache::{CacheEntry, DEFAULT_CAPACITY, LruCache, MetadataCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::DriverConfig;
pub use ext::StorageExt;
pub use identity::Identity;
pub use layer::{Layer, LayerExt, Traced, TracingLayer};
pub use lock::{LockHandle, LockManager};
pub use memory::MemoryStorage;

// Conditional re-exports
#[cfg(feature = "serde")]
pub use ext::StorageExtJson;
