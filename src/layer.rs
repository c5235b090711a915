//! # Layer Trait
//!
//! Tower-style middleware composition for storage backends.
//!
//! ## Overview
//!
//! A [`Layer`] wraps a backend to add cross-cutting behavior (logging,
//! metrics, retries) before it is registered under a scheme.
//!
//! ```text
//! Backend ──▶ Layer::layer() ──▶ Wrapped Backend ──▶ Registry::register()
//! ```
//!
//! Each middleware provides:
//! 1. A wrapper struct that implements the storage traits
//! 2. A `Layer` implementation that creates the wrapper
//!
//! ## Fluent Composition
//!
//! ```rust
//! use anyfs_stream::{LayerExt, MemoryStorage, Storage, TracingLayer};
//!
//! let backend = MemoryStorage::new().layer(TracingLayer::new("uploads"));
//! fn _takes_storage(_: &dyn Storage) {}
//! _takes_storage(&backend);
//! ```

use std::io::Read;

use crate::{
    FsError, Listing, Metadata, ReadStream, Storage, StorageDir, StorageRead, StorageWrite,
    Visibility,
};

/// A layer that wraps a backend to add functionality.
///
/// # Design Notes
///
/// - `layer(self, backend)` consumes both the layer and backend
/// - The resulting `Backend` should implement [`Storage`] so it can be
///   registered
pub trait Layer<S> {
    /// The resulting backend type after applying this layer.
    type Backend;

    /// Wrap the given backend with this layer's functionality.
    fn layer(self, backend: S) -> Self::Backend;
}

/// Extension trait for fluent layer composition.
pub trait LayerExt: Storage + Sized {
    /// Apply a layer to this backend.
    fn layer<L: Layer<Self>>(self, layer: L) -> L::Backend {
        layer.layer(self)
    }
}

impl<S: Storage> LayerExt for S {}

/// Logs every backend call at `debug` level.
#[derive(Debug, Clone)]
pub struct TracingLayer {
    label: String,
}

impl TracingLayer {
    /// Tag log lines with `label` (usually the scheme).
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl<S: Storage> Layer<S> for TracingLayer {
    type Backend = Traced<S>;

    fn layer(self, backend: S) -> Self::Backend {
        Traced {
            inner: backend,
            label: self.label,
        }
    }
}

/// Backend wrapper produced by [`TracingLayer`].
#[derive(Debug)]
pub struct Traced<S> {
    inner: S,
    label: String,
}

impl<S> Traced<S> {
    /// The wrapped backend.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn log<T>(&self, op: &'static str, path: &str, result: Result<T, FsError>) -> Result<T, FsError> {
        match &result {
            Ok(_) => tracing::debug!(storage = %self.label, op, path, "ok"),
            Err(error) => tracing::debug!(storage = %self.label, op, path, %error, "failed"),
        }
        result
    }
}

impl<S: StorageRead> StorageRead for Traced<S> {
    fn read_stream(&self, path: &str) -> Result<ReadStream, FsError> {
        self.log("read_stream", path, self.inner.read_stream(path))
    }

    fn metadata(&self, path: &str) -> Result<Metadata, FsError> {
        self.log("metadata", path, self.inner.metadata(path))
    }

    fn exists(&self, path: &str) -> Result<bool, FsError> {
        self.log("exists", path, self.inner.exists(path))
    }

    fn list(&self, path: &str, recursive: bool) -> Result<Listing, FsError> {
        self.log("list", path, self.inner.list(path, recursive))
    }
}

impl<S: StorageWrite> StorageWrite for Traced<S> {
    fn write_stream(&self, path: &str, contents: &mut dyn Read) -> Result<(), FsError> {
        self.log("write_stream", path, self.inner.write_stream(path, contents))
    }

    fn delete(&self, path: &str) -> Result<(), FsError> {
        self.log("delete", path, self.inner.delete(path))
    }

    fn rename(&self, from: &str, to: &str) -> Result<(), FsError> {
        tracing::debug!(storage = %self.label, to, "rename target");
        self.log("rename", from, self.inner.rename(from, to))
    }

    fn supports_atomic_rename(&self) -> bool {
        self.inner.supports_atomic_rename()
    }

    fn atomic_rename(&self, from: &str, to: &str) -> Result<(), FsError> {
        tracing::debug!(storage = %self.label, to, "atomic_rename target");
        self.log("atomic_rename", from, self.inner.atomic_rename(from, to))
    }

    fn set_visibility(&self, path: &str, visibility: Visibility) -> Result<(), FsError> {
        self.log(
            "set_visibility",
            path,
            self.inner.set_visibility(path, visibility),
        )
    }
}

impl<S: StorageDir> StorageDir for Traced<S> {
    fn create_directory(&self, path: &str) -> Result<(), FsError> {
        self.log("create_directory", path, self.inner.create_directory(path))
    }

    fn delete_directory(&self, path: &str, recursive: bool) -> Result<(), FsError> {
        self.log(
            "delete_directory",
            path,
            self.inner.delete_directory(path, recursive),
        )
    }
}
