//! # Extension Traits
//!
//! Convenience methods on top of the storage capability contract.
//!
//! ## Overview
//!
//! [`StorageExt`] provides whole-object helpers that aren't part of the core
//! traits. They are default methods with a blanket implementation, so any
//! [`Storage`] gets them for free.
//!
//! | Method | Description |
//! |--------|-------------|
//! | [`read_all`](StorageExt::read_all) | Read an object into memory |
//! | [`write_all`](StorageExt::write_all) | Replace an object from a byte slice |
//! | [`is_file`](StorageExt::is_file) | Check if path is a file |
//! | [`is_dir`](StorageExt::is_dir) | Check if path is a directory |
//! | [`copy`](StorageExt::copy) | Copy one object to another path |
//!
//! ## JSON Support (Feature-Gated)
//!
//! With the `serde` feature enabled, `StorageExtJson` adds `read_json` and
//! `write_json`.

use crate::{FsError, Storage};

/// Extension methods for any storage backend.
///
/// # Example
///
/// ```rust
/// use anyfs_stream::{FsError, Storage, StorageExt};
///
/// fn archive<S: Storage>(storage: &S) -> Result<(), FsError> {
///     if storage.is_file("report.csv")? {
///         storage.copy("report.csv", "archive/report.csv")?;
///     }
///     Ok(())
/// }
/// ```
pub trait StorageExt: Storage {
    /// Read the whole object at `path`.
    fn read_all(&self, path: &str) -> Result<Vec<u8>, FsError> {
        self.read_stream(path)?
            .into_bytes()
            .map_err(|e| FsError::io("read_all", path, e))
    }

    /// Create or replace the object at `path` with `data`.
    fn write_all(&self, path: &str, data: &[u8]) -> Result<(), FsError> {
        let mut reader = data;
        self.write_stream(path, &mut reader)
    }

    /// Check if the path points to a file.
    ///
    /// Returns `Ok(false)` if the path doesn't exist (not an error).
    fn is_file(&self, path: &str) -> Result<bool, FsError> {
        match self.metadata(path) {
            Ok(m) => Ok(!m.is_dir()),
            Err(FsError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Check if the path points to a directory.
    ///
    /// Returns `Ok(false)` if the path doesn't exist (not an error).
    fn is_dir(&self, path: &str) -> Result<bool, FsError> {
        match self.metadata(path) {
            Ok(m) => Ok(m.is_dir()),
            Err(FsError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Stream the object at `from` into `to`.
    fn copy(&self, from: &str, to: &str) -> Result<(), FsError> {
        match self.read_stream(from)? {
            crate::ReadStream::Seekable(mut reader) => self.write_stream(to, &mut reader),
            crate::ReadStream::Sequential(mut reader) => self.write_stream(to, &mut reader),
        }
    }
}

impl<S: Storage + ?Sized> StorageExt for S {}

#[cfg(feature = "serde")]
mod json {
    use super::*;
    use serde::{Serialize, de::DeserializeOwned};

    /// JSON helpers, available with the `serde` feature.
    pub trait StorageExtJson: Storage {
        /// Read an object and deserialize it as JSON.
        ///
        /// # Errors
        ///
        /// - `FsError::NotFound` if the object doesn't exist
        /// - `FsError::Deserialization` if parsing fails
        fn read_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, FsError> {
            let data = self.read_all(path)?;
            serde_json::from_slice(&data).map_err(|e| FsError::Deserialization(e.to_string()))
        }

        /// Serialize a value and write it as pretty-printed JSON.
        fn write_json<T: Serialize>(&self, path: &str, value: &T) -> Result<(), FsError> {
            let json = serde_json::to_string_pretty(value)
                .map_err(|e| FsError::Serialization(e.to_string()))?;
            self.write_all(path, json.as_bytes())
        }
    }

    impl<S: Storage + ?Sized> StorageExtJson for S {}
}

#[cfg(feature = "serde")]
pub use json::StorageExtJson;
