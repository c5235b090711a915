//! # Storage Capability Contract
//!
//! The interface the driver calls against. A storage adapter (local disk,
//! blob store, object store, ...) implements the three component traits and
//! gets [`Storage`] for free.
//!
//! ```text
//! StorageRead + StorageWrite + StorageDir = Storage
//! ```
//!
//! ## Quick Reference
//!
//! | Trait | Methods |
//! |-------|---------|
//! | [`StorageRead`] | `read_stream`, `metadata`, `exists`, `list` |
//! | [`StorageWrite`] | `write_stream`, `delete`, `rename`, `atomic_rename`, `set_visibility` |
//! | [`StorageDir`] | `create_directory`, `delete_directory` |
//!
//! Optional capabilities (`atomic_rename`, `set_visibility`) have default
//! implementations returning [`FsError::NotSupported`](crate::FsError::NotSupported).
//!
//! ## Blanket Implementation
//!
//! ```rust
//! use anyfs_stream::{
//!     FsError, Listing, Metadata, ReadStream, Storage, StorageDir, StorageRead, StorageWrite,
//! };
//! use std::io::Read;
//!
//! struct NullStorage;
//!
//! impl StorageRead for NullStorage {
//!     fn read_stream(&self, path: &str) -> Result<ReadStream, FsError> {
//!         Err(FsError::NotFound { path: path.into() })
//!     }
//!     fn metadata(&self, path: &str) -> Result<Metadata, FsError> {
//!         Err(FsError::NotFound { path: path.into() })
//!     }
//!     fn exists(&self, _: &str) -> Result<bool, FsError> { Ok(false) }
//!     fn list(&self, _: &str, _: bool) -> Result<Listing, FsError> {
//!         Ok(Listing::from_vec(vec![]))
//!     }
//! }
//! impl StorageWrite for NullStorage {
//!     fn write_stream(&self, _: &str, _: &mut dyn Read) -> Result<(), FsError> { Ok(()) }
//!     fn delete(&self, path: &str) -> Result<(), FsError> {
//!         Err(FsError::NotFound { path: path.into() })
//!     }
//!     fn rename(&self, _: &str, _: &str) -> Result<(), FsError> { Ok(()) }
//! }
//! impl StorageDir for NullStorage {
//!     fn create_directory(&self, _: &str) -> Result<(), FsError> { Ok(()) }
//!     fn delete_directory(&self, _: &str, _: bool) -> Result<(), FsError> { Ok(()) }
//! }
//!
//! fn use_storage(_: &dyn Storage) {}
//! use_storage(&NullStorage);
//! ```
//!
//! ## Thread Safety
//!
//! All traits require `Send + Sync` and take `&self`; one backend instance
//! serves every session of a scheme concurrently.

mod storage_dir;
mod storage_read;
mod storage_write;

pub use storage_dir::StorageDir;
pub use storage_read::{Listing, ReadSeek, ReadStream, StorageRead};
pub use storage_write::StorageWrite;

/// Complete storage backend: read, write and directory capabilities.
///
/// Automatically implemented for any type implementing the three component
/// traits. The driver only ever holds backends as `Arc<dyn Storage>`.
pub trait Storage: StorageRead + StorageWrite + StorageDir {}

impl<T: StorageRead + StorageWrite + StorageDir + ?Sized> Storage for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_is_object_safe() {
        fn _check(_: &dyn Storage) {}
    }

    #[test]
    fn arc_storage_is_storage() {
        fn _check<S: Storage>() {}
        fn _arc<S: Storage>() {
            _check::<std::sync::Arc<S>>();
        }
    }
}
