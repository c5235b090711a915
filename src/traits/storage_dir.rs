//! Directory operations of a storage backend.

use std::sync::Arc;

use crate::FsError;

/// Directory operations of a storage backend.
///
/// Flat object stores may treat directories as key prefixes; they still
/// have to answer [`StorageRead::metadata`](super::StorageRead::metadata)
/// with [`FileKind::Directory`](crate::FileKind::Directory) for them.
///
/// # Object Safety
///
/// This trait is object-safe and can be used as `dyn StorageDir`.
pub trait StorageDir: Send + Sync {
    /// Create a directory, including missing parents.
    fn create_directory(&self, path: &str) -> Result<(), FsError>;

    /// Delete a directory.
    ///
    /// With `recursive` the contents go too; without it, backends may
    /// refuse non-empty directories.
    ///
    /// # Errors
    ///
    /// - [`FsError::NotFound`] if the directory does not exist
    fn delete_directory(&self, path: &str, recursive: bool) -> Result<(), FsError>;
}

impl<T: StorageDir + ?Sized> StorageDir for Arc<T> {
    fn create_directory(&self, path: &str) -> Result<(), FsError> {
        (**self).create_directory(path)
    }

    fn delete_directory(&self, path: &str, recursive: bool) -> Result<(), FsError> {
        (**self).delete_directory(path, recursive)
    }
}
