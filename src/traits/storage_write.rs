//! Write operations of a storage backend.

use std::io::Read;
use std::sync::Arc;

use crate::{FsError, Visibility};

/// Write operations of a storage backend.
///
/// # Optional Capabilities
///
/// - Atomic rename: advertise with [`supports_atomic_rename`](Self::supports_atomic_rename)
///   and implement [`atomic_rename`](Self::atomic_rename).
/// - Visibility: implement [`set_visibility`](Self::set_visibility).
///
/// Both default to [`FsError::NotSupported`].
///
/// # Object Safety
///
/// This trait is object-safe and can be used as `dyn StorageWrite`.
pub trait StorageWrite: Send + Sync {
    /// Create or replace the object at `path` with everything `contents` yields.
    ///
    /// # Errors
    ///
    /// - [`FsError::Io`] / [`FsError::Backend`] if the upload fails
    fn write_stream(&self, path: &str, contents: &mut dyn Read) -> Result<(), FsError>;

    /// Delete the object at `path`.
    ///
    /// # Errors
    ///
    /// - [`FsError::NotFound`] if there is no object at `path`
    fn delete(&self, path: &str) -> Result<(), FsError>;

    /// Move an object. May be implemented as copy-then-delete.
    ///
    /// # Errors
    ///
    /// - [`FsError::NotFound`] if the source does not exist
    fn rename(&self, from: &str, to: &str) -> Result<(), FsError>;

    /// Whether [`atomic_rename`](Self::atomic_rename) is implemented.
    fn supports_atomic_rename(&self) -> bool {
        false
    }

    /// Move an object in one step, replacing any existing destination.
    fn atomic_rename(&self, from: &str, to: &str) -> Result<(), FsError> {
        let _ = (from, to);
        Err(FsError::NotSupported {
            operation: "atomic_rename",
        })
    }

    /// Change who can read the object.
    fn set_visibility(&self, path: &str, visibility: Visibility) -> Result<(), FsError> {
        let _ = (path, visibility);
        Err(FsError::NotSupported {
            operation: "set_visibility",
        })
    }
}

impl<T: StorageWrite + ?Sized> StorageWrite for Arc<T> {
    fn write_stream(&self, path: &str, contents: &mut dyn Read) -> Result<(), FsError> {
        (**self).write_stream(path, contents)
    }

    fn delete(&self, path: &str) -> Result<(), FsError> {
        (**self).delete(path)
    }

    fn rename(&self, from: &str, to: &str) -> Result<(), FsError> {
        (**self).rename(from, to)
    }

    fn supports_atomic_rename(&self) -> bool {
        (**self).supports_atomic_rename()
    }

    fn atomic_rename(&self, from: &str, to: &str) -> Result<(), FsError> {
        (**self).atomic_rename(from, to)
    }

    fn set_visibility(&self, path: &str, visibility: Visibility) -> Result<(), FsError> {
        (**self).set_visibility(path, visibility)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SinkStorage;

    impl StorageWrite for SinkStorage {
        fn write_stream(&self, _: &str, contents: &mut dyn Read) -> Result<(), FsError> {
            std::io::copy(contents, &mut std::io::sink())?;
            Ok(())
        }

        fn delete(&self, _: &str) -> Result<(), FsError> {
            Ok(())
        }

        fn rename(&self, _: &str, _: &str) -> Result<(), FsError> {
            Ok(())
        }
    }

    #[test]
    fn storage_write_is_object_safe() {
        fn _check(_: &dyn StorageWrite) {}
    }

    #[test]
    fn optional_capabilities_default_to_not_supported() {
        let storage = SinkStorage;
        assert!(!storage.supports_atomic_rename());
        assert!(matches!(
            storage.atomic_rename("a", "b"),
            Err(FsError::NotSupported {
                operation: "atomic_rename"
            })
        ));
        assert!(matches!(
            storage.set_visibility("a", Visibility::Public),
            Err(FsError::NotSupported {
                operation: "set_visibility"
            })
        ));
    }

    #[test]
    fn arc_delegates() {
        let storage = Arc::new(SinkStorage);
        let mut data: &[u8] = b"payload";
        storage.write_stream("a", &mut data).unwrap();
        assert!(data.is_empty());
    }
}
