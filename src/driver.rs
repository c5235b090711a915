//! # Driver
//!
//! The call surface for scheme-qualified URLs.
//!
//! Every method takes URLs of the form `scheme://relative/path`, resolves
//! the scheme through the [`Registry`], normalizes the relative part and
//! talks to the backend.
//!
//! ## Operations
//!
//! | Kind | Methods |
//! |------|---------|
//! | Streams | [`open`](Driver::open) |
//! | Directories | [`opendir`](Driver::opendir), [`mkdir`](Driver::mkdir), [`rmdir`](Driver::rmdir) |
//! | Namespace | [`rename`](Driver::rename), [`unlink`](Driver::unlink) |
//! | Metadata | [`stat`](Driver::stat), [`stat_quiet`](Driver::stat_quiet), [`touch`](Driver::touch), [`chmod`](Driver::chmod) |
//!
//! ## Failures
//!
//! Every operation returns `Result`. Failures are also logged through
//! `tracing`: caller misuse ([`FsError::is_programmer_error`]) at `error`,
//! everything else at `warn`. [`stat_quiet`](Driver::stat_quiet) does not
//! log a missing path.

use std::path::PathBuf;
use std::sync::Arc;

use crate::error::log_failure;
use crate::path::{self, normalize, split_url};
use crate::{
    DirSession, FsError, Mount, OpenMode, OpenOptions, Registry, StatRecord, StorageDir,
    StorageExt, StorageRead, StorageWrite, StreamSession, Visibility, stat,
};

/// Entry point for URL-based file operations.
#[derive(Debug, Clone)]
pub struct Driver {
    registry: Arc<Registry>,
}

impl Driver {
    /// Create a driver over `registry`.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// The registry this driver resolves schemes through.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    fn resolve(&self, url: &str) -> Result<(Arc<Mount>, String), FsError> {
        let (scheme, raw) = split_url(url)?;
        let target = normalize(raw)?;
        Ok((self.registry.resolve(scheme)?, target))
    }

    fn report<T>(url: &str, operation: &'static str, result: Result<T, FsError>) -> Result<T, FsError> {
        if let Err(error) = &result {
            log_failure(url, operation, error);
        }
        result
    }

    /// Open a stream session.
    ///
    /// # Errors
    ///
    /// - [`FsError::NotFound`] when reading a missing object
    pub fn open(
        &self,
        url: &str,
        mode: OpenMode,
        options: OpenOptions,
    ) -> Result<StreamSession, FsError> {
        let result = self
            .resolve(url)
            .and_then(|(mount, target)| StreamSession::open(mount, url, target, mode, options));
        Self::report(url, "open", result)
    }

    /// Start a directory listing.
    pub fn opendir(&self, url: &str) -> Result<DirSession, FsError> {
        let result = self
            .resolve(url)
            .and_then(|(mount, target)| DirSession::open(mount, url, target));
        Self::report(url, "opendir", result)
    }

    /// Create a directory.
    ///
    /// Without `recursive`, a nested target requires its parent to exist.
    ///
    /// # Errors
    ///
    /// - [`FsError::NotFound`] if the parent is missing and `recursive` is off
    pub fn mkdir(&self, url: &str, recursive: bool) -> Result<(), FsError> {
        let result = self.resolve(url).and_then(|(mount, target)| {
            mount.cache().remove(&target);

            if !recursive {
                if let Some(parent) = path::parent(&target) {
                    if !mount.backend().exists(parent)? {
                        return Err(FsError::NotFound {
                            path: PathBuf::from(target),
                        });
                    }
                }
            }
            mount.backend().create_directory(&target)
        });
        Self::report(url, "mkdir", result)
    }

    /// Remove a directory.
    ///
    /// # Errors
    ///
    /// - [`FsError::PermissionDenied`] for the scheme root
    /// - [`FsError::DirectoryNotEmpty`] if `recursive` is off and entries remain
    pub fn rmdir(&self, url: &str, recursive: bool) -> Result<(), FsError> {
        let result = self.resolve(url).and_then(|(mount, target)| {
            if target.is_empty() {
                return Err(FsError::PermissionDenied {
                    path: PathBuf::new(),
                    operation: "rmdir",
                });
            }

            if !recursive {
                if let Some(first) = mount.backend().list(&target, false)?.next() {
                    first?;
                    return Err(FsError::DirectoryNotEmpty {
                        path: PathBuf::from(&target),
                    });
                }
            }

            mount.backend().delete_directory(&target, recursive)?;
            mount.cache().remove_prefix(&target);
            Ok(())
        });
        Self::report(url, "rmdir", result)
    }

    /// Move an object or directory within one scheme.
    ///
    /// Renaming a path onto itself succeeds without touching the backend.
    /// Atomic rename is used when the backend offers it; otherwise the
    /// backend's plain rename, and as a last resort copy-then-delete. Each
    /// step is tried once.
    ///
    /// # Errors
    ///
    /// - [`FsError::NotSupported`] when the URLs name different schemes
    pub fn rename(&self, from: &str, to: &str) -> Result<(), FsError> {
        let result = self.rename_inner(from, to);
        Self::report(from, "rename", result)
    }

    fn rename_inner(&self, from: &str, to: &str) -> Result<(), FsError> {
        let (from_scheme, _) = split_url(from)?;
        let (to_scheme, _) = split_url(to)?;
        if from_scheme != to_scheme {
            return Err(FsError::NotSupported {
                operation: "rename across schemes",
            });
        }

        let (mount, source) = self.resolve(from)?;
        let (_, dest) = self.resolve(to)?;

        mount.cache().remove_prefix(&source);
        mount.cache().remove_prefix(&dest);

        if source == dest {
            return Ok(());
        }

        let backend = mount.backend();
        if backend.supports_atomic_rename() {
            match backend.atomic_rename(&source, &dest) {
                Err(FsError::NotSupported { .. }) => {}
                other => return other,
            }
        }

        match backend.rename(&source, &dest) {
            Err(FsError::NotSupported { .. }) => {
                tracing::debug!(from, to, "rename unsupported, copying");
                backend.copy(&source, &dest)?;
                backend.delete(&source)
            }
            other => other,
        }
    }

    /// Delete an object.
    ///
    /// # Errors
    ///
    /// - [`FsError::NotFound`] if there is no object
    pub fn unlink(&self, url: &str) -> Result<(), FsError> {
        let result = self.resolve(url).and_then(|(mount, target)| {
            mount.cache().remove(&target);
            mount.backend().delete(&target)
        });
        Self::report(url, "unlink", result)
    }

    /// Stat a URL, logging a missing path at `warn`.
    pub fn stat(&self, url: &str) -> Result<StatRecord, FsError> {
        self.url_stat(url, false)
    }

    /// Stat a URL; a missing path is returned as [`FsError::NotFound`]
    /// without being logged.
    pub fn stat_quiet(&self, url: &str) -> Result<StatRecord, FsError> {
        self.url_stat(url, true)
    }

    /// Stat a URL, choosing whether a missing path is logged.
    pub fn url_stat(&self, url: &str, quiet: bool) -> Result<StatRecord, FsError> {
        let result = self
            .resolve(url)
            .and_then(|(mount, target)| stat::stat_for(&mount, &target));

        match &result {
            Err(error) if quiet && error.is_not_found() => {}
            Err(error) => log_failure(url, "stat", error),
            Ok(_) => {}
        }
        result
    }

    /// Returns `true` if the URL names an existing object or directory.
    pub fn exists(&self, url: &str) -> Result<bool, FsError> {
        match self.stat_quiet(url) {
            Ok(_) => Ok(true),
            Err(error) if error.is_not_found() => Ok(false),
            Err(error) => Err(error),
        }
    }

    /// Returns `true` if the URL names a file.
    pub fn is_file(&self, url: &str) -> Result<bool, FsError> {
        match self.stat_quiet(url) {
            Ok(record) => Ok(record.is_file()),
            Err(error) if error.is_not_found() => Ok(false),
            Err(error) => Err(error),
        }
    }

    /// Returns `true` if the URL names a directory.
    pub fn is_dir(&self, url: &str) -> Result<bool, FsError> {
        match self.stat_quiet(url) {
            Ok(record) => Ok(record.is_dir()),
            Err(error) if error.is_not_found() => Ok(false),
            Err(error) => Err(error),
        }
    }

    /// Create an empty object unless something already exists at the URL.
    pub fn touch(&self, url: &str) -> Result<(), FsError> {
        let result = self.resolve(url).and_then(|(mount, target)| {
            if mount.backend().exists(&target)? {
                return Ok(());
            }
            mount.cache().remove(&target);
            mount.backend().write_all(&target, b"")
        });
        Self::report(url, "touch", result)
    }

    /// Map Unix permission bits onto the object's visibility.
    ///
    /// Any group or other read bit makes it public. Backends without
    /// visibility support are treated as having applied the change.
    pub fn chmod(&self, url: &str, mode: u32) -> Result<(), FsError> {
        let visibility = Visibility::from_mode(mode);
        let result = self.resolve(url).and_then(|(mount, target)| {
            match mount.backend().set_visibility(&target, visibility) {
                Err(FsError::NotSupported { .. }) => {
                    tracing::debug!(url, ?visibility, "visibility not supported");
                    Ok(())
                }
                other => other,
            }
        });
        Self::report(url, "chmod", result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::StaticIdentity;
    use crate::MemoryStorage;

    fn setup(storage: MemoryStorage) -> (Arc<MemoryStorage>, Driver) {
        let storage = Arc::new(storage);
        let registry = Arc::new(Registry::new());
        registry.register(
            "t",
            storage.clone(),
            None,
            Arc::new(StaticIdentity { uid: 0, gid: 0 }),
        );
        (storage, Driver::new(registry))
    }

    #[test]
    fn unknown_scheme_is_programmer_error() {
        let (_, driver) = setup(MemoryStorage::new());
        let err = driver.stat("other://a").unwrap_err();
        assert!(matches!(err, FsError::NotRegistered { .. }));
    }

    #[test]
    fn malformed_url_is_invalid_path() {
        let (_, driver) = setup(MemoryStorage::new());
        assert!(matches!(
            driver.unlink("no-scheme"),
            Err(FsError::InvalidPath { .. })
        ));
        assert!(matches!(
            driver.unlink("t://../escape"),
            Err(FsError::InvalidPath { .. })
        ));
    }

    #[test]
    fn mkdir_requires_parent_unless_recursive() {
        let (storage, driver) = setup(MemoryStorage::new());

        assert!(driver.mkdir("t://a/b", false).unwrap_err().is_not_found());
        assert!(!storage.exists("a").unwrap());

        driver.mkdir("t://a", false).unwrap();
        driver.mkdir("t://a/b", false).unwrap();
        driver.mkdir("t://x/y/z", true).unwrap();
        assert!(storage.is_dir("x/y/z").unwrap());
    }

    #[test]
    fn mkdir_after_unlink_of_same_path() {
        let (_, driver) = setup(MemoryStorage::new());
        driver.touch("t://d").unwrap();
        driver.stat("t://d").unwrap();
        driver.unlink("t://d").unwrap();

        driver.mkdir("t://d", false).unwrap();
        assert!(driver.is_dir("t://d").unwrap());
    }

    #[test]
    fn rmdir_root_is_denied() {
        let (_, driver) = setup(MemoryStorage::new());
        assert!(matches!(
            driver.rmdir("t://", true),
            Err(FsError::PermissionDenied { .. })
        ));
        assert!(matches!(
            driver.rmdir("t:///./", false),
            Err(FsError::PermissionDenied { .. })
        ));
    }

    #[test]
    fn rmdir_recursive_drops_cached_children() {
        let (storage, driver) = setup(MemoryStorage::new());
        storage.write_all("d/a.txt", b"a").unwrap();
        driver.stat("t://d/a.txt").unwrap();

        driver.rmdir("t://d", true).unwrap();
        assert!(driver.stat_quiet("t://d/a.txt").unwrap_err().is_not_found());
    }

    #[test]
    fn rename_across_schemes_is_rejected() {
        let (_, driver) = setup(MemoryStorage::new());
        assert!(matches!(
            driver.rename("t://a", "u://a"),
            Err(FsError::NotSupported { .. })
        ));
    }

    #[test]
    fn rename_prefers_atomic() {
        let (storage, driver) = setup(MemoryStorage::new().with_atomic_rename());
        storage.write_all("a", b"1").unwrap();
        driver.rename("t://a", "t://b").unwrap();
        assert_eq!(storage.read_all("b").unwrap(), b"1");
    }

    #[test]
    fn rename_missing_source_fails() {
        let (_, driver) = setup(MemoryStorage::new());
        assert!(driver.rename("t://a", "t://b").unwrap_err().is_not_found());
    }

    #[test]
    fn touch_keeps_existing_content() {
        let (storage, driver) = setup(MemoryStorage::new());
        storage.write_all("f", b"data").unwrap();
        driver.touch("t://f").unwrap();
        assert_eq!(storage.read_all("f").unwrap(), b"data");

        driver.touch("t://g").unwrap();
        assert_eq!(storage.read_all("g").unwrap(), b"");
    }

    #[test]
    fn chmod_maps_visibility() {
        let (storage, driver) = setup(MemoryStorage::new().with_visibility());
        storage.write_all("f", b"").unwrap();

        driver.chmod("t://f", 0o600).unwrap();
        assert_eq!(storage.visibility("f"), Some(Visibility::Private));
        driver.chmod("t://f", 0o644).unwrap();
        assert_eq!(storage.visibility("f"), Some(Visibility::Public));
    }

    #[test]
    fn chmod_without_support_succeeds() {
        let (storage, driver) = setup(MemoryStorage::new());
        storage.write_all("f", b"").unwrap();
        driver.chmod("t://f", 0o600).unwrap();
    }

    #[test]
    fn exists_and_kind_checks() {
        let (storage, driver) = setup(MemoryStorage::new());
        storage.write_all("d/f", b"").unwrap();

        assert!(driver.exists("t://d").unwrap());
        assert!(driver.is_dir("t://d").unwrap());
        assert!(driver.is_file("t://d/f").unwrap());
        assert!(!driver.exists("t://nope").unwrap());
        assert!(driver.exists("other://x").is_err());
    }
}
