//! Directory iterator sessions.

use std::sync::Arc;

use crate::error::log_failure;
use crate::{FsError, Listing, Mount, StorageRead};

/// Lazy, restartable enumeration of one directory.
///
/// Yields base names only. [`rewind`](Self::rewind) asks the backend for a
/// fresh listing; [`close`](Self::close) drops the cursor, after which
/// every call fails with [`FsError::InvalidState`].
pub struct DirSession {
    mount: Option<Arc<Mount>>,
    url: String,
    target: String,
    cursor: Option<Listing>,
}

impl std::fmt::Debug for DirSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirSession")
            .field("url", &self.url)
            .field("exhausted", &self.cursor.is_none())
            .field("closed", &self.mount.is_none())
            .finish()
    }
}

impl DirSession {
    /// Start a listing of `target`.
    ///
    /// An empty listing only counts as success when the directory exists;
    /// otherwise it is reported as [`FsError::NotFound`].
    pub(crate) fn open(mount: Arc<Mount>, url: &str, target: String) -> Result<Self, FsError> {
        let mut listing = mount.backend().list(&target, false)?.peekable();

        if listing.peek().is_none() && !target.is_empty() {
            let meta = mount.backend().metadata(&target)?;
            if !meta.is_dir() {
                return Err(FsError::NotFound {
                    path: target.into(),
                });
            }
        }

        Ok(Self {
            mount: Some(mount),
            url: url.to_string(),
            target,
            cursor: Some(Listing::new(listing)),
        })
    }

    /// The URL this session was opened with.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Next base name, or `None` once the listing is exhausted.
    pub fn read_next(&mut self) -> Result<Option<String>, FsError> {
        if self.mount.is_none() {
            return Err(self.misuse("readdir"));
        }
        let Some(cursor) = self.cursor.as_mut() else {
            return Ok(None);
        };

        match cursor.next() {
            Some(Ok(entry)) => Ok(Some(entry.basename)),
            Some(Err(error)) => {
                log_failure(&self.url, "readdir", &error);
                Err(error)
            }
            None => {
                self.cursor = None;
                Ok(None)
            }
        }
    }

    /// Start over with a fresh listing.
    pub fn rewind(&mut self) -> Result<(), FsError> {
        let Some(mount) = self.mount.clone() else {
            return Err(self.misuse("rewinddir"));
        };
        match mount.backend().list(&self.target, false) {
            Ok(listing) => {
                self.cursor = Some(listing);
                Ok(())
            }
            Err(error) => {
                log_failure(&self.url, "rewinddir", &error);
                Err(error)
            }
        }
    }

    /// Release the cursor and the mount.
    pub fn close(&mut self) {
        self.cursor = None;
        self.mount = None;
    }

    fn misuse(&self, operation: &'static str) -> FsError {
        let error = FsError::InvalidState {
            operation,
            state: "closed",
        };
        log_failure(&self.url, operation, &error);
        error
    }
}

impl Iterator for DirSession {
    type Item = Result<String, FsError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_next().transpose()
    }
}
