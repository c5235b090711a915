//! Advisory locks shared across processes.
//!
//! Each locked URL maps to a lock file named after the SHA-256 of the URL,
//! inside one lock directory. The lock itself is a `flock` on that file, so
//! it is visible to any process using the same directory and released by
//! the kernel if the holder dies.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::FsError;

/// Default lock directory under the system temp dir.
pub fn default_lock_dir() -> PathBuf {
    std::env::temp_dir().join("anyfs-stream")
}

/// Hands out [`LockHandle`]s rooted in one directory.
#[derive(Debug, Clone)]
pub struct LockManager {
    dir: PathBuf,
}

impl LockManager {
    /// Use `dir` for lock files. It is created on first lock.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The lock directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// A handle for `scheme://target`. Nothing is locked until
    /// [`LockHandle::acquire`] is called.
    pub fn handle(&self, scheme: &str, target: &str) -> LockHandle {
        let digest = Sha256::digest(format!("{scheme}://{target}").as_bytes());
        LockHandle {
            path: self.dir.join(format!("{}.lock", hex::encode(digest))),
            #[cfg(unix)]
            held: None,
            #[cfg(not(unix))]
            held: false,
        }
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new(default_lock_dir())
    }
}

/// One session's view of a lock. Dropping it releases the lock.
#[derive(Debug)]
pub struct LockHandle {
    path: PathBuf,
    #[cfg(unix)]
    held: Option<nix::fcntl::Flock<std::fs::File>>,
    #[cfg(not(unix))]
    held: bool,
}

impl LockHandle {
    /// Path of the backing lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `true` while a lock is held.
    pub fn is_held(&self) -> bool {
        #[cfg(unix)]
        {
            self.held.is_some()
        }
        #[cfg(not(unix))]
        {
            self.held
        }
    }

    /// Take a shared or exclusive lock.
    ///
    /// A held lock is converted in place. Returns `Ok(false)` when a
    /// non-blocking request would have to wait.
    #[cfg(unix)]
    pub fn acquire(&mut self, exclusive: bool, blocking: bool) -> Result<bool, FsError> {
        use nix::errno::Errno;
        use nix::fcntl::{Flock, FlockArg};

        let file = match self.held.take() {
            Some(lock) => match lock.unlock() {
                Ok(file) => file,
                Err((lock, errno)) => {
                    self.held = Some(lock);
                    return Err(FsError::io("unlock", &self.path, errno.into()));
                }
            },
            None => self.open()?,
        };

        let arg = match (exclusive, blocking) {
            (true, true) => FlockArg::LockExclusive,
            (true, false) => FlockArg::LockExclusiveNonblock,
            (false, true) => FlockArg::LockShared,
            (false, false) => FlockArg::LockSharedNonblock,
        };

        match Flock::lock(file, arg) {
            Ok(lock) => {
                tracing::debug!(path = %self.path.display(), exclusive, "lock acquired");
                self.held = Some(lock);
                Ok(true)
            }
            Err((_file, errno)) if errno == Errno::EWOULDBLOCK => Ok(false),
            Err((_file, errno)) => Err(FsError::io("lock", &self.path, errno.into())),
        }
    }

    /// Locks are not enforced on this platform; every request succeeds.
    #[cfg(not(unix))]
    pub fn acquire(&mut self, _exclusive: bool, _blocking: bool) -> Result<bool, FsError> {
        self.held = true;
        Ok(true)
    }

    /// Release the lock. Returns `true` if one was held.
    pub fn release(&mut self) -> bool {
        #[cfg(unix)]
        {
            match self.held.take() {
                Some(lock) => {
                    if let Err((_lock, errno)) = lock.unlock() {
                        // Dropping the descriptor releases the lock anyway.
                        tracing::warn!(path = %self.path.display(), %errno, "unlock failed");
                    }
                    tracing::debug!(path = %self.path.display(), "lock released");
                    true
                }
                None => false,
            }
        }
        #[cfg(not(unix))]
        {
            std::mem::replace(&mut self.held, false)
        }
    }

    #[cfg(unix)]
    fn open(&self) -> Result<std::fs::File, FsError> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| FsError::io("create_dir_all", dir, e))?;
        }
        std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .map_err(|e| FsError::io("open", &self.path, e))
    }
}
