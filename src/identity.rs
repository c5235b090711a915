//! Process identity reported as the owner of every object.
//!
//! Backends have no notion of Unix ownership, so stat records claim that the
//! running process owns everything. Where POSIX ids are available they come
//! from `getuid`/`getgid`; otherwise the owner of the running executable is
//! used.

use std::sync::Arc;

/// Source of the uid/gid placed in stat records.
pub trait Identity: Send + Sync {
    /// User id.
    fn uid(&self) -> u32;
    /// Group id.
    fn gid(&self) -> u32;
}

/// Real user and group ids of the current process.
#[cfg(unix)]
#[derive(Debug, Clone, Copy, Default)]
pub struct PosixIdentity;

#[cfg(unix)]
impl Identity for PosixIdentity {
    fn uid(&self) -> u32 {
        nix::unistd::getuid().as_raw()
    }

    fn gid(&self) -> u32 {
        nix::unistd::getgid().as_raw()
    }
}

/// Owner of the running executable, or `0` where that cannot be read.
#[derive(Debug, Clone, Copy)]
pub struct FallbackIdentity {
    uid: u32,
    gid: u32,
}

impl FallbackIdentity {
    /// Read the owner of the current executable once.
    pub fn new() -> Self {
        let (uid, gid) = executable_owner().unwrap_or((0, 0));
        Self { uid, gid }
    }
}

impl Default for FallbackIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl Identity for FallbackIdentity {
    fn uid(&self) -> u32 {
        self.uid
    }

    fn gid(&self) -> u32 {
        self.gid
    }
}

#[cfg(unix)]
fn executable_owner() -> Option<(u32, u32)> {
    use std::os::unix::fs::MetadataExt;

    let meta = std::env::current_exe().and_then(std::fs::metadata).ok()?;
    Some((meta.uid(), meta.gid()))
}

#[cfg(not(unix))]
fn executable_owner() -> Option<(u32, u32)> {
    None
}

/// Fixed ids, for tests and embedders that want to pin ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticIdentity {
    /// User id.
    pub uid: u32,
    /// Group id.
    pub gid: u32,
}

impl Identity for StaticIdentity {
    fn uid(&self) -> u32 {
        self.uid
    }

    fn gid(&self) -> u32 {
        self.gid
    }
}

/// Pick the best identity source for this platform.
pub fn detect() -> Arc<dyn Identity> {
    #[cfg(unix)]
    {
        Arc::new(PosixIdentity)
    }
    #[cfg(not(unix))]
    {
        Arc::new(FallbackIdentity::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn posix_matches_nix() {
        let id = PosixIdentity;
        assert_eq!(id.uid(), nix::unistd::getuid().as_raw());
        assert_eq!(id.gid(), nix::unistd::getgid().as_raw());
    }

    #[cfg(unix)]
    #[test]
    fn fallback_reads_test_binary_owner() {
        use std::os::unix::fs::MetadataExt;

        let exe = std::env::current_exe().unwrap();
        let meta = std::fs::metadata(exe).unwrap();
        let id = FallbackIdentity::new();
        assert_eq!(id.uid(), meta.uid());
        assert_eq!(id.gid(), meta.gid());
    }

    #[test]
    fn detect_is_stable() {
        let a = detect();
        let b = detect();
        assert_eq!(a.uid(), b.uid());
        assert_eq!(a.gid(), b.gid());
    }

    #[test]
    fn static_identity() {
        let id = StaticIdentity { uid: 7, gid: 9 };
        assert_eq!((id.uid(), id.gid()), (7, 9));
    }
}
