//! Stat emulation from backend metadata.

use crate::{FileKind, FsError, Metadata, Mount, StatRecord, StorageRead};

/// Stat record for a normalized `target`, served from the cache when possible.
///
/// Fresh records are cached with the mount's TTL. `NotFound` and other
/// backend failures are returned as-is and never cached.
pub(crate) fn stat_for(mount: &Mount, target: &str) -> Result<StatRecord, FsError> {
    if let Some(hit) = mount.cache().get(target) {
        return Ok(hit);
    }

    let meta = mount.backend().metadata(target)?;
    let record = from_metadata(mount, &meta, None);
    mount.cache().set(target, record.clone(), mount.cache_ttl_secs());
    Ok(record)
}

/// Build a record from backend metadata.
///
/// `fallback_size` is used when the backend does not report a size.
pub(crate) fn from_metadata(mount: &Mount, meta: &Metadata, fallback_size: Option<u64>) -> StatRecord {
    let identity = mount.identity();
    match meta.kind {
        FileKind::Directory => StatRecord::directory(identity.uid(), identity.gid()),
        FileKind::File => {
            let size = meta.size.or(fallback_size).unwrap_or(0);
            let mut record = StatRecord::file(identity.uid(), identity.gid(), size);
            record.atime = mount.clock().now();
            if let Some(timestamp) = meta.timestamp {
                record.mtime = timestamp;
                record.ctime = timestamp;
            }
            record
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::identity::StaticIdentity;
    use crate::{
        DIR_WRITABLE_MODE, FILE_WRITABLE_MODE, ManualClock, MemoryStorage, Registry, StorageExt,
        StorageWrite,
    };

    fn mount(storage: Arc<MemoryStorage>) -> Arc<Mount> {
        let registry = Registry::new().with_clock(Arc::new(ManualClock::new(5_000)));
        registry.register("t", storage, None, Arc::new(StaticIdentity { uid: 10, gid: 20 }));
        registry.resolve("t").unwrap()
    }

    #[test]
    fn file_record() {
        let storage = Arc::new(MemoryStorage::new().with_clock(Arc::new(ManualClock::new(1_234))));
        storage.write_all("a.txt", b"hello").unwrap();
        let mount = mount(storage);

        let record = stat_for(&mount, "a.txt").unwrap();
        assert_eq!(record.mode, FILE_WRITABLE_MODE);
        assert_eq!((record.uid, record.gid), (10, 20));
        assert_eq!(record.size, 5);
        assert_eq!(record.atime, 5_000);
        assert_eq!((record.mtime, record.ctime), (1_234, 1_234));
    }

    #[test]
    fn directory_record_is_zeroed() {
        let storage = Arc::new(MemoryStorage::new());
        storage.write_all("d/a.txt", b"x").unwrap();
        let mount = mount(storage);

        let record = stat_for(&mount, "d").unwrap();
        assert_eq!(record.mode, DIR_WRITABLE_MODE);
        assert_eq!(record.size, 0);
        assert_eq!((record.atime, record.mtime, record.ctime), (0, 0, 0));
        assert_eq!((record.uid, record.gid), (10, 20));
    }

    #[test]
    fn hit_skips_backend() {
        let storage = Arc::new(MemoryStorage::new());
        storage.write_all("a.txt", b"abc").unwrap();
        let mount = mount(storage.clone());

        stat_for(&mount, "a.txt").unwrap();
        storage.delete("a.txt").unwrap();

        assert_eq!(stat_for(&mount, "a.txt").unwrap().size, 3);
    }

    #[test]
    fn not_found_is_not_cached() {
        let storage = Arc::new(MemoryStorage::new());
        let mount = mount(storage.clone());

        assert!(stat_for(&mount, "late.txt").unwrap_err().is_not_found());
        assert_eq!(mount.cache().count(), 0);

        storage.write_all("late.txt", b"1").unwrap();
        assert!(stat_for(&mount, "late.txt").is_ok());
    }

    #[test]
    fn fallback_size_applies_when_backend_is_silent() {
        let storage = Arc::new(MemoryStorage::new());
        let mount = mount(storage);
        let meta = Metadata {
            kind: FileKind::File,
            size: None,
            timestamp: None,
        };
        assert_eq!(from_metadata(&mount, &meta, Some(42)).size, 42);
        assert_eq!(from_metadata(&mount, &meta, None).size, 0);
    }
}
