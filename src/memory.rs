//! In-memory storage backend.
//!
//! Used by the test suite and handy for embedders that want a scratch
//! scheme. All data is lost when dropped.

use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::path::parent;
use crate::{
    Clock, FileKind, FsError, ListEntry, Listing, Metadata, ReadStream, StorageDir, StorageRead,
    StorageWrite, SystemClock, Visibility,
};

#[derive(Debug, Clone)]
enum Node {
    File {
        data: Vec<u8>,
        timestamp: i64,
        visibility: Visibility,
    },
    Directory,
}

/// Thread-safe in-memory object store.
///
/// Parent directories are created implicitly on write, the way most object
/// store adapters behave. Optional capabilities are off unless enabled with
/// the builder methods.
///
/// ```rust
/// use anyfs_stream::{MemoryStorage, StorageExt};
///
/// let storage = MemoryStorage::new().with_atomic_rename();
/// storage.write_all("docs/a.txt", b"hello").unwrap();
/// assert!(storage.is_dir("docs").unwrap());
/// assert_eq!(storage.read_all("docs/a.txt").unwrap(), b"hello");
/// ```
pub struct MemoryStorage {
    nodes: RwLock<BTreeMap<String, Node>>,
    clock: Arc<dyn Clock>,
    atomic_rename: bool,
    visibility: bool,
    sequential: bool,
}

impl std::fmt::Debug for MemoryStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStorage")
            .field("nodes", &self.nodes.read().len())
            .field("atomic_rename", &self.atomic_rename)
            .field("visibility", &self.visibility)
            .field("sequential", &self.sequential)
            .finish()
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(BTreeMap::new()),
            clock: Arc::new(SystemClock),
            atomic_rename: false,
            visibility: false,
            sequential: false,
        }
    }

    /// Advertise and implement atomic rename.
    pub fn with_atomic_rename(mut self) -> Self {
        self.atomic_rename = true;
        self
    }

    /// Accept visibility changes.
    pub fn with_visibility(mut self) -> Self {
        self.visibility = true;
        self
    }

    /// Hand out forward-only read streams, like an HTTP body.
    pub fn with_sequential_reads(mut self) -> Self {
        self.sequential = true;
        self
    }

    /// Stamp modification times from `clock`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Visibility of a stored file.
    pub fn visibility(&self, path: &str) -> Option<Visibility> {
        match self.nodes.read().get(path) {
            Some(Node::File { visibility, .. }) => Some(*visibility),
            _ => None,
        }
    }

    /// Number of stored files.
    pub fn file_count(&self) -> usize {
        self.nodes
            .read()
            .values()
            .filter(|node| matches!(node, Node::File { .. }))
            .count()
    }

    fn not_found(path: &str) -> FsError {
        FsError::NotFound {
            path: PathBuf::from(path),
        }
    }

    fn is_below(key: &str, dir: &str) -> bool {
        dir.is_empty() || key.strip_prefix(dir).is_some_and(|rest| rest.starts_with('/'))
    }

    fn ensure_parents(nodes: &mut BTreeMap<String, Node>, path: &str) -> Result<(), FsError> {
        let mut current = parent(path);
        while let Some(dir) = current {
            match nodes.get(dir) {
                Some(Node::Directory) => break,
                Some(Node::File { .. }) => {
                    return Err(FsError::Backend(format!("not a directory: {dir}")));
                }
                None => {
                    nodes.insert(dir.to_string(), Node::Directory);
                }
            }
            current = parent(dir);
        }
        Ok(())
    }

    fn entry_for(key: &str, node: &Node) -> ListEntry {
        match node {
            Node::File { data, timestamp, .. } => {
                let mut entry = ListEntry::new(key, FileKind::File);
                entry.size = Some(data.len() as u64);
                entry.timestamp = Some(*timestamp);
                entry
            }
            Node::Directory => ListEntry::new(key, FileKind::Directory),
        }
    }
}

impl StorageRead for MemoryStorage {
    fn read_stream(&self, path: &str) -> Result<ReadStream, FsError> {
        match self.nodes.read().get(path) {
            Some(Node::File { data, .. }) => {
                let cursor = Cursor::new(data.clone());
                Ok(if self.sequential {
                    ReadStream::sequential(cursor)
                } else {
                    ReadStream::seekable(cursor)
                })
            }
            Some(Node::Directory) => Err(FsError::Backend(format!("is a directory: {path}"))),
            None => Err(Self::not_found(path)),
        }
    }

    fn metadata(&self, path: &str) -> Result<Metadata, FsError> {
        if path.is_empty() {
            return Ok(Metadata::directory());
        }
        match self.nodes.read().get(path) {
            Some(Node::File { data, timestamp, .. }) => {
                Ok(Metadata::file(data.len() as u64).with_timestamp(*timestamp))
            }
            Some(Node::Directory) => Ok(Metadata::directory()),
            None => Err(Self::not_found(path)),
        }
    }

    fn exists(&self, path: &str) -> Result<bool, FsError> {
        Ok(path.is_empty() || self.nodes.read().contains_key(path))
    }

    fn list(&self, path: &str, recursive: bool) -> Result<Listing, FsError> {
        let nodes = self.nodes.read();
        let entries: Vec<Result<ListEntry, FsError>> = nodes
            .iter()
            .filter(|(key, _)| Self::is_below(key, path))
            .filter(|(key, _)| recursive || parent(key).unwrap_or("") == path)
            .map(|(key, node)| Ok(Self::entry_for(key, node)))
            .collect();
        Ok(Listing::from_vec(entries))
    }
}

impl StorageWrite for MemoryStorage {
    fn write_stream(&self, path: &str, contents: &mut dyn Read) -> Result<(), FsError> {
        let mut data = Vec::new();
        contents
            .read_to_end(&mut data)
            .map_err(|e| FsError::io("write_stream", path, e))?;

        let mut nodes = self.nodes.write();
        if matches!(nodes.get(path), Some(Node::Directory)) || path.is_empty() {
            return Err(FsError::Backend(format!("is a directory: {path}")));
        }
        Self::ensure_parents(&mut nodes, path)?;

        let visibility = match nodes.get(path) {
            Some(Node::File { visibility, .. }) => *visibility,
            _ => Visibility::Public,
        };
        nodes.insert(
            path.to_string(),
            Node::File {
                data,
                timestamp: self.clock.now(),
                visibility,
            },
        );
        Ok(())
    }

    fn delete(&self, path: &str) -> Result<(), FsError> {
        let mut nodes = self.nodes.write();
        match nodes.get(path) {
            Some(Node::File { .. }) => {
                nodes.remove(path);
                Ok(())
            }
            Some(Node::Directory) => Err(FsError::Backend(format!("is a directory: {path}"))),
            None => Err(Self::not_found(path)),
        }
    }

    fn rename(&self, from: &str, to: &str) -> Result<(), FsError> {
        let mut nodes = self.nodes.write();
        if !nodes.contains_key(from) {
            return Err(Self::not_found(from));
        }
        if Self::is_below(to, from) {
            return Err(FsError::InvalidPath {
                path: to.to_string(),
                reason: "destination is inside the source",
            });
        }
        Self::ensure_parents(&mut nodes, to)?;

        let moved: Vec<String> = nodes
            .keys()
            .filter(|key| key.as_str() == from || Self::is_below(key, from))
            .cloned()
            .collect();
        for key in moved {
            if let Some(node) = nodes.remove(&key) {
                let renamed = format!("{to}{}", &key[from.len()..]);
                nodes.insert(renamed, node);
            }
        }
        Ok(())
    }

    fn supports_atomic_rename(&self) -> bool {
        self.atomic_rename
    }

    fn atomic_rename(&self, from: &str, to: &str) -> Result<(), FsError> {
        if !self.atomic_rename {
            return Err(FsError::NotSupported {
                operation: "atomic_rename",
            });
        }
        self.rename(from, to)
    }

    fn set_visibility(&self, path: &str, visibility: Visibility) -> Result<(), FsError> {
        if !self.visibility {
            return Err(FsError::NotSupported {
                operation: "set_visibility",
            });
        }
        match self.nodes.write().get_mut(path) {
            Some(Node::File { visibility: v, .. }) => {
                *v = visibility;
                Ok(())
            }
            Some(Node::Directory) => Ok(()),
            None => Err(Self::not_found(path)),
        }
    }
}

impl StorageDir for MemoryStorage {
    fn create_directory(&self, path: &str) -> Result<(), FsError> {
        if path.is_empty() {
            return Ok(());
        }
        let mut nodes = self.nodes.write();
        match nodes.get(path) {
            Some(Node::Directory) => Ok(()),
            Some(Node::File { .. }) => Err(FsError::Backend(format!("file exists: {path}"))),
            None => {
                Self::ensure_parents(&mut nodes, path)?;
                nodes.insert(path.to_string(), Node::Directory);
                Ok(())
            }
        }
    }

    fn delete_directory(&self, path: &str, recursive: bool) -> Result<(), FsError> {
        let mut nodes = self.nodes.write();
        if !path.is_empty() && !matches!(nodes.get(path), Some(Node::Directory)) {
            return Err(Self::not_found(path));
        }

        let children: Vec<String> = nodes
            .keys()
            .filter(|key| Self::is_below(key, path))
            .cloned()
            .collect();
        if !recursive && !children.is_empty() {
            return Err(FsError::DirectoryNotEmpty {
                path: PathBuf::from(path),
            });
        }

        for key in children {
            nodes.remove(&key);
        }
        nodes.remove(path);
        Ok(())
    }
}
