//! Read capabilities of a storage backend.

use std::io::{Read, Seek};
use std::sync::Arc;

use crate::{FsError, ListEntry, Metadata};

/// A readable, seekable byte source.
pub trait ReadSeek: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadSeek for T {}

/// Content handed out by [`StorageRead::read_stream`].
///
/// Backends report whether their handle can seek. Local files usually can;
/// HTTP bodies from object stores usually cannot.
pub enum ReadStream {
    /// Handle supporting random access.
    Seekable(Box<dyn ReadSeek>),
    /// Forward-only handle.
    Sequential(Box<dyn Read + Send>),
}

impl ReadStream {
    /// Wrap a seekable reader.
    pub fn seekable<R: Read + Seek + Send + 'static>(reader: R) -> Self {
        ReadStream::Seekable(Box::new(reader))
    }

    /// Wrap a forward-only reader.
    pub fn sequential<R: Read + Send + 'static>(reader: R) -> Self {
        ReadStream::Sequential(Box::new(reader))
    }

    /// Returns `true` if the handle supports random access.
    #[inline]
    pub fn is_seekable(&self) -> bool {
        matches!(self, ReadStream::Seekable(_))
    }

    /// Read the remaining content into memory.
    pub fn into_bytes(self) -> std::io::Result<Vec<u8>> {
        let mut data = Vec::new();
        match self {
            ReadStream::Seekable(mut reader) => reader.read_to_end(&mut data)?,
            ReadStream::Sequential(mut reader) => reader.read_to_end(&mut data)?,
        };
        Ok(data)
    }
}

impl std::fmt::Debug for ReadStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadStream::Seekable(_) => f.write_str("ReadStream::Seekable(..)"),
            ReadStream::Sequential(_) => f.write_str("ReadStream::Sequential(..)"),
        }
    }
}

/// Read operations of a storage backend.
///
/// Paths are normalized backend keys (see [`crate::path::normalize`]); the
/// scheme root is the empty string.
///
/// # Object Safety
///
/// This trait is object-safe and can be used as `dyn StorageRead`.
pub trait StorageRead: Send + Sync {
    /// Open the content at `path` for reading.
    ///
    /// # Errors
    ///
    /// - [`FsError::NotFound`] if there is no object at `path`
    fn read_stream(&self, path: &str) -> Result<ReadStream, FsError>;

    /// Get metadata for a path.
    ///
    /// # Errors
    ///
    /// - [`FsError::NotFound`] if the path does not exist
    fn metadata(&self, path: &str) -> Result<Metadata, FsError>;

    /// Check if a path exists.
    ///
    /// Only returns an error for unexpected failures.
    fn exists(&self, path: &str) -> Result<bool, FsError>;

    /// List the contents of a directory.
    ///
    /// The outer `Result` says whether the listing could be started; each
    /// item says whether that entry could be read.
    ///
    /// # Errors
    ///
    /// - [`FsError::NotFound`] if the backend can tell the directory is absent
    fn list(&self, path: &str, recursive: bool) -> Result<Listing, FsError>;
}

impl<T: StorageRead + ?Sized> StorageRead for Arc<T> {
    fn read_stream(&self, path: &str) -> Result<ReadStream, FsError> {
        (**self).read_stream(path)
    }

    fn metadata(&self, path: &str) -> Result<Metadata, FsError> {
        (**self).metadata(path)
    }

    fn exists(&self, path: &str) -> Result<bool, FsError> {
        (**self).exists(path)
    }

    fn list(&self, path: &str, recursive: bool) -> Result<Listing, FsError> {
        (**self).list(path, recursive)
    }
}

/// Iterator over listing entries.
///
/// Wraps a boxed iterator so each backend can hand out its own cursor type.
pub struct Listing(Box<dyn Iterator<Item = Result<ListEntry, FsError>> + Send + 'static>);

impl Listing {
    /// Create from any compatible iterator.
    pub fn new<I>(iter: I) -> Self
    where
        I: Iterator<Item = Result<ListEntry, FsError>> + Send + 'static,
    {
        Self(Box::new(iter))
    }

    /// Create from a pre-collected vector.
    pub fn from_vec(entries: Vec<Result<ListEntry, FsError>>) -> Self {
        Self(Box::new(entries.into_iter()))
    }

    /// Collect all entries, short-circuiting on first error.
    pub fn collect_all(self) -> Result<Vec<ListEntry>, FsError> {
        self.collect()
    }
}

impl Iterator for Listing {
    type Item = Result<ListEntry, FsError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next()
    }
}

impl std::fmt::Debug for Listing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Listing(..)")
    }
}
