//! # Stream Session
//!
//! Per-handle state for an open object.
//!
//! ## Modes
//!
//! | Mode | Body at open | Reads | Writes |
//! |------|--------------|-------|--------|
//! | [`Read`](OpenMode::Read) | backend read stream | yes | no |
//! | [`Write`](OpenMode::Write) | empty buffer | no | yes |
//! | [`Append`](OpenMode::Append) | existing content, or empty if missing | until the first write | always at the end |
//!
//! Writes only touch the in-memory buffer. The buffer is handed to the
//! backend on [`flush`](StreamSession::flush), when the write buffer
//! threshold is reached, and on [`close`](StreamSession::close).
//!
//! ## Lifecycle
//!
//! ```text
//! open ──▶ Open(Read | Write | Append) ──close──▶ Closed
//! ```
//!
//! `Closed` is terminal: every operation except `close` then fails with
//! [`FsError::InvalidState`]. Dropping an open session closes it, so a final
//! flush is attempted on every exit path.
//!
//! ## Seekability
//!
//! Backends may hand out forward-only read streams. The first seek on such
//! a handle wraps it in a read-ahead buffer that keeps every byte read from
//! that point on.

use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::sync::Arc;

use crate::error::log_failure;
use crate::stat;
use crate::{
    FileKind, FsError, LockHandle, LockOperation, Metadata, Mount, OpenMode, OpenOptions,
    ReadSeek, ReadStream, StatRecord, StorageRead, StorageWrite,
};

const FILL_CHUNK: usize = 8 * 1024;

/// Grow `buffer`'s capacity so it can hold `end` bytes, failing instead of
/// aborting when the allocation is impossible.
fn reserve_to(buffer: &mut Vec<u8>, end: u64) -> io::Result<()> {
    let end = usize::try_from(end).map_err(|_| {
        io::Error::new(io::ErrorKind::InvalidInput, "offset exceeds address space")
    })?;
    if let Some(additional) = end.checked_sub(buffer.len()) {
        buffer
            .try_reserve(additional)
            .map_err(|_| io::Error::from(io::ErrorKind::OutOfMemory))?;
    }
    Ok(())
}

/// Seekable view over a forward-only reader.
///
/// Keeps every byte read since `start`; seeking before `start` fails.
struct CachingReader {
    inner: Box<dyn Read + Send>,
    start: u64,
    cached: Vec<u8>,
    pos: u64,
    exhausted: bool,
}

impl CachingReader {
    fn new(inner: Box<dyn Read + Send>, start: u64) -> Self {
        Self {
            inner,
            start,
            cached: Vec::new(),
            pos: start,
            exhausted: false,
        }
    }

    fn end(&self) -> u64 {
        self.start + self.cached.len() as u64
    }

    /// Pull from the inner reader until `target` is buffered, or to the end.
    fn fill_to(&mut self, target: Option<u64>) -> io::Result<()> {
        let mut chunk = [0u8; FILL_CHUNK];
        while !self.exhausted && target.is_none_or(|t| self.end() < t) {
            match self.inner.read(&mut chunk) {
                Ok(0) => self.exhausted = true,
                Ok(n) => self.cached.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn snapshot(&mut self) -> io::Result<Cursor<Vec<u8>>> {
        self.fill_to(None)?;
        let mut cursor = Cursor::new(self.cached.clone());
        cursor.set_position(self.pos - self.start);
        Ok(cursor)
    }
}

impl Read for CachingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.fill_to(Some(self.pos.saturating_add(buf.len() as u64)))?;
        if self.pos >= self.end() {
            return Ok(0);
        }

        let offset = (self.pos - self.start) as usize;
        let n = buf.len().min(self.cached.len() - offset);
        buf[..n].copy_from_slice(&self.cached[offset..offset + n]);
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for CachingReader {
    fn seek(&mut self, from: SeekFrom) -> io::Result<u64> {
        let target = match from {
            SeekFrom::Start(n) => i128::from(n),
            SeekFrom::Current(delta) => i128::from(self.pos) + i128::from(delta),
            SeekFrom::End(delta) => {
                self.fill_to(None)?;
                i128::from(self.end()) + i128::from(delta)
            }
        };
        if target < i128::from(self.start) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before the first buffered byte",
            ));
        }
        self.pos = u64::try_from(target)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "seek offset overflow"))?;
        Ok(self.pos)
    }
}

enum Body {
    Buffer(Cursor<Vec<u8>>),
    Seekable(Box<dyn ReadSeek>),
    Sequential {
        reader: Box<dyn Read + Send>,
        pos: u64,
    },
    Caching(CachingReader),
}

impl Body {
    fn empty() -> Self {
        Body::Buffer(Cursor::new(Vec::new()))
    }

    fn from_stream(stream: ReadStream, must_seek: bool) -> Self {
        match stream {
            ReadStream::Seekable(reader) => Body::Seekable(reader),
            ReadStream::Sequential(reader) if must_seek => {
                Body::Caching(CachingReader::new(reader, 0))
            }
            ReadStream::Sequential(reader) => Body::Sequential { reader, pos: 0 },
        }
    }

    /// Turn a forward-only body into a seekable one. No-op otherwise.
    fn make_seekable(&mut self) {
        if matches!(self, Body::Sequential { .. }) {
            if let Body::Sequential { reader, pos } = std::mem::replace(self, Body::empty()) {
                *self = Body::Caching(CachingReader::new(reader, pos));
            }
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Body::Buffer(cursor) => cursor.read(buf),
            Body::Seekable(reader) => reader.read(buf),
            Body::Sequential { reader, pos } => {
                let n = reader.read(buf)?;
                *pos += n as u64;
                Ok(n)
            }
            Body::Caching(reader) => reader.read(buf),
        }
    }

    fn seek(&mut self, from: SeekFrom) -> io::Result<u64> {
        self.make_seekable();
        match self {
            Body::Buffer(cursor) => cursor.seek(from),
            Body::Seekable(reader) => reader.seek(from),
            Body::Caching(reader) => reader.seek(from),
            Body::Sequential { .. } => Err(io::Error::from(io::ErrorKind::Unsupported)),
        }
    }

    fn position(&mut self) -> io::Result<u64> {
        match self {
            Body::Buffer(cursor) => Ok(cursor.position()),
            Body::Seekable(reader) => reader.stream_position(),
            Body::Sequential { pos, .. } => Ok(*pos),
            Body::Caching(reader) => Ok(reader.pos),
        }
    }

    fn buffered_len(&self) -> Option<u64> {
        match self {
            Body::Buffer(cursor) => Some(cursor.get_ref().len() as u64),
            _ => None,
        }
    }

    fn snapshot(&mut self) -> io::Result<Cursor<Vec<u8>>> {
        self.make_seekable();
        match self {
            Body::Buffer(cursor) => Ok(cursor.clone()),
            Body::Seekable(reader) => {
                let pos = reader.stream_position()?;
                reader.seek(SeekFrom::Start(0))?;
                let mut data = Vec::new();
                reader.read_to_end(&mut data)?;
                reader.seek(SeekFrom::Start(pos))?;
                let mut cursor = Cursor::new(data);
                cursor.set_position(pos);
                Ok(cursor)
            }
            Body::Caching(reader) => reader.snapshot(),
            Body::Sequential { .. } => Err(io::Error::from(io::ErrorKind::Unsupported)),
        }
    }
}

/// An open object.
///
/// Created by [`Driver::open`](crate::Driver::open). Implements the
/// `std::io` traits, so it can be handed to anything expecting a file.
///
/// ```rust
/// use std::io::{Read, Write};
/// use std::sync::Arc;
/// use anyfs_stream::{identity, Driver, MemoryStorage, OpenMode, Registry};
///
/// let registry = Arc::new(Registry::new());
/// registry.register("mem", MemoryStorage::new(), None, identity::detect());
/// let driver = Driver::new(registry);
///
/// let mut out = driver.open("mem://notes.txt", OpenMode::Write, Default::default()).unwrap();
/// out.write_all(b"filedata").unwrap();
/// out.close().unwrap();
///
/// let mut text = String::new();
/// driver
///     .open("mem://notes.txt", OpenMode::Read, Default::default())
///     .unwrap()
///     .read_to_string(&mut text)
///     .unwrap();
/// assert_eq!(text, "filedata");
/// ```
pub struct StreamSession {
    mount: Option<Arc<Mount>>,
    url: String,
    target: String,
    mode: OpenMode,
    body: Body,
    write_buffer: Option<usize>,
    bytes_written: usize,
    dirty: bool,
    appended: bool,
    eof: bool,
    lock: Option<LockHandle>,
}

impl std::fmt::Debug for StreamSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSession")
            .field("url", &self.url)
            .field("mode", &self.mode)
            .field("dirty", &self.dirty)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl StreamSession {
    pub(crate) fn open(
        mount: Arc<Mount>,
        url: &str,
        target: String,
        mode: OpenMode,
        options: OpenOptions,
    ) -> Result<Self, FsError> {
        let mut dirty = false;
        let body = match mode {
            OpenMode::Read => {
                Body::from_stream(mount.backend().read_stream(&target)?, options.must_seek)
            }
            OpenMode::Write => Body::empty(),
            OpenMode::Append => match mount.backend().read_stream(&target) {
                Ok(stream) => {
                    let data = stream
                        .into_bytes()
                        .map_err(|e| FsError::io("read_stream", &target, e))?;
                    Body::Buffer(Cursor::new(data))
                }
                Err(error) if error.is_not_found() => {
                    // Appending to a missing object creates it on close.
                    dirty = true;
                    Body::empty()
                }
                Err(error) => return Err(error),
            },
        };

        tracing::debug!(url, ?mode, "opened");
        Ok(Self {
            write_buffer: options.write_buffer.or(mount.write_buffer()),
            mount: Some(mount),
            url: url.to_string(),
            target,
            mode,
            body,
            bytes_written: 0,
            dirty,
            appended: false,
            eof: false,
            lock: None,
        })
    }

    /// The URL this session was opened with.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Normalized backend path.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Access mode.
    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// Returns `true` if buffered changes have not reached the backend.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Returns `true` if the current handle supports random access.
    pub fn is_seekable(&self) -> bool {
        !matches!(self.body, Body::Sequential { .. })
    }

    /// Returns `true` once [`close`](Self::close) has run.
    pub fn is_closed(&self) -> bool {
        self.mount.is_none()
    }

    /// Current implicit flush threshold.
    pub fn write_buffer(&self) -> Option<usize> {
        self.write_buffer
    }

    /// Returns `true` once a read hit the end of the content.
    pub fn eof(&self) -> bool {
        self.eof
    }

    /// Set the implicit flush threshold.
    ///
    /// `None` flushes only on request and on close; `Some(0)` flushes after
    /// every write; `Some(n)` flushes once `n` bytes were written since the
    /// last flush.
    pub fn set_write_buffer(&mut self, threshold: Option<usize>) {
        self.write_buffer = threshold;
    }

    fn mount(&self, operation: &'static str) -> Result<Arc<Mount>, FsError> {
        self.mount.clone().ok_or(FsError::InvalidState {
            operation,
            state: "closed",
        })
    }

    fn report<T>(&self, operation: &'static str, result: Result<T, FsError>) -> Result<T, FsError> {
        if let Err(error) = &result {
            log_failure(&self.url, operation, error);
        }
        result
    }

    /// Read up to `buf.len()` bytes.
    pub fn read_into(&mut self, buf: &mut [u8]) -> Result<usize, FsError> {
        let result = self.read_inner(buf);
        self.report("read", result)
    }

    fn read_inner(&mut self, buf: &mut [u8]) -> Result<usize, FsError> {
        self.mount("read")?;
        match self.mode {
            OpenMode::Write => {
                return Err(FsError::InvalidState {
                    operation: "read",
                    state: "write-only",
                });
            }
            OpenMode::Append if self.appended => {
                return Err(FsError::InvalidState {
                    operation: "read",
                    state: "appending",
                });
            }
            _ => {}
        }

        let n = self
            .body
            .read(buf)
            .map_err(|e| FsError::io("read", &self.target, e))?;
        if n == 0 && !buf.is_empty() {
            self.eof = true;
        }
        Ok(n)
    }

    /// Read up to `count` bytes. Fewer are returned only at the end.
    pub fn read(&mut self, count: usize) -> Result<Vec<u8>, FsError> {
        let mut data = vec![0u8; count];
        let mut filled = 0;
        while filled < count {
            let n = self.read_into(&mut data[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        data.truncate(filled);
        Ok(data)
    }

    /// Write `data` into the buffer. Returns the number of bytes accepted.
    ///
    /// In append mode the position moves to the end first.
    pub fn write(&mut self, data: &[u8]) -> Result<usize, FsError> {
        let result = self.write_inner(data);
        self.report("write", result)
    }

    fn write_inner(&mut self, data: &[u8]) -> Result<usize, FsError> {
        self.mount("write")?;
        let append = self.mode == OpenMode::Append;
        let Body::Buffer(cursor) = &mut self.body else {
            return Err(FsError::InvalidState {
                operation: "write",
                state: "read-only",
            });
        };
        if !self.mode.is_writable() {
            return Err(FsError::InvalidState {
                operation: "write",
                state: "read-only",
            });
        }

        if append {
            cursor.set_position(cursor.get_ref().len() as u64);
            self.appended = true;
        }
        let written = match cursor.position().checked_add(data.len() as u64) {
            Some(end) => reserve_to(cursor.get_mut(), end).and_then(|()| cursor.write_all(data)),
            None => Err(io::Error::new(io::ErrorKind::InvalidInput, "offset overflow")),
        };
        written.map_err(|e| FsError::io("write", &self.target, e))?;

        self.dirty = true;
        self.eof = false;
        self.bytes_written += data.len();

        // A failed threshold flush is logged by flush and leaves the session dirty.
        if self.write_buffer.is_some_and(|t| self.bytes_written >= t) {
            let _ = self.flush();
        }
        Ok(data.len())
    }

    /// Move the position. Forward-only handles become seekable here.
    pub fn seek(&mut self, from: SeekFrom) -> Result<u64, FsError> {
        let result = self.mount("seek").and_then(|_| {
            self.eof = false;
            self.body
                .seek(from)
                .map_err(|e| FsError::io("seek", &self.target, e))
        });
        self.report("seek", result)
    }

    /// Current position.
    pub fn tell(&mut self) -> Result<u64, FsError> {
        let result = self.mount("tell").and_then(|_| {
            self.body
                .position()
                .map_err(|e| FsError::io("tell", &self.target, e))
        });
        self.report("tell", result)
    }

    /// Resize the buffer to `size` bytes. The position is left alone.
    pub fn truncate(&mut self, size: u64) -> Result<(), FsError> {
        let result = self.truncate_inner(size);
        self.report("truncate", result)
    }

    fn truncate_inner(&mut self, size: u64) -> Result<(), FsError> {
        self.mount("truncate")?;
        match &mut self.body {
            Body::Buffer(cursor) if self.mode.is_writable() => {
                let buffer = cursor.get_mut();
                reserve_to(buffer, size).map_err(|e| FsError::io("truncate", &self.target, e))?;
                // reserve_to proved `size` fits in usize.
                buffer.resize(size as usize, 0);
                self.dirty = true;
                Ok(())
            }
            _ => Err(FsError::InvalidState {
                operation: "truncate",
                state: "read-only",
            }),
        }
    }

    /// Send the buffer to the backend if it has unsaved changes.
    ///
    /// The cache entry for the path is dropped before the upload. On
    /// failure the session stays dirty so a later flush retries.
    pub fn flush(&mut self) -> Result<(), FsError> {
        let mount = self.mount("flush")?;
        if !self.dirty || self.mode == OpenMode::Read {
            return Ok(());
        }
        let Body::Buffer(cursor) = &self.body else {
            return Ok(());
        };

        mount.cache().remove(&self.target);
        let mut contents = cursor.get_ref().as_slice();
        match mount.backend().write_stream(&self.target, &mut contents) {
            Ok(()) => {
                tracing::debug!(url = %self.url, "flushed");
                self.dirty = false;
                self.bytes_written = 0;
                Ok(())
            }
            Err(error) => {
                log_failure(&self.url, "flush", &error);
                Err(error)
            }
        }
    }

    /// Flush and release the session.
    ///
    /// The handle is released even when the final flush fails; that failure
    /// is returned. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<(), FsError> {
        if self.is_closed() {
            return Ok(());
        }
        let result = self.flush();

        if let Some(mut lock) = self.lock.take() {
            lock.release();
        }
        self.body = Body::empty();
        self.mount = None;
        tracing::debug!(url = %self.url, "closed");
        result
    }

    /// Stat the open object.
    ///
    /// Writable sessions report the writable file mode, read-only ones the
    /// readable file mode. While the buffer holds unsaved changes, or the
    /// backend has no object yet, the size is the buffered length.
    pub fn stat(&mut self) -> Result<StatRecord, FsError> {
        let result = self.stat_inner();
        self.report("stat", result)
    }

    fn stat_inner(&mut self) -> Result<StatRecord, FsError> {
        let mount = self.mount("stat")?;
        let buffered = self.body.buffered_len();

        let mut record = match stat::stat_for(&mount, &self.target) {
            Ok(record) => record,
            Err(error) if error.is_not_found() => {
                let pending = Metadata {
                    kind: FileKind::File,
                    size: None,
                    timestamp: None,
                };
                stat::from_metadata(&mount, &pending, buffered)
            }
            Err(error) => return Err(error),
        };

        if self.dirty {
            if let Some(len) = buffered {
                record.size = len;
            }
        }
        if !self.mode.is_writable() {
            record = record.read_only();
        }
        Ok(record)
    }

    /// Duplicate the content as an independent in-memory handle at the
    /// current position. The session is left usable.
    pub fn cast(&mut self) -> Result<Cursor<Vec<u8>>, FsError> {
        let result = self.mount("cast").and_then(|_| {
            self.body
                .snapshot()
                .map_err(|e| FsError::io("cast", &self.target, e))
        });
        self.report("cast", result)
    }

    /// Apply `flock`-style operation bits.
    ///
    /// Codes that request nothing succeed without touching the lock store.
    /// A non-blocking request that would wait returns `Ok(false)`.
    pub fn lock(&mut self, operation: i32) -> Result<bool, FsError> {
        let result = self.lock_inner(operation);
        self.report("lock", result)
    }

    fn lock_inner(&mut self, operation: i32) -> Result<bool, FsError> {
        let mount = self.mount("lock")?;
        let Some(operation) = LockOperation::from_flock(operation) else {
            return Ok(true);
        };

        let handle = self
            .lock
            .get_or_insert_with(|| mount.locks().handle(mount.scheme(), &self.target));
        match operation {
            LockOperation::Unlock => {
                handle.release();
                Ok(true)
            }
            LockOperation::Shared { blocking } => handle.acquire(false, blocking),
            LockOperation::Exclusive { blocking } => handle.acquire(true, blocking),
        }
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        // Failures were already logged by flush.
        let _ = self.close();
    }
}

impl Read for StreamSession {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.read_into(buf)?)
    }
}

impl Write for StreamSession {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(StreamSession::write(self, buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(StreamSession::flush(self)?)
    }
}

impl Seek for StreamSession {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Ok(StreamSession::seek(self, pos)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::StaticIdentity;
    use crate::{
        DriverConfig, FILE_READABLE_MODE, FILE_WRITABLE_MODE, Listing, MemoryStorage, Registry,
        StorageDir, StorageExt,
    };
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn setup(storage: MemoryStorage) -> (Arc<MemoryStorage>, Arc<Mount>) {
        let storage = Arc::new(storage);
        let registry = Registry::new();
        registry.register(
            "t",
            storage.clone(),
            None,
            Arc::new(StaticIdentity { uid: 0, gid: 0 }),
        );
        (storage, registry.resolve("t").unwrap())
    }

    /// Shares a `MemoryStorage`, failing the next `upload_failures` uploads
    /// and optionally handing out reads a few bytes at a time.
    struct Unreliable {
        inner: Arc<MemoryStorage>,
        upload_failures: AtomicUsize,
        read_chunk: Option<usize>,
    }

    struct Trickle<R> {
        inner: R,
        chunk: usize,
    }

    impl<R: Read> Read for Trickle<R> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = buf.len().min(self.chunk);
            self.inner.read(&mut buf[..n])
        }
    }

    impl StorageRead for Unreliable {
        fn read_stream(&self, path: &str) -> Result<ReadStream, FsError> {
            let stream = self.inner.read_stream(path)?;
            let Some(chunk) = self.read_chunk else {
                return Ok(stream);
            };
            let data = stream
                .into_bytes()
                .map_err(|e| FsError::io("read_stream", path, e))?;
            Ok(ReadStream::sequential(Trickle {
                inner: Cursor::new(data),
                chunk,
            }))
        }
        fn metadata(&self, path: &str) -> Result<Metadata, FsError> {
            self.inner.metadata(path)
        }
        fn exists(&self, path: &str) -> Result<bool, FsError> {
            self.inner.exists(path)
        }
        fn list(&self, path: &str, recursive: bool) -> Result<Listing, FsError> {
            self.inner.list(path, recursive)
        }
    }

    impl StorageWrite for Unreliable {
        fn write_stream(&self, path: &str, contents: &mut dyn Read) -> Result<(), FsError> {
            let remaining = self.upload_failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.upload_failures.store(remaining - 1, Ordering::SeqCst);
                return Err(FsError::Backend("upload timed out".into()));
            }
            self.inner.write_stream(path, contents)
        }
        fn delete(&self, path: &str) -> Result<(), FsError> {
            self.inner.delete(path)
        }
        fn rename(&self, from: &str, to: &str) -> Result<(), FsError> {
            self.inner.rename(from, to)
        }
    }

    impl StorageDir for Unreliable {
        fn create_directory(&self, path: &str) -> Result<(), FsError> {
            self.inner.create_directory(path)
        }
        fn delete_directory(&self, path: &str, recursive: bool) -> Result<(), FsError> {
            self.inner.delete_directory(path, recursive)
        }
    }

    fn setup_unreliable(
        upload_failures: usize,
        read_chunk: Option<usize>,
        lock_dir: &Path,
    ) -> (Arc<MemoryStorage>, Arc<Mount>) {
        let storage = Arc::new(MemoryStorage::new());
        let backend = Unreliable {
            inner: storage.clone(),
            upload_failures: AtomicUsize::new(upload_failures),
            read_chunk,
        };
        let registry = Registry::with_config(DriverConfig::default().with_lock_dir(lock_dir));
        registry.register(
            "t",
            backend,
            None,
            Arc::new(StaticIdentity { uid: 0, gid: 0 }),
        );
        (storage, registry.resolve("t").unwrap())
    }

    fn open(mount: &Arc<Mount>, target: &str, mode: OpenMode) -> Result<StreamSession, FsError> {
        StreamSession::open(
            mount.clone(),
            &format!("t://{target}"),
            target.to_string(),
            mode,
            OpenOptions::default(),
        )
    }

    #[test]
    fn write_then_read_back() {
        let (storage, mount) = setup(MemoryStorage::new());

        let mut session = open(&mount, "f.txt", OpenMode::Write).unwrap();
        assert_eq!(session.write(b"filedata").unwrap(), 8);
        assert!(!storage.exists("f.txt").unwrap());
        session.close().unwrap();

        let mut session = open(&mount, "f.txt", OpenMode::Read).unwrap();
        assert_eq!(session.read(100).unwrap(), b"filedata");
        assert!(session.eof());
    }

    #[test]
    fn read_missing_is_not_found() {
        let (_, mount) = setup(MemoryStorage::new());
        assert!(open(&mount, "nope", OpenMode::Read).unwrap_err().is_not_found());
    }

    #[test]
    fn append_forces_end_position() {
        let (storage, mount) = setup(MemoryStorage::new());
        storage.write_all("f", b"abc").unwrap();

        let mut session = open(&mount, "f", OpenMode::Append).unwrap();
        session.seek(SeekFrom::Start(1)).unwrap();
        session.write(b"de").unwrap();
        session.seek(SeekFrom::Start(0)).unwrap();
        session.write(b"f").unwrap();
        session.close().unwrap();

        assert_eq!(storage.read_all("f").unwrap(), b"abcdef");
    }

    #[test]
    fn append_reads_until_first_write() {
        let (storage, mount) = setup(MemoryStorage::new());
        storage.write_all("f", b"abc").unwrap();

        let mut session = open(&mount, "f", OpenMode::Append).unwrap();
        assert_eq!(session.read(2).unwrap(), b"ab");
        session.write(b"d").unwrap();
        assert!(matches!(
            session.read(1),
            Err(FsError::InvalidState { operation: "read", .. })
        ));
    }

    #[test]
    fn append_to_missing_creates_empty_object() {
        let (storage, mount) = setup(MemoryStorage::new());

        let mut session = open(&mount, "new.log", OpenMode::Append).unwrap();
        assert!(session.is_dirty());
        session.close().unwrap();

        assert_eq!(storage.read_all("new.log").unwrap(), b"");
    }

    #[test]
    fn write_without_data_creates_nothing() {
        let (storage, mount) = setup(MemoryStorage::new());
        open(&mount, "f", OpenMode::Write).unwrap().close().unwrap();
        assert!(!storage.exists("f").unwrap());
    }

    #[test]
    fn read_only_rejects_writes() {
        let (storage, mount) = setup(MemoryStorage::new());
        storage.write_all("f", b"abc").unwrap();

        let mut session = open(&mount, "f", OpenMode::Read).unwrap();
        let err = session.write(b"x").unwrap_err();
        assert!(err.is_programmer_error());
        assert!(session.truncate(0).is_err());
    }

    #[test]
    fn write_only_rejects_reads() {
        let (_, mount) = setup(MemoryStorage::new());
        let mut session = open(&mount, "f", OpenMode::Write).unwrap();
        assert!(matches!(
            session.read(1),
            Err(FsError::InvalidState { state: "write-only", .. })
        ));
    }

    #[test]
    fn closed_session_rejects_everything() {
        let (_, mount) = setup(MemoryStorage::new());
        let mut session = open(&mount, "f", OpenMode::Write).unwrap();
        session.close().unwrap();

        assert!(session.is_closed());
        assert!(matches!(
            session.write(b"x"),
            Err(FsError::InvalidState { state: "closed", .. })
        ));
        assert!(session.flush().is_err());
        assert!(session.stat().is_err());
        session.close().unwrap();
    }

    #[test]
    fn threshold_flushes_mid_session() {
        let (storage, mount) = setup(MemoryStorage::new());
        let mut session = open(&mount, "f", OpenMode::Write).unwrap();
        session.set_write_buffer(Some(4));

        session.write(b"ab").unwrap();
        assert!(!storage.exists("f").unwrap());
        session.write(b"cd").unwrap();
        assert_eq!(storage.read_all("f").unwrap(), b"abcd");
        assert!(!session.is_dirty());

        session.write(b"e").unwrap();
        assert_eq!(storage.read_all("f").unwrap(), b"abcd");
        session.close().unwrap();
        assert_eq!(storage.read_all("f").unwrap(), b"abcde");
    }

    #[test]
    fn zero_threshold_flushes_every_write() {
        let (storage, mount) = setup(MemoryStorage::new());
        let mut session = open(&mount, "f", OpenMode::Write).unwrap();
        session.set_write_buffer(Some(0));
        session.write(b"a").unwrap();
        assert_eq!(storage.read_all("f").unwrap(), b"a");
    }

    #[test]
    fn flush_keeps_position() {
        let (_, mount) = setup(MemoryStorage::new());
        let mut session = open(&mount, "f", OpenMode::Write).unwrap();
        session.write(b"hello").unwrap();
        session.flush().unwrap();
        assert_eq!(session.tell().unwrap(), 5);
    }

    #[test]
    fn truncate_marks_dirty() {
        let (storage, mount) = setup(MemoryStorage::new());
        storage.write_all("f", b"abcdef").unwrap();

        let mut session = open(&mount, "f", OpenMode::Append).unwrap();
        assert!(!session.is_dirty());
        session.truncate(3).unwrap();
        assert!(session.is_dirty());
        session.close().unwrap();
        assert_eq!(storage.read_all("f").unwrap(), b"abc");
    }

    #[test]
    fn sequential_handle_becomes_seekable_on_demand() {
        let (storage, mount) = setup(MemoryStorage::new().with_sequential_reads());
        storage.write_all("f", b"0123456789").unwrap();

        let mut session = open(&mount, "f", OpenMode::Read).unwrap();
        assert!(!session.is_seekable());
        assert_eq!(session.tell().unwrap(), 0);

        assert_eq!(session.seek(SeekFrom::Start(7)).unwrap(), 7);
        assert!(session.is_seekable());
        assert_eq!(session.read(3).unwrap(), b"789");
        session.seek(SeekFrom::Start(2)).unwrap();
        assert_eq!(session.read(2).unwrap(), b"23");
        assert_eq!(session.seek(SeekFrom::End(-1)).unwrap(), 9);
    }

    #[test]
    fn caching_reader_rejects_seek_before_start() {
        let (storage, mount) = setup(MemoryStorage::new().with_sequential_reads());
        storage.write_all("f", b"0123456789").unwrap();

        let mut session = open(&mount, "f", OpenMode::Read).unwrap();
        assert_eq!(session.read(4).unwrap(), b"0123");
        assert_eq!(session.seek(SeekFrom::Current(0)).unwrap(), 4);
        assert!(session.seek(SeekFrom::Start(0)).is_err());
        assert_eq!(session.read(2).unwrap(), b"45");
    }

    #[test]
    fn must_seek_wraps_at_open() {
        let (storage, mount) = setup(MemoryStorage::new().with_sequential_reads());
        storage.write_all("f", b"abc").unwrap();

        let session = StreamSession::open(
            mount.clone(),
            "t://f",
            "f".into(),
            OpenMode::Read,
            OpenOptions::default().must_seek(),
        )
        .unwrap();
        assert!(session.is_seekable());
    }

    #[test]
    fn stat_modes_follow_handle() {
        let (storage, mount) = setup(MemoryStorage::new());
        storage.write_all("f", b"abc").unwrap();

        let mut reader = open(&mount, "f", OpenMode::Read).unwrap();
        assert_eq!(reader.stat().unwrap().mode, FILE_READABLE_MODE);

        let mut writer = open(&mount, "g", OpenMode::Write).unwrap();
        writer.write(b"12345").unwrap();
        let record = writer.stat().unwrap();
        assert_eq!(record.mode, FILE_WRITABLE_MODE);
        assert_eq!(record.size, 5);
    }

    #[test]
    fn cast_duplicates_without_consuming() {
        let (storage, mount) = setup(MemoryStorage::new());
        storage.write_all("f", b"abcdef").unwrap();

        let mut session = open(&mount, "f", OpenMode::Read).unwrap();
        session.read(2).unwrap();

        let mut copy = session.cast().unwrap();
        assert_eq!(copy.position(), 2);
        let mut rest = String::new();
        copy.read_to_string(&mut rest).unwrap();
        assert_eq!(rest, "cdef");

        assert_eq!(session.read(2).unwrap(), b"cd");
        session.close().unwrap();
    }

    #[test]
    fn drop_flushes() {
        let (storage, mount) = setup(MemoryStorage::new());
        {
            let mut session = open(&mount, "f", OpenMode::Write).unwrap();
            session.write(b"kept").unwrap();
        }
        assert_eq!(storage.read_all("f").unwrap(), b"kept");
    }

    #[test]
    fn flush_invalidates_cache() {
        let (storage, mount) = setup(MemoryStorage::new());
        storage.write_all("f", b"abc").unwrap();
        stat::stat_for(&mount, "f").unwrap();
        assert_eq!(mount.cache().count(), 1);

        let mut session = open(&mount, "f", OpenMode::Append).unwrap();
        session.write(b"d").unwrap();
        session.flush().unwrap();

        assert_eq!(mount.cache().count(), 0);
        assert_eq!(stat::stat_for(&mount, "f").unwrap().size, 4);
    }

    #[test]
    fn std_io_traits() {
        let (storage, mount) = setup(MemoryStorage::new());
        let mut session = open(&mount, "f", OpenMode::Write).unwrap();
        write!(session, "{}-{}", 1, 2).unwrap();
        Write::flush(&mut session).unwrap();
        assert_eq!(storage.read_all("f").unwrap(), b"1-2");
    }

    #[test]
    fn failed_threshold_flush_keeps_written_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let (storage, mount) = setup_unreliable(1, None, dir.path());

        let mut session = open(&mount, "f", OpenMode::Write).unwrap();
        session.set_write_buffer(Some(3));
        assert_eq!(session.write(b"abc").unwrap(), 3);
        assert!(session.is_dirty());
        assert!(!storage.exists("f").unwrap());

        session.close().unwrap();
        assert_eq!(storage.read_all("f").unwrap(), b"abc");
    }

    #[test]
    fn failed_flush_stays_dirty_until_retry() {
        let dir = tempfile::tempdir().unwrap();
        let (storage, mount) = setup_unreliable(1, None, dir.path());

        let mut session = open(&mount, "f", OpenMode::Write).unwrap();
        session.write(b"data").unwrap();
        assert!(matches!(session.flush(), Err(FsError::Backend(_))));
        assert!(session.is_dirty());

        session.flush().unwrap();
        assert!(!session.is_dirty());
        assert_eq!(storage.read_all("f").unwrap(), b"data");
    }

    #[test]
    fn close_releases_handle_when_final_flush_fails() {
        let dir = tempfile::tempdir().unwrap();
        let (storage, mount) = setup_unreliable(usize::MAX, None, dir.path());

        let mut session = open(&mount, "f", OpenMode::Write).unwrap();
        session.write(b"lost").unwrap();
        assert!(session.lock(LockOperation::LOCK_EX).unwrap());

        assert!(matches!(session.close(), Err(FsError::Backend(_))));
        assert!(session.is_closed());
        session.close().unwrap();
        assert!(!storage.exists("f").unwrap());

        let mut other = open(&mount, "f", OpenMode::Write).unwrap();
        assert!(
            other
                .lock(LockOperation::LOCK_EX | LockOperation::LOCK_NB)
                .unwrap()
        );
    }

    #[test]
    fn drop_with_failing_flush_does_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        let (storage, mount) = setup_unreliable(usize::MAX, None, dir.path());
        {
            let mut session = open(&mount, "f", OpenMode::Write).unwrap();
            session.write(b"x").unwrap();
        }
        assert!(!storage.exists("f").unwrap());
    }

    #[test]
    fn partial_chunks_are_not_eof() {
        let dir = tempfile::tempdir().unwrap();
        let (storage, mount) = setup_unreliable(0, Some(2), dir.path());
        storage.write_all("f", b"abcdef").unwrap();

        let mut session = open(&mount, "f", OpenMode::Read).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(session.read_into(&mut buf).unwrap(), 2);
        assert!(!session.eof());

        assert_eq!(session.read(10).unwrap(), b"cdef");
        assert!(session.eof());
    }

    #[test]
    fn far_seek_on_sequential_handle_reads_nothing() {
        let (storage, mount) = setup(MemoryStorage::new().with_sequential_reads());
        storage.write_all("f", b"0123").unwrap();

        let mut session = open(&mount, "f", OpenMode::Read).unwrap();
        assert_eq!(session.seek(SeekFrom::Start(u64::MAX - 1)).unwrap(), u64::MAX - 1);
        assert_eq!(session.read(8).unwrap(), b"");
        assert!(session.eof());
    }

    #[test]
    fn oversized_buffer_requests_fail_cleanly() {
        let (storage, mount) = setup(MemoryStorage::new());
        let mut session = open(&mount, "f", OpenMode::Write).unwrap();
        session.write(b"abc").unwrap();

        assert!(matches!(session.truncate(1 << 62), Err(FsError::Io { .. })));
        assert!(session.truncate(u64::MAX).is_err());

        session.seek(SeekFrom::Start(1 << 62)).unwrap();
        assert!(matches!(session.write(b"x"), Err(FsError::Io { .. })));

        session.seek(SeekFrom::Start(3)).unwrap();
        session.write(b"d").unwrap();
        session.close().unwrap();
        assert_eq!(storage.read_all("f").unwrap(), b"abcd");
    }

    #[test]
    fn unknown_lock_codes_are_permissive() {
        let (_, mount) = setup(MemoryStorage::new());
        let mut session = open(&mount, "f", OpenMode::Write).unwrap();
        assert!(session.lock(0).unwrap());
        assert!(session.lock(LockOperation::LOCK_NB).unwrap());
        assert!(session.lock(LockOperation::LOCK_UN).unwrap());
    }
}
