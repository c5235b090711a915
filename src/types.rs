//! Core types for the stream driver.

/// `S_IFREG | 0o666`: regular file, writable by everyone.
pub const FILE_WRITABLE_MODE: u32 = 0o100666;

/// `S_IFREG | 0o444`: regular file, read-only.
pub const FILE_READABLE_MODE: u32 = 0o100444;

/// `S_IFDIR | 0o777`: directory, writable by everyone.
pub const DIR_WRITABLE_MODE: u32 = 0o40777;

/// `S_IFDIR | 0o444`: directory, read-only.
pub const DIR_READABLE_MODE: u32 = 0o40444;

/// Permission bits that make an object public (group/other read).
pub const PUBLIC_MASK: u32 = 0o044;

const S_IFMT: u32 = 0o170000;
const S_IFDIR: u32 = 0o040000;
const S_IFREG: u32 = 0o100000;

/// Kind of a storage object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FileKind {
    /// Regular file.
    File,
    /// Directory.
    Directory,
}

/// Metadata reported by a backend for a single path.
///
/// Object stores often omit size or timestamp, so both are optional.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Metadata {
    /// Kind of the object.
    pub kind: FileKind,
    /// Size in bytes, if known.
    pub size: Option<u64>,
    /// Last modification time in epoch seconds, if known.
    pub timestamp: Option<i64>,
}

impl Metadata {
    /// Metadata for a file of known size.
    pub fn file(size: u64) -> Self {
        Self {
            kind: FileKind::File,
            size: Some(size),
            timestamp: None,
        }
    }

    /// Metadata for a directory.
    pub fn directory() -> Self {
        Self {
            kind: FileKind::Directory,
            size: None,
            timestamp: None,
        }
    }

    /// Attach a modification timestamp.
    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Returns `true` if this is a directory.
    #[inline]
    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }
}

/// A single entry produced by a backend listing.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ListEntry {
    /// Full backend path of the entry.
    pub path: String,
    /// Final path component.
    pub basename: String,
    /// Kind of the entry.
    pub kind: FileKind,
    /// Size in bytes, if known.
    pub size: Option<u64>,
    /// Last modification time in epoch seconds, if known.
    pub timestamp: Option<i64>,
}

impl ListEntry {
    /// Build an entry from a backend path, deriving the basename.
    pub fn new(path: impl Into<String>, kind: FileKind) -> Self {
        let path = path.into();
        let basename = crate::path::basename(&path).to_string();
        Self {
            path,
            basename,
            kind,
            size: None,
            timestamp: None,
        }
    }
}

/// POSIX-style stat record emulated from backend metadata.
///
/// `kind` is fixed at construction; the mode bits always agree with it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatRecord {
    /// File-type and permission bits.
    pub mode: u32,
    /// Owning user id.
    pub uid: u32,
    /// Owning group id.
    pub gid: u32,
    /// Size in bytes.
    pub size: u64,
    /// Last access time (epoch seconds).
    pub atime: i64,
    /// Last modification time (epoch seconds).
    pub mtime: i64,
    /// Last status change time (epoch seconds).
    pub ctime: i64,
    kind: FileKind,
}

impl StatRecord {
    /// A directory record: writable directory mode, zero size and times.
    pub fn directory(uid: u32, gid: u32) -> Self {
        Self {
            mode: DIR_WRITABLE_MODE,
            uid,
            gid,
            size: 0,
            atime: 0,
            mtime: 0,
            ctime: 0,
            kind: FileKind::Directory,
        }
    }

    /// A file record with the writable file mode and the given size.
    pub fn file(uid: u32, gid: u32, size: u64) -> Self {
        Self {
            mode: FILE_WRITABLE_MODE,
            uid,
            gid,
            size,
            atime: 0,
            mtime: 0,
            ctime: 0,
            kind: FileKind::File,
        }
    }

    /// The object kind this record was built for.
    #[inline]
    pub fn kind(&self) -> FileKind {
        self.kind
    }

    /// Returns `true` if the mode bits describe a regular file.
    #[inline]
    pub fn is_file(&self) -> bool {
        self.mode & S_IFMT == S_IFREG
    }

    /// Returns `true` if the mode bits describe a directory.
    #[inline]
    pub fn is_dir(&self) -> bool {
        self.mode & S_IFMT == S_IFDIR
    }

    /// Returns `true` if any write bit is set.
    #[inline]
    pub fn is_writable(&self) -> bool {
        self.mode & 0o222 != 0
    }

    /// Returns `true` if any execute bit is set.
    #[inline]
    pub fn is_executable(&self) -> bool {
        self.mode & 0o111 != 0
    }

    /// Same record with read-only permission bits for its kind.
    pub fn read_only(mut self) -> Self {
        self.mode = match self.kind {
            FileKind::File => FILE_READABLE_MODE,
            FileKind::Directory => DIR_READABLE_MODE,
        };
        self
    }
}

/// Object visibility understood by backends that support ACLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Visibility {
    /// Readable by anyone.
    Public,
    /// Readable by the owner only.
    Private,
}

impl Visibility {
    /// Map Unix permission bits onto a visibility.
    ///
    /// Only the low four octal digits are considered; any group or other
    /// read bit makes the object public.
    pub fn from_mode(mode: u32) -> Self {
        if mode & 0o7777 & PUBLIC_MASK != 0 {
            Visibility::Public
        } else {
            Visibility::Private
        }
    }
}

/// Access mode of a stream session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpenMode {
    /// Read-through of existing content.
    Read,
    /// Fresh buffer, replaces the object on flush.
    Write,
    /// Existing content with writes forced to the end.
    Append,
}

impl OpenMode {
    /// Parse an `fopen`-style mode string.
    ///
    /// Trailing `b`/`t` flags are ignored. Anything other than `r` or `a`
    /// opens for writing.
    ///
    /// ```rust
    /// use anyfs_stream::OpenMode;
    ///
    /// assert_eq!(OpenMode::parse("rb"), OpenMode::Read);
    /// assert_eq!(OpenMode::parse("a"), OpenMode::Append);
    /// assert_eq!(OpenMode::parse("w+"), OpenMode::Write);
    /// ```
    pub fn parse(mode: &str) -> Self {
        match mode.trim_end_matches(['b', 't']) {
            "r" => OpenMode::Read,
            "a" => OpenMode::Append,
            _ => OpenMode::Write,
        }
    }

    /// Returns `true` if sessions in this mode accept writes.
    #[inline]
    pub fn is_writable(&self) -> bool {
        !matches!(self, OpenMode::Read)
    }
}

/// Options applied when opening a stream session.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenOptions {
    /// Make a non-seekable read handle seekable right away.
    pub must_seek: bool,
    /// Flush after this many bytes have been written since the last flush.
    pub write_buffer: Option<usize>,
}

impl OpenOptions {
    /// Request a seekable handle at open time.
    pub fn must_seek(mut self) -> Self {
        self.must_seek = true;
        self
    }

    /// Set the implicit flush threshold.
    pub fn write_buffer(mut self, threshold: usize) -> Self {
        self.write_buffer = Some(threshold);
        self
    }
}

/// An advisory lock request decoded from `flock`-style operation bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockOperation {
    /// Shared lock.
    Shared {
        /// Wait until the lock is available.
        blocking: bool,
    },
    /// Exclusive lock.
    Exclusive {
        /// Wait until the lock is available.
        blocking: bool,
    },
    /// Release a held lock.
    Unlock,
}

impl LockOperation {
    /// `flock` shared lock bit.
    pub const LOCK_SH: i32 = 1;
    /// `flock` exclusive lock bit.
    pub const LOCK_EX: i32 = 2;
    /// `flock` non-blocking modifier.
    pub const LOCK_NB: i32 = 4;
    /// `flock` unlock bit.
    pub const LOCK_UN: i32 = 8;

    /// Decode `flock` bits. Returns `None` for codes that request nothing.
    pub fn from_flock(operation: i32) -> Option<Self> {
        let blocking = operation & Self::LOCK_NB == 0;
        if operation & Self::LOCK_UN != 0 {
            Some(LockOperation::Unlock)
        } else if operation & Self::LOCK_EX != 0 {
            Some(LockOperation::Exclusive { blocking })
        } else if operation & Self::LOCK_SH != 0 {
            Some(LockOperation::Shared { blocking })
        } else {
            None
        }
    }
}
