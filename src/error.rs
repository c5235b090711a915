//! Error types for the stream driver.

use std::path::PathBuf;

/// Driver error type with contextual variants.
///
/// Expected absence ([`FsError::NotFound`]) is kept apart from real backend
/// failures ([`FsError::Io`], [`FsError::Backend`]) so quiet call sites can
/// suppress the former without swallowing the latter.
///
/// # Examples
///
/// ```rust
/// use anyfs_stream::FsError;
/// use std::path::PathBuf;
///
/// let err = FsError::NotFound { path: PathBuf::from("uploads/a.txt") };
/// assert_eq!(err.to_string(), "not found: uploads/a.txt");
/// assert!(err.is_not_found());
/// ```
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    // Path/Object Errors
    /// Object does not exist in the backend.
    #[error("not found: {path}")]
    NotFound {
        /// The backend path that was not found.
        path: PathBuf,
    },

    /// Directory removal blocked by its contents.
    #[error("directory not empty: {path}")]
    DirectoryNotEmpty {
        /// The path to the non-empty directory.
        path: PathBuf,
    },

    /// The URL or path could not be interpreted.
    #[error("invalid path: {path} ({reason})")]
    InvalidPath {
        /// The offending path or URL.
        path: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// Operation refused for this path (e.g. removing a scheme root).
    #[error("{operation}: permission denied: {path}")]
    PermissionDenied {
        /// The path where permission was denied.
        path: PathBuf,
        /// The operation that was denied.
        operation: &'static str,
    },

    // Registry Errors
    /// Scheme already bound to a backend.
    #[error("scheme already registered: {scheme}")]
    AlreadyRegistered {
        /// The scheme name.
        scheme: String,
    },

    /// No backend bound to the scheme.
    #[error("scheme not registered: {scheme}")]
    NotRegistered {
        /// The scheme name.
        scheme: String,
    },

    // Session Errors
    /// Operation attempted on a session in the wrong lifecycle state.
    #[error("{operation}: invalid session state: {state}")]
    InvalidState {
        /// The operation that was attempted.
        operation: &'static str,
        /// The state the session was in.
        state: &'static str,
    },

    // Backend/Operation Errors
    /// Backend lacks the capability.
    #[error("operation not supported: {operation}")]
    NotSupported {
        /// The unsupported operation.
        operation: &'static str,
    },

    /// Generic backend error.
    #[error("backend error: {0}")]
    Backend(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// I/O error with context.
    #[error("{operation} failed for {path}: {source}")]
    Io {
        /// The operation that failed.
        operation: &'static str,
        /// The path involved in the operation.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl FsError {
    /// Returns `true` for [`FsError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, FsError::NotFound { .. })
    }

    /// Returns `true` for caller misuse: registry mistakes and
    /// operations on a session in the wrong state.
    pub fn is_programmer_error(&self) -> bool {
        matches!(
            self,
            FsError::AlreadyRegistered { .. }
                | FsError::NotRegistered { .. }
                | FsError::InvalidState { .. }
        )
    }

    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            return FsError::NotFound { path: path.into() };
        }
        FsError::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}

/// Log a failed driver-facing call: misuse at `error`, everything else at `warn`.
pub(crate) fn log_failure(url: &str, operation: &'static str, error: &FsError) {
    if error.is_programmer_error() {
        tracing::error!(url, operation, %error, "misuse");
    } else {
        tracing::warn!(url, operation, %error, "failed");
    }
}

impl From<std::io::Error> for FsError {
    fn from(error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => FsError::NotFound {
                path: PathBuf::new(),
            },
            std::io::ErrorKind::PermissionDenied => FsError::PermissionDenied {
                path: PathBuf::new(),
                operation: "io",
            },
            _ => FsError::Io {
                operation: "io",
                path: PathBuf::new(),
                source: error,
            },
        }
    }
}

/// Lets sessions implement the `std::io` traits.
impl From<FsError> for std::io::Error {
    fn from(error: FsError) -> Self {
        use std::io::ErrorKind;

        match error {
            FsError::Io { source, .. } => source,
            FsError::NotFound { .. } => std::io::Error::new(ErrorKind::NotFound, error),
            FsError::DirectoryNotEmpty { .. } => {
                std::io::Error::new(ErrorKind::DirectoryNotEmpty, error)
            }
            FsError::PermissionDenied { .. } => {
                std::io::Error::new(ErrorKind::PermissionDenied, error)
            }
            FsError::InvalidPath { .. } => std::io::Error::new(ErrorKind::InvalidInput, error),
            FsError::NotSupported { .. } => std::io::Error::new(ErrorKind::Unsupported, error),
            other => std::io::Error::other(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display() {
        let err = FsError::NotFound {
            path: PathBuf::from("missing"),
        };
        assert_eq!(err.to_string(), "not found: missing");
    }

    #[test]
    fn invalid_state_display() {
        let err = FsError::InvalidState {
            operation: "write",
            state: "closed",
        };
        assert_eq!(err.to_string(), "write: invalid session state: closed");
    }

    #[test]
    fn registry_errors_are_programmer_errors() {
        let err = FsError::NotRegistered {
            scheme: "fly".into(),
        };
        assert!(err.is_programmer_error());
        assert!(!err.is_not_found());

        let err = FsError::DirectoryNotEmpty {
            path: PathBuf::from("dir"),
        };
        assert!(!err.is_programmer_error());
    }

    #[test]
    fn io_helper_maps_not_found() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = FsError::io("read_stream", "a.txt", io_err);
        assert!(matches!(err, FsError::NotFound { ref path } if path == &PathBuf::from("a.txt")));
    }

    #[test]
    fn from_io_other() {
        let io_err = std::io::Error::other("boom");
        let err = FsError::from(io_err);
        assert!(matches!(err, FsError::Io { .. }));
    }

    #[test]
    fn into_io_keeps_kind() {
        let err = FsError::NotFound {
            path: PathBuf::from("x"),
        };
        let io_err: std::io::Error = err.into();
        assert_eq!(io_err.kind(), std::io::ErrorKind::NotFound);

        let err = FsError::InvalidState {
            operation: "read",
            state: "closed",
        };
        let io_err: std::io::Error = err.into();
        assert_eq!(io_err.kind(), std::io::ErrorKind::Other);
    }
}
