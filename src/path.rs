//! # URL and Path Handling
//!
//! Splits `scheme://relative/path` URLs and normalizes the relative part
//! into the backend key space.
//!
//! ## Normalized Form
//!
//! - `/` separators only (`\` is converted)
//! - no leading or trailing `/`, no empty segments
//! - `.` segments dropped, `..` resolved lexically
//! - the scheme root is the empty string
//!
//! ```rust
//! use anyfs_stream::path;
//!
//! let (scheme, target) = path::split_url("fly://uploads//2024/./a.txt").unwrap();
//! assert_eq!(scheme, "fly");
//! assert_eq!(path::normalize(target).unwrap(), "uploads/2024/a.txt");
//! ```

use crate::FsError;

/// Separator between the scheme and the relative path.
pub const SCHEME_SEPARATOR: &str = "://";

/// Split a URL into its scheme and the raw relative path.
///
/// # Errors
///
/// - [`FsError::InvalidPath`] if there is no `://` or the scheme is empty
pub fn split_url(url: &str) -> Result<(&str, &str), FsError> {
    match url.split_once(SCHEME_SEPARATOR) {
        Some((scheme, _)) if scheme.is_empty() => Err(FsError::InvalidPath {
            path: url.to_string(),
            reason: "empty scheme",
        }),
        Some((scheme, target)) => Ok((scheme, target)),
        None => Err(FsError::InvalidPath {
            path: url.to_string(),
            reason: "missing scheme separator",
        }),
    }
}

/// Normalize a relative path into the backend key space.
///
/// # Errors
///
/// - [`FsError::InvalidPath`] if `..` climbs above the scheme root
pub fn normalize(path: &str) -> Result<String, FsError> {
    let path = path.replace('\\', "/");
    let mut parts: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.pop().is_none() {
                    return Err(FsError::InvalidPath {
                        path: path.clone(),
                        reason: "path escapes the scheme root",
                    });
                }
            }
            other => parts.push(other),
        }
    }

    Ok(parts.join("/"))
}

/// Parent of a normalized path, or `None` for single-segment paths.
pub fn parent(path: &str) -> Option<&str> {
    path.rsplit_once('/').map(|(parent, _)| parent)
}

/// Final component of a path.
pub fn basename(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}
