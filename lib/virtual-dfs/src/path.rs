//! Path rules shared by the bundled backends.
//!
//! Paths are absolute, slash-separated strings compared byte-wise. Nothing
//! here normalizes a path: anything that would need normalizing (empty
//! segments, trailing slashes, `.` or `..`) is rejected instead.

use crate::{DfsError, Result};

pub const ROOT: &str = "/";

/// Checks that `path` is absolute and made only of non-empty, non-dot segments.
pub fn validate(path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(DfsError::invalid_path(path, "path is empty"));
    }
    if !path.starts_with('/') {
        return Err(DfsError::invalid_path(path, "path is not absolute"));
    }
    if path == ROOT {
        return Ok(());
    }
    for segment in path[1..].split('/') {
        match segment {
            "" => return Err(DfsError::invalid_path(path, "empty path segment")),
            "." | ".." => return Err(DfsError::invalid_path(path, "dot segment")),
            _ if segment.contains('\0') => {
                return Err(DfsError::invalid_path(path, "nul byte in path"));
            }
            _ => {}
        }
    }
    Ok(())
}

/// Splits a valid path into its segments. The root has none.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Returns the parent of a valid path, or `None` for the root.
pub fn parent(path: &str) -> Option<&str> {
    if path == ROOT {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some(ROOT),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

/// Returns the last segment of a valid path, or `None` for the root.
pub fn file_name(path: &str) -> Option<&str> {
    if path == ROOT {
        return None;
    }
    path.rsplit('/').next()
}

pub fn join(parent: &str, name: &str) -> String {
    if parent == ROOT {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// Whether `path` lies strictly below `ancestor`.
pub fn is_descendant(path: &str, ancestor: &str) -> bool {
    if ancestor == ROOT {
        return path != ROOT;
    }
    path.len() > ancestor.len()
        && path.starts_with(ancestor)
        && path.as_bytes()[ancestor.len()] == b'/'
}
