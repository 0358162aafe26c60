use std::io;

use thiserror::Error;

use crate::handle::HandleState;

pub type Result<T> = std::result::Result<T, DfsError>;

/// Error type for external users
#[derive(Error, Debug)]
pub enum DfsError {
    /// The requested file or directory could not be found
    #[error("entry not found: {path}")]
    NotFound { path: String },
    /// Something already occupies the path
    #[error("entry already exists: {path}")]
    AlreadyExists { path: String },
    /// A directory was required but the path (or one of its ancestors) is a file
    #[error("not a directory: {path}")]
    NotADirectory { path: String },
    /// A file was required but the path is a directory
    #[error("is a directory: {path}")]
    IsADirectory { path: String },
    /// The operation is not legal for the handle's mode, or the handle is closed
    #[error("cannot {op} on {state} handle for {path}")]
    InvalidHandleState {
        path: String,
        op: &'static str,
        state: HandleState,
    },
    /// Fewer bytes were transferred than were requested, without an explicit failure.
    /// `transferred` bytes did make it through.
    #[error("partial transfer: {transferred} of {requested} bytes")]
    PartialTransfer { requested: usize, transferred: usize },
    /// The path is malformed for the backend
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: &'static str },
    /// The backend configuration string could not be used
    #[error("invalid backend configuration: {0}")]
    InvalidConfig(String),
    /// A lock protecting backend state was poisoned
    #[error("backend lock poisoned")]
    Lock,
    /// Something failed when doing IO. These errors can generally not be handled.
    /// It may work if tried again.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// The kinds a [`DfsError`] falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    /// Directory versus file mismatch.
    TypeConflict,
    InvalidHandleState,
    PartialTransfer,
    InvalidInput,
    IoError,
}

impl DfsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            Self::NotADirectory { .. } | Self::IsADirectory { .. } => ErrorKind::TypeConflict,
            Self::InvalidHandleState { .. } => ErrorKind::InvalidHandleState,
            Self::PartialTransfer { .. } => ErrorKind::PartialTransfer,
            Self::InvalidPath { .. } | Self::InvalidConfig(_) => ErrorKind::InvalidInput,
            Self::Lock | Self::Io(_) => ErrorKind::IoError,
        }
    }

    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    pub fn already_exists(path: impl Into<String>) -> Self {
        Self::AlreadyExists { path: path.into() }
    }

    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Self::NotADirectory { path: path.into() }
    }

    pub fn is_a_directory(path: impl Into<String>) -> Self {
        Self::IsADirectory { path: path.into() }
    }

    pub fn invalid_path(path: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Attaches `path` to an [`io::Error`] coming from a host call, keeping
    /// the taxonomy kind the error maps to.
    pub fn from_io(path: &str, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::not_found(path),
            io::ErrorKind::AlreadyExists => Self::already_exists(path),
            io::ErrorKind::NotADirectory => Self::not_a_directory(path),
            io::ErrorKind::IsADirectory => Self::is_a_directory(path),
            _ => Self::Io(err),
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for DfsError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        Self::Lock
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(DfsError::not_found("/a").kind(), ErrorKind::NotFound);
        assert_eq!(
            DfsError::not_a_directory("/a").kind(),
            ErrorKind::TypeConflict
        );
        assert_eq!(
            DfsError::is_a_directory("/a").kind(),
            ErrorKind::TypeConflict
        );
        assert_eq!(
            DfsError::PartialTransfer {
                requested: 4,
                transferred: 2
            }
            .kind(),
            ErrorKind::PartialTransfer
        );
        assert_eq!(DfsError::Lock.kind(), ErrorKind::IoError);
    }

    #[test]
    fn test_from_io_keeps_path() {
        let err = DfsError::from_io("/x/y", io::Error::from(io::ErrorKind::NotFound));
        match err {
            DfsError::NotFound { path } => assert_eq!(path, "/x/y"),
            other => panic!("unexpected error: {other:?}"),
        }

        let err = DfsError::from_io("/x", io::Error::from(io::ErrorKind::PermissionDenied));
        assert_eq!(err.kind(), ErrorKind::IoError);
    }

    #[test]
    fn test_display() {
        let err = DfsError::PartialTransfer {
            requested: 10,
            transferred: 3,
        };
        assert_eq!(err.to_string(), "partial transfer: 3 of 10 bytes");
    }
}
