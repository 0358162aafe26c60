//! Client-side abstraction over distributed filesystem backends.
//!
//! A backend implements [`Dfs`] (namespace operations) and hands out
//! [`DfsFile`]s (one per open file). Callers normally go through
//! [`DfsClient`], which validates paths, traces every call and wraps raw
//! backend files into [`FileHandle`]s that enforce the handle state machine
//! and close themselves when dropped.
//!
//! Backends are obtained from a configuration string with [`connect`]:
//!
//! ```
//! use virtual_dfs::{DfsClient, OpenMode};
//!
//! let client = DfsClient::connect("mem://").unwrap();
//! client.create_directory("/logs").unwrap();
//!
//! let mut file = client.open_file("/logs/000001.log", OpenMode::WriteOnly).unwrap();
//! file.write(b"hello").unwrap();
//! file.close().unwrap();
//!
//! assert_eq!(client.file_size("/logs/000001.log").unwrap(), 5);
//! ```

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

#[cfg(feature = "async")]
pub mod async_client;
pub mod client;
pub mod config;
pub mod conformance;
mod error;
pub mod handle;
#[cfg(feature = "host-fs")]
pub mod host_fs;
pub mod mem_fs;
pub mod path;
pub mod registry;

#[cfg(feature = "async")]
pub use async_client::{AsyncDfsClient, AsyncFileHandle};
pub use client::DfsClient;
pub use config::BackendConfig;
pub use error::{DfsError, ErrorKind, Result};
pub use handle::{FileHandle, HandleState};
pub use registry::{connect, BackendRegistry};

/// How a file is opened. There is no read-write mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpenMode {
    /// Create (or truncate) the file and append to it.
    WriteOnly,
    /// Read an existing file, sequentially or at explicit offsets.
    ReadOnly,
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WriteOnly => f.write_str("write-only"),
            Self::ReadOnly => f.write_str("read-only"),
        }
    }
}

/// What [`Dfs::rename`] does when the destination already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenamePolicy {
    /// Fail with [`DfsError::AlreadyExists`] and leave both paths untouched.
    #[default]
    #[serde(alias = "fail")]
    FailIfExists,
    /// Replace an existing destination file.
    Overwrite,
}

impl FromStr for RenamePolicy {
    type Err = DfsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "fail" | "fail_if_exists" => Ok(Self::FailIfExists),
            "overwrite" => Ok(Self::Overwrite),
            other => Err(DfsError::InvalidConfig(format!(
                "unknown rename policy `{other}` (expected `fail` or `overwrite`)"
            ))),
        }
    }
}

/// Namespace operations of a storage backend.
///
/// Every method may block. Implementations must be usable from many threads
/// at once for different paths and handles. Paths are absolute and compared
/// byte-wise; see [`path`] for the rules the bundled backends apply.
pub trait Dfs: fmt::Debug + Send + Sync {
    /// Creates the directory and any missing ancestors. Succeeds if the
    /// directory already exists.
    fn create_directory(&self, path: &str) -> Result<()>;

    /// Removes the directory and everything below it.
    fn delete_directory(&self, path: &str) -> Result<()>;

    /// Whether `path` currently names a file or a directory. Absence is
    /// `Ok(false)`; an error means existence could not be determined.
    fn exists(&self, path: &str) -> Result<bool>;

    /// Removes a single file.
    fn delete(&self, path: &str) -> Result<()>;

    /// Makes `to` resolve to what `from` resolved to, and `from` cease to
    /// exist. An existing `to` is handled per [`Dfs::rename_policy`].
    fn rename(&self, from: &str, to: &str) -> Result<()>;

    /// Byte length of the file, including everything flushed or closed so far.
    fn file_size(&self, path: &str) -> Result<u64>;

    /// Immediate children of the directory as full paths, in lexicographic
    /// order. A missing directory lists as empty.
    fn list_directory(&self, path: &str) -> Result<Vec<String>>;

    fn open_file(&self, path: &str, mode: OpenMode) -> Result<Box<dyn DfsFile>>;

    fn rename_policy(&self) -> RenamePolicy {
        RenamePolicy::FailIfExists
    }
}

/// One open file as handed out by a backend.
///
/// Backend files may assume they are only called in the ways their mode
/// allows; [`FileHandle`] enforces the state machine on top of them. The
/// default methods reject every operation, so a backend only implements the
/// ones its mode supports.
pub trait DfsFile: fmt::Debug + Send {
    fn path(&self) -> &str;

    fn mode(&self) -> OpenMode;

    /// Appends bytes. Returns how many were accepted, which may be fewer than
    /// `buf.len()`.
    fn write(&mut self, _buf: &[u8]) -> Result<usize> {
        Err(unsupported(self, "write"))
    }

    /// Makes every accepted byte visible to other readers.
    fn flush(&mut self) -> Result<()> {
        Err(unsupported(self, "flush"))
    }

    /// Like [`DfsFile::flush`], and additionally durable across a backend restart.
    fn sync(&mut self) -> Result<()> {
        Err(unsupported(self, "sync"))
    }

    /// Reads from the sequential cursor and advances it. May return fewer
    /// bytes than requested; `0` means end of file.
    fn read(&mut self, _buf: &mut [u8]) -> Result<usize> {
        Err(unsupported(self, "read"))
    }

    /// Reads at `offset` without touching the sequential cursor. May return
    /// fewer bytes than requested; `0` means `offset` is at or past the end.
    fn pread(&self, _offset: u64, _buf: &mut [u8]) -> Result<usize> {
        Err(unsupported(self, "pread"))
    }

    /// Flushes pending writes and releases backend resources.
    fn close(&mut self) -> Result<()>;
}

fn unsupported<F: DfsFile + ?Sized>(file: &F, op: &'static str) -> DfsError {
    DfsError::InvalidHandleState {
        path: file.path().to_string(),
        op,
        state: HandleState::from(file.mode()),
    }
}
