//! Scoped file handles.
//!
//! A [`FileHandle`] owns one backend [`DfsFile`] and walks it through
//! `Open -> {Writing* | Reading*} -> Closed`. Operations that the handle's
//! mode does not allow, and every operation after close, fail with
//! [`DfsError::InvalidHandleState`]. Dropping a handle that was never closed
//! closes it.

use std::fmt;
use std::io;

use tracing::{trace, warn};

use crate::{DfsError, DfsFile, OpenMode, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleState {
    Writing,
    Reading,
    Closed,
    /// The handle was moved into a task that never handed it back.
    Detached,
}

impl From<OpenMode> for HandleState {
    fn from(mode: OpenMode) -> Self {
        match mode {
            OpenMode::WriteOnly => Self::Writing,
            OpenMode::ReadOnly => Self::Reading,
        }
    }
}

impl fmt::Display for HandleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Writing => f.write_str("write-only"),
            Self::Reading => f.write_str("read-only"),
            Self::Closed => f.write_str("closed"),
            Self::Detached => f.write_str("detached"),
        }
    }
}

#[derive(Debug)]
pub struct FileHandle {
    inner: Box<dyn DfsFile>,
    path: String,
    mode: OpenMode,
    state: HandleState,
}

impl FileHandle {
    pub fn new(inner: Box<dyn DfsFile>) -> Self {
        let path = inner.path().to_string();
        let mode = inner.mode();
        trace!(%path, %mode, "opened file handle");
        Self {
            inner,
            path,
            mode,
            state: HandleState::from(mode),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn state(&self) -> HandleState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == HandleState::Closed
    }

    fn expect_state(&self, expected: HandleState, op: &'static str) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(DfsError::InvalidHandleState {
                path: self.path.clone(),
                op,
                state: self.state,
            })
        }
    }

    /// Appends `buf`. Returns `buf.len()` when everything was accepted; a
    /// shorter acceptance is reported as [`DfsError::PartialTransfer`], whose
    /// `transferred` bytes are part of the file.
    pub fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.expect_state(HandleState::Writing, "write")?;
        if buf.is_empty() {
            return Ok(0);
        }
        let accepted = self.inner.write(buf)?;
        if accepted < buf.len() {
            return Err(DfsError::PartialTransfer {
                requested: buf.len(),
                transferred: accepted,
            });
        }
        Ok(accepted)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.expect_state(HandleState::Writing, "flush")?;
        trace!(path = %self.path, "flush");
        self.inner.flush()
    }

    pub fn sync(&mut self) -> Result<()> {
        self.expect_state(HandleState::Writing, "sync")?;
        trace!(path = %self.path, "sync");
        self.inner.sync()
    }

    /// Reads from the sequential cursor until `buf` is full or the file ends.
    /// A count below `buf.len()` therefore always means end of file.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.expect_state(HandleState::Reading, "read")?;
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..])? {
                0 => break,
                n => filled += n,
            }
        }
        Ok(filled)
    }

    /// Fills `buf` from the sequential cursor, failing with
    /// [`DfsError::PartialTransfer`] if the file ends first.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let read = self.read(buf)?;
        if read < buf.len() {
            return Err(DfsError::PartialTransfer {
                requested: buf.len(),
                transferred: read,
            });
        }
        Ok(())
    }

    /// Reads at `offset` until `buf` is full or the file ends. The sequential
    /// cursor used by [`FileHandle::read`] is not affected.
    pub fn pread(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        self.expect_state(HandleState::Reading, "pread")?;
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.pread(offset + filled as u64, &mut buf[filled..])? {
                0 => break,
                n => filled += n,
            }
        }
        Ok(filled)
    }

    /// Flushes remaining writes and releases the handle. The handle is
    /// closed afterwards even if flushing failed; the failure is returned
    /// because buffered data may be lost.
    pub fn close(&mut self) -> Result<()> {
        if matches!(self.state, HandleState::Closed | HandleState::Detached) {
            return Err(DfsError::InvalidHandleState {
                path: self.path.clone(),
                op: "close",
                state: self.state,
            });
        }
        self.state = HandleState::Closed;
        trace!(path = %self.path, "closing file handle");
        self.inner.close()
    }
}

impl Drop for FileHandle {
    fn drop(&mut self) {
        if matches!(self.state, HandleState::Writing | HandleState::Reading) {
            if let Err(err) = self.close() {
                warn!(path = %self.path, error = %err, "failed to close dropped file handle");
            }
        }
    }
}

impl io::Read for FileHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        FileHandle::read(self, buf).map_err(Into::into)
    }
}

impl io::Write for FileHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match FileHandle::write(self, buf) {
            Ok(n) => Ok(n),
            Err(DfsError::PartialTransfer { transferred, .. }) if transferred > 0 => {
                Ok(transferred)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        FileHandle::flush(self).map_err(Into::into)
    }
}

impl From<DfsError> for io::Error {
    fn from(err: DfsError) -> Self {
        let kind = match &err {
            DfsError::NotFound { .. } => io::ErrorKind::NotFound,
            DfsError::AlreadyExists { .. } => io::ErrorKind::AlreadyExists,
            DfsError::NotADirectory { .. } => io::ErrorKind::NotADirectory,
            DfsError::IsADirectory { .. } => io::ErrorKind::IsADirectory,
            DfsError::InvalidHandleState { .. } => io::ErrorKind::Unsupported,
            DfsError::PartialTransfer { .. } => io::ErrorKind::WriteZero,
            DfsError::InvalidPath { .. } | DfsError::InvalidConfig(_) => {
                io::ErrorKind::InvalidInput
            }
            DfsError::Lock => io::ErrorKind::Other,
            DfsError::Io(inner) => inner.kind(),
        };
        io::Error::new(kind, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    /// Hands out at most `chunk` bytes per call so the handle has to loop.
    #[derive(Debug)]
    struct Trickle {
        data: Vec<u8>,
        cursor: usize,
        chunk: usize,
    }

    impl DfsFile for Trickle {
        fn path(&self) -> &str {
            "/trickle"
        }

        fn mode(&self) -> OpenMode {
            OpenMode::ReadOnly
        }

        fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
            let n = self.pread(self.cursor as u64, buf)?;
            self.cursor += n;
            Ok(n)
        }

        fn pread(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
            let offset = (offset as usize).min(self.data.len());
            let n = buf.len().min(self.chunk).min(self.data.len() - offset);
            buf[..n].copy_from_slice(&self.data[offset..offset + n]);
            Ok(n)
        }

        fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn trickle(data: &[u8]) -> FileHandle {
        FileHandle::new(Box::new(Trickle {
            data: data.to_vec(),
            cursor: 0,
            chunk: 3,
        }))
    }

    #[test]
    fn test_reads_are_full_unless_eof() {
        let mut handle = trickle(b"0123456789");
        let mut buf = [0u8; 8];
        assert_eq!(handle.read(&mut buf).unwrap(), 8);
        assert_eq!(&buf, b"01234567");
        assert_eq!(handle.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"89");
        assert_eq!(handle.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_pread_leaves_cursor_alone() {
        let mut handle = trickle(b"abcdefghij");
        let mut buf = [0u8; 2];
        handle.read(&mut buf).unwrap();

        let mut at = [0u8; 5];
        assert_eq!(handle.pread(5, &mut at).unwrap(), 5);
        assert_eq!(&at, b"fghij");

        handle.read(&mut buf).unwrap();
        assert_eq!(&buf, b"cd");
    }

    #[test]
    fn test_read_exact_reports_partial_transfer() {
        let mut handle = trickle(b"abc");
        let mut buf = [0u8; 5];
        match handle.read_exact(&mut buf) {
            Err(DfsError::PartialTransfer {
                requested,
                transferred,
            }) => {
                assert_eq!(requested, 5);
                assert_eq!(transferred, 3);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_mode_is_enforced() {
        let mut handle = trickle(b"abc");
        let err = handle.write(b"x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidHandleState);
        let err = handle.flush().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidHandleState);
    }

    #[test]
    fn test_use_after_close_is_rejected() {
        let mut handle = trickle(b"abc");
        handle.close().unwrap();
        assert!(handle.is_closed());

        let mut buf = [0u8; 1];
        assert_eq!(
            handle.read(&mut buf).unwrap_err().kind(),
            ErrorKind::InvalidHandleState
        );
        assert_eq!(
            handle.pread(0, &mut buf).unwrap_err().kind(),
            ErrorKind::InvalidHandleState
        );
        assert_eq!(
            handle.close().unwrap_err().kind(),
            ErrorKind::InvalidHandleState
        );
    }

    #[test]
    fn test_error_message_names_state() {
        let mut handle = trickle(b"abc");
        handle.close().unwrap();
        let err = handle.read(&mut [0u8; 1]).unwrap_err();
        assert_eq!(err.to_string(), "cannot read on closed handle for /trickle");
    }
}
