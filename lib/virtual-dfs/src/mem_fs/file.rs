//! This module contains the write and read sides of an open in-memory file.
//!
//! Both sides remember the file's `id` as well as its inode: a slot freed by
//! a delete can be reused by a later file, and a stale handle must not see
//! (or scribble over) the newcomer's bytes.

use tracing::trace;

use super::*;
use crate::{BackendConfig, DfsFile, OpenMode, Result};

#[derive(Debug)]
pub(super) struct FileWriter {
    fs: FileSystem,
    inode: Inode,
    id: u64,
    path: String,
    buffer: Vec<u8>,
    buffer_size: usize,
    written: u64,
    max_file_size: Option<u64>,
}

impl FileWriter {
    pub(super) fn new(
        fs: FileSystem,
        inode: Inode,
        id: u64,
        path: &str,
        config: &BackendConfig,
    ) -> Self {
        Self {
            fs,
            inode,
            id,
            path: path.to_string(),
            buffer: Vec::new(),
            buffer_size: config.buffer_size,
            written: 0,
            max_file_size: config.max_file_size,
        }
    }

    /// Moves buffered bytes into the file, making them visible. Fails with
    /// `NotFound` once the file has been deleted, even if nothing is pending.
    fn push(&mut self) -> Result<()> {
        {
            let mut fs = self.fs.inner.write()?;
            let file = fs.file_mut(self.inode, self.id, &self.path)?;
            if !self.buffer.is_empty() {
                file.data.extend_from_slice(&self.buffer);
                trace!(path = %self.path, bytes = self.buffer.len(), "pushed buffered bytes");
            }
        }
        self.buffer.clear();
        Ok(())
    }
}

impl DfsFile for FileWriter {
    fn path(&self) -> &str {
        &self.path
    }

    fn mode(&self) -> OpenMode {
        OpenMode::WriteOnly
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let accepted = match self.max_file_size {
            Some(max) => {
                let room = max.saturating_sub(self.written);
                buf.len().min(usize::try_from(room).unwrap_or(usize::MAX))
            }
            None => buf.len(),
        };

        self.buffer.extend_from_slice(&buf[..accepted]);
        self.written += accepted as u64;
        if self.buffer.len() >= self.buffer_size {
            self.push()?;
        }
        Ok(accepted)
    }

    fn flush(&mut self) -> Result<()> {
        self.push()
    }

    fn sync(&mut self) -> Result<()> {
        self.push()?;
        let mut fs = self.fs.inner.write()?;
        let file = fs.file_mut(self.inode, self.id, &self.path)?;
        file.durable_len = file.data.len();
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.push()
    }
}

#[derive(Debug)]
pub(super) struct FileReader {
    fs: FileSystem,
    inode: Inode,
    id: u64,
    path: String,
    cursor: u64,
}

impl FileReader {
    pub(super) fn new(fs: FileSystem, inode: Inode, id: u64, path: &str) -> Self {
        Self {
            fs,
            inode,
            id,
            path: path.to_string(),
            cursor: 0,
        }
    }
}

impl DfsFile for FileReader {
    fn path(&self) -> &str {
        &self.path
    }

    fn mode(&self) -> OpenMode {
        OpenMode::ReadOnly
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let read = self.pread(self.cursor, buf)?;
        self.cursor += read as u64;
        Ok(read)
    }

    fn pread(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let fs = self.fs.inner.read()?;
        let file = fs.file(self.inode, self.id, &self.path)?;

        let Ok(offset) = usize::try_from(offset) else {
            return Ok(0);
        };
        let Some(available) = file.data.get(offset..) else {
            return Ok(0);
        };
        let read = available.len().min(buf.len());
        buf[..read].copy_from_slice(&available[..read]);
        Ok(read)
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod test_file {
    use pretty_assertions::assert_eq;

    use crate::mem_fs::FileSystem;
    use crate::{BackendConfig, Dfs, DfsFile, ErrorKind, OpenMode};

    #[test]
    fn test_writes_are_invisible_until_flushed() {
        let fs = FileSystem::default();
        let mut writer = fs.open_file("/f", OpenMode::WriteOnly).unwrap();

        assert_eq!(writer.write(b"abc").unwrap(), 3);
        assert_eq!(fs.file_size("/f").unwrap(), 0, "still buffered");

        writer.flush().unwrap();
        assert_eq!(fs.file_size("/f").unwrap(), 3);

        writer.write(b"def").unwrap();
        writer.close().unwrap();
        assert_eq!(fs.file_size("/f").unwrap(), 6, "close flushes");
    }

    #[test]
    fn test_full_buffer_spills() {
        let fs = FileSystem::new(BackendConfig::default().with_buffer_size(4));
        let mut writer = fs.open_file("/f", OpenMode::WriteOnly).unwrap();

        writer.write(b"ab").unwrap();
        assert_eq!(fs.file_size("/f").unwrap(), 0);
        writer.write(b"cdef").unwrap();
        assert_eq!(fs.file_size("/f").unwrap(), 6);
        writer.close().unwrap();
    }

    #[test]
    fn test_max_file_size_shortens_writes() {
        let fs = FileSystem::new(BackendConfig::default().with_max_file_size(5));
        let mut writer = fs.open_file("/f", OpenMode::WriteOnly).unwrap();

        assert_eq!(writer.write(b"abc").unwrap(), 3);
        assert_eq!(writer.write(b"defg").unwrap(), 2);
        assert_eq!(writer.write(b"h").unwrap(), 0);
        writer.close().unwrap();
        assert_eq!(fs.file_size("/f").unwrap(), 5);
    }

    #[test]
    fn test_reader_sees_concurrent_flushes() {
        let fs = FileSystem::default();
        let mut writer = fs.open_file("/f", OpenMode::WriteOnly).unwrap();
        writer.write(b"0123").unwrap();
        writer.flush().unwrap();

        let mut reader = fs.open_file("/f", OpenMode::ReadOnly).unwrap();
        let mut buf = [0; 8];
        assert_eq!(reader.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf[..4], b"0123");
        assert_eq!(reader.read(&mut buf).unwrap(), 0, "end of file");

        writer.write(b"4567").unwrap();
        writer.flush().unwrap();
        assert_eq!(reader.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf[..4], b"4567");

        assert_eq!(reader.pread(2, &mut buf).unwrap(), 6);
        assert_eq!(&buf[..6], b"234567");
        assert_eq!(reader.pread(8, &mut buf).unwrap(), 0);
        assert_eq!(reader.pread(u64::MAX, &mut buf).unwrap(), 0);
    }

    #[test]
    fn test_writer_follows_rename() {
        let fs = FileSystem::default();
        let mut writer = fs.open_file("/a/old", OpenMode::WriteOnly).unwrap();
        writer.write(b"before").unwrap();

        fs.rename("/a/old", "/b/new").unwrap();
        writer.write(b"-after").unwrap();
        writer.close().unwrap();

        assert!(!fs.exists("/a/old").unwrap());
        assert_eq!(fs.file_size("/b/new").unwrap(), 12);
    }

    #[test]
    fn test_flush_after_delete_fails() {
        let fs = FileSystem::default();
        let mut writer = fs.open_file("/f", OpenMode::WriteOnly).unwrap();
        writer.write(b"data").unwrap();
        let reader = fs.open_file("/f", OpenMode::ReadOnly).unwrap();

        fs.delete("/f").unwrap();
        // A new file may take over the freed slot.
        let _other = fs.open_file("/g", OpenMode::WriteOnly).unwrap();

        assert_eq!(writer.flush().unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(writer.sync().unwrap_err().kind(), ErrorKind::NotFound);
        let mut buf = [0; 4];
        assert_eq!(
            reader.pread(0, &mut buf).unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert_eq!(fs.file_size("/g").unwrap(), 0);
    }

    #[test]
    fn test_wrong_mode_is_rejected() {
        let fs = FileSystem::default();
        let mut writer = fs.open_file("/f", OpenMode::WriteOnly).unwrap();
        let mut buf = [0; 1];
        assert_eq!(
            writer.read(&mut buf).unwrap_err().kind(),
            ErrorKind::InvalidHandleState
        );
        writer.close().unwrap();

        let mut reader = fs.open_file("/f", OpenMode::ReadOnly).unwrap();
        assert_eq!(
            reader.write(b"x").unwrap_err().kind(),
            ErrorKind::InvalidHandleState
        );
        assert_eq!(
            reader.sync().unwrap_err().kind(),
            ErrorKind::InvalidHandleState
        );
    }

    #[test]
    fn test_buffer_grows_on_demand() {
        let config = BackendConfig {
            buffer_size: usize::MAX,
            ..BackendConfig::default()
        };
        let fs = FileSystem::new(config);
        let mut writer = fs.open_file("/f", OpenMode::WriteOnly).unwrap();
        writer.write(b"abc").unwrap();
        writer.close().unwrap();
        assert_eq!(fs.file_size("/f").unwrap(), 3);
    }
}
