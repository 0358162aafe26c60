//! Backend that stores the namespace in a directory of the local filesystem.
//!
//! `sync` maps to `fsync(2)`-style data syncs, and on unix the directory
//! holding the file is synced too so that a freshly created file survives a
//! crash. Namespace changes sync the affected directories before returning.
//! Renames are a single host rename, but the existence check that implements
//! [`RenamePolicy::FailIfExists`] is not atomic with it.

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, trace, warn};

use crate::config::MAX_BUFFER_SIZE;
use crate::{path, BackendConfig, Dfs, DfsError, DfsFile, OpenMode, RenamePolicy, Result};

pub fn canonicalize(path: &Path) -> Result<PathBuf> {
    dunce::canonicalize(path).map_err(|e| DfsError::from_io(&path.display().to_string(), e))
}

#[derive(Debug, Clone)]
pub struct FileSystem {
    root: PathBuf,
    config: BackendConfig,
}

impl FileSystem {
    /// Opens the backend rooted at `root`, creating the directory first when
    /// the configuration asks for it.
    pub fn new(root: impl Into<PathBuf>, config: BackendConfig) -> Result<Self> {
        let root = root.into();
        if config.create_root {
            fs::create_dir_all(&root)
                .map_err(|e| DfsError::from_io(&root.display().to_string(), e))?;
        }
        if !root.is_dir() {
            return Err(DfsError::InvalidConfig(format!(
                "backend root {} is not an existing directory",
                root.display()
            )));
        }
        let root = canonicalize(&root)?;
        debug!(root = %root.display(), "opened host backend");

        Ok(Self { root, config })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn prepare_path(&self, path: &str) -> Result<PathBuf> {
        path::validate(path)?;
        let path = self.root.join(path.trim_start_matches('/'));

        debug_assert!(path.starts_with(&self.root));
        Ok(path)
    }

    fn metadata(&self, path: &str) -> Result<Option<fs::Metadata>> {
        match fs::metadata(self.prepare_path(path)?) {
            Ok(metadata) => Ok(Some(metadata)),
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
                ) =>
            {
                Ok(None)
            }
            Err(e) => Err(DfsError::from_io(path, e)),
        }
    }
}

impl Dfs for FileSystem {
    fn create_directory(&self, path: &str) -> Result<()> {
        path::validate(path)?;

        let mut walked = String::with_capacity(path.len());
        for segment in path::segments(path) {
            walked.push('/');
            walked.push_str(segment);

            let host_path = self.prepare_path(&walked)?;
            match fs::create_dir(&host_path) {
                Ok(()) => {
                sync_parent(&host_path, &walked)?;
                debug!(path = %walked, "created directory");
            }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    if !host_path.is_dir() {
                        return Err(DfsError::not_a_directory(walked));
                    }
                }
                Err(e) => return Err(DfsError::from_io(&walked, e)),
            }
        }
        Ok(())
    }

    fn delete_directory(&self, path: &str) -> Result<()> {
        let host_path = self.prepare_path(path)?;
        if path == path::ROOT {
            return Err(DfsError::invalid_path(path, "the root cannot be deleted"));
        }

        match self.metadata(path)? {
            None => Err(DfsError::not_found(path)),
            Some(metadata) if !metadata.is_dir() => Err(DfsError::not_a_directory(path)),
            Some(_) => {
                fs::remove_dir_all(&host_path).map_err(|e| DfsError::from_io(path, e))?;
                sync_parent(&host_path, path)?;
                debug!(%path, "deleted directory");
                Ok(())
            }
        }
    }

    fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.metadata(path)?.is_some())
    }

    fn delete(&self, path: &str) -> Result<()> {
        let host_path = self.prepare_path(path)?;
        match self.metadata(path)? {
            None => Err(DfsError::not_found(path)),
            Some(metadata) if metadata.is_dir() => Err(DfsError::is_a_directory(path)),
            Some(_) => {
                fs::remove_file(&host_path).map_err(|e| DfsError::from_io(path, e))?;
                sync_parent(&host_path, path)?;
                debug!(%path, "deleted file");
                Ok(())
            }
        }
    }

    fn rename(&self, from: &str, to: &str) -> Result<()> {
        let host_from = self.prepare_path(from)?;
        let host_to = self.prepare_path(to)?;
        if from == path::ROOT || to == path::ROOT {
            return Err(DfsError::invalid_path(from, "the root cannot be renamed"));
        }
        if path::is_descendant(to, from) {
            return Err(DfsError::invalid_path(
                to,
                "cannot move a directory inside itself",
            ));
        }

        let source = self.metadata(from)?.ok_or_else(|| DfsError::not_found(from))?;
        if from == to {
            return Ok(());
        }

        if let Some(target) = self.metadata(to)? {
            if self.config.rename == RenamePolicy::FailIfExists {
                return Err(DfsError::already_exists(to));
            }
            if target.is_dir() {
                return Err(DfsError::is_a_directory(to));
            }
            if source.is_dir() {
                return Err(DfsError::not_a_directory(to));
            }
        }

        if let Some(parent) = path::parent(to) {
            self.create_directory(parent)?;
        }
        fs::rename(&host_from, &host_to).map_err(|e| DfsError::from_io(from, e))?;
        sync_parent(&host_to, to)?;
        if host_from.parent() != host_to.parent() {
            sync_parent(&host_from, from)?;
        }
        debug!(%from, %to, "renamed");
        Ok(())
    }

    fn file_size(&self, path: &str) -> Result<u64> {
        match self.metadata(path)? {
            None => Err(DfsError::not_found(path)),
            Some(metadata) if metadata.is_dir() => Err(DfsError::is_a_directory(path)),
            Some(metadata) => Ok(metadata.len()),
        }
    }

    fn list_directory(&self, path: &str) -> Result<Vec<String>> {
        let host_path = self.prepare_path(path)?;
        match self.metadata(path)? {
            None => return Ok(Vec::new()),
            Some(metadata) if !metadata.is_dir() => return Err(DfsError::not_a_directory(path)),
            Some(_) => {}
        }

        let mut children = Vec::new();
        for entry in fs::read_dir(host_path).map_err(|e| DfsError::from_io(path, e))? {
            let entry = entry.map_err(|e| DfsError::from_io(path, e))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                warn!(%path, ?name, "skipping entry whose name is not UTF-8");
                continue;
            };
            children.push(path::join(path, name));
        }
        children.sort();
        Ok(children)
    }

    fn open_file(&self, path: &str, mode: OpenMode) -> Result<Box<dyn DfsFile>> {
        let host_path = self.prepare_path(path)?;
        if path == path::ROOT {
            return Err(DfsError::is_a_directory(path));
        }

        match mode {
            OpenMode::ReadOnly => {
                match self.metadata(path)? {
                    None => return Err(DfsError::not_found(path)),
                    Some(metadata) if metadata.is_dir() => {
                        return Err(DfsError::is_a_directory(path));
                    }
                    Some(_) => {}
                }
                let file = fs::File::open(&host_path).map_err(|e| DfsError::from_io(path, e))?;
                Ok(Box::new(HostFileReader {
                    path: path.to_string(),
                    host_path,
                    file,
                    cursor: 0,
                }))
            }
            OpenMode::WriteOnly => {
                if let Some(parent) = path::parent(path) {
                    self.create_directory(parent)?;
                }
                if host_path.is_dir() {
                    return Err(DfsError::is_a_directory(path));
                }
                let file =
                    fs::File::create(&host_path).map_err(|e| DfsError::from_io(path, e))?;
                let capacity = self.config.buffer_size.clamp(1, MAX_BUFFER_SIZE);
                Ok(Box::new(HostFileWriter {
                    path: path.to_string(),
                    host_path,
                    file: BufWriter::with_capacity(capacity, file),
                    entry_synced: false,
                }))
            }
        }
    }

    fn rename_policy(&self) -> RenamePolicy {
        self.config.rename
    }
}

/// Write side of a host file. Bytes sit in a [`BufWriter`] until it fills
/// up or the handle is flushed.
#[derive(Debug)]
pub struct HostFileWriter {
    path: String,
    host_path: PathBuf,
    file: BufWriter<fs::File>,
    entry_synced: bool,
}

impl DfsFile for HostFileWriter {
    fn path(&self) -> &str {
        &self.path
    }

    fn mode(&self) -> OpenMode {
        OpenMode::WriteOnly
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.file
            .write_all(buf)
            .map_err(|e| DfsError::from_io(&self.path, e))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<()> {
        self.file.flush().map_err(|e| DfsError::from_io(&self.path, e))
    }

    fn sync(&mut self) -> Result<()> {
        self.flush()?;
        self.file
            .get_ref()
            .sync_data()
            .map_err(|e| DfsError::from_io(&self.path, e))?;

        if !self.entry_synced {
            match sync_parent(&self.host_path, &self.path) {
                // The file was renamed away, and rename synced its new directory.
                Err(e) if e.is_not_found() => {}
                result => result?,
            }
            self.entry_synced = true;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.flush()
    }
}

impl Drop for HostFileWriter {
    fn drop(&mut self) {
        trace!(?self.host_path, "Closing host file");
    }
}

#[derive(Debug)]
pub struct HostFileReader {
    path: String,
    host_path: PathBuf,
    file: fs::File,
    cursor: u64,
}

impl DfsFile for HostFileReader {
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
        // Host files end before `i64::MAX`, and larger offsets make pread(2) fail.
        if i64::try_from(offset).is_err() {
            return Ok(0);
        }
        loop {
            match read_at(&self.file, buf, offset) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                result => return result.map_err(|e| DfsError::from_io(&self.path, e)),
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

impl Drop for HostFileReader {
    fn drop(&mut self) {
        trace!(?self.host_path, "Closing host file");
    }
}

fn sync_parent(host_path: &Path, path: &str) -> Result<()> {
    match host_path.parent() {
        Some(parent) => sync_directory(parent).map_err(|e| DfsError::from_io(path, e)),
        None => Ok(()),
    }
}

#[cfg(unix)]
fn sync_directory(dir: &Path) -> io::Result<()> {
    fs::File::open(dir)?.sync_all()
}

// Directories cannot be opened as files on windows.
#[cfg(not(unix))]
fn sync_directory(_dir: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn read_at(file: &fs::File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.read_at(buf, offset)
}

// `seek_read` moves the OS cursor, which is fine: reads always pass an
// explicit offset.
#[cfg(windows)]
fn read_at(file: &fs::File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::windows::fs::FileExt;
    file.seek_read(buf, offset)
}
