//! The caller-facing entry point.

use std::sync::Arc;

use tracing::instrument;

use crate::{path, registry, Dfs, FileHandle, OpenMode, RenamePolicy, Result};

/// A cheaply cloneable client over one backend.
///
/// Every namespace call validates its paths before reaching the backend and
/// runs inside a `debug` span named after the operation.
#[derive(Clone, Debug)]
pub struct DfsClient {
    dfs: Arc<dyn Dfs>,
}

impl DfsClient {
    pub fn new(dfs: Arc<dyn Dfs>) -> Self {
        Self { dfs }
    }

    /// Connects to the backend described by `conf` through the default
    /// registry, e.g. `mem://` or `file:///var/lib/dfs`.
    pub fn connect(conf: &str) -> Result<Self> {
        registry::connect(conf).map(Self::new)
    }

    pub fn backend(&self) -> &Arc<dyn Dfs> {
        &self.dfs
    }

    pub fn rename_policy(&self) -> RenamePolicy {
        self.dfs.rename_policy()
    }

    #[instrument(level = "debug", skip(self))]
    pub fn create_directory(&self, path: &str) -> Result<()> {
        path::validate(path)?;
        self.dfs.create_directory(path)
    }

    #[instrument(level = "debug", skip(self))]
    pub fn delete_directory(&self, path: &str) -> Result<()> {
        path::validate(path)?;
        self.dfs.delete_directory(path)
    }

    #[instrument(level = "debug", skip(self))]
    pub fn exists(&self, path: &str) -> Result<bool> {
        path::validate(path)?;
        self.dfs.exists(path)
    }

    #[instrument(level = "debug", skip(self))]
    pub fn delete(&self, path: &str) -> Result<()> {
        path::validate(path)?;
        self.dfs.delete(path)
    }

    #[instrument(level = "debug", skip(self))]
    pub fn rename(&self, from: &str, to: &str) -> Result<()> {
        path::validate(from)?;
        path::validate(to)?;
        self.dfs.rename(from, to)
    }

    #[instrument(level = "debug", skip(self))]
    pub fn file_size(&self, path: &str) -> Result<u64> {
        path::validate(path)?;
        self.dfs.file_size(path)
    }

    #[instrument(level = "debug", skip(self))]
    pub fn list_directory(&self, path: &str) -> Result<Vec<String>> {
        path::validate(path)?;
        self.dfs.list_directory(path)
    }

    #[instrument(level = "debug", skip(self))]
    pub fn open_file(&self, path: &str, mode: OpenMode) -> Result<FileHandle> {
        path::validate(path)?;
        self.dfs.open_file(path, mode).map(FileHandle::new)
    }

    /// Reads a whole file.
    pub fn read_to_end(&self, path: &str) -> Result<Vec<u8>> {
        let mut file = self.open_file(path, OpenMode::ReadOnly)?;
        let mut data = Vec::new();
        let mut chunk = vec![0; 64 * 1024];
        loop {
            let read = file.read(&mut chunk)?;
            data.extend_from_slice(&chunk[..read]);
            if read < chunk.len() {
                break;
            }
        }
        file.close()?;
        Ok(data)
    }

    /// Replaces the file at `path` with `data` and syncs it.
    pub fn write_all(&self, path: &str, data: &[u8]) -> Result<()> {
        let mut file = self.open_file(path, OpenMode::WriteOnly)?;
        file.write(data)?;
        file.sync()?;
        file.close()
    }
}

impl From<Arc<dyn Dfs>> for DfsClient {
    fn from(dfs: Arc<dyn Dfs>) -> Self {
        Self::new(dfs)
    }
}
