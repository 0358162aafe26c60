//! Async facade over [`DfsClient`].
//!
//! Backends are blocking, so every call is shipped to tokio's blocking
//! pool. The methods must therefore be awaited from inside a tokio runtime.

use std::io;

use bytes::Bytes;
use tokio::task::{spawn_blocking, JoinError};

use crate::{DfsClient, DfsError, FileHandle, HandleState, OpenMode, RenamePolicy, Result};

fn join_error(err: JoinError) -> DfsError {
    DfsError::Io(io::Error::other(err))
}

#[derive(Clone, Debug)]
pub struct AsyncDfsClient {
    client: DfsClient,
}

impl AsyncDfsClient {
    pub fn new(client: DfsClient) -> Self {
        Self { client }
    }

    pub async fn connect(conf: &str) -> Result<Self> {
        let conf = conf.to_string();
        spawn_blocking(move || DfsClient::connect(&conf))
            .await
            .map_err(join_error)?
            .map(Self::new)
    }

    /// The blocking client this facade wraps.
    pub fn blocking(&self) -> &DfsClient {
        &self.client
    }

    pub fn rename_policy(&self) -> RenamePolicy {
        self.client.rename_policy()
    }

    async fn run<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&DfsClient) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let client = self.client.clone();
        spawn_blocking(move || f(&client))
            .await
            .map_err(join_error)?
    }

    pub async fn create_directory(&self, path: &str) -> Result<()> {
        let path = path.to_string();
        self.run(move |client| client.create_directory(&path)).await
    }

    pub async fn delete_directory(&self, path: &str) -> Result<()> {
        let path = path.to_string();
        self.run(move |client| client.delete_directory(&path)).await
    }

    pub async fn exists(&self, path: &str) -> Result<bool> {
        let path = path.to_string();
        self.run(move |client| client.exists(&path)).await
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        let path = path.to_string();
        self.run(move |client| client.delete(&path)).await
    }

    pub async fn rename(&self, from: &str, to: &str) -> Result<()> {
        let (from, to) = (from.to_string(), to.to_string());
        self.run(move |client| client.rename(&from, &to)).await
    }

    pub async fn file_size(&self, path: &str) -> Result<u64> {
        let path = path.to_string();
        self.run(move |client| client.file_size(&path)).await
    }

    pub async fn list_directory(&self, path: &str) -> Result<Vec<String>> {
        let path = path.to_string();
        self.run(move |client| client.list_directory(&path)).await
    }

    pub async fn open_file(&self, path: &str, mode: OpenMode) -> Result<AsyncFileHandle> {
        let path = path.to_string();
        let handle = self
            .run(move |client| client.open_file(&path, mode))
            .await?;
        Ok(AsyncFileHandle::new(handle))
    }

    pub async fn read_to_end(&self, path: &str) -> Result<Bytes> {
        let path = path.to_string();
        self.run(move |client| client.read_to_end(&path))
            .await
            .map(Bytes::from)
    }

    pub async fn write_all(&self, path: &str, data: impl Into<Bytes>) -> Result<()> {
        let (path, data) = (path.to_string(), data.into());
        self.run(move |client| client.write_all(&path, &data)).await
    }
}

/// A [`FileHandle`] driven from async code.
///
/// While an operation is in flight the handle lives on the blocking pool. If
/// the future is dropped before it completes, the handle is closed there
/// once the operation finishes and this value reports
/// [`HandleState::Detached`] from then on.
#[derive(Debug)]
pub struct AsyncFileHandle {
    inner: Option<FileHandle>,
    path: String,
    mode: OpenMode,
}

impl AsyncFileHandle {
    pub fn new(handle: FileHandle) -> Self {
        Self {
            path: handle.path().to_string(),
            mode: handle.mode(),
            inner: Some(handle),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn state(&self) -> HandleState {
        self.inner
            .as_ref()
            .map_or(HandleState::Detached, FileHandle::state)
    }

    async fn with<T, F>(&mut self, op: &'static str, f: F) -> Result<T>
    where
        F: FnOnce(&mut FileHandle) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let Some(mut handle) = self.inner.take() else {
            return Err(DfsError::InvalidHandleState {
                path: self.path.clone(),
                op,
                state: HandleState::Detached,
            });
        };
        let (handle, result) = spawn_blocking(move || {
            let result = f(&mut handle);
            (handle, result)
        })
        .await
        .map_err(join_error)?;
        self.inner = Some(handle);
        result
    }

    /// See [`FileHandle::write`].
    pub async fn write(&mut self, data: impl Into<Bytes>) -> Result<usize> {
        let data = data.into();
        self.with("write", move |handle| handle.write(&data)).await
    }

    pub async fn flush(&mut self) -> Result<()> {
        self.with("flush", FileHandle::flush).await
    }

    pub async fn sync(&mut self) -> Result<()> {
        self.with("sync", FileHandle::sync).await
    }

    /// Reads up to `len` bytes from the sequential cursor. Fewer bytes means
    /// the file ended.
    pub async fn read(&mut self, len: usize) -> Result<Bytes> {
        self.with("read", move |handle| {
            let mut buf = vec![0; len];
            let read = handle.read(&mut buf)?;
            buf.truncate(read);
            Ok(Bytes::from(buf))
        })
        .await
    }

    pub async fn read_exact(&mut self, len: usize) -> Result<Bytes> {
        self.with("read", move |handle| {
            let mut buf = vec![0; len];
            handle.read_exact(&mut buf)?;
            Ok(Bytes::from(buf))
        })
        .await
    }

    /// Reads up to `len` bytes at `offset`, leaving the cursor alone.
    pub async fn pread(&mut self, offset: u64, len: usize) -> Result<Bytes> {
        self.with("pread", move |handle| {
            let mut buf = vec![0; len];
            let read = handle.pread(offset, &mut buf)?;
            buf.truncate(read);
            Ok(Bytes::from(buf))
        })
        .await
    }

    pub async fn close(&mut self) -> Result<()> {
        self.with("close", FileHandle::close).await
    }
}
