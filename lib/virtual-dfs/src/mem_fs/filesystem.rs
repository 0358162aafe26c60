//! This module contains the [`FileSystem`] type itself.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use slab::Slab;
use tracing::{debug, warn};

use super::file::{FileReader, FileWriter};
use super::*;
use crate::{path, BackendConfig, Dfs, DfsFile, OpenMode, RenamePolicy, Result};

/// The in-memory file system!
///
/// This `FileSystem` type can be cloned, it's a light copy of the
/// `FileSystemInner` (which is behind a `Arc` + `RwLock`).
#[derive(Clone, Default)]
pub struct FileSystem {
    pub(super) inner: Arc<RwLock<FileSystemInner>>,
}

impl FileSystem {
    pub fn new(config: BackendConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(FileSystemInner {
                config,
                ..Default::default()
            })),
        }
    }

    pub fn config(&self) -> Result<BackendConfig> {
        Ok(self.inner.read()?.config.clone())
    }

    /// Behaves as if the storage layer crashed and came back: every file is
    /// cut back to the bytes it had when it was last synced.
    pub fn simulate_restart(&self) -> Result<()> {
        let mut fs = self.inner.write()?;
        for (_, node) in fs.storage.iter_mut() {
            if let Node::File(file) = node {
                file.data.truncate(file.durable_len);
            }
        }
        debug!("simulated in-memory backend restart");
        Ok(())
    }
}

impl fmt::Debug for FileSystem {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_read() {
            Ok(fs) => fmt::Debug::fmt(&*fs, formatter),
            Err(_) => formatter.write_str("\n\n(locked)\n\n"),
        }
    }
}

/// The core of the file system. It contains a collection of `Node`s,
/// indexed by their respective `Inode` in a slab.
pub(super) struct FileSystemInner {
    pub(super) storage: Slab<Node>,
    pub(super) config: BackendConfig,
    next_file_id: u64,
}

impl Default for FileSystemInner {
    fn default() -> Self {
        let mut storage = Slab::new();
        let root = storage.insert(Node::Directory(DirectoryNode::default()));
        debug_assert_eq!(root, ROOT_INODE);

        Self {
            storage,
            config: BackendConfig::default(),
            next_file_id: 0,
        }
    }
}

impl fmt::Debug for FileSystemInner {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn debug(
            storage: &Slab<Node>,
            name: &str,
            inode: Inode,
            formatter: &mut fmt::Formatter<'_>,
            indentation: usize,
        ) -> fmt::Result {
            match storage.get(inode) {
                Some(Node::Directory(dir)) => {
                    writeln!(formatter, "{:indentation$}{name}/", "")?;
                    for (child_name, child) in &dir.children {
                        debug(storage, child_name, *child, formatter, indentation + 2)?;
                    }
                    Ok(())
                }
                Some(Node::File(file)) => writeln!(
                    formatter,
                    "{:indentation$}{name} ({} bytes, {} durable)",
                    "",
                    file.data.len(),
                    file.durable_len
                ),
                None => writeln!(formatter, "{:indentation$}{name} (dangling)", ""),
            }
        }

        writeln!(formatter, "\n\nmem_fs::FileSystem:")?;
        debug(&self.storage, "", ROOT_INODE, formatter, 0)
    }
}

impl FileSystemInner {
    /// Resolves `path` to an inode. A missing segment, or a segment below a
    /// file, resolves to `None`.
    pub(super) fn lookup(&self, path: &str) -> Option<Inode> {
        let mut current = ROOT_INODE;
        for segment in path::segments(path) {
            match self.storage.get(current)? {
                Node::Directory(dir) => current = *dir.children.get(segment)?,
                Node::File(_) => return None,
            }
        }
        Some(current)
    }

    pub(super) fn file(&self, inode: Inode, id: u64, path: &str) -> Result<&FileNode> {
        match self.storage.get(inode) {
            Some(Node::File(file)) if file.id == id => Ok(file),
            _ => Err(DfsError::not_found(path)),
        }
    }

    pub(super) fn file_mut(&mut self, inode: Inode, id: u64, path: &str) -> Result<&mut FileNode> {
        match self.storage.get_mut(inode) {
            Some(Node::File(file)) if file.id == id => Ok(file),
            _ => Err(DfsError::not_found(path)),
        }
    }

    fn children_mut(&mut self, inode: Inode) -> Result<&mut BTreeMap<String, Inode>> {
        match self.storage.get_mut(inode) {
            Some(Node::Directory(dir)) => Ok(&mut dir.children),
            _ => Err(corrupt(inode)),
        }
    }

    /// Walks `path`, creating every missing directory on the way, and
    /// returns the inode of the last one.
    fn ensure_directory(&mut self, path: &str) -> Result<Inode> {
        let mut current = ROOT_INODE;
        let mut walked = String::with_capacity(path.len());
        for segment in path::segments(path) {
            walked.push('/');
            walked.push_str(segment);

            let existing = match self.storage.get(current) {
                Some(Node::Directory(dir)) => dir.children.get(segment).copied(),
                _ => return Err(corrupt(current)),
            };
            current = match existing {
                Some(child) if self.storage.get(child).is_some_and(Node::is_dir) => child,
                Some(_) => return Err(DfsError::not_a_directory(walked)),
                None => {
                    let child = self
                        .storage
                        .insert(Node::Directory(DirectoryNode::default()));
                    self.children_mut(current)?
                        .insert(segment.to_string(), child);
                    debug!(path = %walked, inode = child, "created directory");
                    child
                }
            };
        }
        Ok(current)
    }

    /// Unlinks `path` from its parent and returns its inode.
    fn detach(&mut self, path: &str) -> Result<Inode> {
        let (Some(parent), Some(name)) = (path::parent(path), path::file_name(path)) else {
            return Err(DfsError::invalid_path(path, "the root cannot be detached"));
        };
        let parent = self.lookup(parent).ok_or_else(|| DfsError::not_found(path))?;
        self.children_mut(parent)?
            .remove(name)
            .ok_or_else(|| DfsError::not_found(path))
    }

    /// Drops `inode` and, for a directory, everything below it.
    fn remove_subtree(&mut self, inode: Inode) {
        let mut remaining = vec![inode];
        while let Some(next) = remaining.pop() {
            if let Some(Node::Directory(dir)) = self.storage.try_remove(next) {
                remaining.extend(dir.children.into_values());
            }
        }
    }

    fn new_file(&mut self, parent: Inode, name: &str) -> Result<(Inode, u64)> {
        let id = self.next_file_id;
        self.next_file_id += 1;
        let inode = self.storage.insert(Node::File(FileNode {
            id,
            data: Vec::new(),
            durable_len: 0,
        }));
        self.children_mut(parent)?.insert(name.to_string(), inode);
        Ok((inode, id))
    }
}

impl Dfs for FileSystem {
    fn create_directory(&self, path: &str) -> Result<()> {
        path::validate(path)?;
        let mut fs = self.inner.write()?;
        fs.ensure_directory(path).map(|_| ())
    }

    fn delete_directory(&self, path: &str) -> Result<()> {
        path::validate(path)?;
        if path == path::ROOT {
            return Err(DfsError::invalid_path(path, "the root cannot be deleted"));
        }

        let mut fs = self.inner.write()?;
        let inode = fs.lookup(path).ok_or_else(|| DfsError::not_found(path))?;
        if !fs.storage[inode].is_dir() {
            return Err(DfsError::not_a_directory(path));
        }
        fs.detach(path)?;
        fs.remove_subtree(inode);
        debug!(%path, "deleted directory");
        Ok(())
    }

    fn exists(&self, path: &str) -> Result<bool> {
        path::validate(path)?;
        let fs = self.inner.read()?;
        Ok(fs.lookup(path).is_some())
    }

    fn delete(&self, path: &str) -> Result<()> {
        path::validate(path)?;
        let mut fs = self.inner.write()?;
        let inode = fs.lookup(path).ok_or_else(|| DfsError::not_found(path))?;
        if fs.storage[inode].is_dir() {
            return Err(DfsError::is_a_directory(path));
        }
        fs.detach(path)?;
        fs.remove_subtree(inode);
        debug!(%path, "deleted file");
        Ok(())
    }

    fn rename(&self, from: &str, to: &str) -> Result<()> {
        path::validate(from)?;
        path::validate(to)?;
        if from == path::ROOT || to == path::ROOT {
            return Err(DfsError::invalid_path(from, "the root cannot be renamed"));
        }
        if path::is_descendant(to, from) {
            return Err(DfsError::invalid_path(
                to,
                "cannot move a directory inside itself",
            ));
        }

        let mut fs = self.inner.write()?;
        let source = fs.lookup(from).ok_or_else(|| DfsError::not_found(from))?;
        if from == to {
            return Ok(());
        }

        let replaced = match fs.lookup(to) {
            None => None,
            Some(_) if fs.config.rename == RenamePolicy::FailIfExists => {
                return Err(DfsError::already_exists(to));
            }
            Some(target) if fs.storage[target].is_dir() => {
                return Err(DfsError::is_a_directory(to));
            }
            Some(_) if fs.storage[source].is_dir() => {
                return Err(DfsError::not_a_directory(to));
            }
            Some(target) => Some(target),
        };

        let (to_parent, to_name) = match (path::parent(to), path::file_name(to)) {
            (Some(parent), Some(name)) => (parent, name),
            _ => return Err(DfsError::invalid_path(to, "the root cannot be renamed")),
        };
        let new_parent = fs.ensure_directory(to_parent)?;

        if let Some(target) = replaced {
            fs.detach(to)?;
            fs.remove_subtree(target);
        }
        fs.detach(from)?;
        fs.children_mut(new_parent)?
            .insert(to_name.to_string(), source);
        debug!(%from, %to, "renamed");
        Ok(())
    }

    fn file_size(&self, path: &str) -> Result<u64> {
        path::validate(path)?;
        let fs = self.inner.read()?;
        let inode = fs.lookup(path).ok_or_else(|| DfsError::not_found(path))?;
        match &fs.storage[inode] {
            Node::File(file) => Ok(file.data.len() as u64),
            Node::Directory(_) => Err(DfsError::is_a_directory(path)),
        }
    }

    fn list_directory(&self, path: &str) -> Result<Vec<String>> {
        path::validate(path)?;
        let fs = self.inner.read()?;
        let Some(inode) = fs.lookup(path) else {
            return Ok(Vec::new());
        };
        match &fs.storage[inode] {
            Node::Directory(dir) => Ok(dir
                .children
                .keys()
                .map(|name| path::join(path, name))
                .collect()),
            Node::File(_) => Err(DfsError::not_a_directory(path)),
        }
    }

    fn open_file(&self, path: &str, mode: OpenMode) -> Result<Box<dyn DfsFile>> {
        path::validate(path)?;
        let (Some(parent), Some(name)) = (path::parent(path), path::file_name(path)) else {
            return Err(DfsError::is_a_directory(path));
        };

        match mode {
            OpenMode::ReadOnly => {
                let fs = self.inner.read()?;
                let inode = fs.lookup(path).ok_or_else(|| DfsError::not_found(path))?;
                match &fs.storage[inode] {
                    Node::File(file) => Ok(Box::new(FileReader::new(
                        self.clone(),
                        inode,
                        file.id,
                        path,
                    ))),
                    Node::Directory(_) => Err(DfsError::is_a_directory(path)),
                }
            }
            OpenMode::WriteOnly => {
                let mut fs = self.inner.write()?;
                let parent = fs.ensure_directory(parent)?;
                let existing = match &fs.storage[parent] {
                    Node::Directory(dir) => dir.children.get(name).copied(),
                    Node::File(_) => return Err(corrupt(parent)),
                };

                let (inode, id) = match existing {
                    Some(inode) => match &mut fs.storage[inode] {
                        Node::File(file) => {
                            file.data.clear();
                            file.durable_len = 0;
                            (inode, file.id)
                        }
                        Node::Directory(_) => return Err(DfsError::is_a_directory(path)),
                    },
                    None => fs.new_file(parent, name)?,
                };
                let config = fs.config.clone();
                drop(fs);

                Ok(Box::new(FileWriter::new(
                    self.clone(),
                    inode,
                    id,
                    path,
                    &config,
                )))
            }
        }
    }

    fn rename_policy(&self) -> RenamePolicy {
        // The configuration is never written after construction, so a
        // poisoned lock still holds the right value.
        let fs = self.inner.read().unwrap_or_else(|poisoned| {
            warn!("reading the rename policy through a poisoned lock");
            poisoned.into_inner()
        });
        fs.config.rename
    }
}
