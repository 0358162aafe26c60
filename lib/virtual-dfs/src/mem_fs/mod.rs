//! In-memory backend.
//!
//! Every file keeps two lengths: what is visible (everything flushed) and
//! what is durable (everything synced). [`FileSystem::simulate_restart`]
//! drops whatever was visible but not durable, which is how the durability
//! half of the contract is exercised without a real storage layer.
//! Namespace changes are durable as soon as they return.

mod file;
mod filesystem;

pub use filesystem::FileSystem;

use std::collections::BTreeMap;
use std::io;

use crate::DfsError;

type Inode = usize;
const ROOT_INODE: Inode = 0;

#[derive(Debug)]
struct FileNode {
    /// Distinguishes this file from later files that reuse the slab slot.
    id: u64,
    data: Vec<u8>,
    durable_len: usize,
}

#[derive(Debug, Default)]
struct DirectoryNode {
    /// Ordered by name, which keeps listings lexicographic.
    children: BTreeMap<String, Inode>,
}

#[derive(Debug)]
enum Node {
    File(FileNode),
    Directory(DirectoryNode),
}

impl Node {
    fn is_dir(&self) -> bool {
        matches!(self, Self::Directory(_))
    }
}

/// The namespace tree refers to an inode that is missing or of the wrong type.
fn corrupt(inode: Inode) -> DfsError {
    DfsError::Io(io::Error::other(format!(
        "in-memory namespace is inconsistent at inode {inode}"
    )))
}
