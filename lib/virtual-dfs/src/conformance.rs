//! End-to-end scenario every backend is expected to pass.
//!
//! [`run_scenario`] drives a client through the whole contract: nested
//! namespace changes, a multi-megabyte write with flush and sync in the
//! middle, rename, sequential and positioned reads, visibility of synced
//! bytes to a second handle, listing and cascading deletes. It leaves
//! nothing behind on success.

use thiserror::Error;
use tracing::debug;

use crate::{path, DfsClient, DfsError, OpenMode};

/// Directory the scenario works in unless told otherwise.
pub const DEFAULT_ROOT: &str = "/test";

/// First record, NUL terminator included.
pub const CONTENT1: &[u8] = b"File1 content\0";
/// Second record, NUL terminator included.
pub const CONTENT2: &[u8] = b"Content for read\0";

pub const BULK_CHUNKS: usize = 1024;
pub const BULK_CHUNK_LEN: usize = 8 * 1024;

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("step `{step}` failed: {source}")]
    Dfs {
        step: &'static str,
        #[source]
        source: DfsError,
    },
    #[error("step `{step}` failed: {detail}")]
    Check { step: &'static str, detail: String },
}

/// Total length of the file written by the scenario.
pub fn expected_file_size() -> u64 {
    (CONTENT1.len() + CONTENT2.len() + BULK_CHUNKS * BULK_CHUNK_LEN) as u64
}

/// Deterministic filler for bulk chunk `index`.
pub fn bulk_chunk(index: usize) -> Vec<u8> {
    let mut state = (index as u64).wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    (0..BULK_CHUNK_LEN)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state >> 32) as u8
        })
        .collect()
}

struct Steps<'a> {
    report: &'a mut dyn FnMut(&str),
}

impl Steps<'_> {
    fn run<T>(&mut self, step: &'static str, result: crate::Result<T>) -> Result<T, ScenarioError> {
        match result {
            Ok(value) => {
                debug!(step, "scenario step passed");
                (self.report)(step);
                Ok(value)
            }
            Err(source) => Err(ScenarioError::Dfs { step, source }),
        }
    }

    fn check(
        &mut self,
        step: &'static str,
        ok: bool,
        detail: impl FnOnce() -> String,
    ) -> Result<(), ScenarioError> {
        if !ok {
            return Err(ScenarioError::Check {
                step,
                detail: detail(),
            });
        }
        debug!(step, "scenario step passed");
        (self.report)(step);
        Ok(())
    }

    fn expect_eq<T: PartialEq + std::fmt::Debug>(
        &mut self,
        step: &'static str,
        actual: T,
        expected: T,
    ) -> Result<(), ScenarioError> {
        let ok = actual == expected;
        self.check(step, ok, || format!("expected {expected:?}, got {actual:?}"))
    }
}

/// Runs the scenario below `root`, which must not hold anything the caller
/// cares about: it is deleted at the end. `report` is called with the name
/// of every step that passes.
pub fn run_scenario(
    client: &DfsClient,
    root: &str,
    report: &mut dyn FnMut(&str),
) -> Result<(), ScenarioError> {
    let mut steps = Steps { report };
    let file1 = path::join(root, "file1");
    let file2 = path::join(root, "file2");
    let file3 = path::join(root, "file3");

    steps.run("create directory", client.create_directory(root))?;
    if steps.run("probe file1", client.exists(&file1))? {
        steps.run("remove stale file1", client.delete(&file1))?;
    }

    // Write, flush and sync, then keep writing.
    let mut writer = steps.run("open file1 for write", client.open_file(&file1, OpenMode::WriteOnly))?;
    let written = steps.run("write content1", writer.write(CONTENT1))?;
    steps.expect_eq("content1 fully accepted", written, CONTENT1.len())?;
    steps.run("flush file1", writer.flush())?;
    steps.run("sync file1", writer.sync())?;
    let written = steps.run("write content2", writer.write(CONTENT2))?;
    steps.expect_eq("content2 fully accepted", written, CONTENT2.len())?;
    for index in 0..BULK_CHUNKS {
        let chunk = bulk_chunk(index);
        let written = writer
            .write(&chunk)
            .map_err(|source| ScenarioError::Dfs { step: "write bulk payload", source })?;
        if written != chunk.len() {
            return Err(ScenarioError::Check {
                step: "write bulk payload",
                detail: format!("chunk {index}: {written} of {} bytes accepted", chunk.len()),
            });
        }
    }
    (steps.report)("write bulk payload");
    steps.run("close file1", writer.close())?;

    // Rename.
    if steps.run("probe file2", client.exists(&file2))? {
        steps.run("remove stale file2", client.delete(&file2))?;
    }
    steps.run("rename file1 to file2", client.rename(&file1, &file2))?;
    let exists = steps.run("probe renamed file", client.exists(&file2))?;
    steps.expect_eq("file2 exists", exists, true)?;
    let exists = steps.run("probe old name", client.exists(&file1))?;
    steps.expect_eq("file1 is gone", exists, false)?;

    let size = steps.run("file size", client.file_size(&file2))?;
    steps.expect_eq("size is the sum of all writes", size, expected_file_size())?;

    // Sequential and positioned reads.
    let mut reader = steps.run("open file2 for read", client.open_file(&file2, OpenMode::ReadOnly))?;
    let mut buf = vec![0; CONTENT1.len()];
    let read = steps.run("read content1", reader.read(&mut buf))?;
    steps.expect_eq("content1 read back", &buf[..read], CONTENT1)?;
    let mut buf = vec![0; CONTENT2.len()];
    let read = steps.run("read content2", reader.read(&mut buf))?;
    steps.expect_eq("content2 read back", &buf[..read], CONTENT2)?;
    let mut buf = vec![0; CONTENT2.len()];
    let read = steps.run(
        "pread content2",
        reader.pread(CONTENT1.len() as u64, &mut buf),
    )?;
    steps.expect_eq("content2 read at offset", &buf[..read], CONTENT2)?;
    let mut buf = vec![0; BULK_CHUNK_LEN];
    let read = steps.run(
        "pread last chunk",
        reader.pread(expected_file_size() - BULK_CHUNK_LEN as u64, &mut buf),
    )?;
    let last = bulk_chunk(BULK_CHUNKS - 1);
    steps.check("last chunk read back", buf[..read] == last[..], || {
        format!("{read} bytes read, contents differ from what was written")
    })?;
    steps.run("close file2", reader.close())?;

    // Synced bytes are visible to a second handle while the writer is open.
    if steps.run("probe file3", client.exists(&file3))? {
        steps.run("remove stale file3", client.delete(&file3))?;
    }
    let mut writer = steps.run("open file3 for write", client.open_file(&file3, OpenMode::WriteOnly))?;
    steps.run("write content1 to file3", writer.write(CONTENT1))?;
    steps.run("flush file3", writer.flush())?;
    steps.run("sync file3", writer.sync())?;
    steps.run("write content2 to file3", writer.write(CONTENT2))?;

    let mut reader = steps.run("open file3 for read", client.open_file(&file3, OpenMode::ReadOnly))?;
    let mut buf = vec![0; CONTENT1.len()];
    let read = steps.run("read synced content", reader.read(&mut buf))?;
    steps.expect_eq("synced content visible", &buf[..read], CONTENT1)?;
    steps.run("close file3 reader", reader.close())?;
    steps.run("close file3 writer", writer.close())?;

    // Listing and deletes.
    let listing = steps.run("list directory", client.list_directory(root))?;
    steps.expect_eq("listing holds both files", listing, vec![file2.clone(), file3.clone()])?;

    steps.run("delete file2", client.delete(&file2))?;
    let exists = steps.run("probe deleted file", client.exists(&file2))?;
    steps.expect_eq("file2 is gone", exists, false)?;

    steps.run("delete directory", client.delete_directory(root))?;
    let listing = steps.run("list deleted directory", client.list_directory(root))?;
    steps.expect_eq("deleted directory lists empty", listing, Vec::<String>::new())?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bulk_chunks_differ() {
        assert_eq!(bulk_chunk(0).len(), BULK_CHUNK_LEN);
        assert_eq!(bulk_chunk(7), bulk_chunk(7));
        assert_ne!(bulk_chunk(0), bulk_chunk(1));
        assert_eq!(expected_file_size(), 14 + 17 + 8 * 1024 * 1024);
    }

    #[test]
    fn test_scenario_on_memory_backend() {
        let client = DfsClient::connect("mem://").unwrap();
        let mut passed = Vec::new();
        run_scenario(&client, DEFAULT_ROOT, &mut |step| passed.push(step.to_string())).unwrap();

        assert!(passed.contains(&"synced content visible".to_string()));
        assert_eq!(passed.last().map(String::as_str), Some("deleted directory lists empty"));
        assert!(!client.exists(DEFAULT_ROOT).unwrap());
    }

    #[test]
    fn test_scenario_reports_first_failure() {
        let client = DfsClient::connect("mem://?max_file_size=20").unwrap();
        let err = run_scenario(&client, "/limited", &mut |_| {}).unwrap_err();
        match err {
            ScenarioError::Dfs { step, source } => {
                assert_eq!(step, "write content2");
                assert!(matches!(
                    source,
                    DfsError::PartialTransfer { requested: 17, transferred: 6 }
                ));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
