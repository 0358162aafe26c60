//! The commands available in the `dfs` binary.
mod check;
mod namespace;
mod transfer;

use std::io::Write;

use anyhow::{Context, Result};
use tracing::debug;
use virtual_dfs::DfsClient;

pub use self::{check::*, namespace::*, transfer::*};

/// Which backend a command talks to.
#[derive(Debug, Clone, clap::Parser)]
pub struct BackendOpts {
    /// Backend configuration string, e.g. `mem://` or `file:///var/lib/dfs?rename=overwrite`.
    #[clap(long, env = "DFS_BACKEND", default_value = "mem://")]
    pub backend: String,
}

impl BackendOpts {
    pub fn client(&self) -> Result<DfsClient> {
        debug!(backend = %self.backend, "connecting");
        DfsClient::connect(&self.backend)
            .with_context(|| format!("unable to connect to \"{}\"", self.backend))
    }
}

#[derive(Debug, clap::Subcommand)]
pub enum Cmd {
    /// Run the end-to-end conformance scenario against a backend
    Check(Check),
    /// List the entries of a directory
    Ls(List),
    /// Create a directory and any missing parents
    Mkdir(MakeDirectory),
    /// Delete a file
    Rm(Remove),
    /// Delete a directory and everything below it
    Rmdir(RemoveDirectory),
    /// Rename a file or directory
    Mv(Move),
    /// Show whether a path exists, and its size if it is a file
    Stat(Stat),
    /// Write a file's contents to stdout
    Cat(Cat),
    /// Copy a local file into the backend
    Put(Put),
}

impl Cmd {
    pub fn execute(&self, out: &mut dyn Write) -> Result<()> {
        debug!(command = ?self, "running command");
        match self {
            Cmd::Check(cmd) => cmd.execute(out),
            Cmd::Ls(cmd) => cmd.execute(out),
            Cmd::Mkdir(cmd) => cmd.execute(out),
            Cmd::Rm(cmd) => cmd.execute(out),
            Cmd::Rmdir(cmd) => cmd.execute(out),
            Cmd::Mv(cmd) => cmd.execute(out),
            Cmd::Stat(cmd) => cmd.execute(out),
            Cmd::Cat(cmd) => cmd.execute(out),
            Cmd::Put(cmd) => cmd.execute(out),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use clap::Parser;

    use super::*;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_dispatch_is_logged() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let cmd = Cmd::Mkdir(
            MakeDirectory::try_parse_from(["mkdir", "--backend", "mem://", "/d"]).unwrap(),
        );
        tracing::subscriber::with_default(subscriber, || cmd.execute(&mut Vec::new())).unwrap();

        let logs = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(logs.contains("running command"), "{logs}");
        assert!(logs.contains("connecting"), "{logs}");
    }
}
