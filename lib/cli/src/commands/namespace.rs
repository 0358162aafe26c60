//! Commands that only touch the namespace.

use std::io::Write;

use anyhow::{Context, Result};
use clap::Parser;
use virtual_dfs::ErrorKind;

use super::BackendOpts;

#[derive(Debug, Parser)]
pub struct List {
    #[clap(flatten)]
    backend: BackendOpts,
    /// Directory to list
    #[clap(default_value = "/")]
    path: String,
}

impl List {
    pub fn execute(&self, out: &mut dyn Write) -> Result<()> {
        let entries = self
            .backend
            .client()?
            .list_directory(&self.path)
            .with_context(|| format!("unable to list \"{}\"", self.path))?;
        for entry in entries {
            writeln!(out, "{entry}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Parser)]
pub struct MakeDirectory {
    #[clap(flatten)]
    backend: BackendOpts,
    path: String,
}

impl MakeDirectory {
    pub fn execute(&self, _out: &mut dyn Write) -> Result<()> {
        self.backend
            .client()?
            .create_directory(&self.path)
            .with_context(|| format!("unable to create \"{}\"", self.path))
    }
}

#[derive(Debug, Parser)]
pub struct Remove {
    #[clap(flatten)]
    backend: BackendOpts,
    path: String,
}

impl Remove {
    pub fn execute(&self, _out: &mut dyn Write) -> Result<()> {
        self.backend
            .client()?
            .delete(&self.path)
            .with_context(|| format!("unable to delete \"{}\"", self.path))
    }
}

#[derive(Debug, Parser)]
pub struct RemoveDirectory {
    #[clap(flatten)]
    backend: BackendOpts,
    path: String,
}

impl RemoveDirectory {
    pub fn execute(&self, _out: &mut dyn Write) -> Result<()> {
        self.backend
            .client()?
            .delete_directory(&self.path)
            .with_context(|| format!("unable to delete directory \"{}\"", self.path))
    }
}

#[derive(Debug, Parser)]
pub struct Move {
    #[clap(flatten)]
    backend: BackendOpts,
    from: String,
    to: String,
}

impl Move {
    pub fn execute(&self, _out: &mut dyn Write) -> Result<()> {
        self.backend
            .client()?
            .rename(&self.from, &self.to)
            .with_context(|| format!("unable to rename \"{}\" to \"{}\"", self.from, self.to))
    }
}

#[derive(Debug, Parser)]
pub struct Stat {
    #[clap(flatten)]
    backend: BackendOpts,
    path: String,
}

impl Stat {
    pub fn execute(&self, out: &mut dyn Write) -> Result<()> {
        let client = self.backend.client()?;
        let context = || format!("unable to stat \"{}\"", self.path);

        if !client.exists(&self.path).with_context(context)? {
            writeln!(out, "{}: not found", self.path)?;
            return Ok(());
        }
        match client.file_size(&self.path) {
            Ok(size) => writeln!(out, "{}: file, {size} bytes", self.path)?,
            Err(e) if e.kind() == ErrorKind::TypeConflict => {
                writeln!(out, "{}: directory", self.path)?
            }
            Err(e) => return Err(e).with_context(context),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;

    fn backend_url(temp: &TempDir) -> String {
        format!("file://{}", temp.path().display())
    }

    fn run<C: Parser>(args: &[&str], execute: impl Fn(&C, &mut dyn Write) -> Result<()>) -> String {
        let cmd = C::try_parse_from(args).unwrap();
        let mut out = Vec::new();
        execute(&cmd, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_namespace_commands() {
        let temp = TempDir::new().unwrap();
        let url = backend_url(&temp);

        run::<MakeDirectory>(&["mkdir", "--backend", &url, "/a/b"], MakeDirectory::execute);
        run::<MakeDirectory>(&["mkdir", "--backend", &url, "/a/c"], MakeDirectory::execute);
        std::fs::write(temp.path().join("a/file"), b"12345").unwrap();

        let listing = run::<List>(&["ls", "--backend", &url, "/a"], List::execute);
        assert_eq!(listing, "/a/b\n/a/c\n/a/file\n");

        let stat = run::<Stat>(&["stat", "--backend", &url, "/a/file"], Stat::execute);
        assert_eq!(stat, "/a/file: file, 5 bytes\n");
        let stat = run::<Stat>(&["stat", "--backend", &url, "/a/b"], Stat::execute);
        assert_eq!(stat, "/a/b: directory\n");

        run::<Move>(&["mv", "--backend", &url, "/a/file", "/a/b/moved"], Move::execute);
        run::<Remove>(&["rm", "--backend", &url, "/a/b/moved"], Remove::execute);
        let stat = run::<Stat>(&["stat", "--backend", &url, "/a/b/moved"], Stat::execute);
        assert_eq!(stat, "/a/b/moved: not found\n");

        run::<RemoveDirectory>(&["rmdir", "--backend", &url, "/a"], RemoveDirectory::execute);
        assert!(!temp.path().join("a").exists());
    }

    #[test]
    fn test_errors_carry_context() {
        let temp = TempDir::new().unwrap();
        let url = backend_url(&temp);

        let cmd = Remove::try_parse_from(["rm", "--backend", url.as_str(), "/missing"]).unwrap();
        let message = format!("{:#}", cmd.execute(&mut Vec::new()).unwrap_err());
        assert!(message.starts_with("unable to delete \"/missing\""), "{message}");

        let cmd = List::try_parse_from(["ls", "--backend", "nope://"]).unwrap();
        let message = format!("{:#}", cmd.execute(&mut Vec::new()).unwrap_err());
        assert!(message.starts_with("unable to connect to \"nope://\""), "{message}");
    }
}
