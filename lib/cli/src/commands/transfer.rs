//! Commands that move file contents in or out of a backend.

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use virtual_dfs::OpenMode;

use super::BackendOpts;

#[derive(Debug, Parser)]
pub struct Cat {
    #[clap(flatten)]
    backend: BackendOpts,
    path: String,
}

impl Cat {
    pub fn execute(&self, out: &mut dyn Write) -> Result<()> {
        let client = self.backend.client()?;
        let mut file = client
            .open_file(&self.path, OpenMode::ReadOnly)
            .with_context(|| format!("unable to open \"{}\"", self.path))?;
        io::copy(&mut file, out).with_context(|| format!("unable to read \"{}\"", self.path))?;
        file.close()?;
        Ok(())
    }
}

#[derive(Debug, Parser)]
pub struct Put {
    #[clap(flatten)]
    backend: BackendOpts,
    /// Local file to upload
    local: PathBuf,
    /// Destination path in the backend
    path: String,
}

impl Put {
    pub fn execute(&self, out: &mut dyn Write) -> Result<()> {
        let client = self.backend.client()?;
        let mut local = fs::File::open(&self.local)
            .with_context(|| format!("unable to open \"{}\"", self.local.display()))?;
        let mut file = client
            .open_file(&self.path, OpenMode::WriteOnly)
            .with_context(|| format!("unable to create \"{}\"", self.path))?;

        let copied = io::copy(&mut local, &mut file)
            .with_context(|| format!("unable to write \"{}\"", self.path))?;
        file.sync()
            .with_context(|| format!("unable to sync \"{}\"", self.path))?;
        file.close()?;

        writeln!(out, "{copied} bytes written to {}", self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_put_then_cat() {
        let temp = TempDir::new().unwrap();
        let local = temp.path().join("local.txt");
        fs::write(&local, b"uploaded contents").unwrap();
        let url = format!("file://{}", temp.path().join("backend").display());

        let put = Put::try_parse_from([
            "put",
            "--backend",
            url.as_str(),
            local.to_str().unwrap(),
            "/dir/remote.txt",
        ])
        .unwrap();
        let mut out = Vec::new();
        put.execute(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "17 bytes written to /dir/remote.txt\n");

        let cat = Cat::try_parse_from(["cat", "--backend", url.as_str(), "/dir/remote.txt"]).unwrap();
        let mut out = Vec::new();
        cat.execute(&mut out).unwrap();
        assert_eq!(out, b"uploaded contents");
    }

    #[test]
    fn test_cat_missing_file() {
        let cat = Cat::try_parse_from(["cat", "--backend", "mem://", "/nothing"]).unwrap();
        let message = format!("{:#}", cat.execute(&mut Vec::new()).unwrap_err());
        assert!(message.starts_with("unable to open \"/nothing\""), "{message}");
    }
}
