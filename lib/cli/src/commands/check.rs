use std::io::Write;

use anyhow::{Context, Result};
use clap::Parser;
use virtual_dfs::conformance;

use super::BackendOpts;

#[derive(Debug, Parser)]
/// The options for the `dfs check` subcommand
pub struct Check {
    #[clap(flatten)]
    backend: BackendOpts,

    /// Scratch directory for the scenario. It is deleted afterwards.
    #[clap(long, default_value = conformance::DEFAULT_ROOT)]
    root: String,
}

impl Check {
    /// Execute the check command
    pub fn execute(&self, out: &mut dyn Write) -> Result<()> {
        let client = self.backend.client()?;

        let mut write_err = None;
        let result = conformance::run_scenario(&client, &self.root, &mut |step| {
            if write_err.is_none() {
                if let Err(e) = writeln!(out, "[pass] {step}") {
                    write_err = Some(e);
                }
            }
        });
        result.with_context(|| format!("\"{}\" failed the conformance scenario", self.backend.backend))?;
        if let Some(e) = write_err {
            return Err(e.into());
        }

        writeln!(out, "{} passed the conformance scenario", self.backend.backend)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_mem_backend() {
        let check = Check::try_parse_from(["check", "--backend", "mem://"]).unwrap();
        let mut out = Vec::new();
        check.execute(&mut out).unwrap();

        let out = String::from_utf8(out).unwrap();
        assert!(out.starts_with("[pass] create directory\n"), "{out}");
        assert!(out.ends_with("mem:// passed the conformance scenario\n"), "{out}");
    }

    #[test]
    fn test_check_reports_failure() {
        let check =
            Check::try_parse_from(["check", "--backend", "mem://?max_file_size=4"]).unwrap();
        let err = check.execute(&mut Vec::new()).unwrap_err();

        let message = format!("{err:#}");
        assert!(message.contains("failed the conformance scenario"), "{message}");
        assert!(message.contains("write content1"), "{message}");
    }
}
