//! The logic for the `dfs` CLI tool.

use std::io::Write;

use anyhow::Result;
use clap::Parser;

use crate::commands::Cmd;
use crate::logging::Output;

/// Command-line arguments for the `dfs` CLI.
#[derive(Parser, Debug)]
#[clap(
    name = "dfs",
    about = "Inspect and exercise distributed filesystem backends.",
    version
)]
pub struct DfsCmd {
    #[clap(flatten)]
    output: Output,
    #[clap(subcommand)]
    cmd: Cmd,
}

impl DfsCmd {
    /// Runs the parsed command, writing its results to `out`.
    pub fn execute(self, out: &mut dyn Write) -> Result<()> {
        let DfsCmd { output, cmd } = self;
        output.initialize_logging();
        cmd.execute(out)
    }
}

/// The main function for the `dfs` CLI tool.
pub fn dfs_main() {
    let cmd = DfsCmd::parse();
    let stdout = std::io::stdout();
    let result = cmd.execute(&mut stdout.lock());

    if let Err(err) = result {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
