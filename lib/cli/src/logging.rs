//! Logging set-up for the CLI.

use std::io::IsTerminal;

use tracing_subscriber::{
    filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// Output options shared by every command.
#[derive(Debug, Default, Clone, clap::Parser)]
pub struct Output {
    /// Log more (`-v` for debug, `-vv` for trace). `$RUST_LOG` wins when set.
    #[clap(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

impl Output {
    pub fn is_verbose(&self) -> bool {
        self.verbose > 0
    }

    fn default_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::WARN,
            1 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }

    /// Initialize logging based on the `$RUST_LOG` environment variable,
    /// falling back to the level picked with `--verbose`.
    pub fn initialize_logging(&self) {
        let fmt_layer = fmt::layer()
            .with_target(true)
            .with_span_events(fmt::format::FmtSpan::CLOSE)
            .with_ansi(should_emit_colors())
            .with_thread_ids(true)
            .with_writer(std::io::stderr)
            .compact();

        let filter_layer = EnvFilter::builder()
            .with_default_directive(self.default_level().into())
            .from_env_lossy();

        // A subscriber may already be installed, e.g. when running under a test harness.
        let _ = tracing_subscriber::registry()
            .with(filter_layer)
            .with(fmt_layer)
            .try_init();
    }
}

/// Check whether we should emit ANSI escape codes for log formatting.
///
/// The `tracing-subscriber` crate doesn't have native support for
/// "--color=always|never|auto", so we implement a poor man's version.
fn should_emit_colors() -> bool {
    std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(Output { verbose: 0 }.default_level(), LevelFilter::WARN);
        assert_eq!(Output { verbose: 1 }.default_level(), LevelFilter::DEBUG);
        assert_eq!(Output { verbose: 5 }.default_level(), LevelFilter::TRACE);
        assert!(!Output::default().is_verbose());
    }
}
