//! Tracing subscriber setup.

use anyhow::Context;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Filter for the given verbosity flags.
///
/// `-q` wins over `-v`. Without either flag `RUST_LOG` is honoured and the
/// default is `warn`.
fn build_filter(verbose: u8, quiet: bool) -> EnvFilter {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => {
                return EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("warn"));
            }
            1 => "debug",
            _ => "trace",
        }
    };
    EnvFilter::new(level)
}

/// Install the global subscriber: human-readable logs on stderr, plus JSON
/// lines appended to `log_file` when given.
///
/// # Errors
///
/// Returns an error if the log file cannot be opened or a global subscriber
/// is already installed.
pub fn init_logging(verbose: u8, quiet: bool, log_file: Option<&Path>) -> anyhow::Result<()> {
    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(build_filter(verbose, quiet))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbose > 1),
        )
        .with(file_layer)
        .try_init()
        .context("installing tracing subscriber")?;

    Ok(())
}

/// Route logs through the test harness; safe to call from every test.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}
