//! # Logging
//!
//! Sets up the `tracing` subscriber for the `tvault` binary. Ledger events
//! (`deposit`, `fee_accrued`, `reward_claimed`, ...) come out of the library
//! crates as structured fields; this module only decides where they go and
//! in which shape.
//!
//! Everything goes to stderr. Stdout carries the command's JSON result and
//! nothing else, so `tvault status | jq` keeps working with logging on.

use std::io::{self, IsTerminal};

use clap::ValueEnum;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Used when `RUST_LOG` is unset: ledger events at info, dependencies at warn.
pub const DEFAULT_FILTER: &str = "warn,tvault_cli=info,tvault_contracts=info,tvault_protocol=info";

/// Shape of the log lines on stderr.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines, colored when stderr is a terminal.
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Installs the global subscriber. Must run once, before any ledger call.
///
/// `RUST_LOG` takes precedence over `default_filter`:
///
/// ```text
/// RUST_LOG=tvault_contracts=debug tvault accrue --caller bob
/// ```
pub fn init_logging(default_filter: &str, format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .with_writer(io::stderr)
                    .with_ansi(io::stderr().is_terminal())
                    .with_target(true),
            )
            .init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(io::stderr)
                    .with_current_span(false)
                    .with_target(true),
            )
            .init(),
    }

    tracing::debug!(format = ?format, "logging initialized");
}
