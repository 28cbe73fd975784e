//! Tracing subscriber setup for programs embedding the logger.
//!
//! The library itself only emits `tracing` events; call one of these once
//! at startup to see them. Both are no-ops if a global subscriber exists.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Compact stderr output. `RUST_LOG` overrides `default_filter`.
pub fn init_tracing(default_filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}

/// Write events to `dir/file_name` through a background writer thread.
///
/// Keep the returned guard alive; dropping it flushes and stops the writer.
pub fn init_file_tracing(dir: &Path, file_name: &str, default_filter: &str) -> WorkerGuard {
    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_ansi(false)
        .with_writer(writer)
        .try_init();
    guard
}
