//! Logging setup.
//!
//! Structured `tracing` output to stderr, with an optional non-blocking
//! file writer alongside. Verbosity is controlled through `RUST_LOG`
//! and defaults to `info`.

use std::io;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Keeps the background log writer alive.
///
/// Dropping the guard flushes and closes the log file.
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Initialise the global subscriber with stderr output only.
pub fn init_logging() -> LoggingGuard {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(stderr_layer())
        .init();

    LoggingGuard { _file_guard: None }
}

/// Initialise the global subscriber with stderr output plus a log file
/// under `log_dir`.
///
/// # Errors
///
/// Returns an error if the log directory cannot be created.
pub fn init_logging_with_file(
    log_dir: &Path,
    log_file: &str,
) -> Result<LoggingGuard, io::Error> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = tracing_appender::rolling::never(log_dir, log_file);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .with_target(true);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(file_layer)
        .with(stderr_layer())
        .init();

    Ok(LoggingGuard {
        _file_guard: Some(file_guard),
    })
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn stderr_layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // The global subscriber can only be installed once per process, so
    // these tests cover the file plumbing rather than init itself.

    #[test]
    fn test_log_directory_created() {
        let dir = TempDir::new().unwrap();
        let log_dir = dir.path().join("logs/nested");

        std::fs::create_dir_all(&log_dir).unwrap();
        assert!(log_dir.exists());
    }

    #[test]
    fn test_guard_holds_worker() {
        let (writer, guard) = tracing_appender::non_blocking(std::io::sink());
        drop(writer);

        let _logging_guard = LoggingGuard {
            _file_guard: Some(guard),
        };
    }

    #[test]
    fn test_default_filter_is_info() {
        // With RUST_LOG unset the fallback filter parses cleanly.
        let filter = EnvFilter::new("info");
        assert_eq!(filter.to_string(), "info");
    }
}
