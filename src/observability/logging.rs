use std::fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const LOG_DIR: &str = "logs";
const LOG_FILE: &str = "scraper.log";
const DEFAULT_FILTER: &str = "mr_open_data=info,info";

/// Install the global subscriber: human-readable lines on stdout and JSON
/// lines in `logs/scraper.log`, rotated daily. `RUST_LOG` replaces the
/// default filter.
///
/// Buffered file output is flushed when the returned guard is dropped, so
/// the caller keeps it until exit.
pub fn init_logging() -> WorkerGuard {
    if let Err(e) = fs::create_dir_all(LOG_DIR) {
        eprintln!("cannot create log directory {}: {}", LOG_DIR, e);
    }

    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(LOG_DIR, LOG_FILE));

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().json().with_writer(file_writer))
        .with(fmt::layer().with_target(true).with_writer(std::io::stdout))
        .init();

    guard
}
