//! Logging initialization
//!
//! Env-filter based (`LOG_LEVEL`), plain or JSON lines (`LOG_JSON`),
//! stdout by default with an optional daily-rolling file when `LOG_DIR`
//! is set. The returned guard must stay alive for the process lifetime
//! or buffered file output is lost.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

const LOG_FILE_PREFIX: &str = "ticket-server.log";

/// Install the global subscriber. Call once, before any spans.
pub fn init_logging(level: &str, json: bool, log_dir: Option<&str>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            if json {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().json().with_writer(writer))
                    .init();
            } else {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().with_ansi(false).with_writer(writer))
                    .init();
            }
            Some(guard)
        }
        None => {
            if json {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().json())
                    .init();
            } else {
                tracing_subscriber::registry().with(filter).with(fmt::layer()).init();
            }
            None
        }
    }
}
