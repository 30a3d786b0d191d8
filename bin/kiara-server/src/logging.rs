//! Tracing subscriber setup.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::Config;

const LOG_FILE_PREFIX: &str = "kiara-server.log";

/// Keeps the file writer's worker thread alive; buffered records are flushed
/// when this is dropped, so hold it until `main` returns.
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Install the global subscriber: stdout always, plus a daily-rolling file
/// when `log_dir` is set.  `RUST_LOG` wins over `KIARA_LOG`.
pub fn init(cfg: &Config) -> LogGuard {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match cfg.log_level.parse::<EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: KIARA_LOG='{}' is not a valid tracing filter ({}); \
                     falling back to 'info'",
                    cfg.log_level, e
                );
                EnvFilter::new("info")
            }
        },
    };

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true);
    let stdout_layer = if cfg.log_json {
        stdout_layer.json().flatten_event(true).boxed()
    } else {
        stdout_layer.boxed()
    };
    let mut layers = vec![stdout_layer];

    let mut file_guard = None;
    if let Some(dir) = &cfg.log_dir {
        match std::fs::create_dir_all(dir) {
            Ok(()) => {
                let appender =
                    RollingFileAppender::new(Rotation::DAILY, Path::new(dir), LOG_FILE_PREFIX);
                let (writer, guard) = tracing_appender::non_blocking(appender);
                file_guard = Some(guard);

                let file_layer = tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(writer);
                layers.push(if cfg.log_json {
                    file_layer.json().flatten_event(true).boxed()
                } else {
                    file_layer.boxed()
                });
            }
            Err(e) => eprintln!("WARN: cannot create log directory {dir}: {e}; logging to stdout only"),
        }
    }

    // Ignore the error when a subscriber is already installed.
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .try_init();

    LogGuard {
        _file_guard: file_guard,
    }
}
