//! Log output for the relay
//!
//! Delivery outcomes are only ever recorded here, so the binary always
//! installs one of two outputs: a daily-rolled file under
//! `$XDG_STATE_HOME/notirelay/`, or stderr carrying warnings and errors only.
//! `RUST_LOG` overrides the level of either.

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, LoggingConfig};
use crate::error::{Error, Result};

/// Where log lines go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    /// Rolling file in the state directory, at the configured level
    File,
    /// Standard error, failures only
    Stderr,
}

impl LogOutput {
    fn default_level<'a>(&self, config: &'a LoggingConfig) -> &'a str {
        match self {
            LogOutput::File => &config.level,
            LogOutput::Stderr => "warn",
        }
    }
}

/// Install the global subscriber.
///
/// Keep the returned guard alive until exit; dropping it flushes pending lines.
pub fn init(config: &LoggingConfig, output: LogOutput) -> Result<LoggingGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(output.default_level(config)));

    match output {
        LogOutput::File => {
            let log_dir = Config::state_dir();
            std::fs::create_dir_all(&log_dir)?;

            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("notirelay.log")
                .max_log_files(config.max_files.max(1))
                .build(&log_dir)
                .map_err(|e| Error::Config(format!("failed to open log file: {}", e)))?;
            let (writer, guard) = tracing_appender::non_blocking(appender);

            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_writer(writer)
                        .with_ansi(false)
                        .with_thread_ids(true)
                        .with_line_number(true),
                )
                .init();

            tracing::info!(log_dir = %log_dir.display(), level = %config.level, "Logging initialized");
            Ok(LoggingGuard {
                _guard: Some(guard),
            })
        }
        LogOutput::Stderr => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_ansi(false)
                        .with_target(false),
                )
                .init();
            Ok(LoggingGuard { _guard: None })
        }
    }
}

/// Test-writer subscriber; safe to call from every test
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Flushes the file writer on drop
pub struct LoggingGuard {
    _guard: Option<WorkerGuard>,
}

pub fn log_file_path() -> PathBuf {
    Config::log_path()
}
