//! Tracing subscriber setup.
//!
//! Events go to stderr and, when a log file is configured, are appended to it
//! without ANSI colors. `RUST_LOG` overrides the configured level.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingSection;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("unknown log level {0:?}")]
    UnknownLevel(String),

    #[error("failed to open log file {path}: {source}")]
    OpenFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to install tracing subscriber: {0}")]
    Init(#[from] TryInitError),
}

/// Maps a configured level name to a tracing level directive.
///
/// Accepts the level names used by existing config files
/// (`WARNING`, `CRITICAL`) as well as tracing's own, in any case.
pub fn level_directive(level: &str) -> Result<&'static str, LoggingError> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" | "critical" => Ok("error"),
        _ => Err(LoggingError::UnknownLevel(level.to_string())),
    }
}

/// Installs the global subscriber.
pub fn init(config: &LoggingSection) -> Result<(), LoggingError> {
    let level = level_directive(&config.level)?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("repost_bot={level}")));

    let file_layer = match &config.file {
        Some(path) => Some(
            fmt::layer()
                .with_ansi(false)
                .with_writer(open_log_file(path)?),
        ),
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .try_init()?;
    Ok(())
}

fn open_log_file(path: &Path) -> Result<Arc<File>, LoggingError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map(Arc::new)
        .map_err(|source| LoggingError::OpenFile {
            path: path.to_path_buf(),
            source,
        })
}
