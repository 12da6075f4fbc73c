//! Tracing subscriber setup.
//!
//! Events go to stderr in the configured format. When a log directory is
//! configured they are also written, without ANSI colors, to a daily-rolling
//! file in that directory.

use std::fs;
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

use crate::config::{LogFormat, ResolvedConfig};
use crate::{Error, Result};

/// Prefix for rolled log files (`qatrack.log.YYYY-MM-DD`).
pub const LOG_FILE_PREFIX: &str = "qatrack.log";

/// Logging settings taken from the resolved config.
#[derive(Debug, Clone)]
pub struct LoggingOptions {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub level: String,
    pub format: LogFormat,
    pub dir: Option<PathBuf>,
}

impl LoggingOptions {
    pub fn from_config(config: &ResolvedConfig) -> Self {
        Self {
            level: config.log_level.value.clone(),
            format: config.log_format.value,
            dir: config.log_dir.as_ref().map(|r| r.value.clone()),
        }
    }
}

/// Keeps the file writer flushing until dropped.
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `options.level`. Hold the returned guard for the
/// life of the process or buffered file output may be lost.
pub fn init(options: &LoggingOptions) -> Result<LoggingGuard> {
    let filter = build_filter(&options.level)?;

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    layers.push(stderr_layer(options.format));

    let mut file_guard = None;
    if let Some(ref dir) = options.dir {
        let (layer, guard) = file_layer(options.format, dir)?;
        layers.push(layer);
        file_guard = Some(guard);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|e| Error::Other(format!("Failed to install log subscriber: {}", e)))?;

    Ok(LoggingGuard { _file: file_guard })
}

/// Build the event filter, preferring `RUST_LOG` when it is set.
fn build_filter(default_directive: &str) -> Result<EnvFilter> {
    match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(env) if !env.trim().is_empty() => Ok(EnvFilter::new(env)),
        _ => EnvFilter::try_new(default_directive).map_err(|e| {
            Error::Config(format!("invalid log-level '{}': {}", default_directive, e))
        }),
    }
}

fn stderr_layer(format: LogFormat) -> Box<dyn Layer<Registry> + Send + Sync> {
    match format {
        LogFormat::Pretty => Box::new(
            tracing_subscriber::fmt::layer()
                .pretty()
                .with_writer(std::io::stderr)
                .with_target(true),
        ),
        LogFormat::Json => Box::new(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_current_span(true),
        ),
    }
}

fn file_layer(
    format: LogFormat,
    dir: &Path,
) -> Result<(Box<dyn Layer<Registry> + Send + Sync>, WorkerGuard)> {
    fs::create_dir_all(dir)?;
    let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let layer: Box<dyn Layer<Registry> + Send + Sync> = match format {
        LogFormat::Pretty => Box::new(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true),
        ),
        LogFormat::Json => Box::new(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(writer)
                .with_target(true)
                .with_current_span(true),
        ),
    };
    Ok((layer, guard))
}
