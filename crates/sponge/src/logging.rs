//! Logging setup for applications embedding the overflow buffer
//!
//! The engine only emits `tracing` events (batch flushes, drops, disk
//! failures, reclamation). This module installs a subscriber for them.

use sponge_core::{Error, Result};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_FILE: &str = "sponge.log";

/// Log output destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    /// Output to stdout
    Stdout,
    /// Output to a daily rolling file
    File(PathBuf),
    /// Output to both stdout and a daily rolling file
    Both(PathBuf),
}

/// Log format style
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line human-readable format
    Pretty,
    /// Compact single-line format
    Compact,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Filter directive, overridden by `RUST_LOG` when set
    pub level: String,
    /// Output destination
    pub output: LogOutput,
    /// Format style
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            output: LogOutput::Stdout,
            format: LogFormat::Compact,
        }
    }
}

impl LogConfig {
    /// Info level on stdout
    pub fn info() -> Self {
        Self::default()
    }

    /// Debug level on stdout; shows every flushed batch
    pub fn debug() -> Self {
        Self::default().with_level("debug")
    }

    /// Warn level on stdout; only drops and failures
    pub fn warn() -> Self {
        Self::default().with_level("warn")
    }

    /// Write to a daily rolling file
    pub fn with_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.output = LogOutput::File(path.into());
        self
    }

    /// Write to stdout and a daily rolling file
    pub fn with_both<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.output = LogOutput::Both(path.into());
        self
    }

    /// Set the format
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the filter directive
    pub fn with_level<S: Into<String>>(mut self, level: S) -> Self {
        self.level = level.into();
        self
    }

    /// Install the global subscriber.
    ///
    /// Returns the appender guard for file output; keep it alive for as
    /// long as events should reach the file. Fails if the level directive
    /// does not parse or a global subscriber is already installed.
    ///
    /// ```rust,no_run
    /// use sponge::logging::LogConfig;
    ///
    /// let _guard = LogConfig::debug().with_file("logs/sponge.log").init()?;
    /// # Ok::<(), sponge::Error>(())
    /// ```
    pub fn init(self) -> Result<Option<WorkerGuard>> {
        let env_filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.level))
            .map_err(|e| Error::Config(format!("invalid log level '{}': {}", self.level, e)))?;

        let registry = tracing_subscriber::registry().with(env_filter);

        match self.output {
            LogOutput::Stdout => {
                match self.format {
                    LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
                    LogFormat::Compact => registry.with(fmt::layer().compact()).try_init(),
                }
                .map_err(already_installed)?;
                Ok(None)
            }
            LogOutput::File(path) => {
                let (writer, guard) = tracing_appender::non_blocking(rolling_file(&path));
                match self.format {
                    LogFormat::Pretty => registry
                        .with(fmt::layer().with_writer(writer).with_ansi(false).pretty())
                        .try_init(),
                    LogFormat::Compact => registry
                        .with(fmt::layer().with_writer(writer).with_ansi(false).compact())
                        .try_init(),
                }
                .map_err(already_installed)?;
                Ok(Some(guard))
            }
            LogOutput::Both(path) => {
                let (writer, guard) = tracing_appender::non_blocking(rolling_file(&path));
                // one format for both sinks keeps the layer types unboxed
                registry
                    .with(fmt::layer().compact())
                    .with(fmt::layer().with_writer(writer).with_ansi(false).compact())
                    .try_init()
                    .map_err(already_installed)?;
                Ok(Some(guard))
            }
        }
    }
}

fn rolling_file(path: &Path) -> tracing_appender::rolling::RollingFileAppender {
    let (dir, file_name) = split_log_path(path);
    tracing_appender::rolling::daily(dir, file_name)
}

fn split_log_path(path: &Path) -> (&Path, &str) {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(DEFAULT_LOG_FILE);
    (dir, file_name)
}

fn already_installed(e: tracing_subscriber::util::TryInitError) -> Error {
    Error::Config(format!("failed to install log subscriber: {}", e))
}
