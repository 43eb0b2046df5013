//! Telemetry initialisation primitives and logging configuration.
//!
//! # Design
//! - Single entry point installs the console layer (pretty or JSON) on stderr.
//! - An optional diagnostic log file receives plain-text `info` events and above.
//! - Records the build SHA once so every layer reports the same value.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Result, anyhow};
use once_cell::sync::OnceCell;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{
    EnvFilter, Layer, fmt, layer::SubscriberExt, registry::Registry, util::SubscriberInitExt,
};

/// Console level when `RUST_LOG` is not provided. Kept quiet so notices stay readable.
pub const DEFAULT_LOG_LEVEL: &str = "warn";

static BUILD_SHA: OnceCell<String> = OnceCell::new();

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Configure and install the global tracing subscriber.
///
/// Returns the path of the diagnostic log when one was opened. A diagnostic log
/// that cannot be opened is reported on stderr and skipped.
///
/// # Errors
///
/// Returns an error if the tracing subscriber cannot be installed (for example,
/// because another subscriber has already been set globally).
pub fn init_logging(config: &LoggingConfig<'_>) -> Result<Option<PathBuf>> {
    let _ = BUILD_SHA.set(config.build_sha.to_string());

    let mut layers: Vec<BoxedLayer> = vec![console_layer(config)];
    let mut active_log = None;
    if let Some(path) = config.log_file {
        match open_diagnostic_log(path) {
            Ok(file) => {
                layers.push(diagnostic_layer(file));
                active_log = Some(path.to_path_buf());
            }
            Err(err) => eprintln!(
                "diagnostic log {} unavailable, continuing without it: {err}",
                path.display()
            ),
        }
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .map_err(|err| anyhow!("failed to install tracing subscriber: {err}"))?;

    Ok(active_log)
}

/// Access the build SHA recorded during logging initialisation.
#[must_use]
pub fn build_sha() -> &'static str {
    BUILD_SHA.get().map_or("dev", String::as_str)
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig<'a> {
    /// Console log level string (e.g., `warn`, `debug`).
    pub level: &'a str,
    /// Output format selection for the console layer.
    pub format: LogFormat,
    /// Diagnostic log file appended to when set.
    pub log_file: Option<&'a Path>,
    /// Build identifier attached to the root span of each run.
    pub build_sha: &'a str,
}

impl Default for LoggingConfig<'_> {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL,
            format: LogFormat::infer(),
            log_file: None,
            build_sha: build_sha(),
        }
    }
}

/// Available output formats for the console logger.
#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    /// Emit logs as structured JSON objects.
    Json,
    /// Emit human-readable, pretty-printed logs.
    Pretty,
}

impl LogFormat {
    /// Choose a sensible default for the current build.
    #[must_use]
    pub const fn infer() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

fn console_layer(config: &LoggingConfig<'_>) -> BoxedLayer {
    let filter = build_env_filter(config.level);
    match config.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .with_filter(filter)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .with_filter(filter)
            .boxed(),
    }
}

fn diagnostic_layer(file: File) -> BoxedLayer {
    fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .with_filter(LevelFilter::INFO)
        .boxed()
}

fn open_diagnostic_log(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

fn build_env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}
