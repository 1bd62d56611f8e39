//! Logging Module
//!
//! Unified logging built on `tracing`:
//! - compact human-readable output on stderr
//! - a daily rolling log file in the log directory (system temp dir by default)
//! - old log files pruned so only the newest `max_files` remain
//!
//! # Examples
//!
//! ```no_run
//! use shared_utils::logging::{LogConfig, init_logging};
//! use tracing::{info, error};
//!
//! let config = LogConfig::default();
//! init_logging("heic2jpg", config).expect("Failed to initialize logging");
//!
//! info!("Program started");
//! error!(error = "something went wrong", "Operation failed");
//! ```

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Crates whose events are always routed through the program filter.
const LIBRARY_TARGETS: &[&str] = &["heic_jpg", "shared_utils"];

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Directory for the rolling log file (defaults to the system temp dir).
    pub log_dir: PathBuf,
    /// Number of log files kept after pruning.
    pub max_files: usize,
    /// Level used when `RUST_LOG` is not set.
    pub level: Level,
    /// Write a log file in addition to stderr.
    pub file_output: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_dir: std::env::temp_dir(),
            max_files: 5,
            level: Level::INFO,
            file_output: true,
        }
    }
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.log_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn with_max_files(mut self, count: usize) -> Self {
        self.max_files = count;
        self
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_file_output(mut self, enabled: bool) -> Self {
        self.file_output = enabled;
        self
    }
}

/// Filter directive used when `RUST_LOG` is absent, e.g.
/// `heic2jpg=info,heic_jpg=info,shared_utils=info`.
pub fn default_filter_directive(program_name: &str, level: Level) -> String {
    let level = level.to_string().to_lowercase();
    std::iter::once(program_name)
        .chain(LIBRARY_TARGETS.iter().copied())
        .map(|target| format!("{}={}", target, level))
        .collect::<Vec<_>>()
        .join(",")
}

fn stderr_layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(false)
        .with_line_number(false)
        .compact()
}

/// Initialize the global subscriber.
///
/// Log file name: `{program_name}.log.<date>` (rotated daily by
/// `tracing-appender`). Calling this twice returns an error instead of
/// panicking.
pub fn init_logging(program_name: &str, config: LogConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter_directive(program_name, config.level)));

    let log_file_name = format!("{}.log", program_name);

    if config.file_output {
        std::fs::create_dir_all(&config.log_dir)
            .with_context(|| format!("Failed to create log directory: {:?}", config.log_dir))?;

        let file_appender =
            RollingFileAppender::new(Rotation::DAILY, &config.log_dir, &log_file_name);

        let file_layer = fmt::layer()
            .with_writer(file_appender)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .with(stderr_layer())
            .try_init()
            .context("Logging already initialized")?;

        cleanup_old_logs(&config.log_dir, program_name, config.max_files)?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer())
            .try_init()
            .context("Logging already initialized")?;
    }

    tracing::debug!(
        program = program_name,
        log_dir = ?config.log_dir,
        log_file = log_file_name,
        file_output = config.file_output,
        level = ?config.level,
        "Logging system initialized"
    );

    Ok(())
}

/// Remove old log files of `program_name`, keeping the newest `max_files`.
fn cleanup_old_logs(log_dir: &Path, program_name: &str, max_files: usize) -> Result<()> {
    use std::fs;

    let entries = fs::read_dir(log_dir)
        .with_context(|| format!("Failed to read log directory: {:?}", log_dir))?;

    let prefix = format!("{}.log", program_name);
    let mut log_files: Vec<(PathBuf, std::time::SystemTime)> = Vec::new();

    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let matches = path
            .file_name()
            .map(|n| n.to_string_lossy().starts_with(&prefix))
            .unwrap_or(false);
        if !matches {
            continue;
        }

        if let Ok(modified) = fs::metadata(&path).and_then(|m| m.modified()) {
            log_files.push((path, modified));
        }
    }

    if log_files.len() <= max_files {
        return Ok(());
    }

    // newest first
    log_files.sort_by(|a, b| b.1.cmp(&a.1));

    for (path, _) in log_files.iter().skip(max_files) {
        match fs::remove_file(path) {
            Ok(()) => tracing::debug!(path = ?path, "Removed old log file"),
            Err(e) => tracing::warn!(path = ?path, error = %e, "Failed to remove old log file"),
        }
    }

    Ok(())
}

/// Log the end of a long-running operation.
pub fn log_operation_end(operation: &str, duration: std::time::Duration, success: bool) {
    if success {
        tracing::info!(
            operation = operation,
            duration_secs = duration.as_secs_f64(),
            "Operation completed successfully"
        );
    } else {
        tracing::error!(
            operation = operation,
            duration_secs = duration.as_secs_f64(),
            "Operation failed"
        );
    }
}
