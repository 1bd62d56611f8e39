//! Unified Error Handler Module
//!
//! ## Error categories
//! - Recoverable: worth another attempt, the caller may retry
//! - Fatal: stop processing the affected unit of work
//! - Optional: a nice-to-have step failed, log and continue
//!
//! ## Reporting
//! - `report_error()`: print the error chain to stderr and the log
//! - `install_panic_handler()`: log panics before the default hook runs

use std::fmt;
use std::panic;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Recoverable,
    Fatal,
    Optional,
}

impl ErrorCategory {
    pub fn should_retry(&self) -> bool {
        matches!(self, ErrorCategory::Recoverable)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Recoverable => write!(f, "RECOVERABLE"),
            ErrorCategory::Fatal => write!(f, "FATAL"),
            ErrorCategory::Optional => write!(f, "OPTIONAL"),
        }
    }
}

pub fn report_error<E: std::error::Error + ?Sized>(error: &E) {
    eprintln!("🔥 ERROR: {}", error);
    tracing::error!("Error occurred: {}", error);

    let mut source = error.source();
    let mut level = 1;
    while let Some(err) = source {
        eprintln!("   {}. Caused by: {}", level, err);
        tracing::error!("  Caused by (level {}): {}", level, err);
        source = err.source();
        level += 1;
    }
}

/// Same as [`report_error`] for `anyhow` chains.
pub fn report_anyhow(error: &anyhow::Error) {
    eprintln!("🔥 ERROR: {}", error);
    tracing::error!("Error occurred: {}", error);

    for (level, cause) in error.chain().skip(1).enumerate() {
        eprintln!("   {}. Caused by: {}", level + 1, cause);
        tracing::error!("  Caused by (level {}): {}", level + 1, cause);
    }
}

pub fn install_panic_handler() {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |panic_info| {
        let payload = panic_info.payload();
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic payload".to_string()
        };

        let location = panic_info
            .location()
            .map(|loc| format!("{}:{}:{}", loc.file(), loc.line(), loc.column()))
            .unwrap_or_else(|| "Unknown location".to_string());

        eprintln!("💥 PANIC occurred!");
        eprintln!("   Message: {}", message);
        eprintln!("   Location: {}", location);
        eprintln!("   This is a bug! Please report it.");

        tracing::error!("PANIC: {} at {}", message, location);

        default_hook(panic_info);
    }));
}
