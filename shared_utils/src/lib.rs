//! Shared Utilities for the heic2jpg tools
//!
//! This crate provides common functionality used by the converter binaries:
//! - Logging setup (stderr + rolling log file)
//! - Error reporting and panic hook
//! - Progress bars and byte/duration formatting
//! - Input file collection
//! - Type-safe file sizes
//! - Summary reports

pub mod batch;
pub mod common_utils;
pub mod error_handler;
pub mod logging;
pub mod progress;
pub mod report;
pub mod types;

pub use batch::*;
pub use report::*;

pub use progress::{
    create_progress_bar, create_spinner, format_bytes, format_duration, BatchProgressBar,
};

pub use error_handler::{install_panic_handler, report_error, ErrorCategory};

pub use types::FileSize;
