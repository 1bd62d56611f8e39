//! Progress Bar Module
//!
//! One bar style for every tool: ████████▓▓░░░░░░
//! plus byte/duration formatting shared by reports.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

pub mod style {
    /// (filled, current, empty)
    pub const PROGRESS_CHARS: &str = "█▓░";

    pub const SPINNER_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

    pub const BATCH_TEMPLATE: &str = "{spinner:.green} {prefix:.cyan.bold} ▕{bar:35.green/black}▏ {percent:>3}% • {pos}/{len} • ⏱️ {elapsed_precise} • {msg}";

    pub const SPINNER_TEMPLATE: &str = "{spinner:.green} {msg}";
}

pub fn create_progress_bar(total: u64, prefix: &str, hidden: bool) -> ProgressBar {
    let pb = ProgressBar::new(total);

    if hidden {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    } else {
        pb.set_style(
            ProgressStyle::default_bar()
                .template(style::BATCH_TEMPLATE)
                .expect("Invalid progress bar template")
                .progress_chars(style::PROGRESS_CHARS)
                .tick_chars(style::SPINNER_CHARS),
        );
        pb.set_prefix(prefix.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
    }
    pb
}

pub fn create_spinner(message: &str, hidden: bool) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();

    if hidden {
        spinner.set_draw_target(ProgressDrawTarget::hidden());
    } else {
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template(style::SPINNER_TEMPLATE)
                .expect("Invalid spinner template")
                .tick_chars(style::SPINNER_CHARS),
        );
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(80));
    }
    spinner
}

/// Bar for a batch whose counters are owned elsewhere.
///
/// The caller pushes absolute counts (`update`), so replaying the same
/// state twice never double-counts.
pub struct BatchProgressBar {
    bar: ProgressBar,
    start_time: Instant,
    succeeded: u64,
    failed: u64,
}

impl BatchProgressBar {
    pub fn new(total: u64, prefix: &str, hidden: bool) -> Self {
        Self {
            bar: create_progress_bar(total, prefix, hidden),
            start_time: Instant::now(),
            succeeded: 0,
            failed: 0,
        }
    }

    pub fn update(&mut self, total: u64, succeeded: u64, failed: u64, current: Option<&str>) {
        self.succeeded = succeeded;
        self.failed = failed;
        self.bar.set_length(total);
        self.bar.set_position(succeeded + failed);

        let status = format!("✅ {} ❌ {}", succeeded, failed);
        match current {
            Some(name) => self
                .bar
                .set_message(format!("{} • {}", status, truncate_filename(name, 32))),
            None => self.bar.set_message(status),
        }
    }

    pub fn succeeded(&self) -> u64 {
        self.succeeded
    }

    pub fn failed(&self) -> u64 {
        self.failed
    }

    pub fn finish(&self) {
        self.bar.finish_with_message(format!(
            "Complete: {} succeeded, {} failed in {}",
            self.succeeded,
            self.failed,
            format_duration(self.start_time.elapsed())
        ));
    }

    pub fn bar(&self) -> &ProgressBar {
        &self.bar
    }
}

fn truncate_filename(filename: &str, max_len: usize) -> String {
    if filename.chars().count() <= max_len {
        return filename.to_string();
    }
    let half = (max_len - 3) / 2;
    let head: String = filename.chars().take(half).collect();
    let tail: String = filename
        .chars()
        .rev()
        .take(half)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("{}...{}", head, tail)
}

pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 3600 {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    } else if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs > 0 {
        format!("{}s", secs)
    } else {
        format!("{}ms", duration.as_millis())
    }
}
