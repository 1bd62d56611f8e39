//! Report Module
//!
//! Summary reporting for batch operations

use crate::batch::BatchResult;
use crate::progress::{format_bytes, format_duration};
use std::time::Duration;

/// Rendered summary lines, kept separate from printing so it can be tested.
pub fn summary_lines(
    result: &BatchResult,
    duration: Duration,
    input_bytes: u64,
    output_bytes: u64,
    operation_name: &str,
) -> Vec<String> {
    let mut lines = Vec::new();
    let rule = "━".repeat(60);

    lines.push(rule.clone());
    lines.push(format!("📊 {} Summary", operation_name));
    lines.push(rule.clone());
    lines.push(format!("  📁 Files Processed:  {:>10}", result.total));
    lines.push(format!("  ✅ Succeeded:        {:>10}", result.succeeded));
    lines.push(format!("  ❌ Failed:           {:>10}", result.failed));
    lines.push(format!("  ⏭️  Skipped:          {:>10}", result.skipped));
    lines.push(format!("  📈 Success Rate:     {:>9.1}%", result.success_rate()));
    lines.push(format!("  💾 Input Size:       {:>10}", format_bytes(input_bytes)));
    lines.push(format!("  💾 Output Size:      {:>10}", format_bytes(output_bytes)));
    lines.push(format!("  ⏱️  Total Time:       {:>10}", format_duration(duration)));
    if result.total > 0 {
        let avg_time = duration.as_secs_f64() / result.total as f64;
        lines.push(format!("  ⏱️  Avg Time/File:    {:>9.2}s", avg_time));
    }
    lines.push(rule);

    if !result.errors.is_empty() {
        lines.push(String::new());
        lines.push("❌ Errors encountered:".to_string());
        for (path, error) in &result.errors {
            lines.push(format!("   {} → {}", path.display(), error));
        }
    }

    lines
}

pub fn print_summary_report(
    result: &BatchResult,
    duration: Duration,
    input_bytes: u64,
    output_bytes: u64,
    operation_name: &str,
) {
    println!();
    for line in summary_lines(result, duration, input_bytes, output_bytes, operation_name) {
        println!("{}", line);
    }
}
