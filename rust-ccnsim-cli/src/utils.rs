//! Utility functions for the ccnsim CLI

use log::info;
use std::time::{Duration, Instant};

/// Format a duration as a human-readable string
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();

    if total_secs < 60 {
        format!("{}.{:03}s", total_secs, duration.subsec_millis())
    } else if total_secs < 3600 {
        format!("{}m {}s", total_secs / 60, total_secs % 60)
    } else {
        let hours = total_secs / 3600;
        let mins = (total_secs % 3600) / 60;
        format!("{}h {}m {}s", hours, mins, total_secs % 60)
    }
}

/// Format a byte count as a human-readable string. Content store capacity can
/// be negative right after a shrink, so this takes a signed value.
pub fn format_bytes(bytes: i64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    let magnitude = bytes.unsigned_abs() as f64;
    let sign = if bytes < 0 { "-" } else { "" };
    if magnitude < KB {
        format!("{} B", bytes)
    } else if magnitude < MB {
        format!("{}{:.2} KB", sign, magnitude / KB)
    } else if magnitude < GB {
        format!("{}{:.2} MB", sign, magnitude / MB)
    } else {
        format!("{}{:.2} GB", sign, magnitude / GB)
    }
}

/// Format a ratio as a percentage
pub fn format_percent(part: u64, whole: u64) -> String {
    if whole == 0 {
        return "n/a".to_string();
    }
    format!("{:.2}%", part as f64 * 100.0 / whole as f64)
}

/// Wall-clock timer that logs on drop
pub struct Timer {
    start: Instant,
    operation: String,
}

impl Timer {
    /// Create a new timer for the specified operation
    pub fn new(operation: &str) -> Self {
        info!("Starting operation: {}", operation);
        Self {
            start: Instant::now(),
            operation: operation.to_string(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Get the elapsed time as a formatted string
    pub fn elapsed_str(&self) -> String {
        format_duration(self.elapsed())
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        info!(
            "Operation '{}' completed in {}",
            self.operation,
            format_duration(self.elapsed())
        );
    }
}

/// Print a section header in the CLI output
pub fn print_header(title: &str) {
    let separator = "=".repeat(title.len());
    println!("\n{}", title);
    println!("{}", separator);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.500s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1h 2m 5s");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.00 KB");
        assert_eq!(format_bytes(-2048), "-2.00 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.00 MB");
    }

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(1, 4), "25.00%");
        assert_eq!(format_percent(1, 0), "n/a");
    }
}
