//! Reusable formatting utilities for CLI output

use chrono::{DateTime, Utc};

/// Format a byte count with a binary unit.
///
/// # Example output
/// `512 B`, `12.0 KiB`, `3.4 MiB`
pub fn format_bytes(bytes: usize) -> String {
    const UNITS: [&str; 3] = ["KiB", "MiB", "GiB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = UNITS[0];
    for next in &UNITS[1..] {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = next;
    }
    format!("{:.1} {}", value, unit)
}

/// Format a unix timestamp (seconds) relative to now.
///
/// Returns "N/A" for a missing or invalid timestamp.
pub fn format_age(timestamp: Option<i64>) -> String {
    match timestamp.and_then(|ts| DateTime::from_timestamp(ts, 0)) {
        Some(at) => format_since(at, Utc::now()),
        None => "N/A".to_string(),
    }
}

/// Human-readable time elapsed between `at` and `now`
pub fn format_since(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = now.signed_duration_since(at).num_seconds().max(0);
    match secs {
        0..=59 => "just now".to_string(),
        60..=3599 => format!("{}m ago", secs / 60),
        3600..=86_399 => format!("{}h ago", secs / 3600),
        _ => format!("{}d ago", secs / 86_400),
    }
}

/// Text progress bar, `width` cells wide
pub fn format_bar(percent: u32, width: usize) -> String {
    let filled = (percent.min(100) as usize * width + 50) / 100;
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}
