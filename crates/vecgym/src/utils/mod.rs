//! Utility functions.

mod running_stats;

pub use running_stats::RunningMeanStd;

/// Abbreviate large numbers for display
pub fn abbreviate(num: u64) -> String {
    match num {
        0..=999 => num.to_string(),
        1_000..=999_999 => format!("{:.1}K", num as f64 / 1e3),
        1_000_000..=999_999_999 => format!("{:.1}M", num as f64 / 1e6),
        _ => format!("{:.1}B", num as f64 / 1e9),
    }
}

/// Format duration in human-readable form
pub fn format_duration(seconds: f64) -> String {
    let secs = seconds.max(0.0) as u64;
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    match (h, m) {
        (0, 0) => format!("{}s", s),
        (0, _) => format!("{}m {}s", m, s),
        _ => format!("{}h {}m {}s", h, m, s),
    }
}
