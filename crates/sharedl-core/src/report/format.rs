//! Human-readable sizes, durations and progress lines.

use std::time::Duration;

use crate::transfer::ProgressSnapshot;

const SIZE_UNITS: [&str; 7] = ["B", "KB", "MB", "GB", "TB", "PB", "EB"];

/// `1536` → `1.5KB`. Base 1024, one decimal, no trailing `.0`, sign kept.
pub fn format_size(bytes: i64) -> String {
    let magnitude = bytes.unsigned_abs();
    let mut unit = 0usize;
    let mut scaled = magnitude;
    while scaled >= 1024 && unit < SIZE_UNITS.len() - 1 {
        scaled /= 1024;
        unit += 1;
    }

    let value = magnitude as f64 / 1024f64.powi(unit as i32);
    let mut number = format!("{:.1}", value);
    if number.ends_with(".0") {
        number.truncate(number.len() - 2);
    }
    let sign = if bytes < 0 { "-" } else { "" };
    format!("{}{}{}", sign, number, SIZE_UNITS[unit])
}

fn format_size_u64(bytes: u64) -> String {
    format_size(i64::try_from(bytes).unwrap_or(i64::MAX))
}

fn plural(n: u64, unit: &str) -> String {
    if n == 1 {
        format!("{} {}", n, unit)
    } else {
        format!("{} {}s", n, unit)
    }
}

/// `125s` → `2 minutes 5 seconds`. Hours are not folded into days.
pub fn format_duration(d: Duration) -> String {
    let total = d.as_secs();
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);

    let parts: Vec<String> = [(hours, "hour"), (minutes, "minute"), (seconds, "second")]
        .into_iter()
        .filter(|(n, _)| *n > 0)
        .map(|(n, unit)| plural(n, unit))
        .collect();

    if parts.is_empty() {
        "0 seconds".to_string()
    } else {
        parts.join(" ")
    }
}

/// Status detail for an in-flight transfer.
pub fn progress_detail(s: &ProgressSnapshot) -> String {
    let received = format_size_u64(s.bytes_received);
    let rate = format_size_u64(s.bytes_per_sec);

    let Some(total) = s.total_bytes else {
        return format!("{} ({}/s)", received, rate);
    };

    let pct = if total == 0 {
        100.0
    } else {
        s.bytes_received as f64 * 100.0 / total as f64
    };
    let eta = if s.bytes_per_sec == 0 {
        "unknown".to_string()
    } else {
        let remaining = total.saturating_sub(s.bytes_received);
        format_duration(Duration::from_secs(remaining / s.bytes_per_sec))
    };
    format!(
        "{:.2}% ({} / {}) {}/s {} remaining",
        pct,
        received,
        format_size_u64(total),
        rate,
        eta
    )
}
