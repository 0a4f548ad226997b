use chrono::{DateTime, Local, TimeZone};

use crate::models::domain::Timestamp;

const SIZE_SUFFIXES: [&str; 7] = ["", "K", "M", "G", "T", "P", "E"];

/// Decimal-scaled byte total, e.g. `1.50 KB`.
///
/// The suffix index is floor(log1000(n)), found by repeated division so exact
/// powers of 1000 never land one suffix short. Zero formats as `0.00 B`.
pub fn pretty_byte_total(byte_count: u64) -> String {
    let mut scale = 0;
    let mut threshold: u64 = 1000;
    while scale + 1 < SIZE_SUFFIXES.len() && byte_count >= threshold {
        scale += 1;
        match threshold.checked_mul(1000) {
            Some(next) => threshold = next,
            None => break,
        }
    }
    let scaled = byte_count as f64 / 1000f64.powi(scale as i32);
    format!("{:.2} {}B", scaled, SIZE_SUFFIXES[scale])
}

/// Integer with thousands separators, e.g. `1,234,567`.
pub fn comma_number_string(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn format_datetime<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format(DATE_FORMAT).to_string()
}

/// Local wall-clock rendering of a capture timestamp.
pub fn format_timestamp(ts: Timestamp) -> String {
    match Local.timestamp_opt(ts.secs, ts.micros * 1000).earliest() {
        Some(at) => format_datetime(&at),
        None => format!("@{}", ts.secs),
    }
}

/// Integer share of `count` in `total`, truncated; `None` when `total` is zero.
pub fn percentage(count: u64, total: u64) -> Option<u8> {
    if total == 0 {
        return None;
    }
    let pct = (count as f64 / total as f64) * 100.0;
    Some(pct.clamp(0.0, 100.0) as u8)
}
