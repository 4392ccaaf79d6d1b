//! Subtitle Timestamp Codec
//!
//! Converts between seconds and `HH:MM:SS,mmm` / `HH:MM:SS.mmm` timestamps.
//!
//! Precision is one millisecond. Formatting truncates sub-millisecond
//! fractions (it never rounds up), with a tiny tolerance so that values such
//! as `1.001` whose binary form is `1.000999…` keep their last millisecond.

use std::sync::OnceLock;

use regex::Regex;

use super::{CoreError, CoreResult, TimeSec};

/// Returned by the formatters for NaN, infinite or negative input.
///
/// This matches what the timeline display shows for an unknown time; it is
/// not a parseable subtitle timestamp.
pub const FALLBACK_TIMESTAMP: &str = "00:00:00";

/// Tolerance (in milliseconds) applied before truncation
const TRUNCATION_EPSILON_MS: f64 = 1e-6;

/// Separator between seconds and milliseconds
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MillisSeparator {
    /// `00:00:01,000` (SRT)
    Comma,
    /// `00:00:01.000` (WebVTT)
    Dot,
}

impl MillisSeparator {
    pub fn as_char(self) -> char {
        match self {
            MillisSeparator::Comma => ',',
            MillisSeparator::Dot => '.',
        }
    }
}

fn timestamp_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d{2,}):(\d{2}):(\d{2})[,.](\d{3})$").expect("timestamp regex is valid")
    })
}

/// Parses a subtitle timestamp (e.g. `"00:01:23,456"`) into seconds
pub fn parse_timestamp(ts: &str) -> CoreResult<TimeSec> {
    let trimmed = ts.trim();
    let caps = timestamp_regex()
        .captures(trimmed)
        .ok_or_else(|| CoreError::InvalidTimestamp(ts.to_string()))?;

    let component = |idx: usize| -> CoreResult<u64> {
        caps[idx]
            .parse::<u64>()
            .map_err(|_| CoreError::InvalidTimestamp(ts.to_string()))
    };

    let hours = component(1)?;
    let minutes = component(2)?;
    let seconds = component(3)?;
    let millis = component(4)?;

    let total_ms = hours
        .checked_mul(3_600_000)
        .and_then(|ms| ms.checked_add(minutes * 60_000 + seconds * 1_000 + millis))
        .ok_or_else(|| CoreError::InvalidTimestamp(ts.to_string()))?;
    Ok(total_ms as f64 / 1000.0)
}

/// Converts seconds to whole milliseconds, truncating.
///
/// Returns `None` for NaN, infinite or negative input.
pub fn to_millis(seconds: TimeSec) -> Option<u64> {
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    Some((seconds * 1000.0 + TRUNCATION_EPSILON_MS).floor() as u64)
}

/// Formats seconds as a subtitle timestamp
pub fn format_timestamp(seconds: TimeSec, separator: MillisSeparator) -> String {
    let Some(total_ms) = to_millis(seconds) else {
        return FALLBACK_TIMESTAMP.to_string();
    };

    let ms = total_ms % 1000;
    let total_secs = total_ms / 1000;
    let secs = total_secs % 60;
    let total_mins = total_secs / 60;
    let mins = total_mins % 60;
    let hours = total_mins / 60;

    format!(
        "{:02}:{:02}:{:02}{}{:03}",
        hours,
        mins,
        secs,
        separator.as_char(),
        ms
    )
}

/// Formats seconds as a wall-clock `HH:MM:SS` for display
pub fn format_clock(seconds: TimeSec) -> String {
    let Some(total_ms) = to_millis(seconds) else {
        return FALLBACK_TIMESTAMP.to_string();
    };

    let total_secs = total_ms / 1000;
    format!(
        "{:02}:{:02}:{:02}",
        total_secs / 3600,
        (total_secs % 3600) / 60,
        total_secs % 60
    )
}
