//! Keep-Segment Resolution
//!
//! Turns cut intervals into the complementary list of segments that survive
//! export.

use crate::core::{TimeRange, TimeSec};

/// Resolves the segments of `[0, video_duration]` not covered by any cut.
///
/// Cuts may be unsorted, overlapping or partly outside the video; they are
/// clamped to the video first and non-finite cuts are ignored. The result is
/// ascending, non-overlapping and never contains zero-length segments.
pub fn resolve_keep_segments(video_duration: TimeSec, cuts: &[TimeRange]) -> Vec<TimeRange> {
    if !(video_duration.is_finite() && video_duration > 0.0) {
        return vec![];
    }

    let mut sorted: Vec<TimeRange> = cuts
        .iter()
        .filter(|c| c.start_sec.is_finite() && c.end_sec.is_finite())
        .map(|c| c.clamp_to(video_duration))
        .filter(|c| c.start_sec < c.end_sec)
        .collect();
    sorted.sort_by(|a, b| a.start_sec.total_cmp(&b.start_sec));

    let mut segments = Vec::new();
    let mut last_end: TimeSec = 0.0;

    for cut in &sorted {
        if cut.start_sec > last_end {
            segments.push(TimeRange::new(last_end, cut.start_sec));
        }
        last_end = last_end.max(cut.end_sec);
    }

    if last_end < video_duration {
        segments.push(TimeRange::new(last_end, video_duration));
    }

    segments
}

/// Merges overlapping or touching ranges into a sorted, disjoint list
pub fn merge_ranges(ranges: &[TimeRange]) -> Vec<TimeRange> {
    let mut sorted: Vec<TimeRange> = ranges.iter().copied().filter(TimeRange::is_valid).collect();
    sorted.sort_by(|a, b| a.start_sec.total_cmp(&b.start_sec));

    let mut merged: Vec<TimeRange> = Vec::with_capacity(sorted.len());
    for range in sorted {
        match merged.last_mut() {
            Some(last) if range.start_sec <= last.end_sec => {
                last.end_sec = last.end_sec.max(range.end_sec);
            }
            _ => merged.push(range),
        }
    }
    merged
}

/// Total length of the given segments
pub fn total_duration(segments: &[TimeRange]) -> TimeSec {
    segments.iter().map(TimeRange::duration).sum()
}
