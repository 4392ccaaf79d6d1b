//! EchoReel Core Type Definitions
//!
//! Defines fundamental types shared by the edit, caption and export modules.

use serde::{Deserialize, Serialize};
use tracing::warn;

// =============================================================================
// ID Types
// =============================================================================

/// Edit decision unique identifier (ULID)
pub type DecisionId = String;

/// Caption unique identifier (ULID)
pub type CaptionId = String;

/// Caption track unique identifier (ULID)
pub type CaptionTrackId = String;

/// Generates a fresh session-unique identifier.
pub fn new_id() -> String {
    ulid::Ulid::new().to_string()
}

// =============================================================================
// Time Types
// =============================================================================

/// Time in seconds (floating point)
pub type TimeSec = f64;

/// Sanitizes a duration reported by an external collaborator.
///
/// Non-finite and negative values become `0.0`.
pub fn sanitize_duration(duration: TimeSec) -> TimeSec {
    if duration.is_finite() && duration >= 0.0 {
        duration
    } else {
        warn!("Ignoring invalid media duration {}, using 0", duration);
        0.0
    }
}

/// Half-open time interval on the source video, in seconds.
///
/// Used for cut intervals and for the keep-segments handed to the exporter.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeRange {
    pub start_sec: TimeSec,
    pub end_sec: TimeSec,
}

impl TimeRange {
    pub fn new(start_sec: TimeSec, end_sec: TimeSec) -> Self {
        Self { start_sec, end_sec }
    }

    /// Returns the length of the range (never negative)
    pub fn duration(&self) -> TimeSec {
        (self.end_sec - self.start_sec).max(0.0)
    }

    /// Returns true if the range is well-formed and non-empty
    pub fn is_valid(&self) -> bool {
        self.start_sec.is_finite() && self.end_sec.is_finite() && self.start_sec < self.end_sec
    }

    /// Returns true if both ranges share some time
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start_sec < other.end_sec && self.end_sec > other.start_sec
    }

    /// Clamps the range into `[0, limit]`
    pub fn clamp_to(&self, limit: TimeSec) -> TimeRange {
        TimeRange {
            start_sec: self.start_sec.clamp(0.0, limit),
            end_sec: self.end_sec.clamp(0.0, limit),
        }
    }
}

// =============================================================================
// Media Handles
// =============================================================================

/// Caller-owned media resource (screen recording, voiceover audio).
///
/// The engine never reads the bytes behind a handle except when staging an
/// export; releasing it is the owner's job (see `session::MediaReleaser`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaHandle {
    /// Location of the media (file path or blob URL)
    pub uri: String,
    /// Duration in seconds, sanitized on construction
    pub duration_sec: TimeSec,
    /// Whether the media carries an audio stream
    #[serde(default = "default_true")]
    pub has_audio: bool,
}

fn default_true() -> bool {
    true
}

impl MediaHandle {
    pub fn new(uri: impl Into<String>, duration_sec: TimeSec) -> Self {
        Self {
            uri: uri.into(),
            duration_sec: sanitize_duration(duration_sec),
            has_audio: true,
        }
    }

    /// Marks the media as having no audio stream (e.g. microphone disabled)
    pub fn without_audio(mut self) -> Self {
        self.has_audio = false;
        self
    }

    /// File extension of the underlying media, lowercased
    pub fn extension(&self) -> Option<String> {
        let name = self.uri.rsplit(['/', '\\']).next()?;
        let (_, ext) = name.rsplit_once('.')?;
        if ext.is_empty() {
            None
        } else {
            Some(ext.to_ascii_lowercase())
        }
    }
}
