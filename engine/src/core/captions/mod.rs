//! Caption System Module
//!
//! Provides caption/subtitle functionality for EchoReel including:
//! - Caption data models (CaptionItem, CaptionTrack, CaptionStyle)
//! - The caption track set the editor works on
//! - SRT and WebVTT parsing, conversion and export
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Caption System                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  models.rs     - Data structures (Item, Track, Style)           │
//! │  tracks.rs     - Track set, selection, ingestion                │
//! │  formats.rs    - SRT/VTT parsing, conversion and export         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use crate::core::captions::{CaptionTrackSet, export_srt};
//!
//! let mut set = CaptionTrackSet::new(120.0);
//! let track = set.add_track("English Subtitles", "en");
//! set.add_caption(&track, 4.0)?;
//!
//! let srt = export_srt(&set.visible_cues());
//! ```

mod formats;
mod models;
mod tracks;

// Re-export models
pub use models::{
    CaptionItem, CaptionPatch, CaptionPosition, CaptionStyle, CaptionStylePatch, CaptionTrack,
    FontWeight, TextAlign, PLACEHOLDER_TEXT, TRANSPARENT,
};

// Re-export track set
pub use tracks::{CaptionTrackSet, DEFAULT_CAPTION_LENGTH, GENERATED_TRACK_NAME};

// Re-export format functions
pub use formats::{
    convert, export_cues, export_srt, export_vtt, parse_subtitle_blocks, srt_to_vtt, vtt_to_srt,
    SubtitleCue, SubtitleDialect, VTT_HEADER,
};
