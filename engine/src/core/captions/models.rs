//! Caption Data Models
//!
//! Defines data structures for captions and caption tracks.
//!
//! # Overview
//!
//! - Caption styling is carried through untouched; the engine only clamps
//!   values that fall outside the ranges the editor offers.
//! - Captions inside a track are kept in ascending start order after every
//!   mutation.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::{new_id, CaptionId, CaptionTrackId, TimeSec};

use super::SubtitleCue;

/// Placeholder text for captions created by hand in the editor
pub const PLACEHOLDER_TEXT: &str = "New caption text";

/// Background value meaning "no box behind the text"
pub const TRANSPARENT: &str = "transparent";

// =============================================================================
// Caption Styling
// =============================================================================

/// Horizontal alignment of caption text
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    Left,
    #[default]
    Center,
    Right,
}

/// Font weight
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FontWeight {
    #[default]
    Normal,
    Bold,
}

/// Caption anchor as a percentage of the video frame (0-100 on both axes)
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CaptionPosition {
    pub x: f64,
    pub y: f64,
}

impl Default for CaptionPosition {
    fn default() -> Self {
        // Bottom center
        Self { x: 50.0, y: 85.0 }
    }
}

/// Caption text style
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionStyle {
    /// Font size in pixels
    pub font_size: f64,
    /// CSS color of the text
    pub color: String,
    /// CSS color of the text box, or `transparent`
    pub background_color: String,
    /// Anchor position (percent of frame)
    pub position: CaptionPosition,
    /// Box width as a percentage of the frame (20-100)
    pub width: f64,
    pub text_align: TextAlign,
    pub font_weight: FontWeight,
}

impl Default for CaptionStyle {
    fn default() -> Self {
        Self {
            font_size: 16.0,
            color: "#FFFFFF".to_string(),
            background_color: TRANSPARENT.to_string(),
            position: CaptionPosition::default(),
            width: 80.0,
            text_align: TextAlign::Center,
            font_weight: FontWeight::Normal,
        }
    }
}

impl CaptionStyle {
    pub const MIN_WIDTH: f64 = 20.0;
    pub const MAX_WIDTH: f64 = 100.0;
    pub const DEFAULT_FONT_SIZE: f64 = 16.0;

    /// Returns true if no box is drawn behind the text
    pub fn has_transparent_background(&self) -> bool {
        let bg = self.background_color.trim();
        bg.eq_ignore_ascii_case(TRANSPARENT) || bg.eq_ignore_ascii_case("#00000000")
    }

    /// Returns a copy with out-of-range values clamped into range
    pub fn normalized(&self) -> Self {
        let mut style = self.clone();
        if !(style.font_size.is_finite() && style.font_size > 0.0) {
            style.font_size = Self::DEFAULT_FONT_SIZE;
        }
        style.position.x = clamp_percent(style.position.x, 0.0, 100.0, 50.0);
        style.position.y = clamp_percent(style.position.y, 0.0, 100.0, 85.0);
        style.width = clamp_percent(style.width, Self::MIN_WIDTH, Self::MAX_WIDTH, 80.0);
        if style.color.trim().is_empty() {
            style.color = "#FFFFFF".to_string();
        }
        if style.background_color.trim().is_empty() {
            style.background_color = TRANSPARENT.to_string();
        }
        style
    }

    /// Shallow-merges a patch into this style
    pub fn apply(&mut self, patch: CaptionStylePatch) {
        if let Some(font_size) = patch.font_size {
            self.font_size = font_size;
        }
        if let Some(color) = patch.color {
            self.color = color;
        }
        if let Some(background_color) = patch.background_color {
            self.background_color = background_color;
        }
        if let Some(position) = patch.position {
            self.position = position;
        }
        if let Some(width) = patch.width {
            self.width = width;
        }
        if let Some(text_align) = patch.text_align {
            self.text_align = text_align;
        }
        if let Some(font_weight) = patch.font_weight {
            self.font_weight = font_weight;
        }
        *self = self.normalized();
    }
}

fn clamp_percent(value: f64, min: f64, max: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback
    }
}

/// Partial style update
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionStylePatch {
    pub font_size: Option<f64>,
    pub color: Option<String>,
    pub background_color: Option<String>,
    pub position: Option<CaptionPosition>,
    pub width: Option<f64>,
    pub text_align: Option<TextAlign>,
    pub font_weight: Option<FontWeight>,
}

// =============================================================================
// Caption Entry
// =============================================================================

/// A single caption with timing, text and style
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionItem {
    pub id: CaptionId,
    /// Start time in seconds
    pub start_time: TimeSec,
    /// End time in seconds
    pub end_time: TimeSec,
    pub text: String,
    #[serde(default)]
    pub style: CaptionStyle,
}

impl CaptionItem {
    /// Creates a new caption with the given id, timing and text
    pub fn new(id: &str, start_time: TimeSec, end_time: TimeSec, text: &str) -> Self {
        Self {
            id: id.to_string(),
            start_time,
            end_time,
            text: text.to_string(),
            style: CaptionStyle::default(),
        }
    }

    /// Creates a caption with auto-generated ID
    pub fn create(start_time: TimeSec, end_time: TimeSec, text: &str) -> Self {
        Self::new(&new_id(), start_time, end_time, text)
    }

    /// Sets the style for this caption
    pub fn with_style(mut self, style: CaptionStyle) -> Self {
        self.style = style;
        self
    }

    pub fn duration(&self) -> TimeSec {
        self.end_time - self.start_time
    }

    /// Returns true if the caption is on screen at `time` (both ends inclusive)
    pub fn is_active_at(&self, time: TimeSec) -> bool {
        time >= self.start_time && time <= self.end_time
    }

    pub fn overlaps(&self, other: &CaptionItem) -> bool {
        self.start_time < other.end_time && self.end_time > other.start_time
    }

    pub fn to_cue(&self) -> SubtitleCue {
        SubtitleCue::new(self.start_time, self.end_time, &self.text)
    }
}

/// Partial caption update (timing and text)
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionPatch {
    pub start_time: Option<TimeSec>,
    pub end_time: Option<TimeSec>,
    pub text: Option<String>,
}

// =============================================================================
// Caption Track
// =============================================================================

/// A named, language-tagged, independently toggleable list of captions
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionTrack {
    pub id: CaptionTrackId,
    /// Display name
    pub name: String,
    /// Language tag (e.g., "en", "ko")
    pub language: String,
    pub is_visible: bool,
    pub captions: Vec<CaptionItem>,
}

impl CaptionTrack {
    /// Creates a new, visible, empty caption track
    pub fn new(id: &str, name: &str, language: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            language: language.to_string(),
            is_visible: true,
            captions: vec![],
        }
    }

    /// Creates a track with auto-generated ID
    pub fn create(name: &str, language: &str) -> Self {
        Self::new(&new_id(), name, language)
    }

    /// Inserts a caption keeping ascending start order.
    ///
    /// Captions with equal start times keep their insertion order.
    pub fn add_caption(&mut self, caption: CaptionItem) {
        let idx = self
            .captions
            .partition_point(|c| c.start_time <= caption.start_time);
        self.captions.insert(idx, caption);
    }

    /// Removes a caption by ID
    pub fn remove_caption(&mut self, caption_id: &str) -> Option<CaptionItem> {
        let pos = self.captions.iter().position(|c| c.id == caption_id)?;
        Some(self.captions.remove(pos))
    }

    pub fn get_caption(&self, caption_id: &str) -> Option<&CaptionItem> {
        self.captions.iter().find(|c| c.id == caption_id)
    }

    /// Merges timing/text changes into a caption.
    ///
    /// Timing that would end up empty, reversed or outside `[0, limit]` is
    /// clamped, or dropped when clamping cannot fix it; the text is applied
    /// either way. Returns false if the caption does not exist.
    pub fn update_caption(&mut self, caption_id: &str, patch: CaptionPatch, limit: TimeSec) -> bool {
        let Some(caption) = self.captions.iter_mut().find(|c| c.id == caption_id) else {
            return false;
        };

        if let Some(text) = patch.text {
            caption.text = text;
        }

        if patch.start_time.is_some() || patch.end_time.is_some() {
            let start = patch.start_time.unwrap_or(caption.start_time);
            let end = patch.end_time.unwrap_or(caption.end_time);
            if start.is_finite() && end.is_finite() {
                let start = start.clamp(0.0, limit);
                let end = end.clamp(0.0, limit);
                if start < end {
                    caption.start_time = start;
                    caption.end_time = end;
                } else {
                    warn!(
                        "Rejected caption timing {}~{} for {}: end must follow start",
                        start, end, caption_id
                    );
                }
            } else {
                warn!("Rejected non-finite caption timing for {}", caption_id);
            }
            self.sort_captions();
        }

        true
    }

    /// Shallow-merges style changes into a caption
    pub fn update_caption_style(&mut self, caption_id: &str, patch: CaptionStylePatch) -> bool {
        match self.captions.iter_mut().find(|c| c.id == caption_id) {
            Some(caption) => {
                caption.style.apply(patch);
                true
            }
            None => false,
        }
    }

    /// Flips visibility without touching the captions
    pub fn toggle_visibility(&mut self) -> bool {
        self.is_visible = !self.is_visible;
        self.is_visible
    }

    /// Stable sort by start time
    pub fn sort_captions(&mut self) {
        self.captions.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
    }

    /// Returns captions on screen at the given time (inclusive)
    pub fn captions_at(&self, time: TimeSec) -> Vec<&CaptionItem> {
        self.captions.iter().filter(|c| c.is_active_at(time)).collect()
    }

    pub fn to_cues(&self) -> Vec<SubtitleCue> {
        self.captions.iter().map(CaptionItem::to_cue).collect()
    }

    /// Returns the full text of all captions
    pub fn full_text(&self) -> String {
        self.captions
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn len(&self) -> usize {
        self.captions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.captions.is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================
