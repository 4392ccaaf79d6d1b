//! Caption Track Set
//!
//! All caption tracks of a session, the selected track, and the operations the
//! editor performs on them.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::{sanitize_duration, CaptionId, CaptionTrackId, CoreError, CoreResult, TimeSec};

use super::{
    parse_subtitle_blocks, CaptionItem, CaptionPatch, CaptionStyle, CaptionStylePatch,
    CaptionTrack, SubtitleCue, PLACEHOLDER_TEXT,
};

/// Length of a caption created by hand
pub const DEFAULT_CAPTION_LENGTH: TimeSec = 3.0;

/// Name of the track created when captions arrive without one
pub const GENERATED_TRACK_NAME: &str = "Generated Captions";

/// Ordered caption tracks with a selection
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionTrackSet {
    pub video_duration: TimeSec,
    pub tracks: Vec<CaptionTrack>,
    pub selected: Option<CaptionTrackId>,
    /// Style given to captions created by hand
    #[serde(default)]
    pub default_style: CaptionStyle,
}

impl CaptionTrackSet {
    pub fn new(video_duration: TimeSec) -> Self {
        Self {
            video_duration: sanitize_duration(video_duration),
            ..Default::default()
        }
    }

    pub fn with_default_style(mut self, style: CaptionStyle) -> Self {
        self.default_style = style.normalized();
        self
    }

    // -------------------------------------------------------------------------
    // Tracks
    // -------------------------------------------------------------------------

    /// Creates a visible, empty track and selects it
    pub fn add_track(&mut self, name: &str, language: &str) -> CaptionTrackId {
        let track = CaptionTrack::create(name, language);
        let id = track.id.clone();
        info!("Created caption track {} ({}, {})", id, name, language);
        self.tracks.push(track);
        self.selected = Some(id.clone());
        id
    }

    /// Deletes a track and all its captions.
    ///
    /// When the selected track is deleted the selection falls back to the
    /// first remaining track, or to none.
    pub fn delete_track(&mut self, track_id: &str) -> Option<CaptionTrack> {
        let pos = self.tracks.iter().position(|t| t.id == track_id)?;
        let removed = self.tracks.remove(pos);

        if self.selected.as_deref() == Some(track_id) {
            self.selected = self.tracks.first().map(|t| t.id.clone());
        }

        Some(removed)
    }

    pub fn get_track(&self, track_id: &str) -> Option<&CaptionTrack> {
        self.tracks.iter().find(|t| t.id == track_id)
    }

    fn track_mut(&mut self, track_id: &str) -> CoreResult<&mut CaptionTrack> {
        self.tracks
            .iter_mut()
            .find(|t| t.id == track_id)
            .ok_or_else(|| CoreError::TrackNotFound(track_id.to_string()))
    }

    pub fn selected_track(&self) -> Option<&CaptionTrack> {
        self.selected.as_deref().and_then(|id| self.get_track(id))
    }

    pub fn select(&mut self, track_id: &str) -> bool {
        if self.get_track(track_id).is_some() {
            self.selected = Some(track_id.to_string());
            true
        } else {
            false
        }
    }

    /// Flips a track's visibility; returns the new state
    pub fn toggle_visibility(&mut self, track_id: &str) -> CoreResult<bool> {
        Ok(self.track_mut(track_id)?.toggle_visibility())
    }

    // -------------------------------------------------------------------------
    // Captions
    // -------------------------------------------------------------------------

    /// Adds a placeholder caption at `at` spanning up to three seconds.
    ///
    /// Returns `Ok(None)` when no room is left before the end of the video.
    pub fn add_caption(&mut self, track_id: &str, at: TimeSec) -> CoreResult<Option<CaptionId>> {
        let duration = self.video_duration;
        let style = self.default_style.clone();
        let track = self.track_mut(track_id)?;

        let start = if at.is_finite() { at.clamp(0.0, duration) } else { 0.0 };
        let end = (start + DEFAULT_CAPTION_LENGTH).min(duration);
        if end <= start {
            debug!("No room for a caption at {} (duration {})", start, duration);
            return Ok(None);
        }

        let caption = CaptionItem::create(start, end, PLACEHOLDER_TEXT).with_style(style);
        let id = caption.id.clone();
        track.add_caption(caption);
        Ok(Some(id))
    }

    pub fn update_caption(
        &mut self,
        track_id: &str,
        caption_id: &str,
        patch: CaptionPatch,
    ) -> CoreResult<bool> {
        let duration = self.video_duration;
        Ok(self.track_mut(track_id)?.update_caption(caption_id, patch, duration))
    }

    pub fn update_caption_style(
        &mut self,
        track_id: &str,
        caption_id: &str,
        patch: CaptionStylePatch,
    ) -> CoreResult<bool> {
        Ok(self
            .track_mut(track_id)?
            .update_caption_style(caption_id, patch))
    }

    pub fn delete_caption(
        &mut self,
        track_id: &str,
        caption_id: &str,
    ) -> CoreResult<Option<CaptionItem>> {
        Ok(self.track_mut(track_id)?.remove_caption(caption_id))
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Captions on screen at `time` across visible tracks.
    ///
    /// Ordered by track, then by position within the track.
    pub fn active_captions_at(&self, time: TimeSec) -> Vec<&CaptionItem> {
        self.tracks
            .iter()
            .filter(|t| t.is_visible)
            .flat_map(|t| t.captions_at(time))
            .collect()
    }

    /// All visible captions as cues, merged by start time
    pub fn visible_cues(&self) -> Vec<SubtitleCue> {
        let mut cues: Vec<SubtitleCue> = self
            .tracks
            .iter()
            .filter(|t| t.is_visible)
            .flat_map(|t| t.to_cues())
            .collect();
        cues.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
        cues
    }

    // -------------------------------------------------------------------------
    // Ingestion
    // -------------------------------------------------------------------------

    /// Parses subtitle text into a new track and selects it.
    ///
    /// Cues with empty text are dropped and timing is clamped to the video.
    /// Returns the new track's id.
    pub fn ingest_subtitles(&mut self, text: &str, name: &str, language: &str) -> CaptionTrackId {
        let duration = self.video_duration;
        let cues = parse_subtitle_blocks(text);
        let parsed = cues.len();

        let mut track = CaptionTrack::create(name, language);
        for cue in cues {
            if cue.text.trim().is_empty() {
                continue;
            }
            let start = cue.start_time.min(duration);
            let end = cue.end_time.min(duration);
            if end <= start {
                continue;
            }
            track.add_caption(
                CaptionItem::create(start, end, &cue.text).with_style(self.default_style.clone()),
            );
        }

        info!(
            "Ingested {} of {} subtitle cues into track '{}'",
            track.len(),
            parsed,
            name
        );

        let id = track.id.clone();
        self.tracks.push(track);
        self.selected = Some(id.clone());
        id
    }

    /// Ingests generator output into a new "Generated Captions" track
    pub fn ingest_generated(&mut self, text: &str, language: &str) -> CaptionTrackId {
        self.ingest_subtitles(text, GENERATED_TRACK_NAME, language)
    }
}

// =============================================================================
// Tests
// =============================================================================
