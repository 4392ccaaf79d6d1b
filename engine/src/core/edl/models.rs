//! Edit Decision Models
//!
//! Defines the edit decision list (EDL): timed, typed editing intents over
//! the source recording. Decisions are kept in ascending start order after
//! every mutation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::render::resolve_keep_segments;
use crate::core::{new_id, sanitize_duration, CoreError, DecisionId, TimeRange, TimeSec};

// =============================================================================
// Edit Action
// =============================================================================

/// Kind of editing intent carried by a decision
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditAction {
    /// Remove the interval from the output
    Cut,
    /// Zoom into the interval
    Zoom,
    /// Emphasize the interval
    Highlight,
}

impl EditAction {
    pub const ALL: [EditAction; 3] = [EditAction::Cut, EditAction::Zoom, EditAction::Highlight];

    /// Wire name
    pub fn as_str(self) -> &'static str {
        match self {
            EditAction::Cut => "cut",
            EditAction::Zoom => "zoom",
            EditAction::Highlight => "highlight",
        }
    }

    /// Display label
    pub fn label(self) -> &'static str {
        match self {
            EditAction::Cut => "Cut",
            EditAction::Zoom => "Zoom",
            EditAction::Highlight => "Highlight",
        }
    }

    /// Timeline color of segments with this action
    pub fn swatch(self) -> &'static str {
        match self {
            EditAction::Cut => "#EF4444",
            EditAction::Zoom => "#3B82F6",
            EditAction::Highlight => "#EAB308",
        }
    }

    /// Icon name shown on the segment
    pub fn icon(self) -> &'static str {
        match self {
            EditAction::Cut => "scissors",
            EditAction::Zoom => "zoom-in",
            EditAction::Highlight => "highlighter",
        }
    }

    /// Whether the exporter renders this action. Zoom and highlight are
    /// editor-only for now and reported as warnings on export.
    pub fn applied_on_export(self) -> bool {
        match self {
            EditAction::Cut => true,
            EditAction::Zoom | EditAction::Highlight => false,
        }
    }
}

impl fmt::Display for EditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EditAction {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        EditAction::ALL
            .into_iter()
            .find(|action| action.as_str() == normalized)
            .ok_or_else(|| CoreError::UnknownAction(s.to_string()))
    }
}

// =============================================================================
// Edit Decision
// =============================================================================

/// A single timed editing intent
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditDecision {
    pub id: DecisionId,
    /// Start time in seconds on the source recording
    pub start_time: TimeSec,
    /// End time in seconds on the source recording
    pub end_time: TimeSec,
    pub action: EditAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl EditDecision {
    pub fn new(id: &str, start_time: TimeSec, end_time: TimeSec, action: EditAction) -> Self {
        Self {
            id: id.to_string(),
            start_time,
            end_time,
            action,
            details: None,
        }
    }

    /// Creates a decision with auto-generated ID
    pub fn create(start_time: TimeSec, end_time: TimeSec, action: EditAction) -> Self {
        Self::new(&new_id(), start_time, end_time, action)
    }

    pub fn with_details(mut self, details: &str) -> Self {
        self.details = Some(details.to_string());
        self
    }

    pub fn range(&self) -> TimeRange {
        TimeRange::new(self.start_time, self.end_time)
    }

    pub fn duration(&self) -> TimeSec {
        self.end_time - self.start_time
    }
}

/// Partial decision update
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditDecisionPatch {
    pub start_time: Option<TimeSec>,
    pub end_time: Option<TimeSec>,
    pub action: Option<EditAction>,
    pub details: Option<String>,
}

/// Decision as produced by an untrusted source (AI suggestion payload).
///
/// Every field is optional or loosely typed; validation happens in
/// [`EditDecisionList::replace_from_ai`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEditDecision {
    #[serde(default)]
    pub start_time: Option<f64>,
    #[serde(default)]
    pub end_time: Option<f64>,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub details: Option<String>,
}

impl RawEditDecision {
    pub fn new(start_time: f64, end_time: f64, action: &str) -> Self {
        Self {
            start_time: Some(start_time),
            end_time: Some(end_time),
            action: action.to_string(),
            details: None,
        }
    }
}

/// Outcome of a bulk ingestion
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub accepted: usize,
    pub dropped: usize,
}

// =============================================================================
// Limits
// =============================================================================

/// Timing limits applied to decisions
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditLimits {
    /// Minimum decision length in seconds
    pub min_duration: TimeSec,
    /// Length of a decision created at the playhead
    pub default_length: TimeSec,
}

impl Default for EditLimits {
    fn default() -> Self {
        Self {
            min_duration: 0.1,
            default_length: 3.0,
        }
    }
}

/// Applies an edge proposal to a range.
///
/// Each proposed edge is clamped to `[0, video_duration]`. The start is
/// accepted only if it stays `min_duration` before the proposed end (or the
/// current end when no end is proposed); the end only if it stays
/// `min_duration` after the resulting start. A rejected edge leaves that
/// side unchanged.
pub(crate) fn resize_range(
    current: TimeRange,
    new_start: Option<TimeSec>,
    new_end: Option<TimeSec>,
    limits: &EditLimits,
    video_duration: TimeSec,
) -> TimeRange {
    let mut range = current;
    let new_start = new_start
        .filter(|s| s.is_finite())
        .map(|s| s.clamp(0.0, video_duration));
    let new_end = new_end
        .filter(|e| e.is_finite())
        .map(|e| e.clamp(0.0, video_duration));

    if let Some(start) = new_start {
        let target_end = new_end.unwrap_or(range.end_sec);
        if start < target_end - limits.min_duration {
            range.start_sec = start;
        }
    }

    if let Some(end) = new_end {
        if end > range.start_sec + limits.min_duration {
            range.end_sec = end;
        }
    }

    range
}

// =============================================================================
// Edit Decision List
// =============================================================================

/// Ordered decisions over one recording
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditDecisionList {
    pub video_duration: TimeSec,
    #[serde(default)]
    pub limits: EditLimits,
    #[serde(default)]
    decisions: Vec<EditDecision>,
}

impl EditDecisionList {
    pub fn new(video_duration: TimeSec) -> Self {
        Self {
            video_duration: sanitize_duration(video_duration),
            limits: EditLimits::default(),
            decisions: vec![],
        }
    }

    pub fn with_limits(mut self, limits: EditLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn decisions(&self) -> &[EditDecision] {
        &self.decisions
    }

    pub fn get(&self, id: &str) -> Option<&EditDecision> {
        self.decisions.iter().find(|d| d.id == id)
    }

    pub fn len(&self) -> usize {
        self.decisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }

    fn sort(&mut self) {
        self.decisions
            .sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
    }

    // -------------------------------------------------------------------------
    // Mutations
    // -------------------------------------------------------------------------

    /// Inserts a decision keeping ascending start order.
    ///
    /// Returns false (and leaves the list unchanged) for a decision whose id
    /// is already present, whose timing is empty or reversed, or which
    /// reaches outside `[0, video_duration]`.
    pub fn insert_sorted(&mut self, decision: EditDecision) -> bool {
        if self.decisions.iter().any(|d| d.id == decision.id) {
            debug!("Rejected duplicate edit decision {}", decision.id);
            return false;
        }
        if !decision.range().is_valid()
            || decision.start_time < 0.0
            || decision.end_time > self.video_duration
        {
            debug!(
                "Rejected edit decision {} with range {}~{}",
                decision.id, decision.start_time, decision.end_time
            );
            return false;
        }

        let idx = self
            .decisions
            .partition_point(|d| d.start_time <= decision.start_time);
        self.decisions.insert(idx, decision);
        true
    }

    /// Adds a decision of the default length at the playhead.
    ///
    /// The decision is clamped to the video and shifted back when the
    /// playhead is too close to the end. Returns `None` if the video is
    /// shorter than the minimum duration.
    pub fn add_at(&mut self, playhead: TimeSec, action: EditAction) -> Option<DecisionId> {
        let duration = self.video_duration;
        if duration < self.limits.min_duration {
            return None;
        }

        let playhead = if playhead.is_finite() {
            playhead.clamp(0.0, duration)
        } else {
            0.0
        };

        let mut start = playhead;
        let end = (playhead + self.limits.default_length).min(duration);
        if end - start < self.limits.min_duration {
            start = (end - self.limits.default_length).max(0.0);
        }

        let decision = EditDecision::create(start, end, action);
        let id = decision.id.clone();
        self.insert_sorted(decision).then_some(id)
    }

    /// Moves one or both edges of a decision.
    ///
    /// Edges that would violate the minimum duration are ignored. Returns
    /// true if the decision's timing changed.
    pub fn resize(&mut self, id: &str, new_start: Option<TimeSec>, new_end: Option<TimeSec>) -> bool {
        let limits = self.limits;
        let duration = self.video_duration;
        let Some(decision) = self.decisions.iter_mut().find(|d| d.id == id) else {
            return false;
        };

        let current = decision.range();
        let resized = resize_range(current, new_start, new_end, &limits, duration);
        if resized == current {
            return false;
        }

        decision.start_time = resized.start_sec;
        decision.end_time = resized.end_sec;
        self.sort();
        true
    }

    /// Removes a decision by ID
    pub fn delete(&mut self, id: &str) -> Option<EditDecision> {
        let pos = self.decisions.iter().position(|d| d.id == id)?;
        Some(self.decisions.remove(pos))
    }

    /// Merges a patch into a decision.
    ///
    /// Merged timing that is reversed, shorter than the minimum duration or
    /// non-finite is rejected; the other fields are applied regardless.
    pub fn update(&mut self, id: &str, patch: EditDecisionPatch) -> bool {
        let limits = self.limits;
        let duration = self.video_duration;
        let Some(decision) = self.decisions.iter_mut().find(|d| d.id == id) else {
            return false;
        };

        if let Some(action) = patch.action {
            decision.action = action;
        }
        if let Some(details) = patch.details {
            decision.details = Some(details);
        }

        if patch.start_time.is_some() || patch.end_time.is_some() {
            let start = patch.start_time.unwrap_or(decision.start_time);
            let end = patch.end_time.unwrap_or(decision.end_time);
            if start.is_finite() && end.is_finite() {
                let start = start.clamp(0.0, duration);
                let end = end.clamp(0.0, duration);
                if end - start >= limits.min_duration {
                    decision.start_time = start;
                    decision.end_time = end;
                } else {
                    warn!("Rejected timing {}~{} for edit decision {}", start, end, id);
                }
            } else {
                warn!("Rejected non-finite timing for edit decision {}", id);
            }
            self.sort();
        }

        true
    }

    /// Replaces the whole list with suggestions from an untrusted source.
    ///
    /// Entries with non-finite or reversed timing, an unknown action, or no
    /// overlap with the video are dropped with a warning. Accepted entries
    /// get fresh ids and are clamped to the video.
    pub fn replace_from_ai(&mut self, raw: Vec<RawEditDecision>) -> IngestReport {
        let duration = self.video_duration;
        let mut report = IngestReport::default();
        let mut accepted = Vec::with_capacity(raw.len());

        for (index, entry) in raw.into_iter().enumerate() {
            let (Some(start), Some(end)) = (entry.start_time, entry.end_time) else {
                warn!("Dropping suggested edit #{}: missing timing", index);
                report.dropped += 1;
                continue;
            };
            if !start.is_finite() || !end.is_finite() || end <= start {
                warn!("Dropping suggested edit #{}: invalid range {}~{}", index, start, end);
                report.dropped += 1;
                continue;
            }
            let action = match entry.action.parse::<EditAction>() {
                Ok(action) => action,
                Err(e) => {
                    warn!("Dropping suggested edit #{}: {}", index, e);
                    report.dropped += 1;
                    continue;
                }
            };

            let clamped = TimeRange::new(start, end).clamp_to(duration);
            if !clamped.is_valid() {
                warn!(
                    "Dropping suggested edit #{}: {}~{} is outside the video ({}s)",
                    index, start, end, duration
                );
                report.dropped += 1;
                continue;
            }

            let mut decision = EditDecision::create(clamped.start_sec, clamped.end_sec, action);
            decision.details = entry.details;
            accepted.push(decision);
            report.accepted += 1;
        }

        self.decisions = accepted;
        self.sort();

        info!(
            "Replaced edit decision list: {} accepted, {} dropped",
            report.accepted, report.dropped
        );
        report
    }

    /// Removes every decision
    pub fn clear(&mut self) {
        self.decisions.clear();
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Intervals of all cut decisions, in start order
    pub fn cuts(&self) -> Vec<TimeRange> {
        self.decisions
            .iter()
            .filter(|d| d.action == EditAction::Cut)
            .map(EditDecision::range)
            .collect()
    }

    /// Pairs of decisions whose intervals share some time
    pub fn overlaps(&self) -> Vec<(DecisionId, DecisionId)> {
        let mut pairs = Vec::new();
        for (i, a) in self.decisions.iter().enumerate() {
            for b in &self.decisions[i + 1..] {
                if b.start_time >= a.end_time {
                    break;
                }
                if a.range().overlaps(&b.range()) {
                    pairs.push((a.id.clone(), b.id.clone()));
                }
            }
        }
        pairs
    }

    /// Regions of the video covered by no decision
    pub fn gaps(&self) -> Vec<TimeRange> {
        let covered: Vec<TimeRange> = self.decisions.iter().map(EditDecision::range).collect();
        resolve_keep_segments(self.video_duration, &covered)
    }

    /// Actions present in the list that the exporter does not render, with
    /// the number of decisions carrying each
    pub fn unapplied_actions(&self) -> Vec<(EditAction, usize)> {
        EditAction::ALL
            .into_iter()
            .filter(|action| !action.applied_on_export())
            .map(|action| {
                let count = self.decisions.iter().filter(|d| d.action == action).count();
                (action, count)
            })
            .filter(|(_, count)| *count > 0)
            .collect()
    }
}

// =============================================================================
// Tests
// =============================================================================
