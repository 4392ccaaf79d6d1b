//! Drag-to-resize interaction
//!
//! A resize gesture is modelled as an explicit value: `begin_resize` captures
//! the decision's current range, pointer moves produce previews without
//! touching the list, and the gesture ends with either `commit` or `cancel`.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::{CoreError, CoreResult, DecisionId, TimeRange, TimeSec};

use super::models::{resize_range, EditDecisionList, EditLimits};

/// Which edge of a segment is being dragged
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeEdge {
    Start,
    End,
}

/// An in-progress resize gesture
#[derive(Clone, Debug, PartialEq)]
pub struct ResizeDrag {
    decision_id: DecisionId,
    edge: ResizeEdge,
    original: TimeRange,
    preview: TimeRange,
    limits: EditLimits,
    video_duration: TimeSec,
}

impl EditDecisionList {
    /// Starts resizing one edge of a decision
    pub fn begin_resize(&self, id: &str, edge: ResizeEdge) -> CoreResult<ResizeDrag> {
        let decision = self
            .get(id)
            .ok_or_else(|| CoreError::DecisionNotFound(id.to_string()))?;

        debug!("Begin {:?} resize of edit decision {}", edge, id);
        Ok(ResizeDrag {
            decision_id: decision.id.clone(),
            edge,
            original: decision.range(),
            preview: decision.range(),
            limits: self.limits,
            video_duration: self.video_duration,
        })
    }
}

impl ResizeDrag {
    pub fn decision_id(&self) -> &str {
        &self.decision_id
    }

    pub fn edge(&self) -> ResizeEdge {
        self.edge
    }

    /// The range that would be committed now
    pub fn preview(&self) -> TimeRange {
        self.preview
    }

    /// Moves the dragged edge to `time` and returns the resulting preview.
    ///
    /// The other edge stays where it was when the drag began. A position that
    /// would break the minimum duration leaves the dragged edge unchanged.
    pub fn propose(&mut self, time: TimeSec) -> TimeRange {
        let (start, end) = match self.edge {
            ResizeEdge::Start => (Some(time), None),
            ResizeEdge::End => (None, Some(time)),
        };
        self.preview = resize_range(self.original, start, end, &self.limits, self.video_duration);
        self.preview
    }

    /// Applies the preview to the list.
    ///
    /// Returns false if nothing changed or the decision no longer exists.
    pub fn commit(self, list: &mut EditDecisionList) -> bool {
        let (start, end) = match self.edge {
            ResizeEdge::Start => (Some(self.preview.start_sec), None),
            ResizeEdge::End => (None, Some(self.preview.end_sec)),
        };
        list.resize(&self.decision_id, start, end)
    }

    /// Abandons the gesture; returns the untouched original range
    pub fn cancel(self) -> TimeRange {
        debug!("Cancelled resize of edit decision {}", self.decision_id);
        self.original
    }
}
