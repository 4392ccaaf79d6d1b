//! Edit Decision List Module
//!
//! Timed cut/zoom/highlight decisions over a recording, plus the drag-resize
//! gesture used by the timeline.

mod drag;
mod models;

pub use drag::{ResizeDrag, ResizeEdge};
pub use models::{
    EditAction, EditDecision, EditDecisionList, EditDecisionPatch, EditLimits, IngestReport,
    RawEditDecision,
};
