//! EchoReel Error Definitions
//!
//! Defines error types used by the editing models and the session.

use thiserror::Error;

use super::{CaptionId, CaptionTrackId, DecisionId, TimeSec};

/// Core engine error types
#[derive(Error, Debug)]
pub enum CoreError {
    // =========================================================================
    // Validation Errors
    // =========================================================================
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Invalid time range: {0}~{1} seconds")]
    InvalidTimeRange(TimeSec, TimeSec),

    #[error("Unknown edit action: {0}")]
    UnknownAction(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    // =========================================================================
    // Lookup Errors
    // =========================================================================
    #[error("Edit decision not found: {0}")]
    DecisionNotFound(DecisionId),

    #[error("Caption not found: {0}")]
    CaptionNotFound(CaptionId),

    #[error("Caption track not found: {0}")]
    TrackNotFound(CaptionTrackId),

    #[error("No recording loaded")]
    NoRecording,

    // =========================================================================
    // Collaborator Errors
    // =========================================================================
    #[error("AI request failed: {0}")]
    AIRequestFailed(String),

    // =========================================================================
    // General Errors
    // =========================================================================
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Core engine result type
pub type CoreResult<T> = Result<T, CoreError>;
