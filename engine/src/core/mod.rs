//! EchoReel Core Engine
//!
//! Core editing engine module.
//! Handles edit decisions, caption timing, subtitle conversion, export
//! planning and the editing session that ties them to the AI and
//! transcoding collaborators.

pub mod ai;
pub mod captions;
pub mod edl;
pub mod ffmpeg;
pub mod render;
pub mod session;
pub mod settings;
pub mod timecode;

// Re-export common types
mod types;
pub use types::*;

mod error;
pub use error::*;
