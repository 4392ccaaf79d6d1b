//! EchoReel Core Library
//!
//! Editing engine for AI-assisted screen recordings: the edit decision
//! list, caption tracks, SRT/WebVTT conversion, keep-segment resolution and
//! FFmpeg export planning. Front ends (the CLI, a UI shell) drive it through
//! [`core::session::EditingSession`].

pub mod core;

pub use crate::core::{CoreError, CoreResult};

/// Engine version reported by front ends
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
