//! Render Pipeline Module
//!
//! Handles final export of an edited recording.
//!
//! # Modules
//!
//! - `keep`: Keep-segment resolution from cut intervals
//! - `export`: Export plan builder and export engine

mod export;
mod keep;

pub use export::*;
pub use keep::{merge_ranges, resolve_keep_segments, total_duration};
