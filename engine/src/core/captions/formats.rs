//! Subtitle Text Formats
//!
//! Parses and generates the two subtitle dialects exchanged with the caption
//! generator and the transcoder:
//! - SRT: numbered blocks, comma milliseconds
//! - WebVTT: `WEBVTT` header, unnumbered blocks, dot milliseconds
//!
//! # Example
//!
//! ```rust
//! use echoreel_lib::core::captions::{parse_subtitle_blocks, srt_to_vtt};
//!
//! let srt = "1\n00:00:01,000 --> 00:00:03,000\nHello\n";
//! let cues = parse_subtitle_blocks(srt);
//! assert_eq!(cues[0].text, "Hello");
//!
//! let vtt = srt_to_vtt(srt);
//! assert!(vtt.starts_with("WEBVTT\n\n00:00:01.000"));
//! ```
//!
//! Parsing is tolerant: blocks that are not well-formed cues are dropped, never
//! reported as errors, because caption text usually arrives from an untrusted
//! generator.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::timecode::{format_timestamp, parse_timestamp, MillisSeparator};
use crate::core::TimeSec;

/// Header line of the WebVTT dialect
pub const VTT_HEADER: &str = "WEBVTT";

/// Delimiter between the start and end timestamps of a cue
const INTERVAL_DELIMITER: &str = "-->";

// =============================================================================
// Types
// =============================================================================

/// A timed caption parsed from (or written to) subtitle text
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtitleCue {
    pub start_time: TimeSec,
    pub end_time: TimeSec,
    pub text: String,
}

impl SubtitleCue {
    pub fn new(start_time: TimeSec, end_time: TimeSec, text: &str) -> Self {
        Self {
            start_time,
            end_time,
            text: text.to_string(),
        }
    }
}

/// Subtitle text dialect
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleDialect {
    /// Comma milliseconds, numbered blocks, no header
    Srt,
    /// Dot milliseconds, `WEBVTT` header, no index lines
    WebVtt,
}

impl SubtitleDialect {
    /// Guesses the dialect of a subtitle text from its header
    pub fn detect(text: &str) -> Self {
        if text.trim_start_matches('\u{feff}').trim_start().starts_with(VTT_HEADER) {
            SubtitleDialect::WebVtt
        } else {
            SubtitleDialect::Srt
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            SubtitleDialect::Srt => "srt",
            SubtitleDialect::WebVtt => "vtt",
        }
    }

    pub fn separator(self) -> MillisSeparator {
        match self {
            SubtitleDialect::Srt => MillisSeparator::Comma,
            SubtitleDialect::WebVtt => MillisSeparator::Dot,
        }
    }
}

// =============================================================================
// Block Splitting
// =============================================================================

fn interval_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\d{2,}:\d{2}:\d{2}[,.]\d{3})\s*-->\s*(\d{2,}:\d{2}:\d{2}[,.]\d{3})")
            .expect("interval regex is valid")
    })
}

fn comma_millis_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{2}:\d{2}:\d{2}),(\d{3})").expect("comma regex is valid"))
}

fn dot_millis_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{2}:\d{2}:\d{2})\.(\d{3})").expect("dot regex is valid"))
}

/// Splits subtitle text into blocks of non-blank lines.
///
/// CRLF line endings and runs of several blank lines are tolerated.
fn split_blocks(text: &str) -> Vec<Vec<&str>> {
    let mut blocks = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }

    blocks
}

fn is_index_line(line: &str) -> bool {
    let line = line.trim();
    !line.is_empty() && line.chars().all(|c| c.is_ascii_digit())
}

fn is_vtt_metadata_block(block: &[&str]) -> bool {
    block.first().is_some_and(|first| {
        let first = first.trim_start_matches('\u{feff}').trim_start();
        first.starts_with(VTT_HEADER) || first.starts_with("NOTE") || first.starts_with("STYLE")
    }) && !block.iter().any(|l| l.contains(INTERVAL_DELIMITER))
}

// =============================================================================
// Parsing
// =============================================================================

/// Parses one block; `None` if it is not a usable cue
fn parse_block(block: &[&str]) -> Option<SubtitleCue> {
    let interval_idx = block.iter().position(|l| l.contains(INTERVAL_DELIMITER))?;
    let caps = interval_regex().captures(block[interval_idx])?;

    let start = parse_timestamp(&caps[1]).ok()?;
    let end = parse_timestamp(&caps[2]).ok()?;

    if start < 0.0 || end < 0.0 || start >= end {
        debug!("Dropping subtitle block with interval {}~{}", start, end);
        return None;
    }

    let text = block[interval_idx + 1..]
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    Some(SubtitleCue::new(start, end, &text))
}

/// Parses SRT or WebVTT text into ordered cues.
///
/// Lines before the interval line of a block (index numbers, cue identifiers)
/// are ignored; lines after it are joined with a single space. Blocks without
/// a valid interval, or whose interval is empty or reversed, are dropped.
pub fn parse_subtitle_blocks(text: &str) -> Vec<SubtitleCue> {
    split_blocks(text)
        .iter()
        .filter_map(|block| parse_block(block))
        .collect()
}

// =============================================================================
// Dialect Conversion
// =============================================================================

/// Switches the millisecond separator on the interval line of a block only,
/// so timestamp-like caption text is left as written
fn rewrite_interval_line(lines: &[&str], millis: &Regex, replacement: &str) -> Vec<String> {
    let interval_idx = lines.iter().position(|l| l.contains(INTERVAL_DELIMITER));
    lines
        .iter()
        .enumerate()
        .map(|(idx, line)| {
            if Some(idx) == interval_idx {
                millis.replace_all(line, replacement).into_owned()
            } else {
                line.to_string()
            }
        })
        .collect()
}

/// Converts SRT text to WebVTT.
///
/// Adds the `WEBVTT` header, switches timestamps to dot milliseconds and
/// strips the numeric index line of every block. Block order and text are
/// otherwise preserved.
pub fn srt_to_vtt(text: &str) -> String {
    if text.trim().is_empty() {
        return String::new();
    }

    let blocks: Vec<String> = split_blocks(text)
        .into_iter()
        .filter(|block| !is_vtt_metadata_block(block))
        .filter_map(|block| {
            let lines: &[&str] = if block.len() > 1 && is_index_line(block[0]) {
                &block[1..]
            } else {
                &block
            };
            if lines.is_empty() {
                None
            } else {
                Some(rewrite_interval_line(lines, comma_millis_regex(), "$1.$2").join("\n"))
            }
        })
        .collect();

    format!("{}\n\n{}", VTT_HEADER, blocks.join("\n\n"))
}

/// Converts WebVTT text to SRT.
///
/// Drops the header and NOTE/STYLE blocks, replaces cue identifiers with
/// 1-based indices and switches timestamps to comma milliseconds.
pub fn vtt_to_srt(text: &str) -> String {
    let mut output = Vec::new();
    for block in split_blocks(text) {
        let Some(interval_idx) = block.iter().position(|l| l.contains(INTERVAL_DELIMITER)) else {
            continue;
        };
        let mut lines = vec![(output.len() + 1).to_string()];
        lines.extend(rewrite_interval_line(
            &block[interval_idx..],
            dot_millis_regex(),
            "$1,$2",
        ));
        output.push(lines.join("\n"));
    }

    output.join("\n\n")
}

/// Converts subtitle text to the requested dialect
pub fn convert(text: &str, target: SubtitleDialect) -> String {
    match (SubtitleDialect::detect(text), target) {
        (SubtitleDialect::Srt, SubtitleDialect::WebVtt) => srt_to_vtt(text),
        (SubtitleDialect::WebVtt, SubtitleDialect::Srt) => vtt_to_srt(text),
        _ => text.to_string(),
    }
}

// =============================================================================
// Generation
// =============================================================================

/// Collapses caption text so it cannot break the block structure
fn cue_text(text: &str) -> String {
    text.lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn interval_line(cue: &SubtitleCue, separator: MillisSeparator) -> String {
    format!(
        "{} --> {}",
        format_timestamp(cue.start_time, separator),
        format_timestamp(cue.end_time, separator)
    )
}

/// Exports cues to SRT
pub fn export_srt(cues: &[SubtitleCue]) -> String {
    cues.iter()
        .enumerate()
        .map(|(index, cue)| {
            format!(
                "{}\n{}\n{}",
                index + 1,
                interval_line(cue, MillisSeparator::Comma),
                cue_text(&cue.text)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Exports cues to WebVTT
pub fn export_vtt(cues: &[SubtitleCue]) -> String {
    let body = cues
        .iter()
        .map(|cue| format!("{}\n{}", interval_line(cue, MillisSeparator::Dot), cue_text(&cue.text)))
        .collect::<Vec<_>>()
        .join("\n\n");
    format!("{}\n\n{}", VTT_HEADER, body)
}

/// Exports cues in the requested dialect
pub fn export_cues(cues: &[SubtitleCue], dialect: SubtitleDialect) -> String {
    match dialect {
        SubtitleDialect::Srt => export_srt(cues),
        SubtitleDialect::WebVtt => export_vtt(cues),
    }
}

// =============================================================================
// Tests
// =============================================================================
