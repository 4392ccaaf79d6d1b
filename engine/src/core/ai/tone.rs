//! Placeholder speech synthesis
//!
//! Writes a quiet sine tone as a stand-in for synthesized speech, sized to
//! the time the text would take to read aloud. Used by the mock collaborator
//! and the CLI when no speech service is configured.

use std::f64::consts::PI;
use std::path::Path;

use tracing::debug;

use super::estimate_speech_duration;
use crate::core::{CoreError, CoreResult, TimeSec};

pub const TONE_SAMPLE_RATE: u32 = 44_100;

/// Peak amplitude relative to full scale
const TONE_AMPLITUDE: f64 = 0.1;

/// Longest placeholder written, in seconds
pub const MAX_TONE_SECONDS: TimeSec = 600.0;

/// Tone pitch derived from the text so different scripts sound different
pub fn tone_frequency(text: &str) -> f64 {
    440.0 + (text.chars().count() % 200) as f64
}

/// Writes a mono 16-bit WAV tone for `text` at `speed` and returns its length
pub fn write_placeholder_tone(path: &Path, text: &str, speed: f64) -> CoreResult<TimeSec> {
    let duration = estimate_speech_duration(text, speed).min(MAX_TONE_SECONDS);
    let frequency = tone_frequency(text);
    let total_samples = (duration * TONE_SAMPLE_RATE as f64).round() as u64;

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: TONE_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec).map_err(wav_error)?;
    for n in 0..total_samples {
        let t = n as f64 / TONE_SAMPLE_RATE as f64;
        let sample = (2.0 * PI * frequency * t).sin() * TONE_AMPLITUDE * i16::MAX as f64;
        writer.write_sample(sample as i16).map_err(wav_error)?;
    }
    writer.finalize().map_err(wav_error)?;

    debug!(
        "Wrote {:.2}s placeholder tone at {} Hz to {}",
        duration,
        frequency,
        path.display()
    );
    Ok(duration)
}

fn wav_error(e: hound::Error) -> CoreError {
    match e {
        hound::Error::IoError(io) => CoreError::IoError(io),
        other => CoreError::AIRequestFailed(format!("Failed to write audio: {}", other)),
    }
}
