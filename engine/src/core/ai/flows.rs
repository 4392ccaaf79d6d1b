//! AI Flow Payloads
//!
//! Request and response shapes of the four generative flows. Field names
//! follow the camelCase wire format the flows speak.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::edl::RawEditDecision;
use crate::core::{CoreError, CoreResult, MediaHandle, TimeSec};

/// Speaking rate used for duration estimates
pub const WORDS_PER_MINUTE: f64 = 160.0;

/// Speed bounds accepted by speech synthesis
pub const MIN_SPEED: f64 = 0.25;
pub const MAX_SPEED: f64 = 4.0;

// =============================================================================
// Edit Suggestions
// =============================================================================

/// Output of the edit suggestion flow.
///
/// Entries are untrusted; `EditDecisionList::replace_from_ai` filters them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdlSuggestion {
    #[serde(default)]
    pub edl: Vec<RawEditDecision>,
}

// =============================================================================
// Voiceover Script
// =============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceoverScriptRequest {
    /// Free-form description of what happens in the recording
    #[serde(alias = "contentDescription")]
    pub video_content_description: String,
}

impl VoiceoverScriptRequest {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            video_content_description: description.into(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceoverScript {
    #[serde(alias = "script")]
    pub voiceover_script: String,
}

// =============================================================================
// Voiceover Audio
// =============================================================================

/// Text-to-speech voice
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Voice {
    #[default]
    Alloy,
    Echo,
    Fable,
    Onyx,
    Nova,
    Shimmer,
}

impl Voice {
    pub const ALL: [Voice; 6] = [
        Voice::Alloy,
        Voice::Echo,
        Voice::Fable,
        Voice::Onyx,
        Voice::Nova,
        Voice::Shimmer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Voice::Alloy => "alloy",
            Voice::Echo => "echo",
            Voice::Fable => "fable",
            Voice::Onyx => "onyx",
            Voice::Nova => "nova",
            Voice::Shimmer => "shimmer",
        }
    }
}

impl fmt::Display for Voice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Voice {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Voice::ALL
            .into_iter()
            .find(|voice| voice.as_str() == wanted)
            .ok_or_else(|| CoreError::ValidationError(format!("Unknown voice: {}", s)))
    }
}

/// Input of the speech synthesis flow
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceoverAudioRequest {
    pub text: String,
    #[serde(default)]
    pub voice: Voice,
    #[serde(default = "default_speed")]
    pub speed: f64,
}

fn default_speed() -> f64 {
    1.0
}

impl VoiceoverAudioRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice: Voice::default(),
            speed: default_speed(),
        }
    }

    pub fn with_voice(mut self, voice: Voice) -> Self {
        self.voice = voice;
        self
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    /// Rejects empty text and speeds outside `0.25..=4.0`
    pub fn validate(&self) -> CoreResult<()> {
        if self.text.trim().is_empty() {
            return Err(CoreError::ValidationError(
                "Voiceover text must not be empty".to_string(),
            ));
        }
        if !self.speed.is_finite() || !(MIN_SPEED..=MAX_SPEED).contains(&self.speed) {
            return Err(CoreError::ValidationError(format!(
                "Voiceover speed must be between {} and {}, got {}",
                MIN_SPEED, MAX_SPEED, self.speed
            )));
        }
        Ok(())
    }
}

/// Output of the speech synthesis flow
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceoverAudio {
    #[serde(alias = "audioHandle")]
    pub audio: MediaHandle,
    /// Reported audio length; estimated from the text when absent
    #[serde(default, alias = "durationSeconds")]
    pub duration_sec: Option<TimeSec>,
}

// =============================================================================
// Captions
// =============================================================================

/// Output of the caption generation flow: an SRT or WebVTT document
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedCaptions {
    pub captions: String,
}

/// Estimated speaking time of `text` at `speed`.
///
/// 160 words per minute at normal speed, never below one second.
pub fn estimate_speech_duration(text: &str, speed: f64) -> TimeSec {
    let words = text.split_whitespace().count() as f64;
    let speed = if speed.is_finite() && speed > 0.0 {
        speed
    } else {
        1.0
    };
    (words / WORDS_PER_MINUTE * 60.0 / speed).max(1.0)
}
