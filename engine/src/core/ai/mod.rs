//! AI Module
//!
//! Contract between the editor and the generative flows: edit suggestions,
//! voiceover script, voiceover audio and caption generation.

mod flows;
mod provider;
mod tone;

pub use flows::{
    estimate_speech_duration, EdlSuggestion, GeneratedCaptions, Voice, VoiceoverAudio,
    VoiceoverAudioRequest, VoiceoverScript, VoiceoverScriptRequest, MAX_SPEED, MIN_SPEED,
    WORDS_PER_MINUTE,
};
pub use provider::{AiCollaborator, MockAiCollaborator};
pub use tone::{tone_frequency, write_placeholder_tone, MAX_TONE_SECONDS, TONE_SAMPLE_RATE};
