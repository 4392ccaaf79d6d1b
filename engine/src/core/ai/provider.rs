//! AI Collaborator Module
//!
//! Defines the trait the editing session uses to reach the generative flows.

use std::path::PathBuf;

use async_trait::async_trait;

use super::{
    write_placeholder_tone, EdlSuggestion, GeneratedCaptions, VoiceoverAudio,
    VoiceoverAudioRequest, VoiceoverScript, VoiceoverScriptRequest,
};
use crate::core::edl::RawEditDecision;
use crate::core::{new_id, CoreError, CoreResult, MediaHandle};

// =============================================================================
// AI Collaborator Trait
// =============================================================================

/// Generative service behind the editor's AI tools.
///
/// Every payload returned here is treated as untrusted by the caller.
#[async_trait]
pub trait AiCollaborator: Send + Sync {
    /// Returns the collaborator name
    fn name(&self) -> &str;

    /// Suggests cut, zoom and highlight decisions for a recording
    async fn suggest_edits(&self, recording: &MediaHandle) -> CoreResult<EdlSuggestion>;

    /// Writes a narration script from a description of the recording
    async fn write_voiceover_script(
        &self,
        request: &VoiceoverScriptRequest,
    ) -> CoreResult<VoiceoverScript>;

    /// Turns a script into speech audio
    async fn synthesize_voiceover(
        &self,
        request: &VoiceoverAudioRequest,
    ) -> CoreResult<VoiceoverAudio>;

    /// Transcribes the recording's audio into a subtitle document
    async fn generate_captions(&self, recording: &MediaHandle) -> CoreResult<GeneratedCaptions>;

    /// Checks if the collaborator is available
    fn is_available(&self) -> bool;
}

// =============================================================================
// Mock Collaborator
// =============================================================================

const MOCK_SCRIPT: &str = "Welcome to this walkthrough. First we open the dashboard, \
then we fill in the form and save our changes.";

const MOCK_CAPTIONS: &str = "1\n00:00:00,000 --> 00:00:03,000\nWelcome to this walkthrough.\n\n\
2\n00:00:03,500 --> 00:00:07,000\nFirst we open the dashboard.\n";

/// Offline collaborator returning canned results.
///
/// Speech is a placeholder tone written under `audio_dir`.
pub struct MockAiCollaborator {
    name: String,
    available: bool,
    edl: Vec<RawEditDecision>,
    script: String,
    captions: String,
    audio_dir: PathBuf,
}

impl MockAiCollaborator {
    /// Creates a new mock collaborator
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            available: true,
            edl: vec![
                RawEditDecision {
                    details: Some("Remove dead space".to_string()),
                    ..RawEditDecision::new(10.0, 15.0, "cut")
                },
                RawEditDecision {
                    details: Some("Zoom in on the button click".to_string()),
                    ..RawEditDecision::new(20.0, 25.0, "zoom")
                },
            ],
            script: MOCK_SCRIPT.to_string(),
            captions: MOCK_CAPTIONS.to_string(),
            audio_dir: std::env::temp_dir(),
        }
    }

    /// Sets the suggested decisions
    pub fn with_edl(mut self, edl: Vec<RawEditDecision>) -> Self {
        self.edl = edl;
        self
    }

    /// Sets the generated script
    pub fn with_script(mut self, script: &str) -> Self {
        self.script = script.to_string();
        self
    }

    /// Sets the generated subtitle document
    pub fn with_captions(mut self, captions: &str) -> Self {
        self.captions = captions.to_string();
        self
    }

    /// Sets where placeholder audio is written
    pub fn with_audio_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.audio_dir = dir.into();
        self
    }

    /// Sets availability
    pub fn with_available(mut self, available: bool) -> Self {
        self.available = available;
        self
    }

    fn check_available(&self) -> CoreResult<()> {
        if self.available {
            Ok(())
        } else {
            Err(CoreError::AIRequestFailed(format!(
                "{} is not available",
                self.name
            )))
        }
    }
}

#[async_trait]
impl AiCollaborator for MockAiCollaborator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn suggest_edits(&self, _recording: &MediaHandle) -> CoreResult<EdlSuggestion> {
        self.check_available()?;
        Ok(EdlSuggestion {
            edl: self.edl.clone(),
        })
    }

    async fn write_voiceover_script(
        &self,
        _request: &VoiceoverScriptRequest,
    ) -> CoreResult<VoiceoverScript> {
        self.check_available()?;
        Ok(VoiceoverScript {
            voiceover_script: self.script.clone(),
        })
    }

    async fn synthesize_voiceover(
        &self,
        request: &VoiceoverAudioRequest,
    ) -> CoreResult<VoiceoverAudio> {
        self.check_available()?;
        request.validate()?;

        let path = self.audio_dir.join(format!("voiceover-{}.wav", new_id()));
        let text = request.text.clone();
        let speed = request.speed;
        let target = path.clone();
        let duration = tokio::task::spawn_blocking(move || {
            write_placeholder_tone(&target, &text, speed)
        })
        .await
        .map_err(|e| CoreError::AIRequestFailed(format!("Synthesis task failed: {}", e)))??;

        Ok(VoiceoverAudio {
            audio: MediaHandle::new(path.to_string_lossy(), duration),
            duration_sec: Some(duration),
        })
    }

    async fn generate_captions(&self, _recording: &MediaHandle) -> CoreResult<GeneratedCaptions> {
        self.check_available()?;
        Ok(GeneratedCaptions {
            captions: self.captions.clone(),
        })
    }

    fn is_available(&self) -> bool {
        self.available
    }
}

// =============================================================================
// Tests
// =============================================================================
