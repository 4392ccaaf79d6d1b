//! Editing Session Module
//!
//! Top-level state of one loaded recording: the edit decision list, the
//! caption tracks, the voiceover and the notices shown to the user.
//! Everything except the settings-derived defaults is discarded when a new
//! recording is loaded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::core::ai::{
    estimate_speech_duration, AiCollaborator, VoiceoverAudio, VoiceoverAudioRequest,
    VoiceoverScriptRequest,
};
use crate::core::captions::{export_srt, CaptionStyle, CaptionTrackSet};
use crate::core::edl::{EditDecisionList, EditLimits, IngestReport};
use crate::core::render::{ExportEngine, ExportError, ExportOutput, ExportRequest, ExportSettings};
use crate::core::settings::AppSettings;
use crate::core::{
    new_id, sanitize_duration, CaptionTrackId, CoreError, CoreResult, MediaHandle, TimeSec,
};

// =============================================================================
// Notices
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// User-visible message raised by a failed or partially applied operation
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub id: String,
    pub level: NoticeLevel,
    pub title: String,
    pub message: String,
    /// Whether repeating the operation may succeed
    pub retryable: bool,
    pub raised_at: DateTime<Utc>,
}

impl Notice {
    pub fn new(level: NoticeLevel, title: &str, message: &str) -> Self {
        Self {
            id: new_id(),
            level,
            title: title.to_string(),
            message: message.to_string(),
            retryable: false,
            raised_at: Utc::now(),
        }
    }

    pub fn info(title: &str, message: &str) -> Self {
        Self::new(NoticeLevel::Info, title, message)
    }

    pub fn warning(title: &str, message: &str) -> Self {
        Self::new(NoticeLevel::Warning, title, message)
    }

    pub fn error(title: &str, message: &str) -> Self {
        Self::new(NoticeLevel::Error, title, message)
    }

    pub fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }
}

// =============================================================================
// Media Release
// =============================================================================

/// Releases caller-owned media (revokes blob URLs, deletes temp files).
///
/// The session calls it exactly once per handle it drops.
pub trait MediaReleaser: Send + Sync {
    fn release(&self, handle: &MediaHandle);
}

/// Releaser for media the session does not own, such as files named on a
/// command line
pub struct NoopReleaser;

impl MediaReleaser for NoopReleaser {
    fn release(&self, _handle: &MediaHandle) {}
}

// =============================================================================
// Editing Session
// =============================================================================

pub struct EditingSession {
    recording: Option<MediaHandle>,
    edl: EditDecisionList,
    captions: CaptionTrackSet,
    voiceover_script: Option<String>,
    voiceover: Option<VoiceoverAudio>,
    notices: Vec<Notice>,
    limits: EditLimits,
    caption_style: CaptionStyle,
    caption_language: String,
    releaser: Box<dyn MediaReleaser>,
}

impl EditingSession {
    /// Creates an empty session with default limits and caption style
    pub fn new(releaser: Box<dyn MediaReleaser>) -> Self {
        Self::with_defaults(
            releaser,
            EditLimits::default(),
            CaptionStyle::default(),
            "en",
        )
    }

    /// Creates an empty session using the editing and caption settings
    pub fn from_settings(settings: &AppSettings, releaser: Box<dyn MediaReleaser>) -> Self {
        Self::with_defaults(
            releaser,
            settings.editing.limits(),
            settings.captions.default_style.clone(),
            &settings.captions.default_language,
        )
    }

    fn with_defaults(
        releaser: Box<dyn MediaReleaser>,
        limits: EditLimits,
        caption_style: CaptionStyle,
        caption_language: &str,
    ) -> Self {
        Self {
            recording: None,
            edl: EditDecisionList::new(0.0).with_limits(limits),
            captions: CaptionTrackSet::new(0.0).with_default_style(caption_style.clone()),
            voiceover_script: None,
            voiceover: None,
            notices: Vec::new(),
            limits,
            caption_style,
            caption_language: caption_language.to_string(),
            releaser,
        }
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn recording(&self) -> Option<&MediaHandle> {
        self.recording.as_ref()
    }

    /// Duration of the loaded recording (0 when none)
    pub fn duration(&self) -> TimeSec {
        self.recording.as_ref().map_or(0.0, |r| r.duration_sec)
    }

    pub fn edl(&self) -> &EditDecisionList {
        &self.edl
    }

    pub fn edl_mut(&mut self) -> &mut EditDecisionList {
        &mut self.edl
    }

    pub fn captions(&self) -> &CaptionTrackSet {
        &self.captions
    }

    pub fn captions_mut(&mut self) -> &mut CaptionTrackSet {
        &mut self.captions
    }

    pub fn voiceover_script(&self) -> Option<&str> {
        self.voiceover_script.as_deref()
    }

    /// Replaces the script by hand
    pub fn set_voiceover_script(&mut self, script: &str) {
        self.voiceover_script = Some(script.to_string());
    }

    pub fn voiceover(&self) -> Option<&VoiceoverAudio> {
        self.voiceover.as_ref()
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn push_notice(&mut self, notice: Notice) {
        match notice.level {
            NoticeLevel::Error => warn!("{}: {}", notice.title, notice.message),
            _ => info!("{}: {}", notice.title, notice.message),
        }
        self.notices.push(notice);
    }

    /// Removes a notice; returns false if it was already gone
    pub fn dismiss_notice(&mut self, id: &str) -> bool {
        let before = self.notices.len();
        self.notices.retain(|n| n.id != id);
        self.notices.len() != before
    }

    /// Removes and returns all pending notices
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    // -------------------------------------------------------------------------
    // Recording Lifecycle
    // -------------------------------------------------------------------------

    /// Loads a new recording.
    ///
    /// The previous recording and voiceover are released and all edits,
    /// captions and the script are discarded.
    pub fn load_recording(&mut self, mut recording: MediaHandle) {
        recording.duration_sec = sanitize_duration(recording.duration_sec);
        let duration = recording.duration_sec;

        self.release_media();
        info!("Loaded recording {} ({:.2}s)", recording.uri, duration);

        self.recording = Some(recording);
        self.edl = EditDecisionList::new(duration).with_limits(self.limits);
        self.captions =
            CaptionTrackSet::new(duration).with_default_style(self.caption_style.clone());
        self.voiceover_script = None;
    }

    /// Releases all media and clears the session
    pub fn close(&mut self) {
        self.release_media();
        self.edl = EditDecisionList::new(0.0).with_limits(self.limits);
        self.captions = CaptionTrackSet::new(0.0).with_default_style(self.caption_style.clone());
        self.voiceover_script = None;
    }

    /// Drops the voiceover audio, releasing its handle
    pub fn clear_voiceover(&mut self) {
        if let Some(previous) = self.voiceover.take() {
            self.releaser.release(&previous.audio);
        }
    }

    fn release_media(&mut self) {
        if let Some(previous) = self.recording.take() {
            self.releaser.release(&previous);
        }
        self.clear_voiceover();
    }

    fn require_recording(&mut self, title: &str) -> CoreResult<MediaHandle> {
        match &self.recording {
            Some(recording) => Ok(recording.clone()),
            None => {
                let err = CoreError::NoRecording;
                self.push_notice(Notice::error(title, &err.to_string()));
                Err(err)
            }
        }
    }

    fn collaborator_failed(&mut self, title: &str, err: &CoreError) {
        let notice = Notice::error(title, &err.to_string());
        let notice = match err {
            CoreError::ValidationError(_) => notice,
            _ => notice.retryable(),
        };
        self.push_notice(notice);
    }

    // -------------------------------------------------------------------------
    // AI Flows
    // -------------------------------------------------------------------------

    /// Replaces the edit decisions with the collaborator's suggestions
    pub async fn request_edit_suggestions(
        &mut self,
        ai: &dyn AiCollaborator,
    ) -> CoreResult<IngestReport> {
        const TITLE: &str = "Edit suggestions failed";
        let recording = self.require_recording(TITLE)?;

        let suggestion = match ai.suggest_edits(&recording).await {
            Ok(suggestion) => suggestion,
            Err(e) => {
                self.collaborator_failed(TITLE, &e);
                return Err(e);
            }
        };

        let report = self.edl.replace_from_ai(suggestion.edl);
        if report.dropped > 0 {
            self.push_notice(Notice::warning(
                "Some suggestions were skipped",
                &format!(
                    "{} of {} suggested edits were invalid and ignored",
                    report.dropped,
                    report.accepted + report.dropped
                ),
            ));
        }
        Ok(report)
    }

    /// Asks for a narration script and keeps it in the session
    pub async fn request_voiceover_script(
        &mut self,
        ai: &dyn AiCollaborator,
        description: &str,
    ) -> CoreResult<String> {
        const TITLE: &str = "Script generation failed";
        let request = VoiceoverScriptRequest::new(description);

        match ai.write_voiceover_script(&request).await {
            Ok(script) => {
                self.voiceover_script = Some(script.voiceover_script.clone());
                Ok(script.voiceover_script)
            }
            Err(e) => {
                self.collaborator_failed(TITLE, &e);
                Err(e)
            }
        }
    }

    /// Synthesizes speech and makes it the session's voiceover.
    ///
    /// A missing or invalid reported duration is estimated from the text.
    /// Returns the voiceover duration.
    pub async fn request_voiceover_audio(
        &mut self,
        ai: &dyn AiCollaborator,
        request: &VoiceoverAudioRequest,
    ) -> CoreResult<TimeSec> {
        const TITLE: &str = "Voiceover generation failed";
        if let Err(e) = request.validate() {
            self.collaborator_failed(TITLE, &e);
            return Err(e);
        }

        let mut audio = match ai.synthesize_voiceover(request).await {
            Ok(audio) => audio,
            Err(e) => {
                self.collaborator_failed(TITLE, &e);
                return Err(e);
            }
        };

        let duration = audio
            .duration_sec
            .map(sanitize_duration)
            .filter(|d| *d > 0.0)
            .unwrap_or_else(|| estimate_speech_duration(&request.text, request.speed));
        audio.duration_sec = Some(duration);
        audio.audio.duration_sec = sanitize_duration(audio.audio.duration_sec);
        if audio.audio.duration_sec <= 0.0 {
            audio.audio.duration_sec = duration;
        }

        self.clear_voiceover();
        info!("Voiceover ready ({:.2}s, voice {})", duration, request.voice);
        self.voiceover = Some(audio);
        Ok(duration)
    }

    /// Transcribes the recording into a new selected caption track
    pub async fn request_captions(
        &mut self,
        ai: &dyn AiCollaborator,
    ) -> CoreResult<CaptionTrackId> {
        const TITLE: &str = "Caption generation failed";
        let recording = self.require_recording(TITLE)?;

        let generated = match ai.generate_captions(&recording).await {
            Ok(generated) => generated,
            Err(e) => {
                self.collaborator_failed(TITLE, &e);
                return Err(e);
            }
        };

        let language = self.caption_language.clone();
        let track_id = self.captions.ingest_generated(&generated.captions, &language);
        if self
            .captions
            .get_track(&track_id)
            .is_some_and(|track| track.is_empty())
        {
            self.push_notice(Notice::warning(
                "No captions found",
                "The generated subtitles contained no usable cues",
            ));
        }
        Ok(track_id)
    }

    // -------------------------------------------------------------------------
    // Export
    // -------------------------------------------------------------------------

    /// Assembles an export request from the current session state.
    ///
    /// Visible captions are serialized to SRT and the voiceover becomes the
    /// auxiliary audio.
    pub fn export_request(&self, settings: ExportSettings) -> CoreResult<ExportRequest> {
        let recording = self.recording.clone().ok_or(CoreError::NoRecording)?;

        let mut request = ExportRequest::new(recording)
            .with_decisions(self.edl.decisions().to_vec())
            .with_settings(settings);

        let cues = self.captions.visible_cues();
        if !cues.is_empty() {
            request = request.with_captions(&export_srt(&cues));
        }
        if let Some(voiceover) = &self.voiceover {
            request = request.with_auxiliary_audio(voiceover.audio.clone());
        }
        Ok(request)
    }

    /// Exports the session, raising notices for failures and policy warnings
    pub async fn export(
        &mut self,
        engine: &ExportEngine,
        settings: ExportSettings,
        progress_tx: Option<mpsc::Sender<f64>>,
    ) -> Result<ExportOutput, ExportError> {
        const TITLE: &str = "Export failed";
        let request = match self.export_request(settings) {
            Ok(request) => request,
            Err(e) => {
                self.push_notice(Notice::error(TITLE, &e.to_string()));
                return Err(ExportError::InvalidRequest(e.to_string()));
            }
        };

        match engine.export(&request, progress_tx).await {
            Ok(output) => {
                for warning in &output.warnings {
                    self.push_notice(Notice::warning("Export note", &warning.to_string()));
                }
                Ok(output)
            }
            Err(e) => {
                let notice = match &e {
                    ExportError::EmptyResult => Notice::error("Nothing to export", &e.to_string()),
                    ExportError::InvalidRequest(_) => Notice::error(TITLE, &e.to_string()),
                    _ => Notice::error(TITLE, &e.to_string()).retryable(),
                };
                self.push_notice(notice);
                Err(e)
            }
        }
    }
}

impl Drop for EditingSession {
    fn drop(&mut self) {
        self.release_media();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ai::MockAiCollaborator;
    use crate::core::edl::{EditAction, RawEditDecision};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    #[derive(Clone, Default)]
    struct RecordingReleaser {
        released: Arc<Mutex<Vec<String>>>,
    }

    impl RecordingReleaser {
        fn released(&self) -> Vec<String> {
            self.released.lock().unwrap().clone()
        }
    }

    impl MediaReleaser for RecordingReleaser {
        fn release(&self, handle: &MediaHandle) {
            self.released.lock().unwrap().push(handle.uri.clone());
        }
    }

    fn session() -> (EditingSession, RecordingReleaser) {
        let releaser = RecordingReleaser::default();
        (EditingSession::new(Box::new(releaser.clone())), releaser)
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    #[test]
    fn test_load_recording_releases_previous_once() {
        let (mut session, releaser) = session();

        session.load_recording(MediaHandle::new("blob:first", 30.0));
        assert!(releaser.released().is_empty());

        session.load_recording(MediaHandle::new("blob:second", 45.0));
        assert_eq!(releaser.released(), vec!["blob:first"]);
        assert_eq!(session.duration(), 45.0);

        drop(session);
        assert_eq!(releaser.released(), vec!["blob:first", "blob:second"]);
    }

    #[test]
    fn test_load_recording_resets_state() {
        let (mut session, _) = session();
        session.load_recording(MediaHandle::new("blob:first", 30.0));
        session.edl_mut().add_at(5.0, EditAction::Cut);
        let track = session.captions_mut().add_track("English", "en");
        session.captions_mut().add_caption(&track, 1.0).unwrap();
        session.set_voiceover_script("Hello");

        session.load_recording(MediaHandle::new("blob:second", 60.0));

        assert!(session.edl().is_empty());
        assert_eq!(session.edl().video_duration, 60.0);
        assert!(session.captions().tracks.is_empty());
        assert!(session.voiceover_script().is_none());
    }

    #[test]
    fn test_load_recording_sanitizes_duration() {
        let (mut session, _) = session();
        let mut handle = MediaHandle::new("blob:x", 10.0);
        handle.duration_sec = f64::INFINITY;
        session.load_recording(handle);
        assert_eq!(session.duration(), 0.0);
    }

    #[test]
    fn test_close_releases_everything() {
        let (mut session, releaser) = session();
        session.load_recording(MediaHandle::new("blob:rec", 30.0));
        session.close();
        session.close();
        assert_eq!(releaser.released(), vec!["blob:rec"]);
        assert!(session.recording().is_none());
    }

    // -------------------------------------------------------------------------
    // AI Flows
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_edit_suggestions_are_filtered() {
        let (mut session, _) = session();
        session.load_recording(MediaHandle::new("blob:rec", 30.0));

        let ai = MockAiCollaborator::new("mock").with_edl(vec![
            RawEditDecision::new(2.0, 4.0, "cut"),
            RawEditDecision::new(5.0, 3.0, "zoom"),
            RawEditDecision::new(6.0, 8.0, "blur"),
        ]);
        let report = session.request_edit_suggestions(&ai).await.unwrap();

        assert_eq!(report.accepted, 1);
        assert_eq!(report.dropped, 2);
        assert_eq!(session.edl().len(), 1);
        assert_eq!(session.notices().len(), 1);
        assert_eq!(session.notices()[0].level, NoticeLevel::Warning);
    }

    #[tokio::test]
    async fn test_failed_flow_raises_notice_and_keeps_state() {
        let (mut session, _) = session();
        session.load_recording(MediaHandle::new("blob:rec", 30.0));
        session.edl_mut().add_at(5.0, EditAction::Zoom);

        let ai = MockAiCollaborator::new("mock").with_available(false);
        assert!(session.request_edit_suggestions(&ai).await.is_err());
        assert!(session.request_captions(&ai).await.is_err());

        assert_eq!(session.edl().len(), 1);
        assert!(session.captions().tracks.is_empty());
        assert_eq!(session.notices().len(), 2);
        assert!(session.notices().iter().all(|n| n.retryable));
    }

    #[tokio::test]
    async fn test_flows_require_recording() {
        let (mut session, _) = session();
        let ai = MockAiCollaborator::new("mock");

        assert!(matches!(
            session.request_edit_suggestions(&ai).await,
            Err(CoreError::NoRecording)
        ));
        assert!(!session.notices()[0].retryable);
    }

    #[tokio::test]
    async fn test_voiceover_script_is_stored() {
        let (mut session, _) = session();
        let ai = MockAiCollaborator::new("mock").with_script("Narration");

        let script = session
            .request_voiceover_script(&ai, "A signup walkthrough")
            .await
            .unwrap();
        assert_eq!(script, "Narration");
        assert_eq!(session.voiceover_script(), Some("Narration"));
    }

    #[tokio::test]
    async fn test_voiceover_replacement_releases_previous_audio() {
        let temp_dir = TempDir::new().unwrap();
        let (mut session, releaser) = session();
        session.load_recording(MediaHandle::new("blob:rec", 30.0));
        let ai = MockAiCollaborator::new("mock").with_audio_dir(temp_dir.path());

        let request = VoiceoverAudioRequest::new("First take");
        session.request_voiceover_audio(&ai, &request).await.unwrap();
        let first = session.voiceover().unwrap().audio.uri.clone();

        session.request_voiceover_audio(&ai, &request).await.unwrap();
        assert_eq!(releaser.released(), vec![first]);
        assert_ne!(session.voiceover().unwrap().audio.uri, releaser.released()[0]);
    }

    #[tokio::test]
    async fn test_invalid_voiceover_request_is_not_retryable() {
        let (mut session, _) = session();
        let ai = MockAiCollaborator::new("mock");

        let request = VoiceoverAudioRequest::new("Hello").with_speed(10.0);
        assert!(session.request_voiceover_audio(&ai, &request).await.is_err());
        assert!(session.voiceover().is_none());
        assert!(!session.notices()[0].retryable);
    }

    #[tokio::test]
    async fn test_generated_captions_become_selected_track() {
        let (mut session, _) = session();
        session.load_recording(MediaHandle::new("blob:rec", 5.0));
        let ai = MockAiCollaborator::new("mock");

        let track_id = session.request_captions(&ai).await.unwrap();
        let track = session.captions().get_track(&track_id).unwrap();

        assert_eq!(session.captions().selected.as_deref(), Some(track_id.as_str()));
        assert_eq!(track.captions.len(), 2);
        // Second cue ends at 7s, past the 5s recording
        assert_eq!(track.captions[1].end_time, 5.0);
    }

    #[tokio::test]
    async fn test_empty_generated_captions_raise_warning() {
        let (mut session, _) = session();
        session.load_recording(MediaHandle::new("blob:rec", 5.0));
        let ai = MockAiCollaborator::new("mock").with_captions("not subtitles");

        session.request_captions(&ai).await.unwrap();
        assert_eq!(session.notices()[0].title, "No captions found");
    }

    // -------------------------------------------------------------------------
    // Export Request
    // -------------------------------------------------------------------------

    #[test]
    fn test_export_request_requires_recording() {
        let (session, _) = session();
        assert!(matches!(
            session.export_request(ExportSettings::default()),
            Err(CoreError::NoRecording)
        ));
    }

    #[test]
    fn test_export_request_includes_visible_captions_only() {
        let (mut session, _) = session();
        session.load_recording(MediaHandle::new("rec.webm", 30.0));
        session.edl_mut().add_at(5.0, EditAction::Cut);

        let shown = session.captions_mut().add_track("Shown", "en");
        session.captions_mut().add_caption(&shown, 1.0).unwrap();
        let hidden = session.captions_mut().add_track("Hidden", "en");
        session.captions_mut().add_caption(&hidden, 10.0).unwrap();
        session.captions_mut().toggle_visibility(&hidden).unwrap();

        let request = session.export_request(ExportSettings::default()).unwrap();
        let captions = request.captions.unwrap();

        assert_eq!(request.decisions.len(), 1);
        assert!(captions.starts_with("1\n00:00:01,000 --> 00:00:04,000\n"));
        assert!(!captions.contains("00:00:10,000"));
        assert!(request.auxiliary_audio.is_none());
    }

    #[test]
    fn test_from_settings_applies_limits() {
        let mut settings = AppSettings::default();
        settings.editing.default_decision_length = 5.0;
        let mut session = EditingSession::from_settings(&settings, Box::new(NoopReleaser));
        session.load_recording(MediaHandle::new("rec.webm", 30.0));

        let id = session.edl_mut().add_at(2.0, EditAction::Highlight).unwrap();
        assert_eq!(session.edl().get(&id).unwrap().end_time, 7.0);
    }

    #[test]
    fn test_dismiss_notice() {
        let (mut session, _) = session();
        session.push_notice(Notice::info("Saved", "Settings saved"));
        let id = session.notices()[0].id.clone();

        assert!(session.dismiss_notice(&id));
        assert!(!session.dismiss_notice(&id));
        assert!(session.take_notices().is_empty());
    }
}
