//! Export Engine Module
//!
//! Turns the edit state into an FFmpeg operation plan and runs it on the
//! session's transcoder.
//!
//! Export policy:
//! - No cuts: single pass. Captions are burned in with the `subtitles`
//!   filter, auxiliary audio replaces the recording's audio (video copied
//!   when nothing else needs re-encoding, audio padded to the video length),
//!   otherwise the recording passes through.
//! - Cuts: one trim/timestamp-reset pair per keep segment, then a concat.
//!   Auxiliary audio and captions are not combined with cuts; they are
//!   reported as warnings instead.
//! - Zoom and highlight decisions are never rendered and always reported.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::keep::{resolve_keep_segments, total_duration};
use crate::core::edl::{EditAction, EditDecision};
use crate::core::ffmpeg::{FFmpegError, SharedTranscoder, TranscoderState};
use crate::core::{MediaHandle, TimeRange, TimeSec};

/// Name of the staged caption file
pub const CAPTIONS_FILE: &str = "captions.srt";

const DEFAULT_VIDEO_EXTENSION: &str = "webm";
const DEFAULT_AUDIO_EXTENSION: &str = "wav";

// =============================================================================
// Settings
// =============================================================================

/// Output container
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Mp4,
    Mov,
    Webm,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Mp4 => "mp4",
            ExportFormat::Mov => "mov",
            ExportFormat::Webm => "webm",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ExportFormat::Mp4 => "video/mp4",
            ExportFormat::Mov => "video/quicktime",
            ExportFormat::Webm => "video/webm",
        }
    }

    fn video_codec_args(self) -> Vec<String> {
        let args: &[&str] = match self {
            ExportFormat::Mp4 | ExportFormat::Mov => {
                &["-c:v", "libx264", "-preset", "veryfast", "-crf", "23", "-pix_fmt", "yuv420p"]
            }
            ExportFormat::Webm => &["-c:v", "libvpx-vp9", "-b:v", "0", "-crf", "32"],
        };
        args.iter().map(|s| s.to_string()).collect()
    }

    fn audio_codec_args(self) -> Vec<String> {
        let args: &[&str] = match self {
            ExportFormat::Mp4 | ExportFormat::Mov => &["-c:a", "aac", "-b:a", "192k"],
            ExportFormat::Webm => &["-c:a", "libopus", "-b:a", "128k"],
        };
        args.iter().map(|s| s.to_string()).collect()
    }
}

/// Output resolution (height; width follows the source aspect ratio)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    #[default]
    Source,
    #[serde(rename = "480p")]
    P480,
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "1080p")]
    P1080,
    #[serde(rename = "4k")]
    P2160,
}

impl Resolution {
    pub fn height(self) -> Option<u32> {
        match self {
            Resolution::Source => None,
            Resolution::P480 => Some(480),
            Resolution::P720 => Some(720),
            Resolution::P1080 => Some(1080),
            Resolution::P2160 => Some(2160),
        }
    }
}

/// Export settings
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSettings {
    #[serde(default)]
    pub format: ExportFormat,
    #[serde(default)]
    pub resolution: Resolution,
}

// =============================================================================
// Request / Errors / Warnings
// =============================================================================

/// Everything needed to export one recording
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    pub video: MediaHandle,
    #[serde(default)]
    pub decisions: Vec<EditDecision>,
    #[serde(default)]
    pub auxiliary_audio: Option<MediaHandle>,
    /// SRT text to burn in
    #[serde(default)]
    pub captions: Option<String>,
    #[serde(default)]
    pub settings: ExportSettings,
}

impl ExportRequest {
    pub fn new(video: MediaHandle) -> Self {
        Self {
            video,
            decisions: vec![],
            auxiliary_audio: None,
            captions: None,
            settings: ExportSettings::default(),
        }
    }

    pub fn with_decisions(mut self, decisions: Vec<EditDecision>) -> Self {
        self.decisions = decisions;
        self
    }

    pub fn with_auxiliary_audio(mut self, audio: MediaHandle) -> Self {
        self.auxiliary_audio = Some(audio);
        self
    }

    pub fn with_captions(mut self, captions: &str) -> Self {
        self.captions = Some(captions.to_string());
        self
    }

    pub fn with_settings(mut self, settings: ExportSettings) -> Self {
        self.settings = settings;
        self
    }

    fn cuts(&self) -> Vec<TimeRange> {
        self.decisions
            .iter()
            .filter(|d| d.action == EditAction::Cut)
            .map(EditDecision::range)
            .collect()
    }

    fn caption_text(&self) -> Option<&str> {
        self.captions.as_deref().filter(|c| !c.trim().is_empty())
    }
}

/// Export error
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Nothing left to export: the cuts remove the entire video")]
    EmptyResult,
    #[error("Transcoder unavailable: {0}")]
    EngineUnavailable(String),
    #[error("Transcoding failed: {0}")]
    TranscodeFailed(String),
    #[error("Invalid export request: {0}")]
    InvalidRequest(String),
    #[error("Another export is already running")]
    Busy,
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<FFmpegError> for ExportError {
    fn from(err: FFmpegError) -> Self {
        match err {
            FFmpegError::NotFound | FFmpegError::InitFailed(_) | FFmpegError::NotReady => {
                ExportError::EngineUnavailable(err.to_string())
            }
            other => ExportError::TranscodeFailed(other.to_string()),
        }
    }
}

/// Non-fatal policy notices attached to a plan
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ExportWarning {
    /// Decisions of an action the exporter does not render
    UnappliedActions { action: EditAction, count: usize },
    /// Auxiliary audio dropped because cuts were applied
    AuxiliaryAudioIgnored,
    /// Caption burn-in dropped because cuts were applied
    CaptionsIgnored,
}

impl std::fmt::Display for ExportWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportWarning::UnappliedActions { action, count } => write!(
                f,
                "{} {} edit(s) are not applied on export",
                count,
                action.label()
            ),
            ExportWarning::AuxiliaryAudioIgnored => {
                f.write_str("Voiceover audio is not combined with cuts and was left out")
            }
            ExportWarning::CaptionsIgnored => {
                f.write_str("Captions are not burned in when cuts are applied")
            }
        }
    }
}

// =============================================================================
// Plan
// =============================================================================

/// One step of the export plan
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum PlanOperation {
    /// Trim the video to a keep segment and reset its timestamps
    TrimVideo { index: usize, range: TimeRange },
    /// Trim the audio to a keep segment and reset its timestamps
    TrimAudio { index: usize, range: TimeRange },
    /// Join the trimmed segments in order
    Concat { segments: usize, with_audio: bool },
    /// Burn in subtitles from a staged file
    BurnCaptions { file: String },
    /// Take the audio stream from a staged file
    ReplaceAudio { file: String },
    /// Scale to a target height
    Scale { height: u32 },
    /// Copy streams unchanged
    Passthrough,
}

/// A file staged into the transcoder before execution
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlanInputSource {
    /// Bytes read from a media handle
    Media(String),
    /// Text produced by the engine
    Text(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanInput {
    pub name: String,
    pub source: PlanInputSource,
}

/// Export plan for the transcoder
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportPlan {
    pub inputs: Vec<PlanInput>,
    pub operations: Vec<PlanOperation>,
    pub output: String,
    pub format: ExportFormat,
    /// Expected output duration in seconds
    pub expected_duration: TimeSec,
    pub warnings: Vec<ExportWarning>,
    /// Index of the auxiliary audio input, if it is used
    #[serde(skip)]
    audio_input: Option<usize>,
    #[serde(skip)]
    source_has_audio: bool,
    #[serde(skip)]
    video_extension: String,
}

impl ExportPlan {
    /// Builds the plan for a request.
    ///
    /// Fails with `EmptyResult` when the cuts leave nothing to export.
    pub fn build(request: &ExportRequest) -> Result<ExportPlan, ExportError> {
        let duration = request.video.duration_sec;
        if !(duration.is_finite() && duration > 0.0) {
            return Err(ExportError::InvalidRequest(
                "the recording has no duration".to_string(),
            ));
        }

        let format = request.settings.format;
        let video_extension = request
            .video
            .extension()
            .unwrap_or_else(|| DEFAULT_VIDEO_EXTENSION.to_string());
        let video_input = format!("input.{}", video_extension);

        let mut plan = ExportPlan {
            inputs: vec![PlanInput {
                name: video_input,
                source: PlanInputSource::Media(request.video.uri.clone()),
            }],
            operations: vec![],
            output: format!("output.{}", format.extension()),
            format,
            expected_duration: duration,
            warnings: vec![],
            audio_input: None,
            source_has_audio: request.video.has_audio,
            video_extension,
        };

        for action in EditAction::ALL {
            if action.applied_on_export() {
                continue;
            }
            let count = request.decisions.iter().filter(|d| d.action == action).count();
            if count > 0 {
                plan.warnings.push(ExportWarning::UnappliedActions { action, count });
            }
        }

        let cuts = request.cuts();
        if cuts.is_empty() {
            plan.build_single_pass(request);
        } else {
            plan.build_cut_pass(request, &cuts)?;
        }

        if let Some(height) = request.settings.resolution.height() {
            plan.operations.push(PlanOperation::Scale { height });
        }

        if plan.operations.is_empty() {
            plan.operations.push(PlanOperation::Passthrough);
        }

        Ok(plan)
    }

    fn build_single_pass(&mut self, request: &ExportRequest) {
        if let Some(captions) = request.caption_text() {
            self.inputs.push(PlanInput {
                name: CAPTIONS_FILE.to_string(),
                source: PlanInputSource::Text(captions.to_string()),
            });
            self.operations.push(PlanOperation::BurnCaptions {
                file: CAPTIONS_FILE.to_string(),
            });
        }

        if let Some(audio) = &request.auxiliary_audio {
            let ext = audio
                .extension()
                .unwrap_or_else(|| DEFAULT_AUDIO_EXTENSION.to_string());
            let name = format!("voiceover.{}", ext);
            // FFmpeg numbers only the `-i` inputs
            self.audio_input = Some(
                self.inputs
                    .iter()
                    .filter(|i| matches!(i.source, PlanInputSource::Media(_)))
                    .count(),
            );
            self.inputs.push(PlanInput {
                name: name.clone(),
                source: PlanInputSource::Media(audio.uri.clone()),
            });
            self.operations.push(PlanOperation::ReplaceAudio { file: name });
        }
    }

    fn build_cut_pass(
        &mut self,
        request: &ExportRequest,
        cuts: &[TimeRange],
    ) -> Result<(), ExportError> {
        if request.auxiliary_audio.is_some() {
            self.warnings.push(ExportWarning::AuxiliaryAudioIgnored);
        }
        if request.caption_text().is_some() {
            self.warnings.push(ExportWarning::CaptionsIgnored);
        }

        let segments = resolve_keep_segments(request.video.duration_sec, cuts);
        if segments.is_empty() {
            return Err(ExportError::EmptyResult);
        }

        for (index, range) in segments.iter().enumerate() {
            self.operations.push(PlanOperation::TrimVideo {
                index,
                range: *range,
            });
            if self.source_has_audio {
                self.operations.push(PlanOperation::TrimAudio {
                    index,
                    range: *range,
                });
            }
        }
        self.operations.push(PlanOperation::Concat {
            segments: segments.len(),
            with_audio: self.source_has_audio,
        });
        self.expected_duration = total_duration(&segments);

        Ok(())
    }

    /// Returns true if the plan applies no edits (streams may still be
    /// re-encoded for a different container)
    pub fn is_passthrough(&self) -> bool {
        self.operations == [PlanOperation::Passthrough]
    }

    fn has_cuts(&self) -> bool {
        self.operations
            .iter()
            .any(|op| matches!(op, PlanOperation::Concat { .. }))
    }

    /// Renders the plan as FFmpeg arguments (after global options)
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        for input in &self.inputs {
            if matches!(input.source, PlanInputSource::Media(_)) {
                args.push("-i".to_string());
                args.push(input.name.clone());
            }
        }

        if self.has_cuts() {
            self.push_cut_args(&mut args);
        } else {
            self.push_single_pass_args(&mut args);
        }

        if matches!(self.format, ExportFormat::Mp4 | ExportFormat::Mov) && !self.is_passthrough() {
            args.push("-movflags".to_string());
            args.push("+faststart".to_string());
        }
        args.push(self.output.clone());
        args
    }

    fn push_cut_args(&self, args: &mut Vec<String>) {
        let mut filters = Vec::new();
        let mut concat_inputs = String::new();
        let mut segments = 0;

        for op in &self.operations {
            match op {
                PlanOperation::TrimVideo { index, range } => {
                    filters.push(format!(
                        "[0:v]trim=start={:.3}:end={:.3},setpts=PTS-STARTPTS[v{}]",
                        range.start_sec, range.end_sec, index
                    ));
                    concat_inputs.push_str(&format!("[v{}]", index));
                    segments += 1;
                }
                PlanOperation::TrimAudio { index, range } => {
                    filters.push(format!(
                        "[0:a]atrim=start={:.3}:end={:.3},asetpts=PTS-STARTPTS[a{}]",
                        range.start_sec, range.end_sec, index
                    ));
                    concat_inputs.push_str(&format!("[a{}]", index));
                }
                _ => {}
            }
        }

        let with_audio = self.source_has_audio;
        if with_audio {
            filters.push(format!(
                "{}concat=n={}:v=1:a=1[outv][outa]",
                concat_inputs, segments
            ));
        } else {
            filters.push(format!("{}concat=n={}:v=1:a=0[outv]", concat_inputs, segments));
        }

        let mut video_label = "[outv]".to_string();
        if let Some(height) = self.scale_height() {
            filters.push(format!("[outv]scale=-2:{}[outvs]", height));
            video_label = "[outvs]".to_string();
        }

        args.push("-filter_complex".to_string());
        args.push(filters.join(";"));
        args.push("-map".to_string());
        args.push(video_label);
        if with_audio {
            args.push("-map".to_string());
            args.push("[outa]".to_string());
        }
        args.extend(self.format.video_codec_args());
        if with_audio {
            args.extend(self.format.audio_codec_args());
        }
    }

    fn push_single_pass_args(&self, args: &mut Vec<String>) {
        let mut video_filters = Vec::new();
        for op in &self.operations {
            match op {
                PlanOperation::BurnCaptions { file } => {
                    video_filters.push(format!("subtitles={}", file));
                }
                PlanOperation::Scale { height } => {
                    video_filters.push(format!("scale=-2:{}", height));
                }
                _ => {}
            }
        }
        let reencode_video =
            !video_filters.is_empty() || self.video_extension != self.format.extension();

        if self.is_passthrough() && !reencode_video {
            args.push("-c".to_string());
            args.push("copy".to_string());
            return;
        }

        if !video_filters.is_empty() {
            args.push("-vf".to_string());
            args.push(video_filters.join(","));
        }

        if let Some(audio_index) = self.audio_input {
            args.push("-map".to_string());
            args.push("0:v:0".to_string());
            args.push("-map".to_string());
            args.push(format!("{}:a:0", audio_index));
        }

        if reencode_video {
            args.extend(self.format.video_codec_args());
        } else {
            args.push("-c:v".to_string());
            args.push("copy".to_string());
        }

        if self.audio_input.is_some() || self.source_has_audio {
            args.extend(self.format.audio_codec_args());
        }

        // Short voiceovers are padded with silence; the video sets the length
        if self.audio_input.is_some() {
            args.push("-af".to_string());
            args.push("apad".to_string());
            args.push("-t".to_string());
            args.push(format!("{:.3}", self.expected_duration));
        }
    }

    fn scale_height(&self) -> Option<u32> {
        self.operations.iter().find_map(|op| match op {
            PlanOperation::Scale { height } => Some(*height),
            _ => None,
        })
    }
}

// =============================================================================
// Progress
// =============================================================================

/// Keeps a progress stream inside `[0, 1]` and never decreasing
#[derive(Debug, Default, Clone, Copy)]
pub struct ProgressGate {
    last: Option<f64>,
}

impl ProgressGate {
    /// Returns the value to forward, or `None` if it would not advance
    pub fn advance(&mut self, fraction: f64) -> Option<f64> {
        if !fraction.is_finite() {
            return None;
        }
        let fraction = fraction.clamp(0.0, 1.0);
        match self.last {
            Some(last) if fraction <= last => None,
            _ => {
                self.last = Some(fraction);
                Some(fraction)
            }
        }
    }

    pub fn last(&self) -> Option<f64> {
        self.last
    }
}

// =============================================================================
// Export Engine
// =============================================================================

/// Exported file
#[derive(Clone, Debug, PartialEq)]
pub struct ExportOutput {
    pub file_name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
    /// Duration in seconds
    pub duration_sec: TimeSec,
    pub warnings: Vec<ExportWarning>,
}

/// Runs export plans on the session's transcoder
pub struct ExportEngine {
    transcoder: SharedTranscoder,
}

impl ExportEngine {
    pub fn new(transcoder: SharedTranscoder) -> Self {
        Self { transcoder }
    }

    /// Exports a request.
    ///
    /// Only one export runs at a time; a second concurrent call fails with
    /// `ExportError::Busy` instead of queueing.
    pub async fn export(
        &self,
        request: &ExportRequest,
        progress_tx: Option<mpsc::Sender<f64>>,
    ) -> Result<ExportOutput, ExportError> {
        let mut state = self
            .transcoder
            .try_lock()
            .map_err(|_| ExportError::Busy)?;
        run_export(&mut state, request, progress_tx).await
    }
}

/// Plans and runs one export on an owned transcoder
pub async fn run_export(
    state: &mut TranscoderState,
    request: &ExportRequest,
    progress_tx: Option<mpsc::Sender<f64>>,
) -> Result<ExportOutput, ExportError> {
    let plan = ExportPlan::build(request)?;
    for warning in &plan.warnings {
        warn!("Export: {}", warning);
    }

    let engine = state.ensure_ready().await?;

    for input in &plan.inputs {
        let data = match &input.source {
            PlanInputSource::Media(uri) => tokio::fs::read(uri).await?,
            PlanInputSource::Text(text) => text.as_bytes().to_vec(),
        };
        engine.write_file(&input.name, &data).await?;
    }

    let args = plan.to_ffmpeg_args();
    info!(
        "Exporting {} ({} operations, {:.1}s expected)",
        plan.output,
        plan.operations.len(),
        plan.expected_duration
    );

    let (engine_tx, mut engine_rx) = mpsc::channel::<f64>(32);
    let forward_tx = progress_tx.clone();
    let forwarder = tokio::spawn(async move {
        let mut gate = ProgressGate::default();
        while let Some(fraction) = engine_rx.recv().await {
            if let (Some(value), Some(tx)) = (gate.advance(fraction), &forward_tx) {
                let _ = tx.send(value).await;
            }
        }
        gate
    });

    let result = engine
        .exec(&args, plan.expected_duration, Some(engine_tx))
        .await;
    let mut gate = forwarder.await.unwrap_or_default();
    result?;

    let data = engine.read_file(&plan.output).await?;
    if let (Some(value), Some(tx)) = (gate.advance(1.0), &progress_tx) {
        let _ = tx.send(value).await;
    }

    info!("Export finished: {} ({} bytes)", plan.output, data.len());
    Ok(ExportOutput {
        file_name: plan.output.clone(),
        mime_type: plan.format.mime_type().to_string(),
        data,
        duration_sec: plan.expected_duration,
        warnings: plan.warnings,
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;

    use super::*;
    use crate::core::ffmpeg::{create_transcoder, FFmpegResult, TranscodeEngine};

    fn recording() -> MediaHandle {
        MediaHandle::new("/recordings/screen.webm", 60.0)
    }

    fn cut(start: f64, end: f64) -> EditDecision {
        EditDecision::create(start, end, EditAction::Cut)
    }

    fn arg_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    // -------------------------------------------------------------------------
    // Plan Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_passthrough_without_edits() {
        let request = ExportRequest::new(recording()).with_settings(ExportSettings {
            format: ExportFormat::Webm,
            resolution: Resolution::Source,
        });
        let plan = ExportPlan::build(&request).unwrap();

        assert!(plan.is_passthrough());
        assert!(plan.warnings.is_empty());
        assert_eq!(
            plan.to_ffmpeg_args(),
            vec!["-i", "input.webm", "-c", "copy", "output.webm"]
        );
    }

    #[test]
    fn test_container_change_reencodes() {
        let plan = ExportPlan::build(&ExportRequest::new(recording())).unwrap();
        let args = plan.to_ffmpeg_args();

        assert!(plan.is_passthrough());
        assert_eq!(arg_after(&args, "-c:v"), Some("libx264"));
        assert_eq!(arg_after(&args, "-c:a"), Some("aac"));
        assert_eq!(args.last().map(String::as_str), Some("output.mp4"));
    }

    #[test]
    fn test_cut_plan_trims_keep_segments() {
        let request =
            ExportRequest::new(recording()).with_decisions(vec![cut(10.0, 20.0), cut(50.0, 60.0)]);
        let plan = ExportPlan::build(&request).unwrap();

        assert_eq!(
            plan.operations,
            vec![
                PlanOperation::TrimVideo { index: 0, range: TimeRange::new(0.0, 10.0) },
                PlanOperation::TrimAudio { index: 0, range: TimeRange::new(0.0, 10.0) },
                PlanOperation::TrimVideo { index: 1, range: TimeRange::new(20.0, 50.0) },
                PlanOperation::TrimAudio { index: 1, range: TimeRange::new(20.0, 50.0) },
                PlanOperation::Concat { segments: 2, with_audio: true },
            ]
        );
        assert_eq!(plan.expected_duration, 40.0);

        let args = plan.to_ffmpeg_args();
        assert_eq!(
            arg_after(&args, "-filter_complex"),
            Some(
                "[0:v]trim=start=0.000:end=10.000,setpts=PTS-STARTPTS[v0];\
                 [0:a]atrim=start=0.000:end=10.000,asetpts=PTS-STARTPTS[a0];\
                 [0:v]trim=start=20.000:end=50.000,setpts=PTS-STARTPTS[v1];\
                 [0:a]atrim=start=20.000:end=50.000,asetpts=PTS-STARTPTS[a1];\
                 [v0][a0][v1][a1]concat=n=2:v=1:a=1[outv][outa]"
            )
        );
        assert!(args.windows(2).any(|w| w == ["-map", "[outa]"]));
    }

    #[test]
    fn test_cut_plan_without_audio_stream() {
        let request = ExportRequest::new(recording().without_audio())
            .with_decisions(vec![cut(0.0, 5.0)]);
        let plan = ExportPlan::build(&request).unwrap();

        assert!(!plan
            .operations
            .iter()
            .any(|op| matches!(op, PlanOperation::TrimAudio { .. })));

        let args = plan.to_ffmpeg_args();
        let graph = arg_after(&args, "-filter_complex").unwrap();
        assert!(graph.ends_with("[v0]concat=n=1:v=1:a=0[outv]"));
        assert!(!graph.contains("atrim"));
        assert!(arg_after(&args, "-c:a").is_none());
    }

    #[test]
    fn test_everything_cut_is_empty_result() {
        let request = ExportRequest::new(recording()).with_decisions(vec![cut(0.0, 60.0)]);
        assert!(matches!(
            ExportPlan::build(&request),
            Err(ExportError::EmptyResult)
        ));
    }

    #[test]
    fn test_zoom_and_highlight_are_warned() {
        let request = ExportRequest::new(recording()).with_decisions(vec![
            EditDecision::create(1.0, 2.0, EditAction::Zoom),
            EditDecision::create(3.0, 4.0, EditAction::Zoom),
            EditDecision::create(5.0, 6.0, EditAction::Highlight),
        ]);
        let plan = ExportPlan::build(&request).unwrap();

        assert_eq!(
            plan.warnings,
            vec![
                ExportWarning::UnappliedActions { action: EditAction::Zoom, count: 2 },
                ExportWarning::UnappliedActions { action: EditAction::Highlight, count: 1 },
            ]
        );
        assert!(plan.is_passthrough());
    }

    #[test]
    fn test_cuts_win_over_audio_and_captions() {
        let request = ExportRequest::new(recording())
            .with_decisions(vec![cut(5.0, 10.0)])
            .with_auxiliary_audio(MediaHandle::new("/tmp/voice.wav", 30.0))
            .with_captions("1\n00:00:01,000 --> 00:00:02,000\nHi\n");
        let plan = ExportPlan::build(&request).unwrap();

        assert_eq!(
            plan.warnings,
            vec![ExportWarning::AuxiliaryAudioIgnored, ExportWarning::CaptionsIgnored]
        );
        assert_eq!(plan.inputs.len(), 1);
        assert!(!plan.to_ffmpeg_args().iter().any(|a| a.contains("subtitles")));
    }

    #[test]
    fn test_captions_and_audio_single_pass() {
        let request = ExportRequest::new(recording())
            .with_auxiliary_audio(MediaHandle::new("/tmp/voice.wav", 30.0))
            .with_captions("1\n00:00:01,000 --> 00:00:02,000\nHi\n");
        let plan = ExportPlan::build(&request).unwrap();

        let names: Vec<_> = plan.inputs.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["input.webm", "captions.srt", "voiceover.wav"]);

        let args = plan.to_ffmpeg_args();
        assert_eq!(
            &args[..4],
            &["-i", "input.webm", "-i", "voiceover.wav"].map(String::from)
        );
        assert_eq!(arg_after(&args, "-vf"), Some("subtitles=captions.srt"));
        assert!(args.windows(2).any(|w| w == ["-map", "1:a:0"]));
        assert!(!args.contains(&"-shortest".to_string()));
    }

    #[test]
    fn test_short_voiceover_keeps_full_video_length() {
        let video = MediaHandle::new("/recordings/screen.webm", 60.0);
        let request =
            ExportRequest::new(video).with_auxiliary_audio(MediaHandle::new("/tmp/voice.wav", 5.0));
        let plan = ExportPlan::build(&request).unwrap();
        let args = plan.to_ffmpeg_args();

        assert_eq!(plan.expected_duration, 60.0);
        assert!(!args.contains(&"-shortest".to_string()));
        assert_eq!(arg_after(&args, "-af"), Some("apad"));
        assert_eq!(arg_after(&args, "-t"), Some("60.000"));
        assert_eq!(args.last().map(String::as_str), Some("output.mp4"));
    }

    #[test]
    fn test_audio_replacement_copies_video() {
        let video = MediaHandle::new("/recordings/screen.mp4", 60.0);
        let request =
            ExportRequest::new(video).with_auxiliary_audio(MediaHandle::new("/tmp/voice.wav", 30.0));
        let args = ExportPlan::build(&request).unwrap().to_ffmpeg_args();

        assert_eq!(arg_after(&args, "-c:v"), Some("copy"));
        assert!(args.windows(2).any(|w| w == ["-map", "0:v:0"]));
        assert!(arg_after(&args, "-vf").is_none());
    }

    #[test]
    fn test_blank_captions_are_ignored() {
        let request = ExportRequest::new(recording()).with_captions("  \n");
        let plan = ExportPlan::build(&request).unwrap();
        assert!(plan.is_passthrough());
    }

    #[test]
    fn test_scale_applied_after_concat() {
        let request = ExportRequest::new(recording())
            .with_decisions(vec![cut(0.0, 1.0)])
            .with_settings(ExportSettings {
                format: ExportFormat::Mp4,
                resolution: Resolution::P720,
            });
        let args = ExportPlan::build(&request).unwrap().to_ffmpeg_args();

        let graph = arg_after(&args, "-filter_complex").unwrap();
        assert!(graph.ends_with("[outv]scale=-2:720[outvs]"));
        assert!(args.windows(2).any(|w| w == ["-map", "[outvs]"]));
    }

    #[test]
    fn test_zero_duration_request_is_invalid() {
        let request = ExportRequest::new(MediaHandle::new("clip.webm", f64::NAN));
        assert!(matches!(
            ExportPlan::build(&request),
            Err(ExportError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_settings_wire_names() {
        let settings: ExportSettings =
            serde_json::from_str(r#"{"format": "mov", "resolution": "4k"}"#).unwrap();
        assert_eq!(settings.format, ExportFormat::Mov);
        assert_eq!(settings.resolution.height(), Some(2160));
    }

    // -------------------------------------------------------------------------
    // Progress Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_progress_gate_is_monotonic_and_clamped() {
        let mut gate = ProgressGate::default();
        assert_eq!(gate.advance(0.0), Some(0.0));
        assert_eq!(gate.advance(0.4), Some(0.4));
        assert_eq!(gate.advance(0.3), None);
        assert_eq!(gate.advance(0.4), None);
        assert_eq!(gate.advance(f64::NAN), None);
        assert_eq!(gate.advance(7.0), Some(1.0));
        assert_eq!(gate.advance(1.0), None);
    }

    // -------------------------------------------------------------------------
    // Engine Tests
    // -------------------------------------------------------------------------

    /// In-memory engine that records calls and "produces" the output file
    #[derive(Default)]
    struct FakeEngine {
        ready: bool,
        fail_exec: bool,
        files: HashMap<String, Vec<u8>>,
        progress_script: Vec<f64>,
        executed: Vec<Vec<String>>,
    }

    #[async_trait]
    impl TranscodeEngine for FakeEngine {
        fn name(&self) -> &str {
            "fake"
        }

        async fn initialize(&mut self) -> FFmpegResult<()> {
            self.ready = true;
            Ok(())
        }

        fn is_ready(&self) -> bool {
            self.ready
        }

        async fn dispose(&mut self) {
            self.ready = false;
            self.files.clear();
        }

        async fn write_file(&mut self, name: &str, data: &[u8]) -> FFmpegResult<()> {
            self.files.insert(name.to_string(), data.to_vec());
            Ok(())
        }

        async fn exec(
            &mut self,
            args: &[String],
            _expected_duration: f64,
            progress: Option<mpsc::Sender<f64>>,
        ) -> FFmpegResult<()> {
            self.executed.push(args.to_vec());
            if let Some(tx) = progress {
                for value in &self.progress_script {
                    let _ = tx.send(*value).await;
                }
            }
            if self.fail_exec {
                return Err(FFmpegError::ExecutionFailed("boom".to_string()));
            }
            if let Some(output) = args.last() {
                self.files.insert(output.clone(), b"video-bytes".to_vec());
            }
            Ok(())
        }

        async fn read_file(&mut self, name: &str) -> FFmpegResult<Vec<u8>> {
            self.files
                .get(name)
                .cloned()
                .ok_or_else(|| FFmpegError::ExecutionFailed(format!("missing {}", name)))
        }
    }

    fn recording_on_disk(dir: &tempfile::TempDir) -> MediaHandle {
        let path = dir.path().join("screen.webm");
        std::fs::write(&path, b"recording").unwrap();
        MediaHandle::new(path.to_string_lossy(), 30.0)
    }

    #[tokio::test]
    async fn test_export_runs_plan_and_reads_output() {
        let dir = tempfile::tempdir().unwrap();
        let engine = FakeEngine {
            progress_script: vec![0.2, 0.1, 0.6, 1.4],
            ..Default::default()
        };
        let transcoder = create_transcoder(Box::new(engine));
        let exporter = ExportEngine::new(transcoder.clone());

        let request = ExportRequest::new(recording_on_disk(&dir))
            .with_decisions(vec![cut(5.0, 10.0)]);
        let (tx, mut rx) = mpsc::channel(16);

        let output = exporter.export(&request, Some(tx)).await.unwrap();
        assert_eq!(output.file_name, "output.mp4");
        assert_eq!(output.mime_type, "video/mp4");
        assert_eq!(output.data, b"video-bytes");
        assert_eq!(output.duration_sec, 25.0);

        let mut seen = Vec::new();
        while let Some(value) = rx.recv().await {
            seen.push(value);
        }
        assert_eq!(seen, vec![0.2, 0.6, 1.0]);

        let state = transcoder.lock().await;
        assert!(state.is_ready());
        assert_eq!(state.initializations(), 1);
    }

    #[tokio::test]
    async fn test_engine_is_initialized_once_across_exports() {
        let dir = tempfile::tempdir().unwrap();
        let transcoder = create_transcoder(Box::new(FakeEngine::default()));
        let exporter = ExportEngine::new(transcoder.clone());
        let request = ExportRequest::new(recording_on_disk(&dir));

        exporter.export(&request, None).await.unwrap();
        exporter.export(&request, None).await.unwrap();

        assert_eq!(transcoder.lock().await.initializations(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_export_is_busy() {
        let dir = tempfile::tempdir().unwrap();
        let transcoder = create_transcoder(Box::new(FakeEngine::default()));
        let exporter = ExportEngine::new(transcoder.clone());
        let request = ExportRequest::new(recording_on_disk(&dir));

        let _guard = transcoder.lock().await;
        assert!(matches!(
            exporter.export(&request, None).await,
            Err(ExportError::Busy)
        ));
    }

    #[tokio::test]
    async fn test_transcode_failure_is_distinct_from_empty_result() {
        let dir = tempfile::tempdir().unwrap();
        let engine = FakeEngine {
            fail_exec: true,
            ..Default::default()
        };
        let exporter = ExportEngine::new(create_transcoder(Box::new(engine)));

        let request = ExportRequest::new(recording_on_disk(&dir));
        assert!(matches!(
            exporter.export(&request, None).await,
            Err(ExportError::TranscodeFailed(_))
        ));

        let request = request.with_decisions(vec![cut(0.0, 30.0)]);
        assert!(matches!(
            exporter.export(&request, None).await,
            Err(ExportError::EmptyResult)
        ));
    }

    #[tokio::test]
    async fn test_missing_recording_file_is_io_error() {
        let exporter = ExportEngine::new(create_transcoder(Box::new(FakeEngine::default())));
        let request = ExportRequest::new(MediaHandle::new("/definitely/missing.webm", 10.0));
        assert!(matches!(
            exporter.export(&request, None).await,
            Err(ExportError::IoError(_))
        ));
    }
}
