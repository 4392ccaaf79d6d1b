//! End-to-end editing session: AI suggestions, generated captions and export
//! through an in-memory transcoder.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use echoreel_lib::core::ai::MockAiCollaborator;
use echoreel_lib::core::edl::{EditAction, RawEditDecision};
use echoreel_lib::core::ffmpeg::{create_transcoder, FFmpegError, FFmpegResult, TranscodeEngine};
use echoreel_lib::core::render::{
    ExportEngine, ExportError, ExportSettings, ExportWarning, CAPTIONS_FILE,
};
use echoreel_lib::core::session::{EditingSession, NoopReleaser, NoticeLevel};
use echoreel_lib::core::MediaHandle;

// =============================================================================
// In-memory transcoder
// =============================================================================

#[derive(Clone, Default)]
struct Staging {
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    commands: Arc<Mutex<Vec<Vec<String>>>>,
}

impl Staging {
    fn file(&self, name: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(name).cloned()
    }

    fn last_command(&self) -> Vec<String> {
        self.commands.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

struct MemoryEngine {
    ready: bool,
    staging: Staging,
}

#[async_trait]
impl TranscodeEngine for MemoryEngine {
    fn name(&self) -> &str {
        "memory"
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
        self.staging.files.lock().unwrap().clear();
    }

    async fn write_file(&mut self, name: &str, data: &[u8]) -> FFmpegResult<()> {
        self.staging
            .files
            .lock()
            .unwrap()
            .insert(name.to_string(), data.to_vec());
        Ok(())
    }

    async fn exec(
        &mut self,
        args: &[String],
        _expected_duration: f64,
        progress: Option<mpsc::Sender<f64>>,
    ) -> FFmpegResult<()> {
        if let Some(tx) = progress {
            for fraction in [0.25, 0.1, 0.75] {
                let _ = tx.send(fraction).await;
            }
        }

        // Output name is always the last argument
        let output = args.last().cloned().unwrap_or_default();
        self.staging.commands.lock().unwrap().push(args.to_vec());
        self.staging
            .files
            .lock()
            .unwrap()
            .insert(output, b"rendered".to_vec());
        Ok(())
    }

    async fn read_file(&mut self, name: &str) -> FFmpegResult<Vec<u8>> {
        self.staging
            .file(name)
            .ok_or_else(|| FFmpegError::ExecutionFailed(format!("missing {}", name)))
    }
}

async fn drain(mut rx: mpsc::Receiver<f64>) -> Vec<f64> {
    let mut values = Vec::new();
    while let Some(value) = rx.recv().await {
        values.push(value);
    }
    values
}

// =============================================================================
// Flow
// =============================================================================

#[tokio::test]
async fn test_suggest_caption_and_export() {
    let temp_dir = tempfile::tempdir().unwrap();
    let recording_path = temp_dir.path().join("screen.webm");
    std::fs::write(&recording_path, b"webm-bytes").unwrap();

    let mut session = EditingSession::new(Box::new(NoopReleaser));
    session.load_recording(MediaHandle::new(recording_path.to_string_lossy(), 30.0));

    let ai = MockAiCollaborator::new("mock").with_edl(vec![
        RawEditDecision::new(2.0, 5.0, "cut"),
        RawEditDecision::new(10.0, 12.0, "zoom"),
        RawEditDecision::new(25.0, 40.0, "cut"),
        RawEditDecision::new(6.0, 8.0, "blur"),
    ]);

    // Suggestions: the unknown action is dropped, the tail cut is clamped
    let report = session.request_edit_suggestions(&ai).await.unwrap();
    assert_eq!(report.accepted, 3);
    assert_eq!(report.dropped, 1);
    let last = session.edl().decisions().last().unwrap();
    assert_eq!(last.end_time, 30.0);

    let track_id = session.request_captions(&ai).await.unwrap();
    assert_eq!(session.captions().get_track(&track_id).unwrap().len(), 2);

    let staging = Staging::default();
    let transcoder = create_transcoder(Box::new(MemoryEngine {
        ready: false,
        staging: staging.clone(),
    }));
    let engine = ExportEngine::new(transcoder.clone());

    // Cut export: captions are skipped and zoom is reported
    let (tx, rx) = mpsc::channel(32);
    let output = session
        .export(&engine, ExportSettings::default(), Some(tx))
        .await
        .unwrap();
    let progress = drain(rx).await;

    assert_eq!(output.file_name, "output.mp4");
    assert_eq!(output.mime_type, "video/mp4");
    assert_eq!(output.data, b"rendered");
    assert!((output.duration_sec - 22.0).abs() < 1e-9);
    assert!(output.warnings.contains(&ExportWarning::UnappliedActions {
        action: EditAction::Zoom,
        count: 1,
    }));
    assert!(output.warnings.contains(&ExportWarning::CaptionsIgnored));

    assert_eq!(staging.file("input.webm").unwrap(), b"webm-bytes");
    assert!(staging.file(CAPTIONS_FILE).is_none());
    assert!(staging
        .last_command()
        .iter()
        .any(|arg| arg == "-filter_complex"));

    assert!(progress.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(progress.last().copied(), Some(1.0));

    let warnings = session
        .notices()
        .iter()
        .filter(|n| n.level == NoticeLevel::Warning)
        .count();
    assert_eq!(warnings, 3);

    // Without cuts the captions are burned in
    let cut_ids: Vec<String> = session
        .edl()
        .decisions()
        .iter()
        .filter(|d| d.action == EditAction::Cut)
        .map(|d| d.id.clone())
        .collect();
    for id in &cut_ids {
        session.edl_mut().delete(id);
    }

    let output = session
        .export(&engine, ExportSettings::default(), None)
        .await
        .unwrap();
    assert!((output.duration_sec - 30.0).abs() < 1e-9);

    let captions = String::from_utf8(staging.file(CAPTIONS_FILE).unwrap()).unwrap();
    assert!(captions.starts_with("1\n00:00:00,000 --> 00:00:03,000\n"));
    assert!(staging
        .last_command()
        .iter()
        .any(|arg| arg == &format!("subtitles={}", CAPTIONS_FILE)));

    // The transcoder was initialized once and reused
    assert_eq!(transcoder.lock().await.initializations(), 1);
}

#[tokio::test]
async fn test_export_of_fully_cut_recording_is_reported_distinctly() {
    let temp_dir = tempfile::tempdir().unwrap();
    let recording_path = temp_dir.path().join("screen.webm");
    std::fs::write(&recording_path, b"webm-bytes").unwrap();

    let mut session = EditingSession::new(Box::new(NoopReleaser));
    session.load_recording(MediaHandle::new(recording_path.to_string_lossy(), 10.0));
    session
        .edl_mut()
        .replace_from_ai(vec![RawEditDecision::new(0.0, 10.0, "cut")]);

    let engine = ExportEngine::new(create_transcoder(Box::new(MemoryEngine {
        ready: false,
        staging: Staging::default(),
    })));

    let result = session
        .export(&engine, ExportSettings::default(), None)
        .await;

    assert!(matches!(result, Err(ExportError::EmptyResult)));
    let notice = session.notices().last().unwrap();
    assert_eq!(notice.title, "Nothing to export");
    assert!(!notice.retryable);
}

#[tokio::test]
async fn test_missing_recording_file_fails_export() {
    let mut session = EditingSession::new(Box::new(NoopReleaser));
    session.load_recording(MediaHandle::new("/nonexistent/screen.webm", 10.0));

    let engine = ExportEngine::new(create_transcoder(Box::new(MemoryEngine {
        ready: false,
        staging: Staging::default(),
    })));

    let result = session
        .export(&engine, ExportSettings::default(), None)
        .await;

    assert!(matches!(result, Err(ExportError::IoError(_))));
    assert!(session.notices().last().unwrap().retryable);
}
