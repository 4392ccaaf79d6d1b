//! FFmpeg Runner Module
//!
//! Process-backed `TranscodeEngine`. Inputs are staged in a private working
//! directory and FFmpeg runs with that directory as its current directory,
//! so plans only ever reference bare file names.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{
    detect_ffmpeg, validate_file_name, FFmpegError, FFmpegInfo, FFmpegResult, TranscodeEngine,
};
use crate::core::new_id;

/// Global options placed before every plan
const GLOBAL_ARGS: [&str; 6] = ["-hide_banner", "-nostdin", "-y", "-nostats", "-progress", "pipe:1"];

/// Number of stderr lines kept in failure messages
const STDERR_TAIL_LINES: usize = 12;

// =============================================================================
// Progress Parsing
// =============================================================================

/// Parsed FFmpeg progress data
#[derive(Debug, Clone, Default)]
pub struct FFmpegProgressData {
    /// Current frame number
    pub frame: u64,
    /// Current FPS
    pub fps: f32,
    /// Current output time in seconds
    pub time_sec: f64,
    /// Speed multiplier (e.g., 2.5x)
    pub speed: Option<f32>,
    /// Set once FFmpeg reports `progress=end`
    pub finished: bool,
}

/// Parse FFmpeg progress output line
///
/// FFmpeg progress output format (when using -progress pipe:1):
/// ```text
/// frame=100
/// fps=30.0
/// out_time_us=3333333
/// speed=2.5x
/// progress=continue
/// ```
///
/// Returns true when the line closes a progress block.
pub fn parse_ffmpeg_progress_line(line: &str, data: &mut FFmpegProgressData) -> bool {
    let line = line.trim();

    if let Some(value) = line.strip_prefix("frame=") {
        data.frame = value.trim().parse().unwrap_or(data.frame);
    } else if let Some(value) = line.strip_prefix("fps=") {
        data.fps = value.trim().parse().unwrap_or(data.fps);
    } else if let Some(value) = line
        .strip_prefix("out_time_us=")
        .or_else(|| line.strip_prefix("out_time_ms="))
    {
        // out_time_ms is in microseconds despite the name
        if let Ok(microseconds) = value.trim().parse::<u64>() {
            data.time_sec = microseconds as f64 / 1_000_000.0;
        }
    } else if let Some(value) = line.strip_prefix("speed=") {
        // Format: "2.5x" or "N/A"
        data.speed = value
            .trim()
            .strip_suffix('x')
            .and_then(|s| s.trim().parse().ok());
    } else if let Some(value) = line.strip_prefix("progress=") {
        data.finished = value.trim() == "end";
        return true;
    }

    false
}

/// Fraction of the expected output produced so far, in `[0, 1]`
pub fn progress_fraction(data: &FFmpegProgressData, expected_duration: f64) -> f64 {
    if data.finished {
        return 1.0;
    }
    if expected_duration > 0.0 && expected_duration.is_finite() {
        (data.time_sec / expected_duration).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

// =============================================================================
// FFmpeg Runner
// =============================================================================

/// FFmpeg process engine
pub struct FFmpegRunner {
    ffmpeg_override: Option<PathBuf>,
    work_root: PathBuf,
    info: Option<FFmpegInfo>,
    work_dir: Option<PathBuf>,
}

impl FFmpegRunner {
    /// Creates an uninitialized runner that stages files under the system
    /// temp directory
    pub fn new() -> Self {
        Self {
            ffmpeg_override: None,
            work_root: std::env::temp_dir(),
            info: None,
            work_dir: None,
        }
    }

    /// Uses a specific FFmpeg binary instead of detecting one
    pub fn with_ffmpeg_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ffmpeg_override = Some(path.into());
        self
    }

    /// Stages files under `root` instead of the system temp directory
    pub fn with_work_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.work_root = root.into();
        self
    }

    /// Get the FFmpeg info (after initialization)
    pub fn info(&self) -> Option<&FFmpegInfo> {
        self.info.as_ref()
    }

    /// Private working directory (after initialization)
    pub fn work_dir(&self) -> Option<&Path> {
        self.work_dir.as_deref()
    }

    fn staged_path(&self, name: &str) -> FFmpegResult<PathBuf> {
        validate_file_name(name)?;
        let dir = self.work_dir.as_ref().ok_or(FFmpegError::NotReady)?;
        Ok(dir.join(name))
    }
}

impl Default for FFmpegRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TranscodeEngine for FFmpegRunner {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn initialize(&mut self) -> FFmpegResult<()> {
        if self.is_ready() {
            return Ok(());
        }

        let override_path = self.ffmpeg_override.clone();
        let info = tokio::task::spawn_blocking(move || detect_ffmpeg(override_path.as_deref()))
            .await
            .map_err(|e| FFmpegError::InitFailed(format!("Detection task failed: {}", e)))??;

        let work_dir = self.work_root.join(format!("echoreel-{}", new_id()));
        tokio::fs::create_dir_all(&work_dir).await.map_err(|e| {
            FFmpegError::InitFailed(format!(
                "Failed to create working directory {}: {}",
                work_dir.display(),
                e
            ))
        })?;

        info!(
            "FFmpeg {} ready at {} (work dir {})",
            info.version,
            info.ffmpeg_path.display(),
            work_dir.display()
        );
        self.info = Some(info);
        self.work_dir = Some(work_dir);
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.info.is_some() && self.work_dir.is_some()
    }

    async fn dispose(&mut self) {
        if let Some(dir) = self.work_dir.take() {
            if let Err(e) = tokio::fs::remove_dir_all(&dir).await {
                warn!("Failed to remove working directory {}: {}", dir.display(), e);
            } else {
                debug!("Removed working directory {}", dir.display());
            }
        }
        self.info = None;
    }

    async fn write_file(&mut self, name: &str, data: &[u8]) -> FFmpegResult<()> {
        let path = self.staged_path(name)?;
        tokio::fs::write(&path, data).await?;
        debug!("Staged {} ({} bytes)", name, data.len());
        Ok(())
    }

    async fn exec(
        &mut self,
        args: &[String],
        expected_duration: f64,
        progress: Option<mpsc::Sender<f64>>,
    ) -> FFmpegResult<()> {
        let info = self.info.as_ref().ok_or(FFmpegError::NotReady)?;
        let work_dir = self.work_dir.as_ref().ok_or(FFmpegError::NotReady)?;

        debug!("ffmpeg {}", args.join(" "));

        let mut child = tokio::process::Command::new(&info.ffmpeg_path)
            .current_dir(work_dir)
            .args(GLOBAL_ARGS)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdout_task = child.stdout.take().map(|stdout| {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                let mut data = FFmpegProgressData::default();

                while let Ok(Some(line)) = lines.next_line().await {
                    if !parse_ffmpeg_progress_line(&line, &mut data) {
                        continue;
                    }
                    if let Some(tx) = &progress {
                        // Receiver gone: keep draining so FFmpeg never blocks
                        let _ = tx.send(progress_fraction(&data, expected_duration)).await;
                    }
                }
            })
        });

        let stderr_task = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut buf = String::new();
                let _ = stderr.read_to_string(&mut buf).await;
                buf
            })
        });

        let status = child.wait().await?;

        if let Some(task) = stdout_task {
            let _ = task.await;
        }
        let stderr = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        if !status.success() {
            return Err(FFmpegError::ExecutionFailed(format!(
                "{} ({})",
                stderr_tail(&stderr),
                status
            )));
        }

        Ok(())
    }

    async fn read_file(&mut self, name: &str) -> FFmpegResult<Vec<u8>> {
        let path = self.staged_path(name)?;
        tokio::fs::read(&path).await.map_err(|e| {
            FFmpegError::ExecutionFailed(format!("Output {} was not produced: {}", name, e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // Progress Parsing Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_parse_ffmpeg_progress_fields() {
        let mut data = FFmpegProgressData::default();

        assert!(!parse_ffmpeg_progress_line("frame=150", &mut data));
        assert!(!parse_ffmpeg_progress_line("fps=29.97", &mut data));
        assert!(!parse_ffmpeg_progress_line("out_time_us=5000000", &mut data));
        assert!(!parse_ffmpeg_progress_line("speed=2.5x", &mut data));

        assert_eq!(data.frame, 150);
        assert!((data.fps - 29.97).abs() < 0.01);
        assert!((data.time_sec - 5.0).abs() < 1e-9);
        assert_eq!(data.speed, Some(2.5));
    }

    #[test]
    fn test_parse_ffmpeg_progress_legacy_time_key() {
        let mut data = FFmpegProgressData::default();
        parse_ffmpeg_progress_line("out_time_ms=2500000", &mut data);
        assert!((data.time_sec - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_parse_ffmpeg_progress_block_boundary() {
        let mut data = FFmpegProgressData::default();
        assert!(parse_ffmpeg_progress_line("progress=continue", &mut data));
        assert!(!data.finished);
        assert!(parse_ffmpeg_progress_line("progress=end", &mut data));
        assert!(data.finished);
    }

    #[test]
    fn test_parse_ffmpeg_progress_ignores_garbage() {
        let mut data = FFmpegProgressData::default();
        parse_ffmpeg_progress_line("out_time_us=N/A", &mut data);
        parse_ffmpeg_progress_line("speed=N/A", &mut data);
        parse_ffmpeg_progress_line("bitrate=1234.5kbits/s", &mut data);
        assert_eq!(data.time_sec, 0.0);
        assert_eq!(data.speed, None);
    }

    #[test]
    fn test_progress_fraction() {
        let mut data = FFmpegProgressData {
            time_sec: 5.0,
            ..Default::default()
        };
        assert_eq!(progress_fraction(&data, 10.0), 0.5);
        assert_eq!(progress_fraction(&data, 2.0), 1.0);
        assert_eq!(progress_fraction(&data, 0.0), 0.0);

        data.finished = true;
        assert_eq!(progress_fraction(&data, 0.0), 1.0);
    }

    #[test]
    fn test_stderr_tail() {
        let stderr = (0..20).map(|i| format!("line {}", i)).collect::<Vec<_>>().join("\n");
        let tail = stderr_tail(&stderr);
        assert!(tail.starts_with("line 8"));
        assert!(tail.ends_with("line 19"));
    }

    // -------------------------------------------------------------------------
    // Lifecycle Tests
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_uninitialized_runner_rejects_io() {
        let mut runner = FFmpegRunner::new();
        assert!(!runner.is_ready());
        assert!(matches!(
            runner.write_file("input.webm", b"data").await,
            Err(FFmpegError::NotReady)
        ));
        assert!(matches!(
            runner.read_file("output.mp4").await,
            Err(FFmpegError::NotReady)
        ));
        assert!(matches!(
            runner.exec(&[], 1.0, None).await,
            Err(FFmpegError::NotReady)
        ));
    }

    #[tokio::test]
    async fn test_missing_override_fails_initialization() {
        let dir = tempfile::tempdir().unwrap();
        let mut runner = FFmpegRunner::new()
            .with_ffmpeg_path(dir.path().join("missing-ffmpeg"))
            .with_work_root(dir.path());

        assert!(matches!(runner.initialize().await, Err(FFmpegError::NotFound)));
        assert!(!runner.is_ready());
        assert!(runner.work_dir().is_none());
    }

    #[tokio::test]
    async fn test_initialize_and_dispose_with_system_ffmpeg() {
        let dir = tempfile::tempdir().unwrap();
        let mut runner = FFmpegRunner::new().with_work_root(dir.path());

        // Only meaningful where FFmpeg is installed
        if runner.initialize().await.is_err() {
            return;
        }
        let work_dir = runner.work_dir().unwrap().to_path_buf();
        assert!(work_dir.exists());

        runner.write_file("note.txt", b"hello").await.unwrap();
        assert_eq!(runner.read_file("note.txt").await.unwrap(), b"hello");

        runner.dispose().await;
        assert!(!runner.is_ready());
        assert!(!work_dir.exists());
    }
}
