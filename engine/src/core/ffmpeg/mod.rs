//! FFmpeg Integration Module
//!
//! The transcoding collaborator used by export:
//! - `TranscodeEngine`: the write-file / exec / read-file contract
//! - `FFmpegRunner`: engine backed by a system FFmpeg process
//! - `TranscoderState`: explicitly owned, lazily initialized engine handle
//!
//! Any FFmpeg on the system PATH (or an explicitly configured binary) can be
//! used; nothing is bundled.

mod detection;
mod runner;
mod state;

use async_trait::async_trait;
use tokio::sync::mpsc;

pub use detection::*;
pub use runner::{
    parse_ffmpeg_progress_line, progress_fraction, FFmpegProgressData, FFmpegRunner,
};
pub use state::{create_transcoder, SharedTranscoder, TranscoderState};

/// FFmpeg-related error types
#[derive(Debug, thiserror::Error)]
pub enum FFmpegError {
    #[error("FFmpeg not found. Please install FFmpeg or set the transcoder path in settings.")]
    NotFound,

    #[error("Transcoder failed to initialize: {0}")]
    InitFailed(String),

    #[error("Transcoder is not initialized")]
    NotReady,

    #[error("FFmpeg execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Invalid input file: {0}")]
    InvalidInput(String),

    #[error("Process error: {0}")]
    ProcessError(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(String),
}

pub type FFmpegResult<T> = Result<T, FFmpegError>;

/// Transcoding collaborator contract.
///
/// Files live in an engine-private namespace addressed by bare file names.
/// `exec` reports progress as a fraction of `expected_duration` on the
/// optional channel.
#[async_trait]
pub trait TranscodeEngine: Send + Sync {
    /// Returns the engine name (for logs)
    fn name(&self) -> &str;

    /// Loads the engine; calling it on a ready engine is a no-op
    async fn initialize(&mut self) -> FFmpegResult<()>;

    /// Checks if the engine can run commands
    fn is_ready(&self) -> bool;

    /// Releases the engine and everything it staged
    async fn dispose(&mut self);

    /// Stages an input file
    async fn write_file(&mut self, name: &str, data: &[u8]) -> FFmpegResult<()>;

    /// Runs one FFmpeg invocation (arguments after the global options)
    async fn exec(
        &mut self,
        args: &[String],
        expected_duration: f64,
        progress: Option<mpsc::Sender<f64>>,
    ) -> FFmpegResult<()>;

    /// Reads back a produced file
    async fn read_file(&mut self, name: &str) -> FFmpegResult<Vec<u8>>;
}

/// Validates a file name for the engine namespace
pub(crate) fn validate_file_name(name: &str) -> FFmpegResult<()> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.contains('\0');
    if invalid {
        Err(FFmpegError::InvalidInput(format!(
            "'{}' is not a plain file name",
            name
        )))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ffmpeg_error_display() {
        let err = FFmpegError::NotFound;
        assert!(err.to_string().contains("FFmpeg not found"));

        let err = FFmpegError::ExecutionFailed("exit code 1".to_string());
        assert!(err.to_string().contains("exit code 1"));
    }

    #[test]
    fn test_validate_file_name() {
        assert!(validate_file_name("input.webm").is_ok());
        assert!(validate_file_name("captions.srt").is_ok());

        for bad in ["", ".", "..", "../etc/passwd", "dir/file.mp4", "a\\b"] {
            assert!(
                matches!(validate_file_name(bad), Err(FFmpegError::InvalidInput(_))),
                "expected rejection for {bad:?}"
            );
        }
    }
}
