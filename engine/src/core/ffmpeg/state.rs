//! Transcoder state
//!
//! Holds the single transcoding engine of a session. The engine is created
//! by the caller, initialized on first use and reused afterwards; exports are
//! serialized by the shared mutex.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use super::{FFmpegResult, TranscodeEngine};

/// Owned transcoding engine with a lazy lifecycle
pub struct TranscoderState {
    engine: Box<dyn TranscodeEngine>,
    initializations: u32,
}

impl TranscoderState {
    pub fn new(engine: Box<dyn TranscodeEngine>) -> Self {
        Self {
            engine,
            initializations: 0,
        }
    }

    /// Returns the engine, initializing it first if needed.
    ///
    /// A failed initialization leaves the state uninitialized so a later
    /// call can retry.
    pub async fn ensure_ready(&mut self) -> FFmpegResult<&mut dyn TranscodeEngine> {
        if !self.engine.is_ready() {
            info!("Initializing transcoder '{}'", self.engine.name());
            self.engine.initialize().await?;
            self.initializations += 1;
        }
        Ok(self.engine.as_mut())
    }

    /// Check if the engine is ready to run commands
    pub fn is_ready(&self) -> bool {
        self.engine.is_ready()
    }

    /// Number of successful initializations so far
    pub fn initializations(&self) -> u32 {
        self.initializations
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    /// Releases the engine; the next `ensure_ready` initializes it again
    pub async fn dispose(&mut self) {
        if self.engine.is_ready() {
            info!("Disposing transcoder '{}'", self.engine.name());
        }
        self.engine.dispose().await;
    }
}

/// Transcoder shared between the session and running exports
pub type SharedTranscoder = Arc<Mutex<TranscoderState>>;

/// Create a new shared transcoder around an engine
pub fn create_transcoder(engine: Box<dyn TranscodeEngine>) -> SharedTranscoder {
    Arc::new(Mutex::new(TranscoderState::new(engine)))
}
