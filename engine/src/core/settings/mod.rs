//! Settings Persistence System
//!
//! Provides persistent application settings with:
//! - Atomic file writes (temp file + rename)
//! - Schema validation with defaults
//! - Migration support for schema changes
//!
//! Storage location: {config_dir}/echoreel/settings.json

use serde::{Deserialize, Serialize};
use std::fs;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use tracing::{info, warn};

use crate::core::ai::Voice;
use crate::core::captions::CaptionStyle;
use crate::core::edl::EditLimits;
use crate::core::ffmpeg::FFmpegRunner;
use crate::core::render::ExportSettings;

/// Settings schema version for migration support
pub const SETTINGS_VERSION: u32 = 1;

/// Settings file name
pub const SETTINGS_FILE: &str = "settings.json";

/// Lock file name (advisory lock to prevent concurrent writers)
pub const SETTINGS_LOCK_FILE: &str = "settings.json.lock";

/// Application directory name under the platform config dir
pub const APP_DIR_NAME: &str = "echoreel";

/// Default settings directory ({config_dir}/echoreel)
pub fn default_settings_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME))
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    /// Schema version for migrations
    #[serde(default = "default_version")]
    pub version: u32,

    /// Edit decision settings
    #[serde(default)]
    pub editing: EditingSettings,

    /// Caption defaults
    #[serde(default)]
    pub captions: CaptionSettings,

    /// Voiceover defaults
    #[serde(default)]
    pub voiceover: VoiceoverSettings,

    /// Default export settings
    #[serde(default)]
    pub export: ExportSettings,

    /// Transcoder location
    #[serde(default)]
    pub transcoder: TranscoderSettings,
}

fn default_version() -> u32 {
    SETTINGS_VERSION
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            editing: EditingSettings::default(),
            captions: CaptionSettings::default(),
            voiceover: VoiceoverSettings::default(),
            export: ExportSettings::default(),
            transcoder: TranscoderSettings::default(),
        }
    }
}

impl AppSettings {
    /// Normalizes and clamps settings so persisted state is always valid.
    ///
    /// Bad values are corrected instead of rejected, so a corrupted or old
    /// config never blocks startup.
    pub fn normalize(&mut self) {
        self.version = SETTINGS_VERSION;

        self.editing.min_decision_duration =
            clamp_f64(self.editing.min_decision_duration, 0.01, 10.0);
        self.editing.default_decision_length = clamp_f64(
            self.editing.default_decision_length,
            self.editing.min_decision_duration,
            600.0,
        );

        self.captions.default_style = self.captions.default_style.normalized();
        if self.captions.default_language.trim().is_empty() {
            self.captions.default_language = default_language();
        }

        self.voiceover.speed = if self.voiceover.speed.is_finite() {
            self.voiceover.speed.clamp(0.25, 4.0)
        } else {
            1.0
        };

        if self
            .transcoder
            .ffmpeg_path
            .as_ref()
            .is_some_and(|p| p.as_os_str().is_empty())
        {
            self.transcoder.ffmpeg_path = None;
        }
        if self
            .transcoder
            .work_dir
            .as_ref()
            .is_some_and(|p| p.as_os_str().is_empty())
        {
            self.transcoder.work_dir = None;
        }
    }
}

fn clamp_f64(value: f64, min: f64, max: f64) -> f64 {
    if !value.is_finite() {
        return min;
    }
    value.clamp(min, max)
}

/// Edit decision settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EditingSettings {
    /// Minimum decision length in seconds
    #[serde(default = "default_min_duration")]
    pub min_decision_duration: f64,

    /// Length of a decision added at the playhead
    #[serde(default = "default_decision_length")]
    pub default_decision_length: f64,
}

impl Default for EditingSettings {
    fn default() -> Self {
        Self {
            min_decision_duration: default_min_duration(),
            default_decision_length: default_decision_length(),
        }
    }
}

impl EditingSettings {
    pub fn limits(&self) -> EditLimits {
        EditLimits {
            min_duration: self.min_decision_duration,
            default_length: self.default_decision_length,
        }
    }
}

fn default_min_duration() -> f64 {
    EditLimits::default().min_duration
}

fn default_decision_length() -> f64 {
    EditLimits::default().default_length
}

/// Caption defaults
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CaptionSettings {
    /// Style of captions created by hand
    #[serde(default)]
    pub default_style: CaptionStyle,

    /// Language tag of generated caption tracks
    #[serde(default = "default_language")]
    pub default_language: String,
}

impl Default for CaptionSettings {
    fn default() -> Self {
        Self {
            default_style: CaptionStyle::default(),
            default_language: default_language(),
        }
    }
}

fn default_language() -> String {
    "en".to_string()
}

/// Voiceover defaults
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VoiceoverSettings {
    #[serde(default)]
    pub voice: Voice,

    /// Speech speed (0.25 - 4.0)
    #[serde(default = "default_speed")]
    pub speed: f64,
}

impl Default for VoiceoverSettings {
    fn default() -> Self {
        Self {
            voice: Voice::default(),
            speed: default_speed(),
        }
    }
}

fn default_speed() -> f64 {
    1.0
}

/// Transcoder settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TranscoderSettings {
    /// Explicit FFmpeg binary (detected from the system when unset)
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Parent directory for staging files (system temp dir when unset)
    #[serde(default)]
    pub work_dir: Option<PathBuf>,
}

impl TranscoderSettings {
    /// Builds an (uninitialized) FFmpeg engine from these settings
    pub fn build_runner(&self) -> FFmpegRunner {
        let mut runner = FFmpegRunner::new();
        if let Some(path) = &self.ffmpeg_path {
            runner = runner.with_ffmpeg_path(path);
        }
        if let Some(dir) = &self.work_dir {
            runner = runner.with_work_root(dir);
        }
        runner
    }
}

// =============================================================================
// Settings Manager
// =============================================================================

/// Settings manager for loading, saving, and resetting settings
pub struct SettingsManager {
    settings_path: PathBuf,
}

impl SettingsManager {
    /// Create a new settings manager storing its file in `settings_dir`
    pub fn new(settings_dir: PathBuf) -> Self {
        Self {
            settings_path: settings_dir.join(SETTINGS_FILE),
        }
    }

    fn lock_path(&self) -> PathBuf {
        self.settings_path
            .parent()
            .unwrap_or_else(|| std::path::Path::new("."))
            .join(SETTINGS_LOCK_FILE)
    }

    fn with_lock<T>(
        &self,
        exclusive: bool,
        op: impl FnOnce() -> Result<T, String>,
    ) -> Result<T, String> {
        // The lock file lives next to the settings file
        if let Some(parent) = self.settings_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create settings directory: {}", e))?;
        }

        let lock_file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(self.lock_path())
            .map_err(|e| format!("Failed to open settings lock file: {}", e))?;

        if exclusive {
            fs2::FileExt::lock_exclusive(&lock_file)
                .map_err(|e| format!("Failed to lock settings file (exclusive): {}", e))?;
        } else {
            fs2::FileExt::lock_shared(&lock_file)
                .map_err(|e| format!("Failed to lock settings file (shared): {}", e))?;
        }

        let result = op();

        if let Err(e) = fs2::FileExt::unlock(&lock_file) {
            warn!("Failed to unlock settings lock file: {}", e);
        }

        result
    }

    /// Get the settings file path
    pub fn settings_path(&self) -> &PathBuf {
        &self.settings_path
    }

    /// Load settings from disk, returning defaults if the file is missing or
    /// unreadable
    pub fn load(&self) -> AppSettings {
        let result = self.with_lock(false, || {
            if !self.settings_path.exists() {
                info!("Settings file not found, using defaults");
                return Ok(AppSettings::default());
            }

            let content = fs::read_to_string(&self.settings_path)
                .map_err(|e| format!("Failed to read settings file: {}", e))?;

            let mut settings = serde_json::from_str::<AppSettings>(&content)
                .map_err(|e| format!("Failed to parse settings file: {}", e))?;

            if settings.version < SETTINGS_VERSION {
                info!(
                    "Migrating settings from version {} to {}",
                    settings.version, SETTINGS_VERSION
                );
                settings = self.migrate(settings);
            }

            settings.normalize();
            Ok(settings)
        });

        match result {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Failed to load settings, using defaults: {}", e);
                AppSettings::default()
            }
        }
    }

    /// Save settings to disk using atomic write (temp file + rename)
    pub fn save(&self, settings: &AppSettings) -> Result<AppSettings, String> {
        self.with_lock(true, || {
            let mut normalized = settings.clone();
            normalized.normalize();

            let content = serde_json::to_string_pretty(&normalized)
                .map_err(|e| format!("Failed to serialize settings: {}", e))?;

            // std::fs::rename does not overwrite on Windows
            let temp_path = self.settings_path.with_extension("json.tmp");
            if temp_path.exists() {
                let _ = fs::remove_file(&temp_path);
            }

            let mut file = fs::File::create(&temp_path)
                .map_err(|e| format!("Failed to create temp settings file: {}", e))?;
            file.write_all(content.as_bytes())
                .map_err(|e| format!("Failed to write settings: {}", e))?;
            file.sync_all()
                .map_err(|e| format!("Failed to sync settings file: {}", e))?;

            if cfg!(windows) {
                let backup_path = self.settings_path.with_extension("json.bak");
                if backup_path.exists() {
                    let _ = fs::remove_file(&backup_path);
                }

                if self.settings_path.exists() {
                    fs::rename(&self.settings_path, &backup_path)
                        .map_err(|e| format!("Failed to backup existing settings file: {}", e))?;
                }

                match fs::rename(&temp_path, &self.settings_path) {
                    Ok(()) => {
                        if backup_path.exists() {
                            let _ = fs::remove_file(&backup_path);
                        }
                    }
                    Err(e) => {
                        if backup_path.exists() {
                            let _ = fs::rename(&backup_path, &self.settings_path);
                        }
                        return Err(format!("Failed to finalize settings file: {}", e));
                    }
                }
            } else {
                fs::rename(&temp_path, &self.settings_path)
                    .map_err(|e| format!("Failed to finalize settings file: {}", e))?;
            }

            info!("Settings saved to {:?}", self.settings_path);
            Ok(normalized)
        })
    }

    /// Reset settings to defaults and delete the settings file
    pub fn reset(&self) -> Result<AppSettings, String> {
        self.with_lock(true, || {
            if self.settings_path.exists() {
                fs::remove_file(&self.settings_path)
                    .map_err(|e| format!("Failed to delete settings file: {}", e))?;
                info!("Settings file deleted");
            }
            Ok(AppSettings::default())
        })
    }

    /// Migrate settings from older version
    fn migrate(&self, mut settings: AppSettings) -> AppSettings {
        settings.version = SETTINGS_VERSION;
        settings
    }
}
