//! EchoReel CLI
//!
//! Headless front end for the editing engine: subtitle conversion, keep-segment
//! resolution, export planning and FFmpeg export.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

use echoreel_lib::core::ai::{write_placeholder_tone, EdlSuggestion, Voice, VoiceoverAudioRequest};
use echoreel_lib::core::captions::{convert, SubtitleDialect};
use echoreel_lib::core::edl::{EditDecisionList, RawEditDecision};
use echoreel_lib::core::ffmpeg::create_transcoder;
use echoreel_lib::core::render::{
    resolve_keep_segments, total_duration, ExportEngine, ExportFormat, ExportPlan, ExportRequest,
    ExportSettings, Resolution,
};
use echoreel_lib::core::session::{EditingSession, NoopReleaser};
use echoreel_lib::core::settings::{default_settings_dir, AppSettings, SettingsManager};
use echoreel_lib::core::{MediaHandle, TimeRange};

#[derive(Parser, Debug)]
#[command(name = "echoreel-cli")]
#[command(version)]
#[command(about = "Headless EchoReel: captions, edit decisions and export")]
struct Cli {
    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Settings directory (defaults to the platform config dir)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert subtitles between SRT and WebVTT
    Convert {
        input: PathBuf,
        /// Target dialect
        #[arg(long, value_enum, default_value_t = Dialect::Vtt)]
        to: Dialect,
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the segments kept after applying cuts
    Keep {
        /// Recording duration in seconds
        #[arg(long)]
        duration: f64,
        /// Suggested decisions as JSON ({"edl": [...]} or a bare array)
        #[arg(long)]
        edl: Option<PathBuf>,
        /// Extra cut as START-END seconds (repeatable)
        #[arg(long = "cut", value_parser = parse_cut)]
        cuts: Vec<TimeRange>,
    },

    /// Print the FFmpeg plan for an export without running it
    Plan {
        #[command(flatten)]
        job: ExportJob,
    },

    /// Export an edited recording with FFmpeg
    Export {
        #[command(flatten)]
        job: ExportJob,
        /// Output file (defaults to the plan's output name)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write a placeholder voiceover WAV sized to the script
    Voiceover {
        /// Script text
        text: String,
        #[arg(long, value_parser = parse_wire::<Voice>)]
        voice: Option<Voice>,
        #[arg(long)]
        speed: Option<f64>,
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Show or change settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args, Debug)]
struct ExportJob {
    /// Screen recording
    video: PathBuf,
    /// Recording duration in seconds
    #[arg(long)]
    duration: f64,
    /// Recording has no audio stream
    #[arg(long)]
    no_audio: bool,
    /// Suggested decisions as JSON ({"edl": [...]} or a bare array)
    #[arg(long)]
    edl: Option<PathBuf>,
    /// Subtitles (SRT or WebVTT) to burn in
    #[arg(long)]
    captions: Option<PathBuf>,
    /// Voiceover audio replacing the recording's audio
    #[arg(long)]
    voiceover: Option<PathBuf>,
    #[arg(long, value_parser = parse_wire::<ExportFormat>)]
    format: Option<ExportFormat>,
    #[arg(long, value_parser = parse_wire::<Resolution>)]
    resolution: Option<Resolution>,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective settings
    Show,
    /// Print the settings file location
    Path,
    /// Delete the settings file
    Reset,
    /// Update individual settings
    Set {
        #[arg(long)]
        ffmpeg_path: Option<PathBuf>,
        #[arg(long)]
        work_dir: Option<PathBuf>,
        #[arg(long, value_parser = parse_wire::<ExportFormat>)]
        format: Option<ExportFormat>,
        #[arg(long, value_parser = parse_wire::<Resolution>)]
        resolution: Option<Resolution>,
        #[arg(long)]
        language: Option<String>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Dialect {
    Srt,
    Vtt,
}

impl From<Dialect> for SubtitleDialect {
    fn from(dialect: Dialect) -> Self {
        match dialect {
            Dialect::Srt => SubtitleDialect::Srt,
            Dialect::Vtt => SubtitleDialect::WebVtt,
        }
    }
}

/// Decisions file: the flow output or just its array
#[derive(Deserialize)]
#[serde(untagged)]
enum EdlFile {
    Wrapped(EdlSuggestion),
    Bare(Vec<RawEditDecision>),
}

impl EdlFile {
    fn into_decisions(self) -> Vec<RawEditDecision> {
        match self {
            EdlFile::Wrapped(suggestion) => suggestion.edl,
            EdlFile::Bare(edl) => edl,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct KeepReport {
    cuts: Vec<TimeRange>,
    keep: Vec<TimeRange>,
    kept_duration: f64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PlanReport {
    plan: ExportPlan,
    args: Vec<String>,
}

// =============================================================================
// Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let manager = settings_manager(cli.config_dir.as_deref())?;

    match cli.command {
        Command::Convert { input, to, output } => convert_subtitles(&input, to, output.as_deref()),
        Command::Keep {
            duration,
            edl,
            cuts,
        } => keep_segments(duration, edl.as_deref(), cuts),
        Command::Plan { job } => {
            let settings = manager.load();
            let session = build_session(&job, &settings)?;
            let request = export_request(&session, &job, &settings)?;
            let plan = ExportPlan::build(&request)?;
            let args = plan.to_ffmpeg_args();
            print_json(&PlanReport { plan, args })
        }
        Command::Export { job, output } => {
            let settings = manager.load();
            export(&job, output, &settings).await
        }
        Command::Voiceover {
            text,
            voice,
            speed,
            output,
        } => {
            let settings = manager.load();
            let request = VoiceoverAudioRequest::new(text)
                .with_voice(voice.unwrap_or(settings.voiceover.voice))
                .with_speed(speed.unwrap_or(settings.voiceover.speed));
            request.validate()?;
            let duration = write_placeholder_tone(&output, &request.text, request.speed)?;
            println!("{} ({:.2}s, voice {})", output.display(), duration, request.voice);
            Ok(())
        }
        Command::Config { action } => configure(&manager, action),
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::prelude::*;

    let default_level = if verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    // stdout carries command output
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .try_init();
}

fn settings_manager(config_dir: Option<&Path>) -> Result<SettingsManager> {
    let dir = match config_dir {
        Some(dir) => dir.to_path_buf(),
        None => default_settings_dir()
            .ok_or_else(|| anyhow!("No config directory on this platform; pass --config-dir"))?,
    };
    Ok(SettingsManager::new(dir))
}

// =============================================================================
// Commands
// =============================================================================

fn convert_subtitles(input: &Path, to: Dialect, output: Option<&Path>) -> Result<()> {
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let converted = convert(&text, to.into());

    match output {
        Some(path) => {
            std::fs::write(path, &converted)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote {}", path.display());
        }
        None => println!("{}", converted),
    }
    Ok(())
}

fn keep_segments(duration: f64, edl: Option<&Path>, extra_cuts: Vec<TimeRange>) -> Result<()> {
    if !(duration.is_finite() && duration > 0.0) {
        bail!("Duration must be a positive number of seconds");
    }

    let mut list = EditDecisionList::new(duration);
    if let Some(path) = edl {
        let report = list.replace_from_ai(read_edl(path)?);
        if report.dropped > 0 {
            warn!("Ignored {} invalid decisions", report.dropped);
        }
    }

    let mut cuts = list.cuts();
    cuts.extend(extra_cuts);
    let keep = resolve_keep_segments(duration, &cuts);
    let kept_duration = total_duration(&keep);

    print_json(&KeepReport {
        cuts,
        keep,
        kept_duration,
    })
}

async fn export(job: &ExportJob, output: Option<PathBuf>, settings: &AppSettings) -> Result<()> {
    let session = build_session(job, settings)?;
    let request = export_request(&session, job, settings)?;

    let transcoder = create_transcoder(Box::new(settings.transcoder.build_runner()));
    let engine = ExportEngine::new(transcoder.clone());

    let (progress_tx, mut progress_rx) = mpsc::channel::<f64>(32);
    let printer = tokio::spawn(async move {
        while let Some(fraction) = progress_rx.recv().await {
            eprint!("\rExporting... {:>5.1}%", fraction * 100.0);
        }
        eprintln!();
    });

    let result = engine.export(&request, Some(progress_tx)).await;
    let _ = printer.await;
    transcoder.lock().await.dispose().await;

    let exported = result?;
    for warning in &exported.warnings {
        warn!("{}", warning);
    }

    let path = output.unwrap_or_else(|| PathBuf::from(&exported.file_name));
    tokio::fs::write(&path, &exported.data)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!(
        "{} ({:.2}s, {} bytes)",
        path.display(),
        exported.duration_sec,
        exported.data.len()
    );
    Ok(())
}

fn configure(manager: &SettingsManager, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => print_json(&manager.load()),
        ConfigAction::Path => {
            println!("{}", manager.settings_path().display());
            Ok(())
        }
        ConfigAction::Reset => {
            let settings = manager.reset().map_err(|e| anyhow!(e))?;
            print_json(&settings)
        }
        ConfigAction::Set {
            ffmpeg_path,
            work_dir,
            format,
            resolution,
            language,
        } => {
            let mut settings = manager.load();
            if let Some(path) = ffmpeg_path {
                settings.transcoder.ffmpeg_path = Some(path);
            }
            if let Some(dir) = work_dir {
                settings.transcoder.work_dir = Some(dir);
            }
            if let Some(format) = format {
                settings.export.format = format;
            }
            if let Some(resolution) = resolution {
                settings.export.resolution = resolution;
            }
            if let Some(language) = language {
                settings.captions.default_language = language;
            }
            let saved = manager.save(&settings).map_err(|e| anyhow!(e))?;
            print_json(&saved)
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn build_session(job: &ExportJob, settings: &AppSettings) -> Result<EditingSession> {
    let mut video = MediaHandle::new(job.video.to_string_lossy(), job.duration);
    if job.no_audio {
        video = video.without_audio();
    }

    let mut session = EditingSession::from_settings(settings, Box::new(NoopReleaser));
    session.load_recording(video);

    if let Some(path) = &job.edl {
        let report = session.edl_mut().replace_from_ai(read_edl(path)?);
        if report.dropped > 0 {
            warn!("Ignored {} invalid decisions", report.dropped);
        }
    }

    if let Some(path) = &job.captions {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Subtitles".to_string());
        let language = settings.captions.default_language.clone();
        session
            .captions_mut()
            .ingest_subtitles(&text, &name, &language);
    }

    Ok(session)
}

fn export_request(
    session: &EditingSession,
    job: &ExportJob,
    settings: &AppSettings,
) -> Result<ExportRequest> {
    let export_settings = ExportSettings {
        format: job.format.unwrap_or(settings.export.format),
        resolution: job.resolution.unwrap_or(settings.export.resolution),
    };

    let mut request = session.export_request(export_settings)?;
    if let Some(path) = &job.voiceover {
        request = request.with_auxiliary_audio(MediaHandle::new(path.to_string_lossy(), 0.0));
    }
    Ok(request)
}

fn read_edl(path: &Path) -> Result<Vec<RawEditDecision>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let file: EdlFile = serde_json::from_str(&text)
        .with_context(|| format!("{} is not a decision list", path.display()))?;
    Ok(file.into_decisions())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Parses a value by its wire name (e.g. "webm", "720p", "nova")
fn parse_wire<T: DeserializeOwned>(value: &str) -> Result<T, String> {
    serde_json::from_value(serde_json::Value::String(value.trim().to_ascii_lowercase()))
        .map_err(|_| format!("unsupported value '{}'", value))
}

fn parse_cut(value: &str) -> Result<TimeRange, String> {
    let (start, end) = value
        .split_once('-')
        .ok_or_else(|| format!("expected START-END, got '{}'", value))?;
    let start: f64 = start
        .trim()
        .parse()
        .map_err(|_| format!("invalid start '{}'", start))?;
    let end: f64 = end
        .trim()
        .parse()
        .map_err(|_| format!("invalid end '{}'", end))?;
    Ok(TimeRange::new(start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cut() {
        assert_eq!(parse_cut("1.5-4").unwrap(), TimeRange::new(1.5, 4.0));
        assert!(parse_cut("4").is_err());
        assert!(parse_cut("a-b").is_err());
    }

    #[test]
    fn test_parse_wire_names() {
        assert_eq!(parse_wire::<ExportFormat>("WebM").unwrap(), ExportFormat::Webm);
        assert_eq!(parse_wire::<Resolution>("4k").unwrap(), Resolution::P2160);
        assert_eq!(parse_wire::<Voice>("shimmer").unwrap(), Voice::Shimmer);
        assert!(parse_wire::<ExportFormat>("avi").is_err());
    }

    #[test]
    fn test_edl_file_accepts_both_shapes() {
        let wrapped: EdlFile =
            serde_json::from_str(r#"{"edl":[{"startTime":1,"endTime":2,"action":"cut"}]}"#)
                .unwrap();
        let bare: EdlFile =
            serde_json::from_str(r#"[{"startTime":1,"endTime":2,"action":"cut"}]"#).unwrap();

        assert_eq!(wrapped.into_decisions().len(), 1);
        assert_eq!(bare.into_decisions().len(), 1);
    }

    #[test]
    fn test_cli_parses_export_job() {
        let cli = Cli::try_parse_from([
            "echoreel-cli",
            "plan",
            "rec.webm",
            "--duration",
            "30",
            "--format",
            "webm",
        ])
        .unwrap();

        match cli.command {
            Command::Plan { job } => {
                assert_eq!(job.duration, 30.0);
                assert_eq!(job.format, Some(ExportFormat::Webm));
                assert!(job.resolution.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
