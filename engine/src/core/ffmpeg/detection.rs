//! FFmpeg Detection Module
//!
//! Locates and validates the FFmpeg binary, either from an explicit path or
//! from the system installation.

use std::path::{Path, PathBuf};
use std::process::Command;

use super::{FFmpegError, FFmpegResult};

/// Information about the FFmpeg installation in use
#[derive(Debug, Clone)]
pub struct FFmpegInfo {
    /// Path to ffmpeg binary
    pub ffmpeg_path: PathBuf,
    /// FFmpeg version string
    pub version: String,
    /// Whether the path came from configuration rather than detection
    pub is_override: bool,
}

/// Uses the FFmpeg binary at an explicit path
pub fn detect_ffmpeg_at(path: &Path) -> FFmpegResult<FFmpegInfo> {
    if !path.exists() {
        return Err(FFmpegError::NotFound);
    }

    let version = get_ffmpeg_version(path)?;
    Ok(FFmpegInfo {
        ffmpeg_path: path.to_path_buf(),
        version,
        is_override: true,
    })
}

/// Detect FFmpeg from system PATH
///
/// Common install locations are checked first, then `which`/`where`.
pub fn detect_system_ffmpeg() -> FFmpegResult<FFmpegInfo> {
    let ffmpeg_path = which_ffmpeg()?;
    let version = get_ffmpeg_version(&ffmpeg_path)?;

    Ok(FFmpegInfo {
        ffmpeg_path,
        version,
        is_override: false,
    })
}

/// Detects FFmpeg, preferring an explicit path when one is configured
pub fn detect_ffmpeg(override_path: Option<&Path>) -> FFmpegResult<FFmpegInfo> {
    match override_path {
        Some(path) => detect_ffmpeg_at(path),
        None => detect_system_ffmpeg(),
    }
}

/// Find ffmpeg binary in system PATH
fn which_ffmpeg() -> FFmpegResult<PathBuf> {
    #[cfg(target_os = "windows")]
    let binary_name = "ffmpeg.exe";

    #[cfg(not(target_os = "windows"))]
    let binary_name = "ffmpeg";

    for path in get_common_ffmpeg_paths() {
        let ffmpeg_path = path.join(binary_name);
        if ffmpeg_path.exists() {
            return Ok(ffmpeg_path);
        }
    }

    #[cfg(target_os = "windows")]
    let locator = "where";

    #[cfg(not(target_os = "windows"))]
    let locator = "which";

    let output = Command::new(locator)
        .arg("ffmpeg")
        .output()
        .map_err(|_| FFmpegError::NotFound)?;

    if output.status.success() {
        let path_str = String::from_utf8_lossy(&output.stdout);
        if let Some(first_line) = path_str.lines().next() {
            let trimmed = first_line.trim();
            if !trimmed.is_empty() {
                return Ok(PathBuf::from(trimmed));
            }
        }
    }

    Err(FFmpegError::NotFound)
}

/// Get common FFmpeg installation paths for the current platform
fn get_common_ffmpeg_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    #[cfg(target_os = "windows")]
    {
        paths.push(PathBuf::from(r"C:\ffmpeg\bin"));
        paths.push(PathBuf::from(r"C:\Program Files\ffmpeg\bin"));

        // Chocolatey
        if let Ok(programdata) = std::env::var("ProgramData") {
            paths.push(PathBuf::from(programdata).join("chocolatey").join("bin"));
        }
    }

    #[cfg(target_os = "macos")]
    {
        // Homebrew
        paths.push(PathBuf::from("/opt/homebrew/bin"));
        paths.push(PathBuf::from("/usr/local/bin"));
    }

    #[cfg(target_os = "linux")]
    {
        paths.push(PathBuf::from("/usr/bin"));
        paths.push(PathBuf::from("/usr/local/bin"));
        paths.push(PathBuf::from("/snap/bin"));
    }

    paths
}

/// Get FFmpeg version string
fn get_ffmpeg_version(ffmpeg_path: &Path) -> FFmpegResult<String> {
    let output = Command::new(ffmpeg_path)
        .arg("-version")
        .output()
        .map_err(FFmpegError::ProcessError)?;

    if !output.status.success() {
        return Err(FFmpegError::ExecutionFailed(
            "Failed to get FFmpeg version".to_string(),
        ));
    }

    parse_version_output(&String::from_utf8_lossy(&output.stdout))
}

/// Parses the version from `ffmpeg -version` output
///
/// First line format: "ffmpeg version X.X.X ...". The whole first line is
/// returned if it does not follow that format.
fn parse_version_output(output: &str) -> FFmpegResult<String> {
    let first_line = output
        .lines()
        .next()
        .filter(|l| !l.trim().is_empty())
        .ok_or_else(|| FFmpegError::ParseError("Could not parse FFmpeg version".to_string()))?;

    if let Some(version_part) = first_line.strip_prefix("ffmpeg version ") {
        if let Some(version) = version_part.split_whitespace().next() {
            return Ok(version.to_string());
        }
    }
    Ok(first_line.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version_output() {
        let out = "ffmpeg version 6.1.1-3ubuntu5 Copyright (c) 2000-2023 the FFmpeg developers\nbuilt with gcc";
        assert_eq!(parse_version_output(out).unwrap(), "6.1.1-3ubuntu5");

        assert_eq!(parse_version_output("custom build\n").unwrap(), "custom build");
        assert!(matches!(
            parse_version_output(""),
            Err(FFmpegError::ParseError(_))
        ));
    }

    #[test]
    fn test_override_path_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("no-ffmpeg-here");
        assert!(matches!(
            detect_ffmpeg(Some(&missing)),
            Err(FFmpegError::NotFound)
        ));
    }

    #[test]
    fn test_detect_system_ffmpeg() {
        // Not a hard failure if FFmpeg isn't installed
        match detect_system_ffmpeg() {
            Ok(info) => {
                assert!(!info.version.is_empty());
                assert!(!info.is_override);
            }
            Err(FFmpegError::NotFound) => {
                println!("FFmpeg not found on system (expected in CI without FFmpeg)");
            }
            Err(e) => {
                println!("FFmpeg detection failed: {}", e);
            }
        }
    }
}
