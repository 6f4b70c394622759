//! # ffmpeg Subprocess Layer
//!
//! All container/codec work (demuxing the audio track out of a video,
//! cutting video segments, concatenating them) is delegated to an
//! external `ffmpeg` executable. This module locates the binary once per
//! process and wraps the handful of invocations the pipelines need.
//!
//! Argument construction is split from process execution so the exact
//! command lines are unit-testable without ffmpeg installed.

use crate::error::AppError;
use once_cell::sync::Lazy;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

#[cfg(not(windows))]
const EXECUTABLE_NAME: &str = "ffmpeg";

#[cfg(windows)]
const EXECUTABLE_NAME: &str = "ffmpeg.exe";

static FFMPEG_PATH: Lazy<Option<PathBuf>> = Lazy::new(find_ffmpeg_internal);

/// Locate ffmpeg, checking PATH, the working directory, and the directory
/// of the running executable. Resolved once per process.
pub fn find_ffmpeg() -> Option<PathBuf> {
    FFMPEG_PATH.clone()
}

fn find_ffmpeg_internal() -> Option<PathBuf> {
    if let Ok(path) = which::which(EXECUTABLE_NAME) {
        tracing::debug!(path = %path.display(), "found ffmpeg in PATH");
        return Some(path);
    }

    if let Ok(cwd) = std::env::current_dir() {
        let candidate = cwd.join(EXECUTABLE_NAME);
        if candidate.is_file() {
            tracing::debug!(path = %candidate.display(), "found ffmpeg in working directory");
            return Some(candidate);
        }
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(folder) = exe.parent() {
            let candidate = folder.join(EXECUTABLE_NAME);
            if candidate.is_file() {
                tracing::debug!(path = %candidate.display(), "found ffmpeg next to executable");
                return Some(candidate);
            }
        }
    }

    tracing::warn!("ffmpeg not found; video sessions will fail");
    None
}

/// How an ffmpeg invocation can fail. Callers match on this to decide
/// whether a failure is the client's media or an operational problem.
#[derive(Debug)]
pub enum FfmpegError {
    /// No executable could be located
    NotFound,
    /// The process could not be started
    Spawn(std::io::Error),
    /// The process ran and exited unsuccessfully
    Failed { status: ExitStatus, stderr: String },
}

impl fmt::Display for FfmpegError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FfmpegError::NotFound => write!(f, "ffmpeg executable not found"),
            FfmpegError::Spawn(e) => write!(f, "failed to spawn ffmpeg: {}", e),
            FfmpegError::Failed { status, stderr } => write!(
                f,
                "ffmpeg exited with {}: {}",
                status,
                stderr.lines().last().unwrap_or("no output")
            ),
        }
    }
}

impl std::error::Error for FfmpegError {}

/// Absent a more specific classification by the caller, an ffmpeg failure
/// is an operational error.
impl From<FfmpegError> for AppError {
    fn from(err: FfmpegError) -> Self {
        AppError::Storage(err.to_string())
    }
}

/// Run ffmpeg with `args`, capturing stderr for the error message.
fn run(args: &[String]) -> Result<(), FfmpegError> {
    let ffmpeg = find_ffmpeg().ok_or(FfmpegError::NotFound)?;

    tracing::debug!(?args, "running ffmpeg");
    let output = Command::new(ffmpeg)
        .args(args)
        .output()
        .map_err(FfmpegError::Spawn)?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        tracing::error!(status = ?output.status, "ffmpeg failed: {}", stderr);
        return Err(FfmpegError::Failed {
            status: output.status,
            stderr,
        });
    }

    Ok(())
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Arguments to demux and normalize a media file's audio track into a mono
/// 16-bit PCM WAV (the `-ac 1`/`pcm_s16le` combination the service has
/// always used for recognition input).
pub fn extract_audio_args(source: &Path, dest: &Path) -> Vec<String> {
    vec![
        "-y".into(),
        "-i".into(),
        path_arg(source),
        "-vn".into(),
        "-ac".into(),
        "1".into(),
        "-acodec".into(),
        "pcm_s16le".into(),
        path_arg(dest),
    ]
}

/// Arguments to cut `[start, start+duration)` out of a video with
/// stream-copied interiors. Extraction points are expressed in stream time
/// (seconds), never frame counts, so concatenated cuts cannot accumulate
/// frame-arithmetic drift.
pub fn cut_segment_args(source: &Path, start: f64, duration: f64, dest: &Path) -> Vec<String> {
    vec![
        "-y".into(),
        "-ss".into(),
        format!("{:.3}", start),
        "-i".into(),
        path_arg(source),
        "-t".into(),
        format!("{:.3}", duration),
        "-c".into(),
        "copy".into(),
        "-avoid_negative_ts".into(),
        "make_zero".into(),
        path_arg(dest),
    ]
}

/// Arguments to concatenate segments listed in an ffmpeg concat-demuxer
/// list file, stream-copying both tracks.
pub fn concat_args(list_file: &Path, dest: &Path) -> Vec<String> {
    vec![
        "-y".into(),
        "-f".into(),
        "concat".into(),
        "-safe".into(),
        "0".into(),
        "-i".into(),
        path_arg(list_file),
        "-c".into(),
        "copy".into(),
        path_arg(dest),
    ]
}

/// Demux `source`'s audio track into a mono 16-bit PCM WAV at `dest`.
pub fn extract_audio(source: &Path, dest: &Path) -> Result<(), FfmpegError> {
    run(&extract_audio_args(source, dest))
}

/// Cut one sub-interval of `source` into `dest`.
pub fn cut_segment(source: &Path, start: f64, duration: f64, dest: &Path) -> Result<(), FfmpegError> {
    run(&cut_segment_args(source, start, duration, dest))
}

/// Concatenate the segments in `list_file` into `dest`.
pub fn concat_segments(list_file: &Path, dest: &Path) -> Result<(), FfmpegError> {
    run(&concat_args(list_file, dest))
}

/// Body of a concat-demuxer list file for `segments`, in order.
pub fn concat_list_body(segments: &[PathBuf]) -> String {
    segments
        .iter()
        .map(|p| format!("file '{}'\n", p.to_string_lossy()))
        .collect()
}
