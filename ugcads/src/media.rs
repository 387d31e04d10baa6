use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::pipeline::{validate_url, MediaRetriever, RetrievedMedia, Transcoder};
use crate::transcribe::WHISPER_SAMPLE_RATE;

/// Longest stderr excerpt carried into an error message.
const STDERR_EXCERPT: usize = 1000;

#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    duration: Option<f64>,
    description: Option<String>,
}

fn stderr_excerpt(stderr: &[u8]) -> String {
    String::from_utf8_lossy(stderr).chars().take(STDERR_EXCERPT).collect()
}

/// Metadata is optional: a failed lookup leaves duration and caption empty.
fn parse_info(success: bool, stdout: &[u8], stderr: &[u8]) -> Option<YtDlpInfo> {
    if !success {
        warn!(
            stderr = %stderr_excerpt(stderr),
            "metadata lookup failed, duration and caption will be null"
        );
        return None;
    }
    match serde_json::from_slice(stdout) {
        Ok(info) => Some(info),
        Err(e) => {
            warn!(error = %e, "unreadable metadata, duration and caption will be null");
            None
        }
    }
}

/// Fetches a video and its metadata with yt-dlp.
///
/// # Security
/// - URL is validated to start with http:// or https://
/// - Arguments are passed via `.arg()` (no shell expansion)
/// - `--no-exec` prevents yt-dlp from running post-processing commands
/// - The downloaded file path must be inside the work directory
#[derive(Debug, Default, Clone)]
pub struct YtDlpRetriever;

#[async_trait]
impl MediaRetriever for YtDlpRetriever {
    async fn retrieve(&self, url: &str, work_dir: &Path) -> Result<RetrievedMedia> {
        validate_url(url)?;

        info!(%url, "downloading video");

        if Command::new("yt-dlp").arg("--version").output().await.is_err() {
            return Err(Error::YtDlpNotFound);
        }

        std::fs::create_dir_all(work_dir)?;

        let output_template = work_dir
            .join("%(id)s.%(ext)s")
            .to_str()
            .ok_or_else(|| Error::Retrieval("work directory path contains invalid UTF-8".into()))?
            .to_string();

        let info_output = Command::new("yt-dlp")
            .args(["--dump-json", "--no-download", "--no-exec", "--no-playlist"])
            .arg(url)
            .output()
            .await?;

        let info = parse_info(
            info_output.status.success(),
            &info_output.stdout,
            &info_output.stderr,
        );

        let output = Command::new("yt-dlp")
            .args([
                "--format",
                "mp4/best",
                "--no-playlist",
                "--no-exec",
                "--quiet",
                "--no-check-certificates",
                "--geo-bypass",
                "--output",
                &output_template,
                "--print",
                "after_move:filepath",
            ])
            .arg(url)
            .output()
            .await?;

        if !output.status.success() {
            return Err(Error::Retrieval(format!(
                "yt-dlp failed: {}",
                stderr_excerpt(&output.stderr)
            )));
        }

        let printed = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let video_path = if printed.is_empty() {
            find_video_file(work_dir)?
        } else {
            let candidate = PathBuf::from(&printed);
            validate_path_in_dir(&candidate, work_dir)?;
            candidate
        };

        if !video_path.is_file() {
            return Err(Error::Retrieval(format!(
                "downloaded file not found at {}",
                video_path.display()
            )));
        }

        debug!(path = %video_path.display(), "video downloaded");

        Ok(RetrievedMedia {
            video_path,
            duration_sec: info
                .as_ref()
                .and_then(|i| i.duration)
                .filter(|d| d.is_finite() && *d >= 0.0)
                .map(|d| d as u64),
            description: info.and_then(|i| i.description),
        })
    }
}

/// Normalize a path by resolving `.` and `..` components without touching the filesystem.
fn normalize_path(path: &Path) -> PathBuf {
    use std::path::Component;
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                parts.pop();
            }
            Component::CurDir => {}
            other => parts.push(other),
        }
    }
    parts.iter().collect()
}

/// Validate that a path is inside the expected directory (prevents path traversal).
fn validate_path_in_dir(path: &Path, expected_dir: &Path) -> Result<()> {
    let canonical_dir = expected_dir
        .canonicalize()
        .unwrap_or_else(|_| normalize_path(expected_dir));
    let canonical_path = path.canonicalize().unwrap_or_else(|_| normalize_path(path));

    if canonical_path.starts_with(&canonical_dir) {
        Ok(())
    } else {
        warn!(
            path = %path.display(),
            expected_dir = %expected_dir.display(),
            "downloaded file path outside work directory"
        );
        Err(Error::Retrieval(
            "downloaded file path is outside the work directory".into(),
        ))
    }
}

/// Find the most recently modified finished download in a directory.
fn find_video_file(dir: &Path) -> Result<PathBuf> {
    let mut best: Option<(PathBuf, std::time::SystemTime)> = None;

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let partial = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| matches!(ext, "part" | "ytdl" | "pcm"));
        if partial || !path.is_file() {
            continue;
        }
        if let Ok(modified) = entry.metadata().and_then(|m| m.modified()) {
            if best.as_ref().is_none_or(|(_, t)| modified > *t) {
                best = Some((path, modified));
            }
        }
    }

    best.map(|(p, _)| p)
        .ok_or_else(|| Error::Retrieval("no video file found after download".into()))
}

/// Extracts the audio track as raw 16kHz mono s16le PCM with ffmpeg.
#[derive(Debug, Default, Clone)]
pub struct FfmpegTranscoder;

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn to_pcm(&self, video: &Path, work_dir: &Path) -> Result<PathBuf> {
        let stem = video
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio".into());
        let audio_path = work_dir.join(format!("{stem}.pcm"));

        info!(video = %video.display(), "extracting audio");

        let output = Command::new("ffmpeg")
            .args(["-nostdin", "-y", "-i"])
            .arg(video)
            .args([
                "-vn",
                "-f",
                "s16le",
                "-acodec",
                "pcm_s16le",
                "-ar",
                &WHISPER_SAMPLE_RATE.to_string(),
                "-ac",
                "1",
            ])
            .arg(&audio_path)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::Transcode("ffmpeg not found — install with: apt install ffmpeg".into())
                } else {
                    Error::Transcode(format!("failed to run ffmpeg: {e}"))
                }
            })?;

        if !output.status.success() {
            return Err(Error::Transcode(format!(
                "ffmpeg failed: {}",
                stderr_excerpt(&output.stderr)
            )));
        }

        let size = std::fs::metadata(&audio_path).map(|m| m.len()).unwrap_or(0);
        if size == 0 {
            return Err(Error::Transcode("ffmpeg produced no audio".into()));
        }

        debug!(path = %audio_path.display(), bytes = size, "audio extracted");
        Ok(audio_path)
    }
}
