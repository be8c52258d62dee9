//! Delegation to the external tools: yt-dlp, ffmpeg, whisper, and the
//! pose analyzer. Each call is one subprocess invocation; failures are
//! classified into the run error taxonomy from exit status and stderr.

use std::path::{Path, PathBuf};
use std::process::Output;

use tokio::{fs, process::Command};
use tracing::{debug, info};

use crate::error::{KonveyerError, Result};
use crate::types::{Transcript, VideoMetadata};

/// External binary performing body-language analysis. Treated as an opaque
/// capability: it takes a video file and writes per-frame JSON annotations.
pub const POSE_ANALYZER_BIN: &str = "pose-analyzer";

// stderr substrings that mark a failure as retry-eligible.
const TRANSIENT_MARKERS: &[&str] = &[
    "429",
    "rate limit",
    "rate-limit",
    "timed out",
    "timeout",
    "connection reset",
    "connection refused",
    "temporary failure",
    "network is unreachable",
    "unable to download webpage",
];

fn stderr_is_transient(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    TRANSIENT_MARKERS.iter().any(|m| lower.contains(m))
}

fn truncate_reason(stderr: &str) -> String {
    let trimmed = stderr.trim();
    match trimmed.char_indices().nth(400) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

/// Run a delegate command; a missing binary surfaces as
/// `DependencyUnavailable` rather than a bare IO error.
async fn run_tool(tool: &str, command: &mut Command) -> Result<Output> {
    debug!(tool, "invoking delegate");
    match command.output().await {
        Ok(output) => Ok(output),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(KonveyerError::DependencyUnavailable {
                tool: tool.to_string(),
                reason: "binary not found on PATH".to_string(),
            })
        }
        Err(e) => Err(e.into()),
    }
}

/// Fetch video metadata without downloading anything.
pub async fn fetch_metadata(url: &str) -> Result<VideoMetadata> {
    let output = run_tool(
        "yt-dlp",
        Command::new("yt-dlp")
            .arg(url)
            .arg("--dump-json")
            .arg("--skip-download")
            .arg("--no-playlist")
            .arg("--no-warnings"),
    )
    .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr_is_transient(&stderr) {
            return Err(KonveyerError::TransientFailure {
                url: url.to_string(),
                reason: truncate_reason(&stderr),
            });
        }
        return Err(KonveyerError::MetadataFailed {
            url: url.to_string(),
            reason: truncate_reason(&stderr),
        });
    }

    let metadata: VideoMetadata = serde_json::from_slice(&output.stdout)?;
    Ok(metadata)
}

/// Download the best audio stream and convert it to mp3. The output name
/// is derived from the video id so re-runs hit the same path.
pub async fn download_audio(url: &str, video_id: &str, out_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(out_dir).await?;
    let template = out_dir.join(format!("{video_id}.%(ext)s"));
    let audio_path = out_dir.join(format!("{video_id}.mp3"));

    let output = run_tool(
        "yt-dlp",
        Command::new("yt-dlp")
            .arg(url)
            .arg("-f")
            .arg("bestaudio/best")
            .arg("--extract-audio")
            .arg("--audio-format")
            .arg("mp3")
            .arg("--audio-quality")
            .arg("192K")
            .arg("--no-playlist")
            .arg("--no-warnings")
            .arg("-o")
            .arg(&template),
    )
    .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr_is_transient(&stderr) {
            return Err(KonveyerError::TransientFailure {
                url: url.to_string(),
                reason: truncate_reason(&stderr),
            });
        }
        return Err(KonveyerError::DownloadFailed {
            url: url.to_string(),
            reason: truncate_reason(&stderr),
        });
    }

    if !fs::try_exists(&audio_path).await.unwrap_or(false) {
        return Err(KonveyerError::DownloadFailed {
            url: url.to_string(),
            reason: format!("expected audio file missing: {}", audio_path.display()),
        });
    }

    info!(url, path = %audio_path.display(), "downloaded audio");
    Ok(audio_path)
}

/// Download the full video (mp4 preferred) and return the file path
/// yt-dlp reports after post-processing.
pub async fn download_video(url: &str, video_id: &str, out_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(out_dir).await?;
    let template = out_dir.join(format!("{video_id}.%(ext)s"));

    let output = run_tool(
        "yt-dlp",
        Command::new("yt-dlp")
            .arg(url)
            .arg("--print")
            .arg("after_move:filepath")
            .arg("-f")
            .arg("best[ext=mp4]/best")
            .arg("--no-playlist")
            .arg("--no-warnings")
            .arg("-o")
            .arg(&template),
    )
    .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr_is_transient(&stderr) {
            return Err(KonveyerError::TransientFailure {
                url: url.to_string(),
                reason: truncate_reason(&stderr),
            });
        }
        return Err(KonveyerError::DownloadFailed {
            url: url.to_string(),
            reason: truncate_reason(&stderr),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let filepath = stdout.trim();
    if filepath.is_empty() {
        return Err(KonveyerError::DownloadFailed {
            url: url.to_string(),
            reason: "yt-dlp reported no output file".to_string(),
        });
    }

    info!(url, path = filepath, "downloaded video");
    Ok(PathBuf::from(filepath))
}

/// Re-encode to mono 16 kHz wav, the input format whisper expects.
pub async fn extract_audio(input: &Path, wav_path: &Path) -> Result<()> {
    let output = run_tool(
        "ffmpeg",
        Command::new("ffmpeg")
            .arg("-y")
            .arg("-i")
            .arg(input)
            .arg("-vn")
            .arg("-acodec")
            .arg("pcm_s16le")
            .arg("-ar")
            .arg("16000")
            .arg("-ac")
            .arg("1")
            .arg(wav_path),
    )
    .await?;

    if !output.status.success() {
        return Err(KonveyerError::AudioExtractionFailed {
            input: input.to_path_buf(),
            reason: truncate_reason(&String::from_utf8_lossy(&output.stderr)),
        });
    }

    Ok(())
}

/// Transcribe with the whisper CLI, producing a JSON transcript at
/// `transcript_path`.
pub async fn transcribe_audio(
    audio_path: &Path,
    transcript_path: &Path,
    model: &str,
) -> Result<Transcript> {
    let output_dir = transcript_path.parent().unwrap_or(Path::new("."));
    fs::create_dir_all(output_dir).await?;

    let output = run_tool(
        "whisper",
        Command::new("whisper")
            .arg(audio_path)
            .arg("--model")
            .arg(model)
            .arg("--output_format")
            .arg("json")
            .arg("--output_dir")
            .arg(output_dir),
    )
    .await?;

    if !output.status.success() {
        return Err(KonveyerError::TranscriptFailed {
            audio_path: audio_path.to_path_buf(),
            reason: truncate_reason(&String::from_utf8_lossy(&output.stderr)),
        });
    }

    // Whisper names its output after the input file stem.
    let stem = audio_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "audio".to_string());
    let whisper_output = output_dir.join(format!("{stem}.json"));
    if whisper_output != transcript_path {
        fs::rename(&whisper_output, transcript_path).await?;
    }

    load_transcript(transcript_path).await
}

/// Load a transcript from a cached file.
pub async fn load_transcript(path: &Path) -> Result<Transcript> {
    let json = fs::read_to_string(path).await?;
    let transcript: Transcript = serde_json::from_str(&json)?;
    Ok(transcript)
}

/// Run the external pose analyzer over a downloaded video, producing
/// per-frame annotations at `report_path`.
pub async fn analyze_pose(video_path: &Path, report_path: &Path) -> Result<()> {
    let output = run_tool(
        POSE_ANALYZER_BIN,
        Command::new(POSE_ANALYZER_BIN)
            .arg(video_path)
            .arg("--output")
            .arg(report_path),
    )
    .await?;

    if !output.status.success() {
        return Err(KonveyerError::PoseAnalysisFailed {
            video_path: video_path.to_path_buf(),
            reason: truncate_reason(&String::from_utf8_lossy(&output.stderr)),
        });
    }

    if !fs::try_exists(report_path).await.unwrap_or(false) {
        return Err(KonveyerError::PoseAnalysisFailed {
            video_path: video_path.to_path_buf(),
            reason: format!("analyzer wrote no report at {}", report_path.display()),
        });
    }

    Ok(())
}
