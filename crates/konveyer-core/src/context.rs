//! Context artifacts: one JSON record per processed video plus a combined
//! plain-text index (`context.txt`) suitable for feeding to an assistant.

use std::path::{Path, PathBuf};

use chrono::Local;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::info;

use crate::error::Result;
use crate::types::{Transcript, VideoMetadata};

/// One context record, serialized as `context-<video_id>.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextRecord {
    pub video_url: String,
    pub video_id: String,
    pub video_title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_recording_time: Option<String>,
    pub transcription_time: String,
    pub whisper_model: String,
    pub transcription: String,
}

/// Path of the context record for a video id.
pub fn context_record_path(context_dir: &Path, video_id: &str) -> PathBuf {
    context_dir.join(format!("context-{video_id}.json"))
}

/// Render the transcription block: metadata header, optional description,
/// then the transcript text.
pub fn format_context_block(
    url: &str,
    metadata: &VideoMetadata,
    transcript: &Transcript,
) -> String {
    let mut block = String::new();

    block.push_str(&format!("Video URL: {url}\n"));
    block.push_str(&format!("Video Title: {}\n", metadata.title));
    block.push_str(&format!(
        "Channel: {}\n",
        metadata.uploader.as_deref().unwrap_or("Unknown")
    ));
    block.push_str(&format!(
        "Upload Date: {}\n",
        metadata.upload_date.as_deref().unwrap_or("Unknown")
    ));
    if let Some(duration) = metadata.duration {
        block.push_str(&format!("Duration: {duration:.0} seconds\n"));
    }
    if let Some(views) = metadata.view_count {
        block.push_str(&format!("Views: {views}\n"));
    }
    block.push_str(&format!("Detected Language: {}\n", transcript.language));
    block.push('\n');

    if let Some(description) = metadata.description.as_deref() {
        if !description.is_empty() {
            block.push_str("=== Video Description ===\n\n");
            // First 500 chars, matching what the metadata fetch keeps around.
            let cut = description
                .char_indices()
                .nth(500)
                .map(|(idx, _)| idx)
                .unwrap_or(description.len());
            block.push_str(&description[..cut]);
            block.push_str("\n\n");
        }
    }

    block.push_str("=== Transcription ===\n\n");
    block.push_str(transcript.text.trim());
    block.push('\n');

    block
}

/// Write the context record for one processed video.
pub async fn write_context_record(
    context_dir: &Path,
    url: &str,
    metadata: &VideoMetadata,
    transcript: &Transcript,
    whisper_model: &str,
) -> Result<PathBuf> {
    fs::create_dir_all(context_dir).await?;

    let record = ContextRecord {
        video_url: url.to_string(),
        video_id: metadata.id.clone(),
        video_title: metadata.title.clone(),
        video_recording_time: metadata.upload_date_iso(),
        transcription_time: Local::now().format("%Y-%m-%dT%H:%M:%S").to_string(),
        whisper_model: whisper_model.to_string(),
        transcription: format_context_block(url, metadata, transcript),
    };

    let path = context_record_path(context_dir, &metadata.id);
    let json = serde_json::to_string_pretty(&record)?;
    fs::write(&path, json).await?;

    info!(path = %path.display(), "wrote context record");
    Ok(path)
}

/// Regenerate the combined index from every record in the context
/// directory. Records are concatenated in filename order so the output is
/// deterministic across runs. Returns the number of records included.
pub async fn rebuild_context_index(context_dir: &Path, index_path: &Path) -> Result<usize> {
    let mut record_paths = Vec::new();
    let mut entries = match fs::read_dir(context_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            fs::write(index_path, "").await?;
            return Ok(0);
        }
        Err(e) => return Err(e.into()),
    };
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with("context-") && name.ends_with(".json") {
            record_paths.push(path);
        }
    }
    record_paths.sort();

    let mut index = String::new();
    for path in &record_paths {
        let json = fs::read_to_string(path).await?;
        let record: ContextRecord = serde_json::from_str(&json)?;

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        index.push_str(&format!("\n# Context from: {filename}\n"));
        index.push_str(&format!("# Video: {}\n", record.video_title));
        index.push_str(&format!("# Source: {}\n", record.video_url));
        index.push_str(&"-".repeat(80));
        index.push_str("\n\n");
        index.push_str(&record.transcription);
        index.push('\n');
        index.push_str(&"=".repeat(80));
        index.push('\n');
    }

    fs::write(index_path, index).await?;
    info!(count = record_paths.len(), path = %index_path.display(), "rebuilt context index");
    Ok(record_paths.len())
}
