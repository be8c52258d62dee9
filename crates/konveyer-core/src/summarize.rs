//! Transcript summarization through an AI provider's chat-completions API.

use std::path::Path;

use tokio::fs;

use crate::error::{KonveyerError, Result};
use crate::format::format_transcript_with_timestamps;
use crate::provider::Provider;
use crate::types::{Transcript, VideoSummary};

/// Generate a structured summary of a transcript.
pub async fn summarize_transcript(
    transcript: &Transcript,
    provider: &Provider,
    summary_lang: &str,
) -> Result<VideoSummary> {
    let config = provider.config();
    let api_key = provider.validate_api_key()?;

    let duration_minutes = transcript.duration_seconds() / 60.0;
    let formatted_transcript = format_transcript_with_timestamps(transcript);

    let system_prompt = format!(
        r#"You are a video content summarizer. Your task is to condense video transcripts into short structured summaries.

IMPORTANT: Write ALL text content (title, summary, topics, takeaways) in {lang} language.

You MUST output ONLY valid JSON matching this exact structure (no markdown, no explanation):
{{
  "title": "Descriptive title for the video",
  "summary": "3-5 sentence summary of the entire video content",
  "duration_minutes": <number>,
  "language": "{lang}",
  "topics": ["topic1", "topic2", "topic3"],
  "key_takeaways": ["takeaway1", "takeaway2", "takeaway3"]
}}

Rules:
- Topics should be the main subjects covered (3-7 items)
- Key takeaways should be the concrete points a viewer leaves with (3-7 items)
- Output ONLY the JSON, nothing else"#,
        lang = summary_lang
    );

    let user_prompt = format!(
        "Summarize this video transcript (duration: {:.1} minutes, language: {}):\n\n{}",
        duration_minutes, transcript.language, formatted_transcript
    );

    let response = reqwest::Client::new()
        .post(config.api_url)
        .header("Content-Type", "application/json")
        .header("Authorization", format!("Bearer {}", api_key))
        .json(&serde_json::json!({
            "model": config.model,
            "messages": [
                {
                    "role": "system",
                    "content": &system_prompt,
                },
                {
                    "role": "user",
                    "content": user_prompt,
                },
            ],
            "temperature": 0.3,
        }))
        .send()
        .await?
        .json::<serde_json::Value>()
        .await?;

    let content = response["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| KonveyerError::SummaryFailed {
            reason: format!("Invalid API response: {:?}", response),
        })?;

    let summary: VideoSummary = serde_json::from_str(content)?;
    Ok(summary)
}

/// Save a summary to a file.
pub async fn save_summary(summary: &VideoSummary, path: &Path) -> Result<()> {
    let pretty_json = serde_json::to_string_pretty(summary)?;
    fs::write(path, &pretty_json).await?;
    Ok(())
}

/// Load a summary from a cached file.
pub async fn load_summary(path: &Path) -> Result<VideoSummary> {
    let json = fs::read_to_string(path).await?;
    let summary: VideoSummary = serde_json::from_str(&json)?;
    Ok(summary)
}
