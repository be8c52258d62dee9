//! Per-item processing: one URL in, one `ProcessingResult` out.
//!
//! The handler is the seam the batch controller drives. `DelegateHandler`
//! is the production implementation that chains the external tools for the
//! selected mode; tests drive the controller with scripted handlers.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tracing::info;

use crate::context;
use crate::error::{KonveyerError, Result};
use crate::links;
use crate::pipeline;
use crate::provider::Provider;
use crate::summarize;
use crate::types::{ProcessingResult, Transcript, WorkItem};

/// What to do with each URL. One fixed set, resolved at startup.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ProcessMode {
    /// Download the audio track as mp3 and stop.
    AudioOnly,
    /// Download, convert and transcribe with whisper.
    #[default]
    Transcribe,
    /// Transcribe, then summarize via an AI provider.
    Summarize,
    /// Transcribe and emit a context record plus combined index.
    Context,
    /// Download the video and run the external pose analyzer.
    BodyLanguage,
}

impl ProcessMode {
    pub fn label(&self) -> &'static str {
        match self {
            ProcessMode::AudioOnly => "audio-only",
            ProcessMode::Transcribe => "transcribe",
            ProcessMode::Summarize => "summarize",
            ProcessMode::Context => "context",
            ProcessMode::BodyLanguage => "body-language",
        }
    }
}

#[derive(Clone, Debug)]
pub struct HandlerOptions {
    pub output_dir: PathBuf,
    pub overwrite: bool,
    pub whisper_model: String,
    pub provider: Provider,
    /// Summary language; defaults to the transcript's detected language.
    pub summary_lang: Option<String>,
}

impl Default for HandlerOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("konveyer_output"),
            overwrite: false,
            whisper_model: "base".to_string(),
            provider: Provider::default(),
            summary_lang: None,
        }
    }
}

/// Processes exactly one work item. Implementations must not mutate state
/// outside their output directory.
#[async_trait]
pub trait ItemHandler: Send + Sync {
    async fn process(&self, item: &WorkItem) -> Result<ProcessingResult>;
}

/// Production handler: validates the URL, then delegates to the external
/// tool chain for the selected mode. Artifacts are named from the video id
/// so re-runs are idempotent; with `overwrite` unset, items whose terminal
/// artifact already exists are skipped without touching the network.
pub struct DelegateHandler {
    mode: ProcessMode,
    options: HandlerOptions,
}

impl DelegateHandler {
    pub fn new(mode: ProcessMode, options: HandlerOptions) -> Self {
        Self { mode, options }
    }

    pub fn mode(&self) -> ProcessMode {
        self.mode
    }

    fn terminal_artifact(&self, video_id: &str) -> PathBuf {
        let out = &self.options.output_dir;
        match self.mode {
            ProcessMode::AudioOnly => out.join(format!("{video_id}.mp3")),
            ProcessMode::Transcribe => out.join(format!("{video_id}.json")),
            ProcessMode::Summarize => out.join(format!("{video_id}.summary.json")),
            ProcessMode::Context => context::context_record_path(&out.join("context"), video_id),
            ProcessMode::BodyLanguage => out.join(format!("{video_id}.pose.json")),
        }
    }

    /// Shared front of the transcribe/summarize/context modes. Reuses a
    /// cached transcript when overwrite is off.
    async fn transcribe_chain(
        &self,
        url: &str,
        video_id: &str,
    ) -> Result<(PathBuf, Transcript)> {
        let out = &self.options.output_dir;
        let transcript_path = out.join(format!("{video_id}.json"));

        if !self.options.overwrite && fs::try_exists(&transcript_path).await.unwrap_or(false) {
            let transcript = pipeline::load_transcript(&transcript_path).await?;
            info!(url, "reusing cached transcript");
            return Ok((transcript_path, transcript));
        }

        let mp3 = pipeline::download_audio(url, video_id, out).await?;
        let wav = out.join(format!("{video_id}.wav"));
        pipeline::extract_audio(&mp3, &wav).await?;
        let transcript =
            pipeline::transcribe_audio(&wav, &transcript_path, &self.options.whisper_model).await?;
        // The intermediate wav is only whisper input.
        let _ = fs::remove_file(&wav).await;

        Ok((transcript_path, transcript))
    }

    async fn run_audio_only(&self, item: &WorkItem, video_id: &str) -> Result<ProcessingResult> {
        let mp3 = pipeline::download_audio(&item.url, video_id, &self.options.output_dir).await?;
        Ok(ProcessingResult::succeeded(item.index, &item.url, vec![mp3]))
    }

    async fn run_transcribe(&self, item: &WorkItem, video_id: &str) -> Result<ProcessingResult> {
        let (transcript_path, transcript) = self.transcribe_chain(&item.url, video_id).await?;
        Ok(
            ProcessingResult::succeeded(item.index, &item.url, vec![transcript_path])
                .with_duration(transcript.duration_seconds())
                .with_language(&transcript.language),
        )
    }

    async fn run_summarize(&self, item: &WorkItem, video_id: &str) -> Result<ProcessingResult> {
        let (transcript_path, transcript) = self.transcribe_chain(&item.url, video_id).await?;

        let lang = self
            .options
            .summary_lang
            .clone()
            .unwrap_or_else(|| transcript.language.clone());
        let summary =
            summarize::summarize_transcript(&transcript, &self.options.provider, &lang).await?;

        let summary_path = self
            .options
            .output_dir
            .join(format!("{video_id}.summary.json"));
        summarize::save_summary(&summary, &summary_path).await?;

        Ok(
            ProcessingResult::succeeded(item.index, &item.url, vec![transcript_path, summary_path])
                .with_duration(transcript.duration_seconds())
                .with_language(&transcript.language),
        )
    }

    async fn run_context(&self, item: &WorkItem, video_id: &str) -> Result<ProcessingResult> {
        let metadata = pipeline::fetch_metadata(&item.url).await?;
        let (transcript_path, transcript) = self.transcribe_chain(&item.url, video_id).await?;

        let context_dir = self.options.output_dir.join("context");
        let record_path = context::write_context_record(
            &context_dir,
            &item.url,
            &metadata,
            &transcript,
            &self.options.whisper_model,
        )
        .await?;
        let index_path = self.options.output_dir.join("context.txt");
        context::rebuild_context_index(&context_dir, &index_path).await?;

        Ok(
            ProcessingResult::succeeded(item.index, &item.url, vec![transcript_path, record_path])
                .with_duration(transcript.duration_seconds())
                .with_language(&transcript.language),
        )
    }

    async fn run_body_language(&self, item: &WorkItem, video_id: &str) -> Result<ProcessingResult> {
        let video = pipeline::download_video(&item.url, video_id, &self.options.output_dir).await?;
        let report_path = self
            .options
            .output_dir
            .join(format!("{video_id}.pose.json"));
        pipeline::analyze_pose(&video, &report_path).await?;
        Ok(ProcessingResult::succeeded(
            item.index,
            &item.url,
            vec![video, report_path],
        ))
    }
}

#[async_trait]
impl ItemHandler for DelegateHandler {
    async fn process(&self, item: &WorkItem) -> Result<ProcessingResult> {
        let url = item.url.as_str();
        if !links::is_youtube_url(url) {
            return Err(KonveyerError::InvalidInput {
                url: url.to_string(),
                reason: "not a recognized YouTube URL".to_string(),
            });
        }
        let video_id = links::video_id(url).ok_or_else(|| KonveyerError::InvalidInput {
            url: url.to_string(),
            reason: "could not extract a video identifier".to_string(),
        })?;

        let artifact = self.terminal_artifact(&video_id);
        if !self.options.overwrite && fs::try_exists(&artifact).await.unwrap_or(false) {
            info!(url, artifact = %artifact.display(), "terminal artifact exists, skipping");
            return Ok(ProcessingResult::skipped(item.index, url, vec![artifact]));
        }

        match self.mode {
            ProcessMode::AudioOnly => self.run_audio_only(item, &video_id).await,
            ProcessMode::Transcribe => self.run_transcribe(item, &video_id).await,
            ProcessMode::Summarize => self.run_summarize(item, &video_id).await,
            ProcessMode::Context => self.run_context(item, &video_id).await,
            ProcessMode::BodyLanguage => self.run_body_language(item, &video_id).await,
        }
    }
}
