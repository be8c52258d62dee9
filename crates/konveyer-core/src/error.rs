use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KonveyerError {
    #[error("Invalid input {url}: {reason}")]
    InvalidInput { url: String, reason: String },

    #[error("External tool `{tool}` is unavailable: {reason}")]
    DependencyUnavailable { tool: String, reason: String },

    #[error("Transient failure for {url}: {reason}")]
    TransientFailure { url: String, reason: String },

    #[error("Job source unavailable ({origin}): {reason}")]
    SourceUnavailable { origin: String, reason: String },

    #[error("Download failed for {url}: {reason}")]
    DownloadFailed { url: String, reason: String },

    #[error("Metadata fetch failed for {url}: {reason}")]
    MetadataFailed { url: String, reason: String },

    #[error("Audio extraction failed for {input}: {reason}")]
    AudioExtractionFailed { input: PathBuf, reason: String },

    #[error("Transcription failed for {audio_path}: {reason}")]
    TranscriptFailed { audio_path: PathBuf, reason: String },

    #[error("Pose analysis failed for {video_path}: {reason}")]
    PoseAnalysisFailed { video_path: PathBuf, reason: String },

    #[error("Summary generation failed: {reason}")]
    SummaryFailed { reason: String },

    #[error("Checkpoint write failed at {path}: {reason}")]
    CheckpointFailed { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("API request failed: {0}")]
    Api(#[from] reqwest::Error),

    #[error("Missing API key: {env_var} environment variable is not set")]
    MissingApiKey { env_var: String },
}

/// Coarse failure classification used by the retry loop and run summaries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    InvalidInput,
    DependencyUnavailable,
    TransientFailure,
    SourceUnavailable,
    Unrecoverable,
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ErrorClass::InvalidInput => "invalid input",
            ErrorClass::DependencyUnavailable => "dependency unavailable",
            ErrorClass::TransientFailure => "transient failure",
            ErrorClass::SourceUnavailable => "source unavailable",
            ErrorClass::Unrecoverable => "unrecoverable",
        };
        f.write_str(label)
    }
}

impl KonveyerError {
    pub fn class(&self) -> ErrorClass {
        match self {
            KonveyerError::InvalidInput { .. } => ErrorClass::InvalidInput,
            KonveyerError::DependencyUnavailable { .. } | KonveyerError::MissingApiKey { .. } => {
                ErrorClass::DependencyUnavailable
            }
            // Network failures from the HTTP client are retry-eligible like
            // rate limits surfaced by the delegate tools.
            KonveyerError::TransientFailure { .. } | KonveyerError::Api(_) => {
                ErrorClass::TransientFailure
            }
            KonveyerError::SourceUnavailable { .. } => ErrorClass::SourceUnavailable,
            _ => ErrorClass::Unrecoverable,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.class() == ErrorClass::TransientFailure
    }
}

pub type Result<T> = std::result::Result<T, KonveyerError>;
