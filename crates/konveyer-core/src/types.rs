use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ErrorClass;

/// Lifecycle of one work item. Transitions only move forward:
/// pending -> in-progress -> {succeeded, failed, skipped}.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Pending,
    InProgress,
    Succeeded,
    Failed,
    Skipped,
}

impl ItemStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ItemStatus::Succeeded | ItemStatus::Failed | ItemStatus::Skipped
        )
    }
}

/// One URL in a batch run, tracked by the controller.
#[derive(Clone, Debug)]
pub struct WorkItem {
    pub index: usize,
    pub url: String,
    pub status: ItemStatus,
    pub error: Option<String>,
}

impl WorkItem {
    pub fn new(index: usize, url: impl Into<String>) -> Self {
        Self {
            index,
            url: url.into(),
            status: ItemStatus::Pending,
            error: None,
        }
    }

    /// Move pending -> in-progress. No-op once processing has started.
    pub fn begin(&mut self) {
        if self.status == ItemStatus::Pending {
            self.status = ItemStatus::InProgress;
        }
    }

    /// Settle the item on a terminal status. A terminal status never regresses.
    pub fn finish(&mut self, status: ItemStatus, error: Option<String>) {
        debug_assert!(status.is_terminal());
        if !self.status.is_terminal() {
            self.status = status;
            self.error = error;
        }
    }
}

/// Overall state of a batch run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Aborted,
}

/// Outcome of processing a single work item.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub index: usize,
    pub url: String,
    pub status: ItemStatus,
    pub artifacts: Vec<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_class: Option<ErrorClass>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl ProcessingResult {
    pub fn succeeded(index: usize, url: impl Into<String>, artifacts: Vec<PathBuf>) -> Self {
        Self {
            index,
            url: url.into(),
            status: ItemStatus::Succeeded,
            artifacts,
            error_class: None,
            detail: None,
            duration_seconds: None,
            language: None,
        }
    }

    pub fn skipped(index: usize, url: impl Into<String>, artifacts: Vec<PathBuf>) -> Self {
        Self {
            status: ItemStatus::Skipped,
            ..Self::succeeded(index, url, artifacts)
        }
    }

    pub fn failed(
        index: usize,
        url: impl Into<String>,
        class: ErrorClass,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            index,
            url: url.into(),
            status: ItemStatus::Failed,
            artifacts: Vec::new(),
            error_class: Some(class),
            detail: Some(detail.into()),
            duration_seconds: None,
            language: None,
        }
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration_seconds = Some(seconds);
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

/// Whisper transcript (JSON output of the whisper CLI).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    pub segments: Vec<Segment>,
    pub language: String,
}

impl Transcript {
    /// End timestamp of the last segment, in seconds.
    pub fn duration_seconds(&self) -> f64 {
        self.segments.last().map(|s| s.end).unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Subset of yt-dlp's `--dump-json` output we care about.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub upload_date: Option<String>,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub view_count: Option<u64>,
    #[serde(default)]
    pub description: Option<String>,
}

impl VideoMetadata {
    /// YouTube reports upload dates as YYYYMMDD; convert to an ISO-ish
    /// timestamp (noon, no timezone) for context records.
    pub fn upload_date_iso(&self) -> Option<String> {
        let raw = self.upload_date.as_deref()?;
        if raw.len() != 8 || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some(format!("{}-{}-{}T12:00:00", &raw[..4], &raw[4..6], &raw[6..8]))
    }
}

/// Structured summary produced by the AI provider for the summarize mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoSummary {
    pub title: String,
    pub summary: String,
    pub duration_minutes: f64,
    pub language: String,
    pub topics: Vec<String>,
    pub key_takeaways: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn work_item_moves_forward_only() {
        let mut item = WorkItem::new(0, "https://www.youtube.com/watch?v=abc");
        assert_eq!(item.status, ItemStatus::Pending);

        item.begin();
        assert_eq!(item.status, ItemStatus::InProgress);

        item.finish(ItemStatus::Succeeded, None);
        assert_eq!(item.status, ItemStatus::Succeeded);

        // A terminal status never regresses.
        item.finish(ItemStatus::Failed, Some("late error".into()));
        assert_eq!(item.status, ItemStatus::Succeeded);
        assert!(item.error.is_none());
    }

    #[test]
    fn upload_date_converts_to_iso() {
        let meta = VideoMetadata {
            id: "abc".into(),
            title: "t".into(),
            duration: None,
            upload_date: Some("20240131".into()),
            uploader: None,
            view_count: None,
            description: None,
        };
        assert_eq!(meta.upload_date_iso().as_deref(), Some("2024-01-31T12:00:00"));
    }

    #[test]
    fn malformed_upload_date_is_dropped() {
        let meta = VideoMetadata {
            id: "abc".into(),
            title: "t".into(),
            duration: None,
            upload_date: Some("2024".into()),
            uploader: None,
            view_count: None,
            description: None,
        };
        assert!(meta.upload_date_iso().is_none());
    }
}
