//! Konveyer Core Library
//!
//! Resumable, fault-tolerant batch processing of YouTube videos: job
//! sources, a sequential batch controller with checkpointing, and per-item
//! handlers that delegate the heavy lifting (download, transcription,
//! summarization, pose analysis) to external tools.

pub mod checkpoint;
pub mod clean;
pub mod context;
pub mod controller;
pub mod error;
pub mod format;
pub mod handler;
pub mod links;
pub mod pipeline;
pub mod provider;
pub mod source;
pub mod summarize;
pub mod summary;
pub mod types;

// Re-export commonly used items at crate root
pub use checkpoint::{CheckpointConfig, RunCheckpoint, default_checkpoint_dir};
pub use clean::{CleanReport, classify_link, clean_links_file, convert_links_file};
pub use controller::{BatchController, ConfirmFn, ProgressFn, RunConfig};
pub use error::{ErrorClass, KonveyerError, Result};
pub use format::{
    format_run_summary_readable, format_timestamp, format_transcript_with_timestamps,
    format_video_summary_readable,
};
pub use handler::{DelegateHandler, HandlerOptions, ItemHandler, ProcessMode};
pub use provider::{Provider, ProviderConfig};
pub use source::JobSource;
pub use summary::{RunAggregator, RunSummary};
pub use types::{
    ItemStatus, ProcessingResult, RunState, Segment, Transcript, VideoMetadata, VideoSummary,
    WorkItem,
};
