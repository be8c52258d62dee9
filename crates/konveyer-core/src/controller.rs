//! The batch controller: drives a job source through an item handler,
//! strictly in sequence, with bounded retries, a persisted checkpoint and
//! configurable fault tolerance.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::checkpoint::{CheckpointConfig, RunCheckpoint};
use crate::error::{ErrorClass, Result};
use crate::handler::ItemHandler;
use crate::source::JobSource;
use crate::summary::{RunAggregator, RunSummary};
use crate::types::{ItemStatus, ProcessingResult, RunState, WorkItem};

/// Called between sub-batches when interactive mode is on. Arguments are
/// the next item index and the total item count; returning `false` aborts
/// the run at the batch boundary.
pub type ConfirmFn = Box<dyn Fn(usize, usize) -> bool + Send + Sync>;

/// Called before each item is processed: (index, total, url). Purely
/// observational; lets a CLI drive a progress bar without the controller
/// knowing about terminals.
pub type ProgressFn = Box<dyn Fn(usize, usize, &str) + Send + Sync>;

/// Every knob the controller recognizes. No globals: the caller builds one
/// of these and hands it to the constructor.
#[derive(Clone, Debug)]
pub struct RunConfig {
    /// Items per sub-batch between interactive pauses.
    pub batch_size: usize,
    /// Explicit starting index; overrides any stored checkpoint.
    pub start_index: Option<u64>,
    pub interactive_mode: bool,
    pub continue_on_error: bool,
    /// Retries for transient failures, beyond the first attempt.
    pub max_retries: u32,
    /// Fixed delay between retry attempts.
    pub rate_limit_delay: Duration,
    /// Politeness delay between consecutive items.
    pub item_delay: Duration,
    /// Whether existing artifacts get reprocessed (enforced by the handler).
    pub overwrite: bool,
    pub checkpoint_path: PathBuf,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            start_index: None,
            interactive_mode: false,
            continue_on_error: true,
            max_retries: 3,
            rate_limit_delay: Duration::from_secs(3),
            item_delay: Duration::ZERO,
            overwrite: false,
            checkpoint_path: crate::checkpoint::default_checkpoint_dir().join("checkpoint.json"),
        }
    }
}

impl RunConfig {
    fn checkpoint_config(&self) -> CheckpointConfig {
        CheckpointConfig {
            batch_size: self.batch_size,
            continue_on_error: self.continue_on_error,
        }
    }
}

pub struct BatchController<H: ItemHandler> {
    config: RunConfig,
    handler: H,
    confirm: Option<ConfirmFn>,
    progress: Option<ProgressFn>,
    interrupt: Arc<AtomicBool>,
    state: RunState,
}

impl<H: ItemHandler> BatchController<H> {
    pub fn new(config: RunConfig, handler: H) -> Self {
        Self {
            config,
            handler,
            confirm: None,
            progress: None,
            interrupt: Arc::new(AtomicBool::new(false)),
            state: RunState::Idle,
        }
    }

    /// Install the continuation callback used at sub-batch boundaries.
    pub fn with_confirm(mut self, confirm: ConfirmFn) -> Self {
        self.confirm = Some(confirm);
        self
    }

    /// Install the per-item progress observer.
    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Shared flag checked at item boundaries; set it (e.g. from a ctrl-c
    /// handler) to abort after the current item.
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupt)
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Run the batch to completion (or abort) and return the summary.
    ///
    /// Per-item failures are captured in the summary; only an unreadable
    /// job source or a checkpoint write failure propagate as errors.
    pub async fn run(&mut self, source: &JobSource) -> Result<RunSummary> {
        let urls = source.enumerate().await?;
        let total = urls.len();

        let mut checkpoint = self.load_or_init_checkpoint().await?;
        let start = match self.config.start_index {
            Some(index) => index,
            None => checkpoint.resume_from(),
        };

        let mut aggregator = RunAggregator::new(checkpoint.run_id);
        self.state = RunState::Running;
        info!(
            source = %source.describe(),
            total,
            start,
            batch_size = self.config.batch_size,
            "starting batch run"
        );

        if start as usize >= total {
            // Nothing to do: empty source, or the checkpoint/start index is
            // already past the end. That is a completed run, not an error.
            self.state = RunState::Completed;
            return Ok(aggregator.finalize(self.state));
        }

        let mut processed_in_batch = 0usize;
        for (index, url) in urls.iter().enumerate().skip(start as usize) {
            if self.interrupt.load(Ordering::SeqCst) {
                warn!(index, "interrupted; aborting at item boundary");
                self.state = RunState::Aborted;
                break;
            }

            if self.config.interactive_mode && processed_in_batch >= self.config.batch_size {
                let proceed = self
                    .confirm
                    .as_ref()
                    .map(|confirm| confirm(index, total))
                    .unwrap_or(true);
                if !proceed {
                    info!(index, "operator declined to continue; aborting");
                    self.state = RunState::Aborted;
                    break;
                }
                processed_in_batch = 0;
            }

            if let Some(progress) = &self.progress {
                progress(index, total, url);
            }

            let mut item = WorkItem::new(index, url.clone());
            item.begin();

            match self.process_with_retry(&item).await {
                Ok(result) => {
                    item.finish(result.status, None);
                    checkpoint.advance(index as u64);
                    checkpoint.save(&self.config.checkpoint_path).await?;
                    aggregator.record(result);
                }
                Err(err) => {
                    let class = err.class();
                    item.finish(ItemStatus::Failed, Some(err.to_string()));
                    if class == ErrorClass::DependencyUnavailable {
                        // Likely affects every later item of this mode.
                        error!(url = url.as_str(), %err, "dependency unavailable");
                    } else {
                        error!(url = url.as_str(), %class, %err, "item failed");
                    }
                    aggregator.record(ProcessingResult::failed(index, url, class, err.to_string()));
                    if !self.config.continue_on_error {
                        self.state = RunState::Aborted;
                        break;
                    }
                }
            }

            processed_in_batch += 1;
            if !self.config.item_delay.is_zero() && index + 1 < total {
                sleep(self.config.item_delay).await;
            }
        }

        if self.state == RunState::Running {
            self.state = RunState::Completed;
        }
        let summary = aggregator.finalize(self.state);
        info!(
            state = ?summary.state,
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            "batch run finished"
        );
        Ok(summary)
    }

    async fn load_or_init_checkpoint(&self) -> Result<RunCheckpoint> {
        match RunCheckpoint::load(&self.config.checkpoint_path).await? {
            Some(mut checkpoint) => {
                info!(
                    last_index = ?checkpoint.last_index,
                    "resuming from checkpoint"
                );
                checkpoint.config = self.config.checkpoint_config();
                Ok(checkpoint)
            }
            None => Ok(RunCheckpoint::new(self.config.checkpoint_config())),
        }
    }

    /// Invoke the handler, retrying transient failures with a fixed delay.
    /// A handler that always fails transiently is invoked exactly
    /// `max_retries + 1` times.
    async fn process_with_retry(&self, item: &WorkItem) -> Result<ProcessingResult> {
        let mut attempt = 0u32;
        loop {
            match self.handler.process(item).await {
                Ok(result) => return Ok(result),
                Err(err) if err.is_transient() && attempt < self.config.max_retries => {
                    attempt += 1;
                    warn!(
                        url = item.url.as_str(),
                        attempt,
                        max_retries = self.config.max_retries,
                        %err,
                        "transient failure, retrying"
                    );
                    sleep(self.config.rate_limit_delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
