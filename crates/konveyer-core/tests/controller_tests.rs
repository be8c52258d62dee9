//! Batch controller behavior, driven end to end with scripted handlers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use konveyer_core::{
    BatchController, ErrorClass, ItemHandler, ItemStatus, JobSource, KonveyerError,
    ProcessingResult, Result, RunCheckpoint, RunConfig, RunState, WorkItem,
};

#[derive(Clone, Copy, Debug)]
enum Behavior {
    Succeed,
    Skip,
    InvalidInput,
    AlwaysTransient,
    TransientThenSucceed { failures: u32 },
}

/// Handler whose per-URL behavior is scripted up front. Records every
/// invocation so tests can assert on visit order and attempt counts.
#[derive(Clone)]
struct ScriptedHandler {
    default: Behavior,
    behaviors: HashMap<String, Behavior>,
    calls: Arc<Mutex<Vec<String>>>,
    attempts: Arc<Mutex<HashMap<String, u32>>>,
}

impl ScriptedHandler {
    fn new(default: Behavior) -> Self {
        Self {
            default,
            behaviors: HashMap::new(),
            calls: Arc::new(Mutex::new(Vec::new())),
            attempts: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn with(mut self, url: &str, behavior: Behavior) -> Self {
        self.behaviors.insert(url.to_string(), behavior);
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn attempts_for(&self, url: &str) -> u32 {
        self.attempts.lock().unwrap().get(url).copied().unwrap_or(0)
    }
}

#[async_trait]
impl ItemHandler for ScriptedHandler {
    async fn process(&self, item: &WorkItem) -> Result<ProcessingResult> {
        self.calls.lock().unwrap().push(item.url.clone());
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let entry = attempts.entry(item.url.clone()).or_insert(0);
            *entry += 1;
            *entry
        };

        let behavior = self
            .behaviors
            .get(&item.url)
            .copied()
            .unwrap_or(self.default);
        match behavior {
            Behavior::Succeed => Ok(ProcessingResult::succeeded(
                item.index,
                &item.url,
                Vec::new(),
            )),
            Behavior::Skip => Ok(ProcessingResult::skipped(item.index, &item.url, Vec::new())),
            Behavior::InvalidInput => Err(KonveyerError::InvalidInput {
                url: item.url.clone(),
                reason: "scripted invalid input".to_string(),
            }),
            Behavior::AlwaysTransient => Err(KonveyerError::TransientFailure {
                url: item.url.clone(),
                reason: "scripted transient failure".to_string(),
            }),
            Behavior::TransientThenSucceed { failures } => {
                if attempt <= failures {
                    Err(KonveyerError::TransientFailure {
                        url: item.url.clone(),
                        reason: "scripted transient failure".to_string(),
                    })
                } else {
                    Ok(ProcessingResult::succeeded(
                        item.index,
                        &item.url,
                        Vec::new(),
                    ))
                }
            }
        }
    }
}

fn urls(n: usize) -> Vec<String> {
    (0..n)
        .map(|i| format!("https://www.youtube.com/watch?v=vid{i}"))
        .collect()
}

fn test_config(dir: &tempfile::TempDir) -> RunConfig {
    RunConfig {
        rate_limit_delay: Duration::ZERO,
        item_delay: Duration::ZERO,
        checkpoint_path: dir.path().join("checkpoint.json"),
        ..RunConfig::default()
    }
}

#[tokio::test]
async fn visits_every_item_once_in_ascending_order() {
    let dir = tempfile::tempdir().unwrap();
    let handler = ScriptedHandler::new(Behavior::Succeed);
    let source = JobSource::List(urls(5));

    let mut controller = BatchController::new(test_config(&dir), handler.clone());
    let summary = controller.run(&source).await.unwrap();

    assert_eq!(summary.state, RunState::Completed);
    assert_eq!(summary.succeeded, 5);
    assert_eq!(summary.failed, 0);
    assert_eq!(handler.calls(), urls(5));
    let indices: Vec<usize> = summary.results.iter().map(|r| r.index).collect();
    assert_eq!(indices, vec![0, 1, 2, 3, 4]);

    let checkpoint = RunCheckpoint::load(&dir.path().join("checkpoint.json"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(checkpoint.last_index, Some(4));
}

#[tokio::test]
async fn transient_failures_retry_exactly_max_retries_plus_one_times() {
    let dir = tempfile::tempdir().unwrap();
    let handler = ScriptedHandler::new(Behavior::AlwaysTransient);
    let source = JobSource::List(urls(1));

    let config = RunConfig {
        max_retries: 3,
        ..test_config(&dir)
    };
    let mut controller = BatchController::new(config, handler.clone());
    let summary = controller.run(&source).await.unwrap();

    assert_eq!(handler.attempts_for(&urls(1)[0]), 4);
    assert_eq!(summary.failed, 1);
    assert_eq!(
        summary.results[0].error_class,
        Some(ErrorClass::TransientFailure)
    );
    // continue_on_error is on by default, so the run still completes.
    assert_eq!(summary.state, RunState::Completed);
}

#[tokio::test]
async fn invalid_input_is_not_retried() {
    let dir = tempfile::tempdir().unwrap();
    let handler = ScriptedHandler::new(Behavior::InvalidInput);
    let source = JobSource::List(urls(1));

    let mut controller = BatchController::new(test_config(&dir), handler.clone());
    let summary = controller.run(&source).await.unwrap();

    assert_eq!(handler.attempts_for(&urls(1)[0]), 1);
    assert_eq!(summary.results[0].error_class, Some(ErrorClass::InvalidInput));
}

#[tokio::test]
async fn transient_failure_recovers_within_retry_limit() {
    let dir = tempfile::tempdir().unwrap();
    let target = urls(1).remove(0);
    let handler = ScriptedHandler::new(Behavior::Succeed)
        .with(&target, Behavior::TransientThenSucceed { failures: 2 });
    let source = JobSource::List(vec![target.clone()]);

    let mut controller = BatchController::new(test_config(&dir), handler.clone());
    let summary = controller.run(&source).await.unwrap();

    assert_eq!(handler.attempts_for(&target), 3);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 0);
}

#[tokio::test]
async fn stop_on_error_aborts_and_leaves_later_items_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let all = urls(4);
    let handler =
        ScriptedHandler::new(Behavior::Succeed).with(&all[1], Behavior::InvalidInput);
    let source = JobSource::List(all.clone());

    let config = RunConfig {
        continue_on_error: false,
        ..test_config(&dir)
    };
    let mut controller = BatchController::new(config, handler.clone());
    let summary = controller.run(&source).await.unwrap();

    assert_eq!(summary.state, RunState::Aborted);
    assert_eq!(summary.processed(), 2);
    assert_eq!(handler.calls(), vec![all[0].clone(), all[1].clone()]);

    // Only the successful item advanced the checkpoint.
    let checkpoint = RunCheckpoint::load(&dir.path().join("checkpoint.json"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(checkpoint.last_index, Some(0));
}

#[tokio::test]
async fn completed_run_resumes_with_nothing_to_do() {
    let dir = tempfile::tempdir().unwrap();
    let source = JobSource::List(urls(3));

    let first = ScriptedHandler::new(Behavior::Succeed);
    let mut controller = BatchController::new(test_config(&dir), first);
    let summary = controller.run(&source).await.unwrap();
    assert_eq!(summary.succeeded, 3);

    // Same checkpoint path, fresh controller: everything is already done.
    let second = ScriptedHandler::new(Behavior::Succeed);
    let mut controller = BatchController::new(test_config(&dir), second.clone());
    let summary = controller.run(&source).await.unwrap();
    assert_eq!(summary.state, RunState::Completed);
    assert_eq!(summary.processed(), 0);
    assert!(second.calls().is_empty());
}

#[tokio::test]
async fn resume_restarts_at_index_after_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let checkpoint_path = dir.path().join("checkpoint.json");
    let all = urls(4);

    // A previous run got through index 1 before being interrupted.
    let mut checkpoint = RunCheckpoint::new(konveyer_core::CheckpointConfig {
        batch_size: 10,
        continue_on_error: true,
    });
    checkpoint.advance(1);
    checkpoint.save(&checkpoint_path).await.unwrap();

    let handler = ScriptedHandler::new(Behavior::Succeed);
    let mut controller = BatchController::new(test_config(&dir), handler.clone());
    let summary = controller.run(&JobSource::List(all.clone())).await.unwrap();

    assert_eq!(handler.calls(), vec![all[2].clone(), all[3].clone()]);
    assert_eq!(summary.succeeded, 2);

    let reloaded = RunCheckpoint::load(&checkpoint_path).await.unwrap().unwrap();
    assert_eq!(reloaded.last_index, Some(3));
    // Run identity carries across the resume.
    assert_eq!(reloaded.run_id, checkpoint.run_id);
}

#[tokio::test]
async fn explicit_start_index_overrides_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let checkpoint_path = dir.path().join("checkpoint.json");
    let all = urls(3);

    let mut checkpoint = RunCheckpoint::new(konveyer_core::CheckpointConfig {
        batch_size: 10,
        continue_on_error: true,
    });
    checkpoint.advance(2);
    checkpoint.save(&checkpoint_path).await.unwrap();

    let config = RunConfig {
        start_index: Some(1),
        ..test_config(&dir)
    };
    let handler = ScriptedHandler::new(Behavior::Succeed);
    let mut controller = BatchController::new(config, handler.clone());
    let summary = controller.run(&JobSource::List(all.clone())).await.unwrap();

    assert_eq!(handler.calls(), vec![all[1].clone(), all[2].clone()]);
    assert_eq!(summary.succeeded, 2);
}

#[tokio::test]
async fn start_index_beyond_source_completes_with_zero_items() {
    let dir = tempfile::tempdir().unwrap();
    let config = RunConfig {
        start_index: Some(100),
        ..test_config(&dir)
    };
    let handler = ScriptedHandler::new(Behavior::Succeed);
    let mut controller = BatchController::new(config, handler.clone());
    let summary = controller.run(&JobSource::List(urls(3))).await.unwrap();

    assert_eq!(summary.state, RunState::Completed);
    assert_eq!(summary.processed(), 0);
    assert!(handler.calls().is_empty());
}

#[tokio::test]
async fn empty_source_completes_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let handler = ScriptedHandler::new(Behavior::Succeed);
    let mut controller = BatchController::new(test_config(&dir), handler);
    let summary = controller
        .run(&JobSource::List(Vec::new()))
        .await
        .unwrap();

    assert_eq!(summary.state, RunState::Completed);
    assert_eq!(summary.processed(), 0);
}

#[tokio::test]
async fn mixed_batch_records_failure_and_continues() {
    let dir = tempfile::tempdir().unwrap();
    let all = urls(3);
    let handler =
        ScriptedHandler::new(Behavior::Succeed).with(&all[1], Behavior::InvalidInput);
    let mut controller = BatchController::new(test_config(&dir), handler);
    let summary = controller.run(&JobSource::List(all.clone())).await.unwrap();

    assert_eq!(summary.state, RunState::Completed);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 1);

    let failed: Vec<_> = summary.failed_items().collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].url, all[1]);
    assert_eq!(failed[0].error_class, Some(ErrorClass::InvalidInput));

    let checkpoint = RunCheckpoint::load(&dir.path().join("checkpoint.json"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(checkpoint.last_index, Some(2));
}

#[tokio::test]
async fn second_pass_skips_are_counted_not_reprocessed() {
    let dir = tempfile::tempdir().unwrap();
    let source = JobSource::List(urls(3));

    let first = ScriptedHandler::new(Behavior::Succeed);
    let mut controller = BatchController::new(test_config(&dir), first);
    let summary = controller.run(&source).await.unwrap();
    assert_eq!(summary.succeeded, 3);

    // Forced second pass over the same items: artifacts exist, so the
    // handler reports skips. Nothing is redone and nothing fails.
    let config = RunConfig {
        start_index: Some(0),
        ..test_config(&dir)
    };
    let second = ScriptedHandler::new(Behavior::Skip);
    let mut controller = BatchController::new(config, second);
    let summary = controller.run(&source).await.unwrap();

    assert_eq!(summary.state, RunState::Completed);
    assert_eq!(summary.skipped, 3);
    assert_eq!(summary.failed, 0);
}

#[tokio::test]
async fn interactive_pause_happens_between_sub_batches() {
    let dir = tempfile::tempdir().unwrap();
    let confirms = Arc::new(AtomicUsize::new(0));
    let confirms_seen = Arc::clone(&confirms);

    let config = RunConfig {
        batch_size: 2,
        interactive_mode: true,
        ..test_config(&dir)
    };
    let handler = ScriptedHandler::new(Behavior::Succeed);
    let mut controller = BatchController::new(config, handler)
        .with_confirm(Box::new(move |_next, _total| {
            confirms_seen.fetch_add(1, Ordering::SeqCst);
            true
        }));
    let summary = controller.run(&JobSource::List(urls(5))).await.unwrap();

    assert_eq!(summary.succeeded, 5);
    // Pauses before items 2 and 4.
    assert_eq!(confirms.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn declined_continuation_aborts_at_batch_boundary() {
    let dir = tempfile::tempdir().unwrap();
    let config = RunConfig {
        batch_size: 2,
        interactive_mode: true,
        ..test_config(&dir)
    };
    let handler = ScriptedHandler::new(Behavior::Succeed);
    let mut controller =
        BatchController::new(config, handler.clone()).with_confirm(Box::new(|_, _| false));
    let summary = controller.run(&JobSource::List(urls(5))).await.unwrap();

    assert_eq!(summary.state, RunState::Aborted);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(handler.calls().len(), 2);
}

#[tokio::test]
async fn interrupt_flag_aborts_at_item_boundary() {
    let dir = tempfile::tempdir().unwrap();
    let handler = ScriptedHandler::new(Behavior::Succeed);
    let mut controller = BatchController::new(test_config(&dir), handler.clone());

    controller.interrupt_flag().store(true, Ordering::SeqCst);
    let summary = controller.run(&JobSource::List(urls(3))).await.unwrap();

    assert_eq!(summary.state, RunState::Aborted);
    assert_eq!(summary.processed(), 0);
    assert!(handler.calls().is_empty());
}

#[tokio::test]
async fn unreadable_source_fails_before_any_item() {
    let dir = tempfile::tempdir().unwrap();
    let handler = ScriptedHandler::new(Behavior::Succeed);
    let mut controller = BatchController::new(test_config(&dir), handler.clone());

    let source = JobSource::File(dir.path().join("missing.txt"));
    let err = controller.run(&source).await.unwrap_err();
    assert!(matches!(err, KonveyerError::SourceUnavailable { .. }));
    assert!(handler.calls().is_empty());
}

#[tokio::test]
async fn progress_observer_sees_every_item() {
    let dir = tempfile::tempdir().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_inner = Arc::clone(&seen);

    let handler = ScriptedHandler::new(Behavior::Succeed);
    let mut controller = BatchController::new(test_config(&dir), handler)
        .with_progress(Box::new(move |index, total, url| {
            seen_inner.lock().unwrap().push((index, total, url.to_string()));
        }));
    controller.run(&JobSource::List(urls(3))).await.unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 3);
    assert_eq!(seen[0], (0, 3, urls(3)[0].clone()));
    assert_eq!(seen[2].0, 2);
}

#[tokio::test]
async fn item_statuses_are_terminal_in_summary() {
    let dir = tempfile::tempdir().unwrap();
    let all = urls(2);
    let handler = ScriptedHandler::new(Behavior::Succeed).with(&all[1], Behavior::Skip);
    let mut controller = BatchController::new(test_config(&dir), handler);
    let summary = controller.run(&JobSource::List(all)).await.unwrap();

    for result in &summary.results {
        assert!(result.status.is_terminal());
    }
    assert_eq!(summary.results[0].status, ItemStatus::Succeeded);
    assert_eq!(summary.results[1].status, ItemStatus::Skipped);
}
