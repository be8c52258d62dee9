//! Run summary aggregation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{ItemStatus, ProcessingResult, RunState};

/// Accumulates per-item results during a run. Recording is idempotent per
/// item index: a second record for the same index overwrites the first.
#[derive(Debug)]
pub struct RunAggregator {
    run_id: Uuid,
    results: BTreeMap<usize, ProcessingResult>,
}

impl RunAggregator {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            results: BTreeMap::new(),
        }
    }

    pub fn record(&mut self, result: ProcessingResult) {
        self.results.insert(result.index, result);
    }

    pub fn recorded(&self) -> usize {
        self.results.len()
    }

    pub fn finalize(self, state: RunState) -> RunSummary {
        let mut succeeded = 0;
        let mut failed = 0;
        let mut skipped = 0;
        for result in self.results.values() {
            match result.status {
                ItemStatus::Succeeded => succeeded += 1,
                ItemStatus::Failed => failed += 1,
                ItemStatus::Skipped => skipped += 1,
                _ => {}
            }
        }
        RunSummary {
            run_id: self.run_id,
            state,
            succeeded,
            failed,
            skipped,
            results: self.results.into_values().collect(),
        }
    }
}

/// Final outcome of a batch run: counts plus the ordered per-item results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub state: RunState,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub results: Vec<ProcessingResult>,
}

impl RunSummary {
    pub fn processed(&self) -> usize {
        self.results.len()
    }

    pub fn is_full_success(&self) -> bool {
        self.state == RunState::Completed && self.failed == 0
    }

    pub fn failed_items(&self) -> impl Iterator<Item = &ProcessingResult> {
        self.results
            .iter()
            .filter(|r| r.status == ItemStatus::Failed)
    }
}
