//! Iteration records and run status tracking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use st_types::{Configuration, MatchScore};
use uuid::Uuid;

use crate::evaluator::Observation;
use crate::perturbation::PerturbationVector;
use crate::schedule::Gains;

/// Unique tuning run identifier.
pub type RunId = Uuid;

/// Everything that happened in one SPSA iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    pub run_id: RunId,
    /// 0-based iteration index.
    pub iteration: usize,
    pub gains: Gains,
    pub perturbation: PerturbationVector,
    pub plus: Configuration,
    pub minus: Configuration,
    pub observation: Observation,
    pub gradient: f64,
    /// Parameter values after the update, unrounded.
    pub values: Vec<(String, f64)>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl IterationRecord {
    pub fn score(&self) -> MatchScore {
        self.observation.score()
    }

    pub fn duration_seconds(&self) -> i64 {
        (self.finished_at - self.started_at).num_seconds()
    }
}

/// Lifecycle state of a tuning run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Pending,
    Running,
    Completed,
    Cancelled,
    Failed,
}

/// Aggregate status of a tuning run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStatus {
    pub run_id: RunId,
    pub seed: u64,
    pub state: RunState,
    pub iterations_planned: usize,
    pub iterations_completed: usize,
    pub iterations_degraded: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl RunStatus {
    pub fn new(run_id: RunId, seed: u64, iterations_planned: usize) -> Self {
        Self {
            run_id,
            seed,
            state: RunState::Pending,
            iterations_planned,
            iterations_completed: 0,
            iterations_degraded: 0,
            started_at: None,
            finished_at: None,
            error: None,
        }
    }

    pub fn mark_running(&mut self) {
        self.state = RunState::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn record(&mut self, record: &IterationRecord) {
        self.iterations_completed += 1;
        if record.observation.is_degraded() {
            self.iterations_degraded += 1;
        }
    }

    pub fn mark_completed(&mut self) {
        self.state = RunState::Completed;
        self.finished_at = Some(Utc::now());
    }

    pub fn mark_cancelled(&mut self) {
        self.state = RunState::Cancelled;
        self.finished_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self, error: String) {
        self.state = RunState::Failed;
        self.finished_at = Some(Utc::now());
        self.error = Some(error);
    }
}
