//! # st-optimizer
//!
//! Simultaneous Perturbation Stochastic Approximation for SpinTune.
//!
//! Provides the gain schedule, the seeded perturbation sign source, the
//! [`MatchEvaluator`] contract, the per-iteration [`SpsaOptimizer::step`], and
//! iteration records for tracking a run.

mod evaluator;
mod perturbation;
mod record;
mod schedule;
mod spsa;

pub use evaluator::{evaluate_with_timeout, MatchEvaluator, Observation};
pub use perturbation::{PerturbationVector, SeededSigns, Sign, SignSource};
pub use record::{IterationRecord, RunId, RunState, RunStatus};
pub use schedule::{GainSchedule, Gains};
pub use spsa::{apply_update, gradient_estimate, SpsaOptimizer};
