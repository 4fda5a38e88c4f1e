//! The SPSA update step.

use chrono::Utc;
use st_types::{
    MatchRequest, MatchScore, MatchSettings, ParameterError, ParameterSet, SpsaConfig, TuneResult,
};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::evaluator::{evaluate_with_timeout, MatchEvaluator};
use crate::perturbation::{PerturbationVector, SeededSigns, SignSource};
use crate::record::{IterationRecord, RunId};
use crate::schedule::{GainSchedule, Gains};

/// Default bound on a single evaluation.
pub const DEFAULT_EVAL_TIMEOUT: Duration = Duration::from_secs(3600);

/// Shared scalar gradient estimate `(plus - minus) / (2 * c_k)`.
pub fn gradient_estimate(score: MatchScore, c_k: f64) -> f64 {
    score.difference() / (2.0 * c_k)
}

/// Move every parameter by `a_k * gradient * sign` and clamp it.
///
/// The per-coordinate gradient is the shared scalar times that coordinate's
/// perturbation sign.
pub fn apply_update(
    params: &mut ParameterSet,
    perturbation: &PerturbationVector,
    a_k: f64,
    gradient: f64,
) {
    for param in params.iter_mut() {
        if let Some(sign) = perturbation.sign(param.name()) {
            let candidate = param.value() + a_k * gradient * sign.as_f64();
            param.set_value(candidate);
        }
    }
}

/// Sequential SPSA optimizer.
///
/// Holds only the gain schedule, the sign stream and the iteration counter;
/// the parameter vector is owned by the caller and updated in place.
pub struct SpsaOptimizer<S: SignSource = SeededSigns> {
    run_id: RunId,
    schedule: GainSchedule,
    signs: S,
    settings: MatchSettings,
    eval_timeout: Duration,
    iteration: usize,
}

impl<S: SignSource> SpsaOptimizer<S> {
    pub fn new(spsa: SpsaConfig, settings: MatchSettings, signs: S) -> TuneResult<Self> {
        spsa.validate()?;
        Ok(Self {
            run_id: Uuid::new_v4(),
            schedule: GainSchedule::new(spsa),
            signs,
            settings,
            eval_timeout: DEFAULT_EVAL_TIMEOUT,
            iteration: 0,
        })
    }

    pub fn with_eval_timeout(mut self, timeout: Duration) -> Self {
        self.eval_timeout = timeout;
        self
    }

    pub fn with_run_id(mut self, run_id: RunId) -> Self {
        self.run_id = run_id;
        self
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Index of the next iteration to run.
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn schedule(&self) -> &GainSchedule {
        &self.schedule
    }

    pub fn signs(&self) -> &S {
        &self.signs
    }

    /// Run one iteration: perturb, evaluate once, update every parameter.
    pub async fn step<E: MatchEvaluator + ?Sized>(
        &mut self,
        params: &mut ParameterSet,
        evaluator: &E,
    ) -> TuneResult<IterationRecord> {
        if params.is_empty() {
            return Err(ParameterError::NoParameters.into());
        }

        let started_at = Utc::now();
        let k = self.iteration;
        let Gains { a_k, c_k } = self.schedule.at(k);
        debug!("Iteration {}: a_k={:.6} c_k={:.6}", k, a_k, c_k);

        let perturbation = PerturbationVector::draw(params, &mut self.signs);
        let (plus, minus) = perturbation.perturbed(params, c_k);

        let request = MatchRequest {
            iteration: k,
            plus,
            minus,
            settings: self.settings.clone(),
        };
        let observation = evaluate_with_timeout(evaluator, &request, self.eval_timeout).await;
        let score = observation.score();

        let gradient = gradient_estimate(score, c_k);
        apply_update(params, &perturbation, a_k, gradient);
        self.iteration += 1;

        info!(
            "Iteration {} finished: score {:.3}-{:.3}, gradient {:.5}",
            k, score.plus, score.minus, gradient
        );

        let MatchRequest { plus, minus, .. } = request;
        Ok(IterationRecord {
            run_id: self.run_id,
            iteration: k,
            gains: Gains { a_k, c_k },
            perturbation,
            plus,
            minus,
            observation,
            gradient,
            values: params
                .iter()
                .map(|p| (p.name().to_string(), p.value()))
                .collect(),
            started_at,
            finished_at: Utc::now(),
        })
    }
}
