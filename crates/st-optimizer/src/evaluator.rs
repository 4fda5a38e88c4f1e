//! The match evaluator contract and timeout handling.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use st_types::{EvalResult, EvaluationError, MatchRequest, MatchScore};
use std::time::Duration;
use tracing::warn;

/// Plays the plus configuration against the minus configuration and reports
/// their fractional scores.
///
/// Implementations return [`MatchScore::NEUTRAL`] when a match produced no
/// games. Errors are never fatal to a run: the optimizer records them and
/// continues with a neutral observation.
#[async_trait]
pub trait MatchEvaluator: Send + Sync {
    async fn evaluate(&self, request: &MatchRequest) -> EvalResult<MatchScore>;

    /// Human-readable evaluator name.
    fn name(&self) -> &str;
}

/// What the optimizer actually observed for one iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Observation {
    Measured(MatchScore),
    /// No usable result; the iteration proceeds with a neutral score.
    Degraded { reason: String },
}

impl Observation {
    pub fn score(&self) -> MatchScore {
        match self {
            Observation::Measured(score) => *score,
            Observation::Degraded { .. } => MatchScore::NEUTRAL,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Observation::Degraded { .. })
    }

    pub fn degraded_reason(&self) -> Option<&str> {
        match self {
            Observation::Degraded { reason } => Some(reason),
            Observation::Measured(_) => None,
        }
    }
}

fn is_well_formed(score: &MatchScore) -> bool {
    let in_unit = |v: f64| v.is_finite() && (0.0..=1.0).contains(&v);
    in_unit(score.plus) && in_unit(score.minus) && score.plus + score.minus <= 1.0 + 1e-9
}

/// Run one evaluation bounded by `timeout`. Timeouts, evaluator errors and
/// out-of-range scores all degrade to a neutral observation.
pub async fn evaluate_with_timeout<E: MatchEvaluator + ?Sized>(
    evaluator: &E,
    request: &MatchRequest,
    timeout: Duration,
) -> Observation {
    let reason = match tokio::time::timeout(timeout, evaluator.evaluate(request)).await {
        Ok(Ok(score)) if is_well_formed(&score) => return Observation::Measured(score),
        Ok(Ok(score)) => format!("malformed score {score:?}"),
        Ok(Err(e)) => e.to_string(),
        Err(_) => EvaluationError::Timeout {
            timeout_seconds: timeout.as_secs(),
        }
        .to_string(),
    };

    warn!(
        "Evaluation {} of iteration {} degraded to neutral: {}",
        evaluator.name(),
        request.iteration,
        reason
    );
    Observation::Degraded { reason }
}
