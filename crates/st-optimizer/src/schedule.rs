//! Gain sequences.

use serde::{Deserialize, Serialize};
use st_types::SpsaConfig;

/// Step and perturbation sizes for one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gains {
    pub a_k: f64,
    pub c_k: f64,
}

/// Decaying SPSA gain schedule. `c_k` decays more slowly than `a_k` for the
/// usual choice `gamma < alpha`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainSchedule {
    config: SpsaConfig,
}

impl GainSchedule {
    pub fn new(config: SpsaConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SpsaConfig {
        &self.config
    }

    /// Gains for the 0-based iteration `k`.
    pub fn at(&self, k: usize) -> Gains {
        let n = (k as f64) + 1.0;
        Gains {
            a_k: self.config.a / n.powf(self.config.alpha),
            c_k: self.config.c / n.powf(self.config.gamma),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_iteration_uses_raw_hyperparameters() {
        let schedule = GainSchedule::new(SpsaConfig::default());
        let gains = schedule.at(0);
        assert_eq!(gains.a_k, 0.02);
        assert_eq!(gains.c_k, 2.0);
    }

    #[test]
    fn gains_strictly_decrease() {
        let schedule = GainSchedule::new(SpsaConfig::default());
        let mut previous = schedule.at(0);
        for k in 1..2000 {
            let gains = schedule.at(k);
            assert!(gains.a_k < previous.a_k, "a_k did not decrease at k={k}");
            assert!(gains.c_k < previous.c_k, "c_k did not decrease at k={k}");
            previous = gains;
        }
    }

    #[test]
    fn perturbation_never_reaches_zero() {
        let schedule = GainSchedule::new(SpsaConfig::default());
        for k in [10usize, 1_000, 1_000_000, 1_000_000_000] {
            assert!(schedule.at(k).c_k > 0.0);
        }
    }

    #[test]
    fn perturbation_decays_slower_than_step() {
        let schedule = GainSchedule::new(SpsaConfig::default());
        let first = schedule.at(0);
        let later = schedule.at(99);
        assert!(later.c_k / first.c_k > later.a_k / first.a_k);
    }

    #[test]
    fn known_values() {
        let schedule = GainSchedule::new(SpsaConfig {
            a: 1.0,
            c: 1.0,
            alpha: 1.0,
            gamma: 0.5,
        });
        let gains = schedule.at(3);
        assert!((gains.a_k - 0.25).abs() < 1e-12);
        assert!((gains.c_k - 0.5).abs() < 1e-12);
    }
}
