//! Run configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::TuneResult;
use crate::matches::MatchSettings;
use crate::validation_error;

/// SPSA hyperparameters.
///
/// Gains follow `a_k = a / (k+1)^alpha` and `c_k = c / (k+1)^gamma`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpsaConfig {
    /// Update step size.
    pub a: f64,
    /// Perturbation size.
    pub c: f64,
    /// Decay exponent of `a_k`.
    pub alpha: f64,
    /// Decay exponent of `c_k`.
    pub gamma: f64,
}

impl Default for SpsaConfig {
    fn default() -> Self {
        Self {
            a: 0.02,
            c: 2.0,
            alpha: 0.602,
            gamma: 0.101,
        }
    }
}

impl SpsaConfig {
    pub fn validate(&self) -> TuneResult<()> {
        for (label, value) in [
            ("a", self.a),
            ("c", self.c),
            ("alpha", self.alpha),
            ("gamma", self.gamma),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(validation_error!(
                    "SPSA {label} must be a positive finite number, got {value}"
                ));
            }
        }
        Ok(())
    }
}

/// Everything a tuning run needs, validated before the first iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningConfig {
    /// Engine binary whose options are tuned.
    pub engine_path: PathBuf,
    /// Match runner binary.
    pub cutechess_path: PathBuf,
    pub iterations: usize,
    pub settings: MatchSettings,
    pub spsa: SpsaConfig,
    /// Restrict tuning to these option names. `None` tunes everything.
    pub parameters: Option<Vec<String>>,
    /// Snapshot file, overwritten after every iteration.
    pub output: PathBuf,
    /// Optional JSON-lines log of every iteration.
    pub history: Option<PathBuf>,
    /// Where the match runner writes its games.
    pub pgn_out: Option<PathBuf>,
    /// Seed of the perturbation sign stream. Drawn at random when unset.
    pub seed: Option<u64>,
    pub eval_timeout_secs: u64,
    pub discovery_timeout_secs: u64,
}

impl TuningConfig {
    pub fn new(engine_path: impl Into<PathBuf>) -> Self {
        Self {
            engine_path: engine_path.into(),
            cutechess_path: PathBuf::from("cutechess-cli"),
            iterations: 500,
            settings: MatchSettings::default(),
            spsa: SpsaConfig::default(),
            parameters: None,
            output: PathBuf::from("spsa_result.json"),
            history: None,
            pgn_out: Some(PathBuf::from("spsa_games.pgn")),
            seed: None,
            eval_timeout_secs: 3600,
            discovery_timeout_secs: 5,
        }
    }

    pub fn with_iterations(mut self, n: usize) -> Self {
        self.iterations = n;
        self
    }

    pub fn with_settings(mut self, settings: MatchSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_spsa(mut self, spsa: SpsaConfig) -> Self {
        self.spsa = spsa;
        self
    }

    pub fn with_parameters(mut self, names: Vec<String>) -> Self {
        self.parameters = Some(names);
        self
    }

    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = path.into();
        self
    }

    pub fn with_history(mut self, path: impl Into<PathBuf>) -> Self {
        self.history = Some(path.into());
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn eval_timeout(&self) -> Duration {
        Duration::from_secs(self.eval_timeout_secs)
    }

    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_secs(self.discovery_timeout_secs)
    }

    /// Check every field that can be checked without touching the filesystem.
    pub fn validate(&self) -> TuneResult<()> {
        if self.engine_path.as_os_str().is_empty() {
            return Err(validation_error!("engine path is empty"));
        }
        if self.iterations == 0 {
            return Err(validation_error!("iterations must be positive"));
        }
        if self.settings.games == 0 {
            return Err(validation_error!("games per iteration must be positive"));
        }
        if self.settings.concurrency == 0 {
            return Err(validation_error!("concurrency must be positive"));
        }
        if self.settings.time_control.trim().is_empty() {
            return Err(validation_error!("time control is empty"));
        }
        if self.eval_timeout_secs == 0 || self.discovery_timeout_secs == 0 {
            return Err(validation_error!("timeouts must be positive"));
        }
        if matches!(&self.parameters, Some(names) if names.is_empty()) {
            return Err(validation_error!(
                "an explicit parameter list must name at least one parameter"
            ));
        }
        self.spsa.validate()
    }
}
