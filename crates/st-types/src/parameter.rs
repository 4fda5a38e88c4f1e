//! Tunable parameters and the registry that holds them.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::errors::ParameterError;
use crate::matches::Configuration;

/// Divisor applied to the bound range when deriving a default step.
pub const STEP_RANGE_DIVISOR: f64 = 20.0;

/// One scalar knob of the engine under tuning.
///
/// `value` is kept as `f64` between iterations; it is only rounded when a
/// configuration is rendered for a match or a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TunableParameter {
    name: String,
    value: f64,
    default: i64,
    min: i64,
    max: i64,
    step: f64,
}

impl TunableParameter {
    /// Create a parameter from an advertised default and inclusive bounds.
    ///
    /// The step defaults to `max(1, round((max - min) / 20))`. A default that
    /// lies outside the bounds is clamped into them.
    pub fn create(
        name: impl Into<String>,
        default: i64,
        min: i64,
        max: i64,
    ) -> Result<Self, ParameterError> {
        let name = name.into();
        if min >= max {
            return Err(ParameterError::InvalidRange { name, min, max });
        }

        // abs_diff: the full i64 range does not fit in an i64 width.
        let step = (max.abs_diff(min) as f64 / STEP_RANGE_DIVISOR).round().max(1.0);
        let value = (default as f64).clamp(min as f64, max as f64);

        Ok(Self {
            name,
            value,
            default,
            min,
            max,
            step,
        })
    }

    /// Override the derived step with one supplied by the discovering side.
    pub fn with_step(mut self, step: f64) -> Result<Self, ParameterError> {
        if !step.is_finite() || step <= 0.0 {
            return Err(ParameterError::InvalidStep {
                name: self.name,
                step,
            });
        }
        self.step = step;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn default(&self) -> i64 {
        self.default
    }

    pub fn min(&self) -> i64 {
        self.min
    }

    pub fn max(&self) -> i64 {
        self.max
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    /// Clip `candidate` into `[min, max]`.
    pub fn clamp(&self, candidate: f64) -> f64 {
        candidate.clamp(self.min as f64, self.max as f64)
    }

    /// Store `candidate` after clamping it, returning the stored value.
    pub fn set_value(&mut self, candidate: f64) -> f64 {
        self.value = self.clamp(candidate);
        self.value
    }

    /// Current value rounded to the engine's integral precision.
    pub fn rounded(&self) -> i64 {
        self.value.round() as i64
    }
}

/// The ordered set of parameters being tuned. Discovery order is preserved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    parameters: Vec<TunableParameter>,
}

impl ParameterSet {
    /// Build a set, rejecting duplicate names.
    pub fn new(parameters: Vec<TunableParameter>) -> Result<Self, ParameterError> {
        let mut seen = HashSet::new();
        for param in &parameters {
            if !seen.insert(param.name()) {
                return Err(ParameterError::DuplicateName {
                    name: param.name().to_string(),
                });
            }
        }
        Ok(Self { parameters })
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TunableParameter> {
        self.parameters.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut TunableParameter> {
        self.parameters.iter_mut()
    }

    pub fn names(&self) -> Vec<&str> {
        self.parameters.iter().map(|p| p.name()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&TunableParameter> {
        self.parameters.iter().find(|p| p.name() == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut TunableParameter> {
        self.parameters.iter_mut().find(|p| p.name() == name)
    }

    /// Clip `candidate` into the bounds of the named parameter.
    pub fn clamp(&self, name: &str, candidate: f64) -> Result<f64, ParameterError> {
        self.get(name)
            .map(|p| p.clamp(candidate))
            .ok_or_else(|| ParameterError::UnknownParameter {
                name: name.to_string(),
            })
    }

    /// Restrict the set to the selected names.
    ///
    /// Fails with [`ParameterError::EmptySelection`] when nothing matches, so
    /// callers can tell "asked for nothing that exists" apart from an engine
    /// that advertised no parameters at all.
    pub fn filter<S: AsRef<str>>(&self, selected: &[S]) -> Result<ParameterSet, ParameterError> {
        let wanted: HashSet<&str> = selected.iter().map(|s| s.as_ref()).collect();
        let parameters: Vec<TunableParameter> = self
            .parameters
            .iter()
            .filter(|p| wanted.contains(p.name()))
            .cloned()
            .collect();

        if parameters.is_empty() {
            return Err(ParameterError::EmptySelection {
                requested: selected.iter().map(|s| s.as_ref().to_string()).collect(),
            });
        }

        Ok(Self { parameters })
    }

    /// Selected names that do not exist in this set.
    pub fn unmatched<S: AsRef<str>>(&self, selected: &[S]) -> Vec<String> {
        selected
            .iter()
            .map(|s| s.as_ref())
            .filter(|name| self.get(name).is_none())
            .map(str::to_string)
            .collect()
    }

    /// Integral rendering of the current values.
    pub fn rounded(&self) -> Configuration {
        self.parameters
            .iter()
            .map(|p| (p.name().to_string(), p.rounded()))
            .collect()
    }
}
