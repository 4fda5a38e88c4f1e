//! Perturbation signs and the perturbed configurations built from them.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use st_types::{Configuration, ParameterSet};

/// Direction of a single coordinate's perturbation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sign {
    Plus,
    Minus,
}

impl Sign {
    pub fn as_f64(self) -> f64 {
        match self {
            Sign::Plus => 1.0,
            Sign::Minus => -1.0,
        }
    }
}

/// Source of independent, uniformly distributed ±1 draws.
pub trait SignSource: Send {
    fn next_sign(&mut self) -> Sign;
}

/// ChaCha-backed sign stream seeded once per run.
#[derive(Debug, Clone)]
pub struct SeededSigns {
    seed: u64,
    rng: ChaCha8Rng,
}

impl SeededSigns {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Seed from the thread RNG. The chosen seed is available via [`seed`](Self::seed)
    /// so the run can be replayed.
    pub fn from_entropy() -> Self {
        Self::new(rand::thread_rng().gen())
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl SignSource for SeededSigns {
    fn next_sign(&mut self) -> Sign {
        if self.rng.gen_bool(0.5) {
            Sign::Plus
        } else {
            Sign::Minus
        }
    }
}

/// Per-iteration sign assignment, one entry per parameter in set order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerturbationVector {
    signs: Vec<(String, Sign)>,
}

impl PerturbationVector {
    /// Draw one sign per parameter, advancing `source` exactly once for each.
    pub fn draw<S: SignSource + ?Sized>(params: &ParameterSet, source: &mut S) -> Self {
        let signs = params
            .iter()
            .map(|p| (p.name().to_string(), source.next_sign()))
            .collect();
        Self { signs }
    }

    pub fn sign(&self, name: &str) -> Option<Sign> {
        self.signs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, s)| *s)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Sign)> {
        self.signs.iter().map(|(n, s)| (n.as_str(), *s))
    }

    pub fn len(&self) -> usize {
        self.signs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signs.is_empty()
    }

    /// Build the `(plus, minus)` configurations `clamp(value ± c_k * sign)`,
    /// rounded to integers.
    pub fn perturbed(&self, params: &ParameterSet, c_k: f64) -> (Configuration, Configuration) {
        let mut plus = Configuration::new();
        let mut minus = Configuration::new();

        for param in params.iter() {
            let Some(sign) = self.sign(param.name()) else {
                continue;
            };
            let offset = c_k * sign.as_f64();
            plus.insert(param.name(), param.clamp(param.value() + offset).round() as i64);
            minus.insert(param.name(), param.clamp(param.value() - offset).round() as i64);
        }

        (plus, minus)
    }
}
