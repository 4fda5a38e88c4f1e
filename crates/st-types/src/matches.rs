//! Types exchanged with a match evaluator.

use serde::{Deserialize, Serialize};

/// A complete engine configuration: option name to integral value, in
/// parameter order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    values: Vec<(String, i64)>,
}

impl Configuration {
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }

    /// Set `name` to `value`, replacing an earlier entry with the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: i64) {
        let name = name.into();
        match self.values.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.values.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<i64> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.values.iter().map(|(n, v)| (n.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(String, i64)> for Configuration {
    fn from_iter<I: IntoIterator<Item = (String, i64)>>(iter: I) -> Self {
        let mut config = Configuration::new();
        for (name, value) in iter {
            config.insert(name, value);
        }
        config
    }
}

/// Fractional match scores of the plus and minus configurations against
/// each other (win = 1, draw = 0.5, loss = 0).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchScore {
    pub plus: f64,
    pub minus: f64,
}

impl MatchScore {
    /// The observation used when no result is available. Yields a zero
    /// gradient estimate.
    pub const NEUTRAL: MatchScore = MatchScore {
        plus: 0.5,
        minus: 0.5,
    };

    pub fn new(plus: f64, minus: f64) -> Self {
        Self { plus, minus }
    }

    pub fn difference(&self) -> f64 {
        self.plus - self.minus
    }

    pub fn is_neutral(&self) -> bool {
        self.difference() == 0.0
    }
}

impl Default for MatchScore {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

/// Game counts from the plus configuration's point of view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchTally {
    pub wins: u64,
    pub losses: u64,
    pub draws: u64,
}

impl MatchTally {
    pub fn new(wins: u64, losses: u64, draws: u64) -> Self {
        Self {
            wins,
            losses,
            draws,
        }
    }

    pub fn total(&self) -> u64 {
        self.wins + self.losses + self.draws
    }

    /// Convert to fractional scores; draws count half for both sides.
    /// An empty tally is neutral.
    pub fn score(&self) -> MatchScore {
        let total = self.total();
        if total == 0 {
            return MatchScore::NEUTRAL;
        }
        let total = total as f64;
        let half_draws = self.draws as f64 * 0.5;
        MatchScore {
            plus: (self.wins as f64 + half_draws) / total,
            minus: (self.losses as f64 + half_draws) / total,
        }
    }
}

/// How each evaluation is played out by the match runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSettings {
    /// Games per iteration.
    pub games: u32,
    /// Time control, passed to the runner untouched (e.g. "10+0.1").
    pub time_control: String,
    /// Games the runner may play in parallel.
    pub concurrency: u32,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            games: 100,
            time_control: "10+0.1".to_string(),
            concurrency: 4,
        }
    }
}

/// One evaluation request: the two perturbed configurations to play against
/// each other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRequest {
    pub iteration: usize,
    pub plus: Configuration,
    pub minus: Configuration,
    pub settings: MatchSettings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_insert_replaces() {
        let mut config = Configuration::new();
        config.insert("Hash", 32);
        config.insert("Contempt", 5);
        config.insert("Hash", 64);

        assert_eq!(config.len(), 2);
        assert_eq!(config.get("Hash"), Some(64));
        let names: Vec<&str> = config.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["Hash", "Contempt"]);
    }

    #[test]
    fn tally_score_splits_draws() {
        let score = MatchTally::new(10, 5, 5).score();
        assert!((score.plus - 0.625).abs() < 1e-12);
        assert!((score.minus - 0.375).abs() < 1e-12);
        assert!(score.plus + score.minus <= 1.0 + 1e-12);
    }

    #[test]
    fn empty_tally_is_neutral() {
        let score = MatchTally::default().score();
        assert_eq!(score, MatchScore::NEUTRAL);
        assert!(score.is_neutral());
    }

    #[test]
    fn all_draws_is_neutral() {
        let score = MatchTally::new(0, 0, 8).score();
        assert!(score.is_neutral());
    }

    #[test]
    fn default_settings() {
        let settings = MatchSettings::default();
        assert_eq!(settings.games, 100);
        assert_eq!(settings.time_control, "10+0.1");
        assert_eq!(settings.concurrency, 4);
    }
}
