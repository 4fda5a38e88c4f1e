//! Match evaluation through cutechess-cli.

use async_trait::async_trait;
use st_optimizer::MatchEvaluator;
use st_types::{Configuration, EvalResult, EvaluationError, MatchRequest, MatchScore, MatchTally};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

const SCORE_PREFIX: &str = "Score of plus vs minus:";

/// Parse the final `Score of plus vs minus: W - L - D ...` line.
///
/// cutechess-cli reprints the running score after every game, so the last
/// occurrence is the match result. `W` counts plus wins, `L` plus losses.
pub fn parse_score_line(output: &str) -> Option<MatchTally> {
    output.lines().rev().find_map(|line| {
        let (_, rest) = line.split_once(SCORE_PREFIX)?;
        let mut parts = rest.splitn(3, '-');
        let wins = parts.next()?.trim().parse().ok()?;
        let losses = parts.next()?.trim().parse().ok()?;
        let draws = parts.next()?.split_whitespace().next()?.parse().ok()?;
        Some(MatchTally::new(wins, losses, draws))
    })
}

/// Plays the plus and minus configurations of one engine against each other
/// with cutechess-cli.
#[derive(Debug, Clone)]
pub struct CutechessEvaluator {
    runner: PathBuf,
    runner_args: Vec<String>,
    engine: PathBuf,
    pgn_out: Option<PathBuf>,
}

impl CutechessEvaluator {
    pub fn new(runner: impl Into<PathBuf>, engine: impl Into<PathBuf>) -> Self {
        Self {
            runner: runner.into(),
            runner_args: Vec::new(),
            engine: engine.into(),
            pgn_out: None,
        }
    }

    /// Arguments placed before the generated match arguments.
    pub fn with_runner_args(mut self, args: Vec<String>) -> Self {
        self.runner_args = args;
        self
    }

    pub fn with_pgn_out(mut self, path: Option<PathBuf>) -> Self {
        self.pgn_out = path;
        self
    }

    fn engine_args(&self, args: &mut Vec<String>, name: &str, config: &Configuration) {
        args.push("-engine".into());
        args.push(format!("cmd={}", self.engine.display()));
        // One argument per option so names containing spaces stay intact.
        args.extend(config.iter().map(|(option, value)| format!("option.{option}={value}")));
        args.push(format!("name={name}"));
    }

    /// Full cutechess-cli argument list for `request`.
    pub fn build_args(&self, request: &MatchRequest) -> Vec<String> {
        let mut args = self.runner_args.clone();
        self.engine_args(&mut args, "plus", &request.plus);
        self.engine_args(&mut args, "minus", &request.minus);
        args.extend([
            "-each".to_string(),
            format!("tc={}", request.settings.time_control),
            "proto=uci".to_string(),
            "-games".to_string(),
            request.settings.games.to_string(),
            "-concurrency".to_string(),
            request.settings.concurrency.to_string(),
        ]);
        if let Some(pgn) = &self.pgn_out {
            args.push("-pgnout".into());
            args.push(pgn.display().to_string());
        }
        args.push("-recover".into());
        args
    }
}

#[async_trait]
impl MatchEvaluator for CutechessEvaluator {
    async fn evaluate(&self, request: &MatchRequest) -> EvalResult<MatchScore> {
        let args = self.build_args(request);
        debug!("Running {} {}", self.runner.display(), args.join(" "));

        let child = Command::new(&self.runner)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EvaluationError::Launch {
                path: self.runner.display().to_string(),
                message: e.to_string(),
            })?;
        let output = child.wait_with_output().await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        match parse_score_line(&stdout) {
            Some(tally) => {
                info!(
                    "Iteration {} match: +{} -{} ={}",
                    request.iteration, tally.wins, tally.losses, tally.draws
                );
                Ok(tally.score())
            }
            None if !output.status.success() => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(EvaluationError::RunnerFailed {
                    status: output.status.to_string(),
                    message: stderr.lines().last().unwrap_or_default().to_string(),
                })
            }
            None => Err(EvaluationError::MissingScore),
        }
    }

    fn name(&self) -> &str {
        "cutechess"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use st_types::MatchSettings;

    fn request() -> MatchRequest {
        let mut plus = Configuration::new();
        plus.insert("Hash", 34);
        plus.insert("Move Overhead", 12);
        let mut minus = Configuration::new();
        minus.insert("Hash", 30);
        minus.insert("Move Overhead", 8);
        MatchRequest {
            iteration: 3,
            plus,
            minus,
            settings: MatchSettings {
                games: 20,
                time_control: "5+0.05".into(),
                concurrency: 2,
            },
        }
    }

    #[test]
    fn last_score_line_wins() {
        let output = "\
Started game 1 of 4 (plus vs minus)
Score of plus vs minus: 1 - 0 - 0  [1.000] 1
Score of plus vs minus: 1 - 1 - 0  [0.500] 2
Score of plus vs minus: 2 - 1 - 1  [0.625] 4
Finished match
";
        assert_eq!(parse_score_line(output), Some(MatchTally::new(2, 1, 1)));
    }

    #[test]
    fn score_fields_are_wins_losses_draws() {
        let tally = parse_score_line("Score of plus vs minus: 10 - 5 - 3  [0.639] 18").unwrap();
        assert_eq!(tally, MatchTally::new(10, 5, 3));
        let score = tally.score();
        assert!((score.plus - 11.5 / 18.0).abs() < 1e-12);
        assert!((score.minus - 6.5 / 18.0).abs() < 1e-12);
    }

    #[test]
    fn missing_or_garbled_score_is_none() {
        assert_eq!(parse_score_line("Finished match\n"), None);
        assert_eq!(parse_score_line("Score of plus vs minus: a - b - c"), None);
        assert_eq!(parse_score_line("Score of other vs minus: 1 - 0 - 0"), None);
    }

    #[test]
    fn build_args_keeps_each_option_separate() {
        let evaluator = CutechessEvaluator::new("cutechess-cli", "/engines/test")
            .with_pgn_out(Some(PathBuf::from("games.pgn")));
        let args = evaluator.build_args(&request());

        let expected: Vec<String> = [
            "-engine",
            "cmd=/engines/test",
            "option.Hash=34",
            "option.Move Overhead=12",
            "name=plus",
            "-engine",
            "cmd=/engines/test",
            "option.Hash=30",
            "option.Move Overhead=8",
            "name=minus",
            "-each",
            "tc=5+0.05",
            "proto=uci",
            "-games",
            "20",
            "-concurrency",
            "2",
            "-pgnout",
            "games.pgn",
            "-recover",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        assert_eq!(args, expected);
    }

    #[test]
    fn build_args_without_pgn() {
        let args = CutechessEvaluator::new("cutechess-cli", "engine").build_args(&request());
        assert!(!args.iter().any(|a| a == "-pgnout"));
        assert_eq!(args.last().map(String::as_str), Some("-recover"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn evaluate_parses_runner_output() {
        let script = "echo 'Score of plus vs minus: 3 - 1 - 0  [0.750] 4'";
        let evaluator = CutechessEvaluator::new("/bin/sh", "engine")
            .with_runner_args(vec!["-c".into(), script.into(), "cutechess".into()]);

        let score = evaluator.evaluate(&request()).await.unwrap();
        assert_eq!(score, MatchScore::new(0.75, 0.25));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn zero_games_is_neutral() {
        let script = "echo 'Score of plus vs minus: 0 - 0 - 0  [nan] 0'";
        let evaluator = CutechessEvaluator::new("/bin/sh", "engine")
            .with_runner_args(vec!["-c".into(), script.into(), "cutechess".into()]);

        let score = evaluator.evaluate(&request()).await.unwrap();
        assert_eq!(score, MatchScore::NEUTRAL);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_runner_reports_error() {
        let evaluator = CutechessEvaluator::new("/bin/sh", "engine").with_runner_args(vec![
            "-c".into(),
            "echo 'Unknown engine' >&2; exit 2".into(),
            "cutechess".into(),
        ]);

        let err = evaluator.evaluate(&request()).await.unwrap_err();
        match err {
            EvaluationError::RunnerFailed { message, .. } => assert_eq!(message, "Unknown engine"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn io_failures_convert_to_io_errors() {
        let err: EvaluationError = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed").into();
        assert!(matches!(err, EvaluationError::Io(_)));
        assert!(err.to_string().contains("pipe closed"));
    }

    #[tokio::test]
    async fn missing_runner_is_a_launch_error() {
        let evaluator = CutechessEvaluator::new("/no/such/cutechess", "engine");
        let err = evaluator.evaluate(&request()).await.unwrap_err();
        assert!(matches!(err, EvaluationError::Launch { .. }));
    }
}
