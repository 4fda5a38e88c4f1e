use serde::Serialize;
use st_optimizer::{MatchEvaluator, RunStatus, SeededSigns, SignSource, SpsaOptimizer};
use st_store::{HistoryLog, Snapshot, SnapshotStore};
use st_types::{config_error, ParameterError, ParameterSet, TunableParameter, TuneResult, TuningConfig};
use st_uci::{CutechessEvaluator, UciDiscovery};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Outcome of a finished (or cancelled) run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub status: RunStatus,
    pub parameters: ParameterSet,
    pub snapshot: Snapshot,
}

/// Turn discovered parameters into the active tuning set.
///
/// An engine with nothing tunable fails with [`ParameterError::NoParameters`];
/// a selection that matches none of the discovered names fails with
/// [`ParameterError::EmptySelection`].
pub fn select_parameters(
    discovered: Vec<TunableParameter>,
    selection: Option<&[String]>,
) -> TuneResult<ParameterSet> {
    if discovered.is_empty() {
        return Err(ParameterError::NoParameters.into());
    }
    let all = ParameterSet::new(discovered)?;

    match selection {
        None => Ok(all),
        Some(names) => {
            for missing in all.unmatched(names) {
                warn!("Requested parameter {} is not advertised by the engine", missing);
            }
            Ok(all.filter(names)?)
        }
    }
}

/// One tuning run: discovery, the SPSA loop, and persistence.
pub struct TuningRun<E: MatchEvaluator> {
    config: TuningConfig,
    evaluator: E,
    snapshots: SnapshotStore,
    history: Option<HistoryLog>,
}

impl TuningRun<CutechessEvaluator> {
    /// Run against cutechess-cli as configured.
    pub fn from_config(config: TuningConfig) -> Self {
        let evaluator = CutechessEvaluator::new(&config.cutechess_path, &config.engine_path)
            .with_pgn_out(config.pgn_out.clone());
        Self::new(config, evaluator)
    }
}

impl<E: MatchEvaluator> TuningRun<E> {
    pub fn new(config: TuningConfig, evaluator: E) -> Self {
        let snapshots = SnapshotStore::new(&config.output);
        let history = config.history.as_ref().map(HistoryLog::new);
        Self {
            config,
            evaluator,
            snapshots,
            history,
        }
    }

    pub fn config(&self) -> &TuningConfig {
        &self.config
    }

    /// Output files must be creatable as files; checked before the engine is
    /// launched.
    fn check_output_paths(&self) -> TuneResult<()> {
        let paths = std::iter::once(&self.config.output).chain(self.config.history.as_ref());
        for path in paths {
            if path.is_dir() {
                return Err(config_error!(
                    "{} is a directory, expected a file path",
                    path.display()
                ));
            }
        }
        Ok(())
    }

    /// Validate the configuration, discover parameters and run every
    /// iteration.
    pub async fn run(&self, cancel: watch::Receiver<bool>) -> TuneResult<RunReport> {
        self.config.validate()?;
        self.check_output_paths()?;

        let discovered = UciDiscovery::new(&self.config.engine_path)
            .with_timeout(self.config.discovery_timeout())
            .discover()
            .await?;
        let params = select_parameters(discovered, self.config.parameters.as_deref())?;

        let signs = match self.config.seed {
            Some(seed) => SeededSigns::new(seed),
            None => SeededSigns::from_entropy(),
        };
        self.execute(params, signs, cancel).await
    }

    /// Run the configured number of iterations over `params`, writing a
    /// snapshot after each one. Cancellation is honoured between iterations.
    pub async fn execute(
        &self,
        mut params: ParameterSet,
        signs: SeededSigns,
        cancel: watch::Receiver<bool>,
    ) -> TuneResult<RunReport> {
        let seed = signs.seed();
        let mut optimizer = SpsaOptimizer::new(self.config.spsa, self.config.settings.clone(), signs)?
            .with_eval_timeout(self.config.eval_timeout());
        let mut status = RunStatus::new(optimizer.run_id(), seed, self.config.iterations);

        info!(
            "Tuning {} parameters with {} (run {}, seed {})",
            params.len(),
            self.evaluator.name(),
            optimizer.run_id(),
            seed
        );
        for p in params.iter() {
            info!(
                "  {}: {} [{}, {}] step={}",
                p.name(),
                p.value(),
                p.min(),
                p.max(),
                p.step()
            );
        }

        status.mark_running();
        match self.iterate(&mut optimizer, &mut params, &mut status, &cancel).await {
            Ok(()) => {}
            Err(e) => {
                error!("Tuning run failed: {}", e);
                status.mark_failed(e.to_string());
                return Err(e);
            }
        }

        let snapshot = self.snapshots.write(&params)?;
        info!(
            "Run {} finished after {} iterations ({} degraded); results saved to {}",
            status.run_id,
            status.iterations_completed,
            status.iterations_degraded,
            self.snapshots.path().display()
        );

        Ok(RunReport {
            status,
            parameters: params,
            snapshot,
        })
    }

    async fn iterate<S: SignSource>(
        &self,
        optimizer: &mut SpsaOptimizer<S>,
        params: &mut ParameterSet,
        status: &mut RunStatus,
        cancel: &watch::Receiver<bool>,
    ) -> TuneResult<()> {
        for i in 0..self.config.iterations {
            if *cancel.borrow() {
                warn!("Cancellation requested; stopping before iteration {}", i + 1);
                status.mark_cancelled();
                return Ok(());
            }

            info!("--- Iteration {}/{} ---", i + 1, self.config.iterations);
            let record = optimizer.step(params, &self.evaluator).await?;
            status.record(&record);

            for p in params.iter() {
                debug!("  {}: {:.2}", p.name(), p.value());
            }

            self.snapshots.write(params)?;
            if let Some(history) = &self.history {
                history.append(&record)?;
            }
        }

        status.mark_completed();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use st_optimizer::RunState;
    use st_store::SnapshotEntry;
    use st_types::{EvalResult, EvaluationError, MatchRequest, MatchScore, TuneError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Plus always wins 60/40, except every third call fails.
    #[derive(Default)]
    struct FakeMatch {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MatchEvaluator for FakeMatch {
        async fn evaluate(&self, _request: &MatchRequest) -> EvalResult<MatchScore> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n % 3 == 2 {
                Err(EvaluationError::MissingScore)
            } else {
                Ok(MatchScore::new(0.6, 0.4))
            }
        }

        fn name(&self) -> &str {
            "fake"
        }
    }

    fn discovered() -> Vec<TunableParameter> {
        vec![
            TunableParameter::create("Hash", 32, 1, 1024).unwrap(),
            TunableParameter::create("Contempt", 0, -100, 100).unwrap(),
        ]
    }

    fn config(dir: &TempDir, iterations: usize) -> TuningConfig {
        TuningConfig::new("engine")
            .with_iterations(iterations)
            .with_output(dir.path().join("result.json"))
            .with_history(dir.path().join("history.jsonl"))
    }

    fn not_cancelled() -> watch::Receiver<bool> {
        let (tx, rx) = watch::channel(false);
        drop(tx);
        rx
    }

    #[test]
    fn select_without_selection_keeps_everything() {
        let set = select_parameters(discovered(), None).unwrap();
        assert_eq!(set.names(), vec!["Hash", "Contempt"]);
    }

    #[test]
    fn select_subset() {
        let names = vec!["Contempt".to_string(), "Threads".to_string()];
        let set = select_parameters(discovered(), Some(names.as_slice())).unwrap();
        assert_eq!(set.names(), vec!["Contempt"]);
    }

    #[test]
    fn nothing_discovered_and_nothing_matched_are_distinct() {
        let names = vec!["Threads".to_string()];

        let none = select_parameters(Vec::new(), Some(names.as_slice())).unwrap_err();
        assert!(matches!(none, TuneError::Parameter(ParameterError::NoParameters)));

        let empty = select_parameters(discovered(), Some(names.as_slice())).unwrap_err();
        assert!(matches!(
            empty,
            TuneError::Parameter(ParameterError::EmptySelection { .. })
        ));
    }

    #[tokio::test]
    async fn zero_iterations_leave_initial_values() {
        let dir = TempDir::new().unwrap();
        let run = TuningRun::new(config(&dir, 0), FakeMatch::default());
        let params = select_parameters(discovered(), None).unwrap();

        let report = run
            .execute(params.clone(), SeededSigns::new(1), not_cancelled())
            .await
            .unwrap();

        assert_eq!(report.parameters, params);
        assert_eq!(report.status.iterations_completed, 0);
        assert_eq!(report.status.state, RunState::Completed);

        let written = SnapshotStore::new(dir.path().join("result.json")).read().unwrap();
        assert_eq!(written.get("Hash"), Some(SnapshotEntry { value: 32, default: 32 }));
        assert_eq!(written.get("Contempt"), Some(SnapshotEntry { value: 0, default: 0 }));
        assert!(!dir.path().join("history.jsonl").exists());
    }

    #[tokio::test]
    async fn iterations_persist_snapshot_and_history() {
        let dir = TempDir::new().unwrap();
        let run = TuningRun::new(config(&dir, 6), FakeMatch::default());
        let params = select_parameters(discovered(), None).unwrap();

        let report = run
            .execute(params, SeededSigns::new(7), not_cancelled())
            .await
            .unwrap();

        assert_eq!(report.status.state, RunState::Completed);
        assert_eq!(report.status.iterations_completed, 6);
        assert_eq!(report.status.iterations_degraded, 2);
        assert_eq!(report.status.seed, 7);

        let history = HistoryLog::new(dir.path().join("history.jsonl")).read_all().unwrap();
        assert_eq!(history.len(), 6);
        assert!(history.iter().all(|r| r.run_id == report.status.run_id));
        assert_eq!(history.iter().filter(|r| r.observation.is_degraded()).count(), 2);

        let written = SnapshotStore::new(dir.path().join("result.json")).read().unwrap();
        assert_eq!(written, report.snapshot);
        for p in report.parameters.iter() {
            assert_eq!(written.get(p.name()).unwrap().value, p.rounded());
        }
    }

    #[tokio::test]
    async fn cancellation_stops_between_iterations() {
        let dir = TempDir::new().unwrap();
        let evaluator = FakeMatch::default();
        let run = TuningRun::new(config(&dir, 50), evaluator);
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        let report = run
            .execute(select_parameters(discovered(), None).unwrap(), SeededSigns::new(3), rx)
            .await
            .unwrap();

        assert_eq!(report.status.state, RunState::Cancelled);
        assert_eq!(report.status.iterations_completed, 0);
        assert_eq!(run.evaluator.calls.load(Ordering::SeqCst), 0);
        assert!(dir.path().join("result.json").exists());
    }

    #[tokio::test]
    async fn invalid_config_fails_before_discovery() {
        let dir = TempDir::new().unwrap();
        let mut config = config(&dir, 5);
        config.settings.games = 0;
        let run = TuningRun::new(config, FakeMatch::default());

        let err = run.run(not_cancelled()).await.unwrap_err();
        assert!(matches!(err, TuneError::Validation(_)));
    }

    #[tokio::test]
    async fn directory_as_output_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir, 5).with_output(dir.path());
        let run = TuningRun::new(config, FakeMatch::default());

        // Rejected before the (missing) engine is launched.
        let err = run.run(not_cancelled()).await.unwrap_err();
        assert!(matches!(err, TuneError::Config(_)));

        let config = TuningConfig::new("engine")
            .with_output(dir.path().join("result.json"))
            .with_history(dir.path());
        let err = TuningRun::new(config, FakeMatch::default())
            .run(not_cancelled())
            .await
            .unwrap_err();
        assert!(matches!(err, TuneError::Config(_)));
    }

    #[tokio::test]
    async fn missing_engine_is_fatal() {
        let dir = TempDir::new().unwrap();
        let mut config = config(&dir, 5);
        config.engine_path = "/definitely/not/an/engine".into();
        let run = TuningRun::new(config, FakeMatch::default());

        let err = run.run(not_cancelled()).await.unwrap_err();
        assert!(matches!(err, TuneError::Discovery(_)));
        assert!(!dir.path().join("result.json").exists());
    }
}
