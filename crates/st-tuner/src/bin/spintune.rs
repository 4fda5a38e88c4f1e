//! spintune - SPSA tuner for the spin options of a UCI engine

use anyhow::{Context, Result};
use clap::Parser;
use st_tuner::TuningRun;
use st_types::{MatchSettings, SpsaConfig, TuningConfig};
use std::path::PathBuf;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "spintune")]
#[command(about = "Tune UCI engine spin options with SPSA self-play", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the UCI engine binary
    #[arg(short, long)]
    engine: PathBuf,

    /// Path to cutechess-cli
    #[arg(long, default_value = "cutechess-cli")]
    cutechess: PathBuf,

    /// Number of SPSA iterations
    #[arg(short = 'n', long, default_value_t = 500)]
    iterations: usize,

    /// Games per iteration
    #[arg(short, long, default_value_t = 100)]
    games: u32,

    /// Time control passed to cutechess-cli
    #[arg(long, default_value = "10+0.1")]
    tc: String,

    /// Concurrent games per match
    #[arg(long, default_value_t = 4)]
    concurrency: u32,

    /// Result snapshot path
    #[arg(short, long, default_value = "spsa_result.json")]
    output: PathBuf,

    /// Only tune these options (repeatable)
    #[arg(short, long = "param", value_name = "NAME")]
    params: Vec<String>,

    /// Step-size scale
    #[arg(long, default_value_t = 0.02)]
    a: f64,

    /// Perturbation scale
    #[arg(long, default_value_t = 2.0)]
    c: f64,

    /// Step-size decay exponent
    #[arg(long, default_value_t = 0.602)]
    alpha: f64,

    /// Perturbation decay exponent
    #[arg(long, default_value_t = 0.101)]
    gamma: f64,

    /// Seed for the perturbation signs (random when omitted)
    #[arg(long)]
    seed: Option<u64>,

    /// Append per-iteration records to this JSON-lines file
    #[arg(long)]
    history: Option<PathBuf>,

    /// PGN file for played games
    #[arg(long, default_value = "spsa_games.pgn")]
    pgnout: PathBuf,

    /// Do not save games
    #[arg(long, conflicts_with = "pgnout")]
    no_pgn: bool,

    /// Seconds allowed for one match before the iteration is skipped
    #[arg(long, default_value_t = 3600)]
    eval_timeout: u64,

    /// Seconds allowed for the engine to list its options
    #[arg(long, default_value_t = 5)]
    discovery_timeout: u64,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn into_config(self) -> TuningConfig {
        let mut config = TuningConfig::new(self.engine)
            .with_iterations(self.iterations)
            .with_settings(MatchSettings {
                games: self.games,
                time_control: self.tc,
                concurrency: self.concurrency,
            })
            .with_spsa(SpsaConfig {
                a: self.a,
                c: self.c,
                alpha: self.alpha,
                gamma: self.gamma,
            })
            .with_output(self.output);

        config.cutechess_path = self.cutechess;
        config.pgn_out = if self.no_pgn { None } else { Some(self.pgnout) };
        config.eval_timeout_secs = self.eval_timeout;
        config.discovery_timeout_secs = self.discovery_timeout;

        if !self.params.is_empty() {
            config = config.with_parameters(self.params);
        }
        if let Some(path) = self.history {
            config = config.with_history(path);
        }
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        config
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = cli.into_config();
    info!(
        "Effective configuration: {}",
        serde_json::to_string(&config).context("serializing configuration")?
    );

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; finishing the current iteration");
            let _ = cancel_tx.send(true);
        }
    });

    let run = TuningRun::from_config(config);
    let report = match run.run(cancel_rx).await {
        Ok(report) => report,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    println!("Run {} ({:?})", report.status.run_id, report.status.state);
    for p in report.parameters.iter() {
        println!("{} = {} (default {})", p.name(), p.rounded(), p.default());
    }
    println!("Saved to {}", run.config().output.display());

    Ok(())
}
