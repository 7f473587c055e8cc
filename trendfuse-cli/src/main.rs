//! TrendFuse CLI: signal analysis, backtests and forward tests.
//!
//! Commands:
//! - `analyze`: trend/volume detection and fusion score for the latest bar
//! - `signal`: live buy/sell/hold with trade plan
//! - `backtest`: replay recent history for one or more symbols
//! - `learn`: feature effectiveness and advisory weights
//! - `forward start|step|status|trades|export|worker`: forward-test sessions

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use trendfuse_core::domain::RunId;
use trendfuse_core::learner::LearnedWeights;
use trendfuse_runner::forward::{self, run_status, JsonStore, RunStore, Stepper};
use trendfuse_runner::runner::LearningReport;
use trendfuse_runner::{
    run_analysis, run_backtests, run_learner, run_live_signal, AppConfig, CandleSource, CoinbaseSource,
    SyntheticSource,
};

#[derive(Parser)]
#[command(name = "trendfuse", about = "TrendFuse CLI: multi-timeframe fusion signals")]
struct Cli {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use deterministic synthetic candles instead of the exchange.
    #[arg(long, global = true, default_value_t = false)]
    synthetic: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score the latest closed bar.
    Analyze {
        #[arg(long, default_value = "BTC/USD")]
        symbol: String,
    },
    /// Live action and trade plan for the latest closed bar.
    Signal {
        #[arg(long, default_value = "BTC/USD")]
        symbol: String,

        /// Learner report JSON whose weights are added as a bonus.
        #[arg(long)]
        learned: Option<PathBuf>,
    },
    /// Backtest recent history.
    Backtest {
        /// Symbols to backtest (e.g., BTC/USD ETH/USD).
        #[arg(required = true)]
        symbols: Vec<String>,

        /// Write the report JSON here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Measure feature effectiveness over recent history.
    Learn {
        #[arg(long, default_value = "BTC/USD")]
        symbol: String,

        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Forward-test sessions.
    Forward {
        #[command(subcommand)]
        action: ForwardAction,
    },
}

#[derive(Subcommand)]
enum ForwardAction {
    /// Start a session for a symbol.
    Start {
        #[arg(long)]
        symbol: String,
    },
    /// Step one run, or every active run when no id is given.
    Step {
        #[arg(long)]
        run_id: Option<u64>,
    },
    /// Run, open trades and the most recent closed trades.
    Status {
        #[arg(long)]
        run_id: u64,
    },
    /// All trades of a run in creation order.
    Trades {
        #[arg(long)]
        run_id: u64,
    },
    /// Export all trades of a run as CSV.
    Export {
        #[arg(long)]
        run_id: u64,

        /// Defaults to forward_test_<id>_<date>.csv.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Step all active runs on the configured interval until Enter is pressed.
    Worker,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load_or_default(cli.config.as_deref())
        .with_context(|| "failed to load configuration")?;
    let source = build_source(&config, cli.synthetic)?;

    match cli.command {
        Commands::Analyze { symbol } => print_json(&run_analysis(source.as_ref(), &symbol, &config, Utc::now())?),
        Commands::Signal { symbol, learned } => {
            let learned = learned.as_deref().map(load_learned).transpose()?;
            print_json(&run_live_signal(source.as_ref(), &symbol, &config, learned, Utc::now())?)
        }
        Commands::Backtest { symbols, output } => run_backtest_cmd(source.as_ref(), &symbols, &config, output),
        Commands::Learn { symbol, output } => {
            let report = run_learner(source.as_ref(), &symbol, &config, Utc::now())?;
            write_or_print(&report, output.as_deref())
        }
        Commands::Forward { action } => run_forward(action, source, config),
    }
}

fn build_source(config: &AppConfig, synthetic: bool) -> Result<Arc<dyn CandleSource>> {
    if synthetic {
        return Ok(Arc::new(SyntheticSource::new()));
    }
    Ok(Arc::new(CoinbaseSource::from_config(&config.data)?))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn write_or_print<T: Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, serde_json::to_string_pretty(value)?)
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!("Report saved to: {}", path.display());
            Ok(())
        }
        None => print_json(value),
    }
}

fn load_learned(path: &Path) -> Result<LearnedWeights> {
    let text = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let report: LearningReport =
        serde_json::from_str(&text).with_context(|| format!("{} is not a learner report", path.display()))?;
    Ok(report.learned)
}

fn run_backtest_cmd(
    source: &dyn CandleSource,
    symbols: &[String],
    config: &AppConfig,
    output: Option<PathBuf>,
) -> Result<()> {
    let results = run_backtests(source, symbols, config, Utc::now());
    let mut reports = Vec::with_capacity(results.len());
    let mut failed = false;
    for (symbol, result) in results {
        match result {
            Ok(report) => {
                let s = &report.stats;
                eprintln!(
                    "{symbol}: {} trades, win rate {:.2}%, P/L {:.2}%, max DD {:.2}%",
                    s.trades, s.win_rate, s.pl_pct, s.max_drawdown_pct
                );
                reports.push(report);
            }
            Err(e) => {
                eprintln!("Error for {symbol}: {e}");
                failed = true;
            }
        }
    }

    match reports.as_slice() {
        [single] => write_or_print(single, output.as_deref())?,
        _ => write_or_print(&reports, output.as_deref())?,
    }
    if failed {
        bail!("one or more backtests failed");
    }
    Ok(())
}

fn run_forward(action: ForwardAction, source: Arc<dyn CandleSource>, config: AppConfig) -> Result<()> {
    let store: Arc<dyn RunStore> = Arc::new(JsonStore::open(&config.forward_test.store_dir)?);
    let interval = Duration::from_secs(config.forward_test.poll_interval_secs);
    let stepper = Arc::new(Stepper::new(source, store.clone(), config));

    match action {
        ForwardAction::Start { symbol } => print_json(&stepper.start_run(&symbol, Utc::now())?),
        ForwardAction::Step { run_id: Some(id) } => {
            let out = stepper.step(RunId(id), Utc::now())?;
            eprintln!(
                "run {id}: {} candles, {} opened, {} closed{}",
                out.candles,
                out.opened,
                out.closed,
                if out.finalized { ", finalized" } else { "" }
            );
            print_json(&store.get_run(RunId(id))?)
        }
        ForwardAction::Step { run_id: None } => {
            let report = forward::tick(&stepper, Utc::now());
            eprintln!(
                "stepped {} runs ({} failed, {} finalized)",
                report.stepped, report.failed, report.finalized
            );
            Ok(())
        }
        ForwardAction::Status { run_id } => print_json(&run_status(store.as_ref(), RunId(run_id))?),
        ForwardAction::Trades { run_id } => print_json(&store.trades_for_run(RunId(run_id))?),
        ForwardAction::Export { run_id, output } => {
            let trades = store.trades_for_run(RunId(run_id))?;
            let path = output.unwrap_or_else(|| {
                PathBuf::from(format!("forward_test_{run_id}_{}.csv", Utc::now().date_naive()))
            });
            let file = std::fs::File::create(&path).with_context(|| format!("failed to create {}", path.display()))?;
            forward::write_trades_csv(&trades, file)?;
            eprintln!("Exported {} trades to {}", trades.len(), path.display());
            Ok(())
        }
        ForwardAction::Worker => {
            let handle = forward::spawn_worker(stepper, interval)?;
            eprintln!("Worker running every {}s; press Enter to stop.", interval.as_secs());
            let mut line = String::new();
            std::io::stdin().read_line(&mut line)?;
            handle.stop();
            Ok(())
        }
    }
}
