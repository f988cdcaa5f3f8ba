//! StreamLedger Simulator
//!
//! Runs scripted scenarios and randomized soak runs against an in-memory ledger.

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use streamledger_ledger::LedgerConfig;

mod controller;
mod metrics;
mod participant;
mod scenario;

use controller::SimulationController;
use scenario::Scenario;

/// StreamLedger Simulator CLI
#[derive(Parser, Debug)]
#[command(name = "simulator")]
#[command(about = "StreamLedger scenario runner and soak harness")]
struct Args {
    /// Number of simulated participants to create
    #[arg(short, long, default_value = "4")]
    participants: usize,

    /// Built-in scenario to run
    #[arg(short, long, conflicts_with = "scenario_file")]
    scenario: Option<String>,

    /// JSON scenario file to run
    #[arg(long)]
    scenario_file: Option<std::path::PathBuf>,

    /// Random operations per task when no scenario is given
    #[arg(long, default_value = "1000")]
    steps: usize,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Concurrent soak tasks
    #[arg(long, default_value = "1")]
    concurrent_tasks: usize,

    /// Starting balance of each participant in a soak run
    #[arg(long, default_value = "1000000")]
    initial_balance: u64,

    /// Print the final ledger snapshot as JSON
    #[arg(long)]
    dump: bool,

    /// Keep drained streams visible instead of removing them
    #[arg(long)]
    retain_exhausted: bool,

    /// Reject streams longer than this many seconds
    #[arg(long)]
    max_duration: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = LedgerConfig::from_env();
    if args.retain_exhausted {
        config.retain_exhausted_streams = true;
    }
    if args.max_duration.is_some() {
        config.max_duration_secs = args.max_duration;
    }
    config.validate()?;

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone()),
    );
    if config.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    info!("Starting StreamLedger Simulator");

    let controller = SimulationController::new(config, args.participants, args.seed);

    let scenario = match (&args.scenario, &args.scenario_file) {
        (Some(name), _) => Some(Scenario::load(name)?),
        (None, Some(path)) => Some(Scenario::from_file(path)?),
        (None, None) => None,
    };

    match scenario {
        Some(scenario) => controller.run_scenario(&scenario).await?,
        None => {
            controller.initialize(args.initial_balance)?;
            controller
                .run_soak(args.steps, args.concurrent_tasks.max(1))
                .await?;
        }
    }

    let metrics = controller.get_metrics().await;
    info!(
        total = metrics.total_operations,
        succeeded = metrics.successful_operations,
        rejected = metrics.rejected_operations(),
        success_rate = %format!("{:.2}%", metrics.success_rate() * 100.0),
        conservation_checks = metrics.conservation_checks,
        seed = controller.seed(),
        "Simulation complete"
    );
    for (code, count) in &metrics.rejections {
        info!(code, count, "Rejections");
    }

    println!("{}", controller.ledger_metrics());

    if args.dump {
        println!("{}", serde_json::to_string_pretty(&controller.snapshot()?)?);
    }

    Ok(())
}
