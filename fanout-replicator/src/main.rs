//! Replicates the MovieLens catalog from MySQL into every configured sink, aggregates the
//! replicated ratings, and audits the results.

use clap::{Parser, Subcommand, ValueEnum};
use fanout_config::shared::ReplicatorConfig;
use fanout_telemetry::metrics::init_metrics;
use fanout_telemetry::tracing::init_tracing;
use tracing::{error, info};

use crate::config::load_replicator_config;

mod config;
mod core;

#[derive(Parser, Debug)]
#[command(name = "fanout-replicator")]
#[command(about = "Replicates MovieLens data into many sinks and aggregates ratings")]
struct Cli {
    /// Serve Prometheus metrics on this port while the command runs.
    #[arg(long, global = true)]
    metrics_port: Option<u16>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Brings every sink up to date with the source.
    Replicate {
        #[arg(long, value_enum, default_value_t = Pipeline::Movies)]
        pipeline: Pipeline,
    },
    /// Recomputes the ratings summary from scratch.
    Aggregate,
    /// Compares a sample of the source and of the ratings summary against the sinks.
    Audit,
    /// Re-runs the aggregation batches a previous run left failed or stuck.
    ResetFailed,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pipeline {
    Movies,
    Ratings,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_replicator_config()?;

    let _log_flusher = init_tracing(env!("CARGO_BIN_NAME"))?;

    if let Some(port) = cli.metrics_port {
        init_metrics(env!("CARGO_BIN_NAME"), Some(port))?;
    }

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(cli.command, config))
}

async fn async_main(command: Command, config: ReplicatorConfig) -> anyhow::Result<()> {
    info!(command = ?command, sinks = config.sinks.len(), "starting fanout replicator");

    core::apply_all_migrations(&config).await?;

    let result = match command {
        Command::Replicate { pipeline } => core::replicate(&config, pipeline).await,
        Command::Aggregate => core::aggregate(&config).await,
        Command::Audit => core::audit(&config).await,
        Command::ResetFailed => core::reset_failed(&config).await,
    };

    if let Err(err) = &result {
        error!("{err:#}");
    }

    result
}
