use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{BatchArgs, ImpliedVolArgs, MonteCarloArgs, PriceArgs, RunArgs};

#[derive(Parser)]
#[command(name = "thales")]
#[command(about = "Options pricing and paper trading engine", long_about = None)]
struct Cli {
    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true, env = "THALES_LOG_FILE")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Black-Scholes price and Greeks for one contract
    Price(PriceArgs),
    /// Implied volatility from a quoted premium
    ImpliedVol(ImpliedVolArgs),
    /// Monte Carlo valuation compared with the closed form
    MonteCarlo(MonteCarloArgs),
    /// Scalar vs vectorized pricing over a synthetic chain
    Batch(BatchArgs),
    /// Paper-trade a simulated option chain
    Run(RunArgs),
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn init_logging(log_file: Option<&PathBuf>) -> anyhow::Result<()> {
    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_file.as_ref())?;

    match cli.command {
        Commands::Price(args) => commands::run_price(&args, cli.json)?,
        Commands::ImpliedVol(args) => commands::run_implied_vol(&args, cli.json)?,
        Commands::MonteCarlo(args) => commands::run_monte_carlo(&args, cli.json)?,
        Commands::Batch(args) => commands::run_batch(&args, cli.json)?,
        Commands::Run(args) => commands::run_engine(&args, cli.json).await?,
    }

    Ok(())
}
