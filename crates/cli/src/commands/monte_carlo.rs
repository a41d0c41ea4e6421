//! Monte Carlo valuation next to the closed-form model.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use thales_core::{MonteCarloSettings, OptionType};
use thales_pricing::black_scholes as bs;
use thales_pricing::monte_carlo::{self, OptionParameters};

use super::price::ContractArgs;

#[derive(Args, Debug, Clone)]
pub struct MonteCarloArgs {
    #[command(flatten)]
    pub contract: ContractArgs,

    /// Annualized volatility
    #[arg(long, default_value_t = 0.20)]
    pub volatility: f64,

    /// Simulated paths
    #[arg(long, default_value_t = MonteCarloSettings::default().num_simulations)]
    pub simulations: u32,

    /// Time steps per path
    #[arg(long, default_value_t = MonteCarloSettings::default().num_steps)]
    pub steps: u32,

    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// Skip the finite-difference Greeks
    #[arg(long)]
    pub price_only: bool,
}

/// A simulated figure and its closed-form counterpart.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Comparison {
    pub monte_carlo: f64,
    pub closed_form: f64,
}

impl Comparison {
    #[must_use]
    pub fn error(&self) -> f64 {
        self.monte_carlo - self.closed_form
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MonteCarloReport {
    pub option_type: OptionType,
    pub simulations: u32,
    pub steps: u32,
    pub seed: u64,
    pub price: Comparison,
    pub delta: Option<Comparison>,
    pub gamma: Option<Comparison>,
    pub vega: Option<Comparison>,
}

/// Prices the contract by simulation and by formula.
///
/// # Errors
/// Returns an error for an unknown option type or zero paths or steps.
pub fn monte_carlo_report(args: &MonteCarloArgs) -> Result<MonteCarloReport> {
    let c = &args.contract;
    let sigma = args.volatility;
    let params = OptionParameters::new(c.spot, c.strike, c.rate, sigma, c.time)
        .with_simulations(args.simulations)
        .with_steps(args.steps)
        .with_seed(args.seed);

    let price = Comparison {
        monte_carlo: monte_carlo::price(c.option_type, &params).context("simulation failed")?,
        closed_form: bs::theoretical_price(c.option_type, c.spot, c.strike, c.rate, sigma, c.time),
    };

    let mut report = MonteCarloReport {
        option_type: c.option_type,
        simulations: args.simulations,
        steps: args.steps,
        seed: args.seed,
        price,
        delta: None,
        gamma: None,
        vega: None,
    };
    if args.price_only {
        return Ok(report);
    }

    let closed = bs::greeks(c.option_type, c.spot, c.strike, c.rate, sigma, c.time);
    let delta = match c.option_type {
        OptionType::Put => monte_carlo::put_delta(&params)?,
        _ => monte_carlo::call_delta(&params)?,
    };
    report.delta = Some(Comparison {
        monte_carlo: delta,
        closed_form: closed.delta,
    });
    report.gamma = Some(Comparison {
        monte_carlo: monte_carlo::gamma(&params)?,
        closed_form: closed.gamma,
    });
    report.vega = Some(Comparison {
        monte_carlo: monte_carlo::vega(&params)?,
        closed_form: closed.vega,
    });
    Ok(report)
}

/// Runs the monte-carlo command.
///
/// # Errors
/// Returns an error if the simulation fails or JSON serialization fails.
pub fn run_monte_carlo(args: &MonteCarloArgs, json: bool) -> Result<()> {
    let started = std::time::Instant::now();
    let report = monte_carlo_report(args)?;
    tracing::info!(
        simulations = report.simulations,
        steps = report.steps,
        elapsed_ms = started.elapsed().as_millis(),
        "monte carlo valuation complete"
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "{} with {} paths x {} steps (seed {})",
        report.option_type, report.simulations, report.steps, report.seed
    );
    println!("  {:<6} {:>12} {:>12} {:>10}", "", "simulated", "formula", "error");
    let rows = [
        ("price", Some(report.price)),
        ("delta", report.delta),
        ("gamma", report.gamma),
        ("vega", report.vega),
    ];
    for (name, row) in rows {
        if let Some(row) = row {
            println!(
                "  {name:<6} {:>12.5} {:>12.5} {:>10.5}",
                row.monte_carlo,
                row.closed_form,
                row.error()
            );
        }
    }
    Ok(())
}
