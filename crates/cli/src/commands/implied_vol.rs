//! Implied volatility from a quoted premium.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use thales_core::OptionType;
use thales_pricing::black_scholes as bs;
use thales_pricing::ImpliedVolSolver;

use super::price::ContractArgs;

#[derive(Args, Debug, Clone)]
pub struct ImpliedVolArgs {
    /// Quoted option premium
    #[arg(long)]
    pub price: f64,

    #[command(flatten)]
    pub contract: ContractArgs,

    /// Absolute price tolerance
    #[arg(long, default_value_t = 1e-4)]
    pub epsilon: f64,

    #[arg(long, default_value_t = 100)]
    pub max_iterations: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImpliedVolReport {
    pub option_type: OptionType,
    pub market_price: f64,
    pub implied_volatility: f64,
    /// Model price at the solved volatility.
    pub model_price: f64,
}

/// Solves for the volatility that reproduces the quoted premium.
///
/// # Errors
/// Returns an error if the option type is unknown or the solver fails.
pub fn implied_vol_report(args: &ImpliedVolArgs) -> Result<ImpliedVolReport> {
    let c = &args.contract;
    let solver = ImpliedVolSolver::new(args.epsilon, args.max_iterations);
    let sigma = match c.option_type {
        OptionType::Call => solver.call(args.price, c.spot, c.strike, c.rate, c.time),
        OptionType::Put => solver.put(args.price, c.spot, c.strike, c.rate, c.time),
        OptionType::Unknown => anyhow::bail!("option type must be call or put"),
    }
    .with_context(|| format!("no implied volatility for {} at {}", c.option_type, args.price))?;

    Ok(ImpliedVolReport {
        option_type: c.option_type,
        market_price: args.price,
        implied_volatility: sigma,
        model_price: bs::theoretical_price(c.option_type, c.spot, c.strike, c.rate, sigma, c.time),
    })
}

/// Runs the implied-vol command.
///
/// # Errors
/// Returns an error if the solver fails or JSON serialization fails.
pub fn run_implied_vol(args: &ImpliedVolArgs, json: bool) -> Result<()> {
    let report = implied_vol_report(args)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "{} @ {:.4}: implied vol {:.4}% (model {:.4})",
        report.option_type,
        report.market_price,
        report.implied_volatility * 100.0,
        report.model_price
    );
    Ok(())
}
