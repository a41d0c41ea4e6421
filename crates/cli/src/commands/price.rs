//! Closed-form price and Greeks for one contract.

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use thales_core::{Greeks, OptionType};
use thales_pricing::black_scholes as bs;

/// Contract terms shared by the pricing commands.
#[derive(Args, Debug, Clone)]
pub struct ContractArgs {
    /// Underlying spot price
    #[arg(long)]
    pub spot: f64,

    /// Strike price
    #[arg(long)]
    pub strike: f64,

    /// Continuously compounded risk-free rate
    #[arg(long, default_value_t = 0.05)]
    pub rate: f64,

    /// Time to expiry in years
    #[arg(long)]
    pub time: f64,

    /// call or put
    #[arg(long = "type", default_value = "call")]
    pub option_type: OptionType,
}

#[derive(Args, Debug, Clone)]
pub struct PriceArgs {
    #[command(flatten)]
    pub contract: ContractArgs,

    /// Annualized volatility
    #[arg(long, default_value_t = 0.20)]
    pub volatility: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PriceReport {
    pub option_type: OptionType,
    pub price: f64,
    pub intrinsic: f64,
    pub time_value: f64,
    pub greeks: Greeks,
}

#[must_use]
pub fn price_report(args: &PriceArgs) -> PriceReport {
    let c = &args.contract;
    let price = bs::theoretical_price(c.option_type, c.spot, c.strike, c.rate, args.volatility, c.time);
    let intrinsic = bs::intrinsic_value(c.option_type, c.spot, c.strike);
    PriceReport {
        option_type: c.option_type,
        price,
        intrinsic,
        time_value: price - intrinsic,
        greeks: bs::greeks(c.option_type, c.spot, c.strike, c.rate, args.volatility, c.time),
    }
}

/// Runs the price command.
///
/// # Errors
/// Returns an error if JSON serialization fails.
pub fn run_price(args: &PriceArgs, json: bool) -> Result<()> {
    let report = price_report(args);
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let g = &report.greeks;
    println!("{} S={} K={} r={} σ={} T={}", report.option_type, args.contract.spot, args.contract.strike, args.contract.rate, args.volatility, args.contract.time);
    println!("  price      {:>12.4}", report.price);
    println!("  intrinsic  {:>12.4}", report.intrinsic);
    println!("  time value {:>12.4}", report.time_value);
    println!("  delta      {:>12.4}", g.delta);
    println!("  gamma      {:>12.5}", g.gamma);
    println!("  theta/day  {:>12.5}", g.theta);
    println!("  vega/1%    {:>12.4}", g.vega);
    println!("  rho/1%     {:>12.4}", g.rho);
    Ok(())
}
