//! Prices a synthetic chain through the scalar and vector batch paths.

use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use thales_pricing::{cpu_features, BatchInputs, BatchKernel, BatchPricer, CpuFeatures};

#[derive(Args, Debug, Clone)]
pub struct BatchArgs {
    /// Contracts in the chain
    #[arg(long, default_value_t = 10_000)]
    pub contracts: usize,

    /// Underlying spot price
    #[arg(long, default_value_t = 100.0)]
    pub spot: f64,

    #[arg(long, default_value_t = 0.05)]
    pub rate: f64,

    /// Quantity to compute
    #[arg(long, value_enum, default_value = "call-price")]
    pub kernel: KernelArg,

    /// Timed passes per path
    #[arg(long, default_value_t = 5)]
    pub iterations: u32,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelArg {
    CallPrice,
    PutPrice,
    CallDelta,
    PutDelta,
    Gamma,
    Vega,
    CallTheta,
    PutTheta,
    CallRho,
    PutRho,
}

impl From<KernelArg> for BatchKernel {
    fn from(arg: KernelArg) -> Self {
        match arg {
            KernelArg::CallPrice => Self::CallPrice,
            KernelArg::PutPrice => Self::PutPrice,
            KernelArg::CallDelta => Self::CallDelta,
            KernelArg::PutDelta => Self::PutDelta,
            KernelArg::Gamma => Self::Gamma,
            KernelArg::Vega => Self::Vega,
            KernelArg::CallTheta => Self::CallTheta,
            KernelArg::PutTheta => Self::PutTheta,
            KernelArg::CallRho => Self::CallRho,
            KernelArg::PutRho => Self::PutRho,
        }
    }
}

/// Chain inputs held as parallel columns.
#[derive(Debug, Clone, Default)]
pub struct Chain {
    pub spot: Vec<f64>,
    pub strike: Vec<f64>,
    pub rate: Vec<f64>,
    pub volatility: Vec<f64>,
    pub time: Vec<f64>,
}

impl Chain {
    /// Strikes from 50% to 150% of spot, a mild smile, expiries from one
    /// week to two years.
    #[must_use]
    pub fn synthetic(contracts: usize, spot: f64, rate: f64) -> Self {
        let mut chain = Self::default();
        for i in 0..contracts {
            let moneyness = 0.5 + (i % 101) as f64 / 100.0;
            let expiry_bucket = (i / 101) % 24;
            chain.spot.push(spot);
            chain.strike.push(spot * moneyness);
            chain.rate.push(rate);
            chain.volatility.push(0.18 + 0.25 * (moneyness - 1.0).powi(2));
            chain.time.push(7.0 / 365.0 + expiry_bucket as f64 / 12.0);
        }
        chain
    }

    #[must_use]
    pub fn inputs(&self) -> BatchInputs<'_> {
        BatchInputs::new(&self.spot, &self.strike, &self.rate, &self.volatility, &self.time)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.spot.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.spot.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub contracts: usize,
    pub kernel: BatchKernel,
    pub cpu: CpuFeatures,
    pub vector_path: bool,
    pub scalar_ns_per_contract: f64,
    pub vector_ns_per_contract: f64,
    pub speedup: f64,
    /// Largest absolute difference between the two paths.
    pub max_abs_diff: f64,
}

fn timed(
    pricer: BatchPricer,
    kernel: BatchKernel,
    chain: &Chain,
    out: &mut [f64],
    iterations: u32,
) -> Result<Duration> {
    let inputs = chain.inputs();
    let started = Instant::now();
    for _ in 0..iterations.max(1) {
        pricer.compute(kernel, &inputs, out)?;
    }
    Ok(started.elapsed() / iterations.max(1))
}

fn per_contract(elapsed: Duration, contracts: usize) -> f64 {
    if contracts == 0 {
        return 0.0;
    }
    elapsed.as_nanos() as f64 / contracts as f64
}

/// Runs both paths over the same chain and compares them.
///
/// # Errors
/// Returns an error if a batch call rejects its inputs.
pub fn batch_report(args: &BatchArgs, vector: BatchPricer) -> Result<BatchReport> {
    let kernel = BatchKernel::from(args.kernel);
    let chain = Chain::synthetic(args.contracts, args.spot, args.rate);
    let mut scalar_out = vec![0.0; chain.len()];
    let mut vector_out = vec![0.0; chain.len()];

    let scalar = timed(BatchPricer::scalar(), kernel, &chain, &mut scalar_out, args.iterations)?;
    let vectored = timed(vector, kernel, &chain, &mut vector_out, args.iterations)?;

    let max_abs_diff = scalar_out
        .iter()
        .zip(&vector_out)
        .map(|(a, b)| (a - b).abs())
        .fold(0.0, f64::max);
    let scalar_ns = per_contract(scalar, chain.len());
    let vector_ns = per_contract(vectored, chain.len());

    Ok(BatchReport {
        contracts: chain.len(),
        kernel,
        cpu: *cpu_features(),
        vector_path: vector.uses_vector_path(),
        scalar_ns_per_contract: scalar_ns,
        vector_ns_per_contract: vector_ns,
        speedup: if vector_ns > 0.0 { scalar_ns / vector_ns } else { 1.0 },
        max_abs_diff,
    })
}

/// Runs the batch command.
///
/// # Errors
/// Returns an error if pricing or JSON serialization fails.
pub fn run_batch(args: &BatchArgs, json: bool) -> Result<()> {
    let report = batch_report(args, BatchPricer::new())?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "{:?} over {} contracts (avx={} avx2={} fma={})",
        report.kernel, report.contracts, report.cpu.has_avx, report.cpu.has_avx2, report.cpu.has_fma
    );
    println!("  scalar  {:>10.1} ns/contract", report.scalar_ns_per_contract);
    if report.vector_path {
        println!("  vector  {:>10.1} ns/contract", report.vector_ns_per_contract);
        println!("  speedup {:>10.2}x", report.speedup);
    } else {
        println!("  vector path unavailable on this CPU; both runs used the scalar loop");
    }
    println!("  max |scalar - vector| = {:.3e}", report.max_abs_diff);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(contracts: usize) -> BatchArgs {
        BatchArgs {
            contracts,
            spot: 100.0,
            rate: 0.05,
            kernel: KernelArg::CallPrice,
            iterations: 1,
        }
    }

    #[test]
    fn synthetic_chain_is_well_formed() {
        let chain = Chain::synthetic(250, 100.0, 0.05);
        assert_eq!(chain.len(), 250);
        assert!(chain.strike.iter().all(|&k| (50.0..=150.0).contains(&k)));
        assert!(chain.volatility.iter().all(|&v| v >= 0.18));
        assert!(chain.time.iter().all(|&t| t > 0.0));
    }

    #[test]
    fn both_paths_agree() {
        let report = batch_report(&args(1_003), BatchPricer::new()).unwrap();
        assert_eq!(report.contracts, 1_003);
        assert!(report.max_abs_diff < 1e-9, "{}", report.max_abs_diff);
    }

    #[test]
    fn scalar_only_run_reports_no_vector_path() {
        let report = batch_report(&args(17), BatchPricer::scalar()).unwrap();
        assert!(!report.vector_path);
        assert_eq!(report.max_abs_diff, 0.0);
    }

    #[test]
    fn empty_chain_is_fine() {
        let report = batch_report(&args(0), BatchPricer::new()).unwrap();
        assert_eq!(report.contracts, 0);
        assert_eq!(report.scalar_ns_per_contract, 0.0);
    }
}
