//! Option pricing: closed-form Black-Scholes with Greeks and implied
//! volatility, an AVX batch pricer over option chains, and a Monte Carlo
//! reference model.
//!
//! All pricing functions are pure and thread-safe.

pub mod black_scholes;
pub mod cpu;
pub mod error;
pub mod implied_vol;
pub mod monte_carlo;
pub mod normal;
pub mod vectorized;

pub use cpu::{cpu_features, CpuFeatures};
pub use error::{PricingError, Result};
pub use implied_vol::ImpliedVolSolver;
pub use monte_carlo::OptionParameters;
pub use vectorized::{BatchInputs, BatchKernel, BatchPricer};
