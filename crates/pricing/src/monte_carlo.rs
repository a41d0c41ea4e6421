//! Monte Carlo pricing of European options under geometric Brownian motion.
//!
//! Slow reference model used to cross-check the closed-form prices. Each
//! call reseeds its own RNG from [`OptionParameters::seed`], so identical
//! parameters reproduce bit-identical results, and bumped revaluations for
//! the finite-difference Greeks see the same random stream.
//!
//! # Example
//!
//! ```
//! use thales_pricing::monte_carlo::{self, OptionParameters};
//!
//! let params = OptionParameters::new(100.0, 100.0, 0.05, 0.2, 1.0)
//!     .with_simulations(20_000)
//!     .with_seed(7);
//! let price = monte_carlo::call_price(&params).unwrap();
//! assert!((price - 10.45).abs() < 0.5);
//! ```

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use thales_core::{MonteCarloSettings, OptionType};

use crate::black_scholes::PERCENT;
use crate::error::{PricingError, Result};

/// Spot bump for delta and gamma, as a fraction of spot.
const SPOT_BUMP: f64 = 0.01;
/// Absolute volatility bump for vega.
const VOL_BUMP: f64 = 0.01;

/// Inputs for one Monte Carlo valuation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptionParameters {
    /// Spot price.
    pub s: f64,
    /// Strike price.
    pub k: f64,
    /// Risk-free rate.
    pub r: f64,
    /// Volatility.
    pub sigma: f64,
    /// Time to expiry in years.
    pub t: f64,
    /// Number of simulated paths (default 10 000).
    pub num_simulations: u32,
    /// Time steps per path (default 100).
    pub num_steps: u32,
    /// RNG seed (default 0).
    pub seed: u64,
}

impl OptionParameters {
    #[must_use]
    pub fn new(s: f64, k: f64, r: f64, sigma: f64, t: f64) -> Self {
        let defaults = MonteCarloSettings::default();
        Self {
            s,
            k,
            r,
            sigma,
            t,
            num_simulations: defaults.num_simulations,
            num_steps: defaults.num_steps,
            seed: defaults.seed,
        }
    }

    /// Applies simulation count, steps and seed from configuration.
    #[must_use]
    pub fn with_settings(mut self, settings: &MonteCarloSettings) -> Self {
        self.num_simulations = settings.num_simulations;
        self.num_steps = settings.num_steps;
        self.seed = settings.seed;
        self
    }

    #[must_use]
    pub fn with_simulations(mut self, num_simulations: u32) -> Self {
        self.num_simulations = num_simulations;
        self
    }

    #[must_use]
    pub fn with_steps(mut self, num_steps: u32) -> Self {
        self.num_steps = num_steps;
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    fn with_spot(self, s: f64) -> Self {
        Self { s, ..self }
    }

    fn with_sigma(self, sigma: f64) -> Self {
        Self { sigma, ..self }
    }

    fn validate(&self) -> Result<()> {
        if self.num_simulations == 0 {
            return Err(PricingError::invalid_argument("num_simulations must be positive"));
        }
        if self.num_steps == 0 {
            return Err(PricingError::invalid_argument("num_steps must be positive"));
        }
        Ok(())
    }
}

/// Discounted mean payoff over `num_simulations` GBM paths.
///
/// # Errors
///
/// `InvalidArgument` for zero simulations or steps, or an `Unknown` option type.
pub fn price(option_type: OptionType, params: &OptionParameters) -> Result<f64> {
    params.validate()?;
    let is_call = match option_type {
        OptionType::Call => true,
        OptionType::Put => false,
        OptionType::Unknown => {
            return Err(PricingError::invalid_argument("option type must be CALL or PUT"))
        }
    };

    let OptionParameters { s, k, r, sigma, t, .. } = *params;
    if t <= 0.0 {
        return Ok(payoff(is_call, s, k));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
    let dt = t / f64::from(params.num_steps);
    let drift = (r - 0.5 * sigma * sigma) * dt;
    let diffusion = sigma * dt.sqrt();

    let mut sum = 0.0;
    for _ in 0..params.num_simulations {
        let mut s_t = s;
        for _ in 0..params.num_steps {
            let z: f64 = rng.sample(StandardNormal);
            s_t *= (drift + diffusion * z).exp();
        }
        sum += payoff(is_call, s_t, k);
    }

    let mean = sum / f64::from(params.num_simulations);
    Ok((-r * t).exp() * mean)
}

#[inline]
fn payoff(is_call: bool, s_t: f64, k: f64) -> f64 {
    if is_call {
        (s_t - k).max(0.0)
    } else {
        (k - s_t).max(0.0)
    }
}

/// Central difference `(f(x + h) - f(x - h)) / 2h` of a repricing closure.
fn central_difference(h: f64, reprice: impl Fn(f64) -> Result<f64>) -> Result<f64> {
    let up = reprice(h)?;
    let down = reprice(-h)?;
    Ok((up - down) / (2.0 * h))
}

/// # Errors
///
/// See [`price`].
pub fn call_price(params: &OptionParameters) -> Result<f64> {
    price(OptionType::Call, params)
}

/// # Errors
///
/// See [`price`].
pub fn put_price(params: &OptionParameters) -> Result<f64> {
    price(OptionType::Put, params)
}

fn delta(option_type: OptionType, params: &OptionParameters) -> Result<f64> {
    let h = SPOT_BUMP * params.s;
    central_difference(h, |bump| price(option_type, &params.with_spot(params.s + bump)))
}

/// Central difference with a 1% spot bump.
///
/// # Errors
///
/// See [`price`].
pub fn call_delta(params: &OptionParameters) -> Result<f64> {
    delta(OptionType::Call, params)
}

/// Central difference with a 1% spot bump.
///
/// # Errors
///
/// See [`price`].
pub fn put_delta(params: &OptionParameters) -> Result<f64> {
    delta(OptionType::Put, params)
}

/// Second difference of the call price with a 1% spot bump.
///
/// # Errors
///
/// See [`price`].
pub fn gamma(params: &OptionParameters) -> Result<f64> {
    let h = SPOT_BUMP * params.s;
    let up = call_price(&params.with_spot(params.s + h))?;
    let down = call_price(&params.with_spot(params.s - h))?;
    let center = call_price(params)?;
    Ok((up + down - 2.0 * center) / (h * h))
}

/// Central difference of the call price over ±0.01 volatility, per 1%.
///
/// # Errors
///
/// See [`price`].
pub fn vega(params: &OptionParameters) -> Result<f64> {
    let raw = central_difference(VOL_BUMP, |bump| {
        call_price(&params.with_sigma(params.sigma + bump))
    })?;
    Ok(raw / PERCENT)
}
