//! Newton-Raphson implied volatility.

use serde::{Deserialize, Serialize};

use crate::black_scholes::{call_price, put_price, vega, PERCENT};
use crate::error::{PricingError, Result};

const INITIAL_GUESS: f64 = 0.20;
const MIN_SIGMA: f64 = 0.001;
const MAX_SIGMA: f64 = 10.0;

/// Solver settings. Defaults: `epsilon = 1e-4`, `max_iterations = 100`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImpliedVolSolver {
    /// Absolute price tolerance for convergence.
    pub epsilon: f64,
    pub max_iterations: u32,
}

impl Default for ImpliedVolSolver {
    fn default() -> Self {
        Self {
            epsilon: 1e-4,
            max_iterations: 100,
        }
    }
}

impl ImpliedVolSolver {
    #[must_use]
    pub fn new(epsilon: f64, max_iterations: u32) -> Self {
        Self {
            epsilon,
            max_iterations,
        }
    }

    /// Volatility that reproduces `price` for a call.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if any input is non-finite, `t <= 0`, or
    ///   `price < max(0, S - K·e^{-rT})`.
    /// - `DegenerateInput` if vega vanishes at an iterate.
    /// - `VolatilityOutOfRange` if an iterate exceeds 10.0.
    /// - `NonConvergence` if the iteration budget runs out.
    pub fn call(&self, price: f64, s: f64, k: f64, r: f64, t: f64) -> Result<f64> {
        check_inputs(price, s, k, r, t)?;
        let lower_bound = (s - k * (-r * t).exp()).max(0.0);
        self.solve(price, lower_bound, |sigma| call_price(s, k, r, sigma, t), |sigma| {
            vega(s, k, r, sigma, t)
        })
    }

    /// Volatility that reproduces `price` for a put.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Self::call`], with the lower bound
    /// `max(0, K·e^{-rT} - S)`.
    pub fn put(&self, price: f64, s: f64, k: f64, r: f64, t: f64) -> Result<f64> {
        check_inputs(price, s, k, r, t)?;
        let lower_bound = (k * (-r * t).exp() - s).max(0.0);
        self.solve(price, lower_bound, |sigma| put_price(s, k, r, sigma, t), |sigma| {
            vega(s, k, r, sigma, t)
        })
    }

    fn solve(
        &self,
        price: f64,
        lower_bound: f64,
        pricer: impl Fn(f64) -> f64,
        vega_of: impl Fn(f64) -> f64,
    ) -> Result<f64> {
        if price < lower_bound {
            return Err(PricingError::invalid_argument(format!(
                "option price {price} violates arbitrage bound {lower_bound}"
            )));
        }

        let mut sigma = INITIAL_GUESS;
        for _ in 0..self.max_iterations {
            let diff = price - pricer(sigma);
            if diff.abs() < self.epsilon {
                return Ok(sigma);
            }

            let v = vega_of(sigma);
            if v == 0.0 {
                return Err(PricingError::degenerate(format!(
                    "vega is zero at sigma = {sigma}"
                )));
            }

            // Public vega is per 1%; Newton needs the raw derivative.
            sigma += diff / (v * PERCENT);

            if sigma <= MIN_SIGMA {
                sigma = MIN_SIGMA;
            } else if sigma > MAX_SIGMA {
                return Err(PricingError::VolatilityOutOfRange {
                    sigma,
                    max: MAX_SIGMA,
                });
            }
        }

        Err(PricingError::NonConvergence {
            iterations: self.max_iterations,
        })
    }
}

fn check_inputs(price: f64, s: f64, k: f64, r: f64, t: f64) -> Result<()> {
    for (name, value) in [("price", price), ("spot", s), ("strike", k), ("rate", r), ("time", t)] {
        if !value.is_finite() {
            return Err(PricingError::invalid_argument(format!(
                "{name} must be finite, got {value}"
            )));
        }
    }
    if t <= 0.0 {
        return Err(PricingError::invalid_argument(format!(
            "time to expiration must be positive, got {t}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_volatility_for_calls_and_puts() {
        let solver = ImpliedVolSolver::default();
        for sigma in [0.1, 0.2, 0.3, 0.4, 0.5] {
            let call = call_price(100.0, 100.0, 0.05, sigma, 1.0);
            let put = put_price(100.0, 100.0, 0.05, sigma, 1.0);
            let iv_call = solver.call(call, 100.0, 100.0, 0.05, 1.0).unwrap();
            let iv_put = solver.put(put, 100.0, 100.0, 0.05, 1.0).unwrap();
            assert!((iv_call - sigma).abs() < 1e-4, "call {sigma} -> {iv_call}");
            assert!((iv_put - sigma).abs() < 1e-4, "put {sigma} -> {iv_put}");
        }
    }

    #[test]
    fn rejects_expired_contracts() {
        let err = ImpliedVolSolver::default()
            .call(5.0, 100.0, 100.0, 0.05, 0.0)
            .unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn rejects_non_finite_inputs() {
        let solver = ImpliedVolSolver::default();
        assert!(solver.call(f64::NAN, 100.0, 100.0, 0.05, 1.0).unwrap_err().is_invalid_input());
        assert!(solver.put(f64::NAN, 100.0, 100.0, 0.05, 1.0).unwrap_err().is_invalid_input());
        assert!(solver.call(10.0, f64::INFINITY, 100.0, 0.05, 1.0).unwrap_err().is_invalid_input());
        assert!(solver.put(10.0, 100.0, f64::NAN, 0.05, 1.0).unwrap_err().is_invalid_input());
        assert!(solver.call(10.0, 100.0, 100.0, 0.05, f64::NAN).unwrap_err().is_invalid_input());
        assert!(crate::black_scholes::call_implied_volatility(f64::NAN, 100.0, 100.0, 0.05, 1.0)
            .unwrap_err()
            .is_invalid_input());
    }

    #[test]
    fn rejects_prices_below_arbitrage_bound() {
        let solver = ImpliedVolSolver::default();
        // Deep ITM call worth at least S - K e^{-rT} ~ 24.9.
        let err = solver.call(20.0, 120.0, 100.0, 0.05, 1.0).unwrap_err();
        assert!(err.is_invalid_input());
        let err = solver.put(10.0, 80.0, 100.0, 0.05, 1.0).unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn absurd_price_leaves_supported_range() {
        // A call can never be worth more than spot.
        let err = ImpliedVolSolver::default()
            .call(150.0, 100.0, 100.0, 0.05, 1.0)
            .unwrap_err();
        assert!(err.is_non_convergence());
    }

    #[test]
    fn tiny_budget_reports_non_convergence() {
        let price = call_price(100.0, 100.0, 0.05, 0.6, 1.0);
        let err = ImpliedVolSolver::new(1e-10, 1)
            .call(price, 100.0, 100.0, 0.05, 1.0)
            .unwrap_err();
        assert_eq!(err, PricingError::NonConvergence { iterations: 1 });
    }

    #[test]
    fn zero_vega_is_degenerate() {
        // Far OTM and nearly expired: vega underflows to zero.
        let err = ImpliedVolSolver::default()
            .call(1.0, 1.0, 1_000.0, 0.0, 1e-6)
            .unwrap_err();
        assert!(err.is_degenerate());
    }
}
