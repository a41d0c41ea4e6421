//! Closed-form Black-Scholes pricing for European options.
//!
//! All functions take `(s, k, r, sigma, t)`: spot, strike, continuously
//! compounded risk-free rate, annualized volatility and time to expiry in
//! years. They are pure and safe to call from any thread.
//!
//! Conventions:
//! - `t <= 0`: prices are intrinsic value, deltas are the moneyness indicator,
//!   every other Greek is exactly 0.
//! - `sigma <= 0` with `t > 0`: prices, deltas, thetas and rhos are NaN;
//!   gamma and vega are 0.
//! - vega and rho are per 1% move; theta is per calendar day.
//!
//! The batch pricer in [`crate::vectorized`] mirrors every expression here
//! operation for operation. Keep the two in sync when editing.

use thales_core::{Greeks, OptionType};

use crate::error::Result;
use crate::implied_vol::ImpliedVolSolver;
use crate::normal::{cdf, pdf};

pub(crate) const DAYS_PER_YEAR: f64 = 365.0;
pub(crate) const PERCENT: f64 = 100.0;

/// d1 and d2 plus the shared √T term.
#[derive(Debug, Clone, Copy)]
struct Terms {
    d1: f64,
    d2: f64,
    sqrt_t: f64,
}

#[inline]
fn terms(s: f64, k: f64, r: f64, sigma: f64, t: f64) -> Terms {
    let sqrt_t = t.sqrt();
    if sigma <= 0.0 {
        return Terms {
            d1: f64::NAN,
            d2: f64::NAN,
            sqrt_t,
        };
    }
    let d1 = ((s / k).ln() + (r + sigma * sigma / 2.0) * t) / (sigma * sqrt_t);
    let d2 = d1 - sigma * sqrt_t;
    Terms { d1, d2, sqrt_t }
}

#[inline]
fn discount(r: f64, t: f64) -> f64 {
    (-r * t).exp()
}

/// d1 of the Black-Scholes formula. NaN for `sigma <= 0`.
#[must_use]
pub fn d1(s: f64, k: f64, r: f64, sigma: f64, t: f64) -> f64 {
    terms(s, k, r, sigma, t).d1
}

/// d2 = d1 - σ√T. NaN for `sigma <= 0`.
#[must_use]
pub fn d2(s: f64, k: f64, r: f64, sigma: f64, t: f64) -> f64 {
    terms(s, k, r, sigma, t).d2
}

// ============================================================================
// Prices
// ============================================================================

#[must_use]
pub fn call_price(s: f64, k: f64, r: f64, sigma: f64, t: f64) -> f64 {
    if t <= 0.0 {
        return (s - k).max(0.0);
    }
    let tm = terms(s, k, r, sigma, t);
    s * cdf(tm.d1) - k * discount(r, t) * cdf(tm.d2)
}

#[must_use]
pub fn put_price(s: f64, k: f64, r: f64, sigma: f64, t: f64) -> f64 {
    if t <= 0.0 {
        return (k - s).max(0.0);
    }
    let tm = terms(s, k, r, sigma, t);
    k * discount(r, t) * cdf(-tm.d2) - s * cdf(-tm.d1)
}

/// Price for either right. `Unknown` has no payoff and yields NaN.
#[must_use]
pub fn theoretical_price(option_type: OptionType, s: f64, k: f64, r: f64, sigma: f64, t: f64) -> f64 {
    match option_type {
        OptionType::Call => call_price(s, k, r, sigma, t),
        OptionType::Put => put_price(s, k, r, sigma, t),
        OptionType::Unknown => f64::NAN,
    }
}

/// Payoff if exercised now. `Unknown` yields NaN.
#[must_use]
pub fn intrinsic_value(option_type: OptionType, s: f64, k: f64) -> f64 {
    match option_type {
        OptionType::Call => (s - k).max(0.0),
        OptionType::Put => (k - s).max(0.0),
        OptionType::Unknown => f64::NAN,
    }
}

// ============================================================================
// Greeks
// ============================================================================

#[must_use]
pub fn call_delta(s: f64, k: f64, r: f64, sigma: f64, t: f64) -> f64 {
    if t <= 0.0 {
        return if s > k { 1.0 } else { 0.0 };
    }
    cdf(terms(s, k, r, sigma, t).d1)
}

#[must_use]
pub fn put_delta(s: f64, k: f64, r: f64, sigma: f64, t: f64) -> f64 {
    if t <= 0.0 {
        return if s < k { -1.0 } else { 0.0 };
    }
    cdf(terms(s, k, r, sigma, t).d1) - 1.0
}

/// Same for calls and puts.
#[must_use]
pub fn gamma(s: f64, k: f64, r: f64, sigma: f64, t: f64) -> f64 {
    if t <= 0.0 || sigma <= 0.0 {
        return 0.0;
    }
    let tm = terms(s, k, r, sigma, t);
    pdf(tm.d1) / (s * sigma * tm.sqrt_t)
}

/// Per 1% change in volatility. Same for calls and puts.
#[must_use]
pub fn vega(s: f64, k: f64, r: f64, sigma: f64, t: f64) -> f64 {
    if t <= 0.0 || sigma <= 0.0 {
        return 0.0;
    }
    let tm = terms(s, k, r, sigma, t);
    s * tm.sqrt_t * pdf(tm.d1) / PERCENT
}

/// Per calendar day.
#[must_use]
pub fn call_theta(s: f64, k: f64, r: f64, sigma: f64, t: f64) -> f64 {
    if t <= 0.0 {
        return 0.0;
    }
    let tm = terms(s, k, r, sigma, t);
    let decay = -s * sigma * pdf(tm.d1) / (2.0 * tm.sqrt_t);
    let carry = -r * k * discount(r, t) * cdf(tm.d2);
    (decay + carry) / DAYS_PER_YEAR
}

/// Per calendar day.
#[must_use]
pub fn put_theta(s: f64, k: f64, r: f64, sigma: f64, t: f64) -> f64 {
    if t <= 0.0 {
        return 0.0;
    }
    let tm = terms(s, k, r, sigma, t);
    let decay = -s * sigma * pdf(tm.d1) / (2.0 * tm.sqrt_t);
    let carry = r * k * discount(r, t) * cdf(-tm.d2);
    (decay + carry) / DAYS_PER_YEAR
}

/// Per 1% change in the rate.
#[must_use]
pub fn call_rho(s: f64, k: f64, r: f64, sigma: f64, t: f64) -> f64 {
    if t <= 0.0 {
        return 0.0;
    }
    let tm = terms(s, k, r, sigma, t);
    k * t * discount(r, t) * cdf(tm.d2) / PERCENT
}

/// Per 1% change in the rate.
#[must_use]
pub fn put_rho(s: f64, k: f64, r: f64, sigma: f64, t: f64) -> f64 {
    if t <= 0.0 {
        return 0.0;
    }
    let tm = terms(s, k, r, sigma, t);
    -k * t * discount(r, t) * cdf(-tm.d2) / PERCENT
}

/// All five Greeks for one contract. `Unknown` yields NaN for the
/// right-dependent Greeks (delta, theta, rho).
#[must_use]
pub fn greeks(option_type: OptionType, s: f64, k: f64, r: f64, sigma: f64, t: f64) -> Greeks {
    let (delta, theta, rho) = match option_type {
        OptionType::Call => (
            call_delta(s, k, r, sigma, t),
            call_theta(s, k, r, sigma, t),
            call_rho(s, k, r, sigma, t),
        ),
        OptionType::Put => (
            put_delta(s, k, r, sigma, t),
            put_theta(s, k, r, sigma, t),
            put_rho(s, k, r, sigma, t),
        ),
        OptionType::Unknown => (f64::NAN, f64::NAN, f64::NAN),
    };
    Greeks {
        delta,
        gamma: gamma(s, k, r, sigma, t),
        theta,
        vega: vega(s, k, r, sigma, t),
        rho,
    }
}

// ============================================================================
// Implied volatility
// ============================================================================

/// Implied volatility of a call with the default solver settings
/// (epsilon 1e-4, 100 iterations).
///
/// # Errors
///
/// See [`ImpliedVolSolver::call`].
pub fn call_implied_volatility(price: f64, s: f64, k: f64, r: f64, t: f64) -> Result<f64> {
    ImpliedVolSolver::default().call(price, s, k, r, t)
}

/// Implied volatility of a put with the default solver settings.
///
/// # Errors
///
/// See [`ImpliedVolSolver::put`].
pub fn put_implied_volatility(price: f64, s: f64, k: f64, r: f64, t: f64) -> Result<f64> {
    ImpliedVolSolver::default().put(price, s, k, r, t)
}

#[cfg(test)]
mod tests {
    use super::*;

    const S: f64 = 100.0;
    const K: f64 = 100.0;
    const R: f64 = 0.05;
    const SIGMA: f64 = 0.2;
    const T: f64 = 1.0;

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn at_the_money_one_year() {
        assert!(close(call_price(S, K, R, SIGMA, T), 10.4506, 1e-3));
        assert!(close(put_price(S, K, R, SIGMA, T), 5.5735, 1e-3));
        assert!(close(call_delta(S, K, R, SIGMA, T), 0.6368, 1e-3));
        assert!(close(put_delta(S, K, R, SIGMA, T), -0.3632, 1e-3));
        assert!(close(gamma(S, K, R, SIGMA, T), 0.018_76, 1e-4));
        assert!(close(vega(S, K, R, SIGMA, T), 0.3752, 1e-3));
        assert!(close(call_rho(S, K, R, SIGMA, T), 0.5323, 1e-3));
        assert!(close(put_rho(S, K, R, SIGMA, T), -0.4189, 1e-3));
    }

    #[test]
    fn theta_is_per_day() {
        let call = call_theta(S, K, R, SIGMA, T);
        let put = put_theta(S, K, R, SIGMA, T);
        assert!(close(call * DAYS_PER_YEAR, -6.414, 1e-2));
        assert!(close(put * DAYS_PER_YEAR, -1.658, 1e-2));
        assert!(call < put);
    }

    #[test]
    fn shorter_expiry_decays_faster() {
        assert!(call_theta(S, K, R, SIGMA, 0.25) < call_theta(S, K, R, SIGMA, T));
        assert!(vega(S, K, R, SIGMA, 0.25) < vega(S, K, R, SIGMA, T));
        assert!(vega(S, K, R, SIGMA, 2.0) > vega(S, K, R, SIGMA, T));
    }

    #[test]
    fn expired_options_collapse_to_intrinsic() {
        assert_eq!(call_price(110.0, K, R, SIGMA, 0.0), 10.0);
        assert_eq!(put_price(110.0, K, R, SIGMA, 0.0), 0.0);
        assert_eq!(put_price(90.0, K, R, SIGMA, -0.5), 10.0);
        assert_eq!(call_delta(110.0, K, R, SIGMA, 0.0), 1.0);
        assert_eq!(call_delta(K, K, R, SIGMA, 0.0), 0.0);
        assert_eq!(put_delta(90.0, K, R, SIGMA, 0.0), -1.0);
        assert_eq!(put_delta(K, K, R, SIGMA, 0.0), 0.0);
        for f in [gamma, vega, call_theta, put_theta, call_rho, put_rho] {
            assert_eq!(f(110.0, K, R, SIGMA, 0.0), 0.0);
        }
    }

    #[test]
    fn expiry_wins_over_invalid_volatility() {
        assert_eq!(call_price(110.0, K, R, -0.1, 0.0), 10.0);
        assert_eq!(gamma(110.0, K, R, 0.0, 0.0), 0.0);
    }

    #[test]
    fn non_positive_volatility_is_nan_except_gamma_and_vega() {
        for sigma in [0.0, -0.2] {
            assert!(call_price(S, K, R, sigma, T).is_nan());
            assert!(put_price(S, K, R, sigma, T).is_nan());
            assert!(call_delta(S, K, R, sigma, T).is_nan());
            assert!(put_theta(S, K, R, sigma, T).is_nan());
            assert!(call_rho(S, K, R, sigma, T).is_nan());
            assert_eq!(gamma(S, K, R, sigma, T), 0.0);
            assert_eq!(vega(S, K, R, sigma, T), 0.0);
        }
    }

    #[test]
    fn dispatch_by_option_type() {
        let g = greeks(OptionType::Put, S, K, R, SIGMA, T);
        assert_eq!(g.delta, put_delta(S, K, R, SIGMA, T));
        assert_eq!(g.theta, put_theta(S, K, R, SIGMA, T));
        assert_eq!(g.gamma, gamma(S, K, R, SIGMA, T));

        let unknown = greeks(OptionType::Unknown, S, K, R, SIGMA, T);
        assert!(unknown.delta.is_nan());
        assert_eq!(unknown.vega, vega(S, K, R, SIGMA, T));

        assert_eq!(
            theoretical_price(OptionType::Call, S, K, R, SIGMA, T),
            call_price(S, K, R, SIGMA, T)
        );
        assert!(theoretical_price(OptionType::Unknown, S, K, R, SIGMA, T).is_nan());
        assert_eq!(intrinsic_value(OptionType::Put, 95.0, K), 5.0);
        assert_eq!(intrinsic_value(OptionType::Call, 95.0, K), 0.0);
    }
}
