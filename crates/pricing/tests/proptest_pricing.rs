//! Property-based tests for the pricing models.
//!
//! These tests verify that:
//! 1. Put-call parity holds for the closed-form prices
//! 2. Call delta minus put delta is one for live contracts
//! 3. The batch pricer matches the scalar model lane for lane, including
//!    expired and invalid-volatility lanes mixed into live vectors

use proptest::prelude::*;

use thales_core::{Greeks, OptionType};
use thales_pricing::black_scholes as bs;
use thales_pricing::vectorized::{self, BatchInputs, BatchKernel, BatchPricer};

// ============================================================================
// Strategies
// ============================================================================

fn live_contract() -> impl Strategy<Value = (f64, f64, f64, f64, f64)> {
    (
        10.0..500.0f64,
        10.0..500.0f64,
        0.0..0.10f64,
        0.05..1.0f64,
        0.01..3.0f64,
    )
}

/// Mostly live contracts with roughly one in four lanes expired or carrying
/// a non-positive volatility.
fn any_contract() -> impl Strategy<Value = (f64, f64, f64, f64, f64)> {
    prop_oneof![
        6 => live_contract(),
        1 => (10.0..500.0f64, 10.0..500.0f64, 0.0..0.10f64, 0.05..1.0f64, prop_oneof![Just(0.0), -1.0..0.0f64]),
        1 => (10.0..500.0f64, 10.0..500.0f64, 0.0..0.10f64, prop_oneof![Just(0.0), -0.5..0.0f64], 0.01..3.0f64),
    ]
}

struct Columns {
    spot: Vec<f64>,
    strike: Vec<f64>,
    rate: Vec<f64>,
    vol: Vec<f64>,
    time: Vec<f64>,
}

impl Columns {
    fn from_rows(rows: &[(f64, f64, f64, f64, f64)]) -> Self {
        Self {
            spot: rows.iter().map(|r| r.0).collect(),
            strike: rows.iter().map(|r| r.1).collect(),
            rate: rows.iter().map(|r| r.2).collect(),
            vol: rows.iter().map(|r| r.3).collect(),
            time: rows.iter().map(|r| r.4).collect(),
        }
    }

    fn inputs(&self) -> BatchInputs<'_> {
        BatchInputs::new(&self.spot, &self.strike, &self.rate, &self.vol, &self.time)
    }
}

fn same(a: f64, b: f64) -> bool {
    (a.is_nan() && b.is_nan()) || (a - b).abs() < 1e-10
}

// ============================================================================
// Closed-form invariants
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn put_call_parity((s, k, r, sigma, t) in live_contract()) {
        let lhs = bs::call_price(s, k, r, sigma, t) - bs::put_price(s, k, r, sigma, t);
        let rhs = s - k * (-r * t).exp();
        prop_assert!((lhs - rhs).abs() < 1e-4, "lhs={} rhs={}", lhs, rhs);
    }

    #[test]
    fn delta_parity((s, k, r, sigma, t) in live_contract()) {
        let diff = bs::call_delta(s, k, r, sigma, t) - bs::put_delta(s, k, r, sigma, t);
        prop_assert!((diff - 1.0).abs() < 1e-4);
    }

    #[test]
    fn prices_respect_bounds((s, k, r, sigma, t) in live_contract()) {
        let call = bs::call_price(s, k, r, sigma, t);
        let put = bs::put_price(s, k, r, sigma, t);
        prop_assert!(call >= -1e-4 && call <= s + 1e-6);
        prop_assert!(put >= -1e-4 && put <= k + 1e-6);
        prop_assert!(bs::gamma(s, k, r, sigma, t) >= 0.0);
        prop_assert!(bs::vega(s, k, r, sigma, t) >= 0.0);
    }
}

// ============================================================================
// Scalar / vector equivalence
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn batch_matches_scalar(rows in prop::collection::vec(any_contract(), 0..40)) {
        let cols = Columns::from_rows(&rows);
        let inputs = cols.inputs();
        let mut out = vec![0.0; rows.len()];

        for kernel in [BatchKernel::CallPrice, BatchKernel::PutPrice, BatchKernel::CallDelta, BatchKernel::Gamma] {
            BatchPricer::new().compute(kernel, &inputs, &mut out).unwrap();
            for (i, &(s, k, r, sigma, t)) in rows.iter().enumerate() {
                let want = kernel.scalar(s, k, r, sigma, t);
                prop_assert!(same(out[i], want), "{:?}[{}]: {} vs {}", kernel, i, out[i], want);
            }
        }
    }

    #[test]
    fn remaining_kernels_match_scalar(rows in prop::collection::vec(any_contract(), 1..24)) {
        let cols = Columns::from_rows(&rows);
        let inputs = cols.inputs();
        let mut out = vec![0.0; rows.len()];

        for kernel in BatchKernel::ALL {
            BatchPricer::new().compute(kernel, &inputs, &mut out).unwrap();
            for (i, &(s, k, r, sigma, t)) in rows.iter().enumerate() {
                prop_assert!(same(out[i], kernel.scalar(s, k, r, sigma, t)));
            }
        }
    }

    #[test]
    fn greeks_batch_matches_scalar(rows in prop::collection::vec(any_contract(), 1..24), is_call in any::<bool>()) {
        let option_type = if is_call { OptionType::Call } else { OptionType::Put };
        let cols = Columns::from_rows(&rows);
        let mut out = vec![Greeks::default(); rows.len()];
        vectorized::greeks_batch(option_type, &cols.inputs(), &mut out).unwrap();

        for (g, &(s, k, r, sigma, t)) in out.iter().zip(&rows) {
            let want = bs::greeks(option_type, s, k, r, sigma, t);
            prop_assert!(same(g.delta, want.delta));
            prop_assert!(same(g.gamma, want.gamma));
            prop_assert!(same(g.theta, want.theta));
            prop_assert!(same(g.vega, want.vega));
            prop_assert!(same(g.rho, want.rho));
        }
    }
}

// ============================================================================
// Unaligned input
// ============================================================================

#[test]
fn unaligned_subslices_price_correctly() {
    let n = 19;
    let spot: Vec<f64> = (0..n).map(|i| 80.0 + 2.0 * f64::from(i)).collect();
    let strike = vec![100.0; n as usize];
    let rate = vec![0.03; n as usize];
    let vol = vec![0.25; n as usize];
    let time = vec![0.5; n as usize];

    // Offsetting by one element breaks 32-byte alignment of every column.
    let inputs = BatchInputs::new(&spot[1..], &strike[1..], &rate[1..], &vol[1..], &time[1..]);
    let mut out = vec![0.0; inputs.len()];
    vectorized::call_price(&inputs, &mut out).unwrap();

    for (i, price) in out.iter().enumerate() {
        let want = bs::call_price(spot[i + 1], 100.0, 0.03, 0.25, 0.5);
        assert!(same(*price, want));
    }
}
