use thales_pricing::black_scholes as bs;
use thales_pricing::ImpliedVolSolver;

const S: f64 = 100.0;
const K: f64 = 100.0;
const R: f64 = 0.05;
const SIGMA: f64 = 0.2;
const T: f64 = 1.0;

fn is_close(a: f64, b: f64, tolerance: f64) -> bool {
    (a - b).abs() < tolerance
}

#[test]
fn test_atm_reference_scenario() {
    assert!(is_close(bs::call_price(S, K, R, SIGMA, T), 10.45, 0.01));
    assert!(is_close(bs::put_price(S, K, R, SIGMA, T), 5.57, 0.01));
    assert!(is_close(bs::call_delta(S, K, R, SIGMA, T), 0.63, 0.01));
    assert!(is_close(bs::put_delta(S, K, R, SIGMA, T), -0.37, 0.01));
    assert!(is_close(bs::gamma(S, K, R, SIGMA, T), 0.019, 0.001));
    assert!(is_close(bs::vega(S, K, R, SIGMA, T), 0.375, 0.001));
    assert!(is_close(bs::call_rho(S, K, R, SIGMA, T), 0.53, 0.01));
    // -6.41 per year.
    assert!(is_close(bs::call_theta(S, K, R, SIGMA, T), -0.0176, 0.0005));
}

#[test]
fn test_moneyness_shifts_delta() {
    assert!(is_close(bs::call_delta(110.0, K, R, SIGMA, T), 0.79, 0.01));
    assert!(is_close(bs::call_delta(90.0, K, R, SIGMA, T), 0.43, 0.01));
    assert!(is_close(bs::put_delta(90.0, K, R, SIGMA, T), -0.57, 0.01));
}

#[test]
fn test_vega_peaks_near_the_money() {
    let atm = bs::vega(S, K, R, SIGMA, T);
    assert!(bs::vega(130.0, K, R, SIGMA, T) < atm);
    assert!(bs::vega(70.0, K, R, SIGMA, T) < atm);
}

#[test]
fn test_expiry_boundary_is_exact() {
    for (s, call_intrinsic, put_intrinsic, call_delta, put_delta) in [
        (110.0, 10.0, 0.0, 1.0, 0.0),
        (90.0, 0.0, 10.0, 0.0, -1.0),
        (100.0, 0.0, 0.0, 0.0, 0.0),
    ] {
        assert_eq!(bs::call_price(s, K, R, SIGMA, 0.0), call_intrinsic);
        assert_eq!(bs::put_price(s, K, R, SIGMA, 0.0), put_intrinsic);
        assert_eq!(bs::call_delta(s, K, R, SIGMA, 0.0), call_delta);
        assert_eq!(bs::put_delta(s, K, R, SIGMA, 0.0), put_delta);
        assert_eq!(bs::gamma(s, K, R, SIGMA, 0.0), 0.0);
        assert_eq!(bs::vega(s, K, R, SIGMA, 0.0), 0.0);
        assert_eq!(bs::call_theta(s, K, R, SIGMA, 0.0), 0.0);
        assert_eq!(bs::put_theta(s, K, R, SIGMA, 0.0), 0.0);
        assert_eq!(bs::call_rho(s, K, R, SIGMA, 0.0), 0.0);
        assert_eq!(bs::put_rho(s, K, R, SIGMA, 0.0), 0.0);
    }
}

#[test]
fn test_implied_volatility_round_trip() {
    for sigma in [0.1, 0.2, 0.3, 0.4, 0.5] {
        for (s, k, t) in [(100.0, 100.0, 1.0), (95.0, 100.0, 0.5), (110.0, 100.0, 2.0)] {
            let call = bs::call_price(s, k, R, sigma, t);
            let put = bs::put_price(s, k, R, sigma, t);
            let iv_call = bs::call_implied_volatility(call, s, k, R, t).unwrap();
            let iv_put = bs::put_implied_volatility(put, s, k, R, t).unwrap();
            assert!(is_close(iv_call, sigma, 1e-4), "call sigma={sigma} s={s}: {iv_call}");
            assert!(is_close(iv_put, sigma, 1e-4), "put sigma={sigma} s={s}: {iv_put}");
        }
    }
}

#[test]
fn test_solver_settings_are_respected() {
    let price = bs::call_price(S, K, R, 0.35, T);
    let tight = ImpliedVolSolver::new(1e-10, 100).call(price, S, K, R, T).unwrap();
    assert!(is_close(tight, 0.35, 1e-8));
}

#[test]
fn test_implied_volatility_errors_are_classified() {
    assert!(bs::call_implied_volatility(5.0, S, K, R, 0.0)
        .unwrap_err()
        .is_invalid_input());
    assert!(bs::put_implied_volatility(1.0, 50.0, K, R, T)
        .unwrap_err()
        .is_invalid_input());
    assert!(bs::call_implied_volatility(150.0, S, K, R, T)
        .unwrap_err()
        .is_non_convergence());
}
