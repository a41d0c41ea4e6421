//! Standard normal distribution.
//!
//! The CDF is the five-term Abramowitz & Stegun polynomial (26.2.17), accurate
//! to about 7.5e-8. The batch pricer evaluates the exact same sequence of
//! floating point operations per lane, so anything built on these functions
//! agrees bit-for-bit between the scalar and AVX paths.

pub(crate) const B1: f64 = 0.319_381_53;
pub(crate) const B2: f64 = -0.356_563_782;
pub(crate) const B3: f64 = 1.781_477_937;
pub(crate) const B4: f64 = -1.821_255_978;
pub(crate) const B5: f64 = 1.330_274_429;
pub(crate) const P: f64 = 0.231_641_9;
pub(crate) const C: f64 = 0.398_942_28;

/// 1 / sqrt(2π)
pub(crate) const INV_SQRT_2PI: f64 = 0.398_942_280_401_432_7;

#[inline]
pub(crate) fn poly(t: f64) -> f64 {
    t * (t * (t * (t * B5 + B4) + B3) + B2) + B1
}

/// Φ(x).
#[inline]
#[must_use]
pub fn cdf(x: f64) -> f64 {
    let ax = x.abs();
    let t = 1.0 / (1.0 + P * ax);
    let tail = C * (-ax * ax / 2.0).exp() * t * poly(t);
    if x >= 0.0 {
        1.0 - tail
    } else {
        tail
    }
}

/// φ(x).
#[inline]
#[must_use]
pub fn pdf(x: f64) -> f64 {
    INV_SQRT_2PI * (-0.5 * x * x).exp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cdf_reference_points() {
        assert!((cdf(0.0) - 0.5).abs() < 1e-6);
        assert!((cdf(1.0) - 0.841_344_746).abs() < 1e-6);
        assert!((cdf(-1.96) - 0.024_997_895).abs() < 1e-6);
        assert!(cdf(-40.0) >= 0.0);
        assert!((cdf(40.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn cdf_is_symmetric() {
        for i in 1..=50 {
            let x = f64::from(i) * 0.1;
            assert!((cdf(x) + cdf(-x) - 1.0).abs() < 1e-12, "x = {x}");
        }
    }

    #[test]
    fn pdf_peak_and_symmetry() {
        assert!((pdf(0.0) - INV_SQRT_2PI).abs() < 1e-15);
        assert!((pdf(1.3) - pdf(-1.3)).abs() < 1e-15);
        assert!((pdf(1.0) - 0.241_970_724_519_143_37).abs() < 1e-12);
    }

    #[test]
    fn nan_propagates() {
        assert!(cdf(f64::NAN).is_nan());
        assert!(pdf(f64::NAN).is_nan());
    }
}
