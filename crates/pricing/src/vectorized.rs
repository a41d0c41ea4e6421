//! Batch Black-Scholes over parallel input arrays, four options per AVX
//! instruction group.
//!
//! Every lane evaluates the regular formula and the degenerate cases
//! unconditionally and picks per lane with a comparison mask, so expired
//! (`T <= 0`) and invalid-volatility (`sigma <= 0`) contracts can share a
//! vector with live ones. The arithmetic mirrors [`crate::black_scholes`]
//! operation for operation; `exp` and `ln` are evaluated per lane with the
//! same `f64` routines. Results therefore match the scalar model exactly.
//!
//! Inputs are read with unaligned loads; `n % 4` trailing elements go through
//! the scalar model. Without AVX, or off x86_64, every call is a scalar loop.
//! Nothing here allocates or locks.

use serde::{Deserialize, Serialize};
use thales_core::{Greeks, OptionType};

use crate::black_scholes as bs;
use crate::cpu::cpu_features;
use crate::error::{PricingError, Result};

pub const LANES: usize = 4;

/// Parallel input arrays. All five must have the same length.
#[derive(Debug, Clone, Copy)]
pub struct BatchInputs<'a> {
    pub spot: &'a [f64],
    pub strike: &'a [f64],
    pub rate: &'a [f64],
    pub volatility: &'a [f64],
    pub time: &'a [f64],
}

impl<'a> BatchInputs<'a> {
    #[must_use]
    pub fn new(
        spot: &'a [f64],
        strike: &'a [f64],
        rate: &'a [f64],
        volatility: &'a [f64],
        time: &'a [f64],
    ) -> Self {
        Self {
            spot,
            strike,
            rate,
            volatility,
            time,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.spot.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.spot.is_empty()
    }

    fn check(&self, out_len: usize) -> Result<()> {
        let n = self.spot.len();
        let lens = [
            self.strike.len(),
            self.rate.len(),
            self.volatility.len(),
            self.time.len(),
            out_len,
        ];
        if lens.iter().any(|&len| len != n) {
            return Err(PricingError::invalid_argument(format!(
                "batch length mismatch: spot={n}, strike={}, rate={}, volatility={}, time={}, output={}",
                lens[0], lens[1], lens[2], lens[3], lens[4]
            )));
        }
        Ok(())
    }

    #[inline]
    fn at(&self, i: usize) -> (f64, f64, f64, f64, f64) {
        (
            self.spot[i],
            self.strike[i],
            self.rate[i],
            self.volatility[i],
            self.time[i],
        )
    }
}

/// Quantity computed by a batch call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchKernel {
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

impl BatchKernel {
    pub const ALL: [Self; 10] = [
        Self::CallPrice,
        Self::PutPrice,
        Self::CallDelta,
        Self::PutDelta,
        Self::Gamma,
        Self::Vega,
        Self::CallTheta,
        Self::PutTheta,
        Self::CallRho,
        Self::PutRho,
    ];

    /// The closed-form function this kernel vectorizes.
    #[must_use]
    pub fn scalar(self, s: f64, k: f64, r: f64, sigma: f64, t: f64) -> f64 {
        let f: fn(f64, f64, f64, f64, f64) -> f64 = match self {
            Self::CallPrice => bs::call_price,
            Self::PutPrice => bs::put_price,
            Self::CallDelta => bs::call_delta,
            Self::PutDelta => bs::put_delta,
            Self::Gamma => bs::gamma,
            Self::Vega => bs::vega,
            Self::CallTheta => bs::call_theta,
            Self::PutTheta => bs::put_theta,
            Self::CallRho => bs::call_rho,
            Self::PutRho => bs::put_rho,
        };
        f(s, k, r, sigma, t)
    }
}

/// Dispatches batch calls to the AVX kernels or the scalar loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPricer {
    vector: bool,
}

impl Default for BatchPricer {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchPricer {
    /// Uses the vector path when the CPU supports it.
    #[must_use]
    pub fn new() -> Self {
        Self {
            vector: cfg!(target_arch = "x86_64") && cpu_features().vector_path_available(),
        }
    }

    /// Always uses the scalar loop.
    #[must_use]
    pub const fn scalar() -> Self {
        Self { vector: false }
    }

    #[must_use]
    pub const fn uses_vector_path(&self) -> bool {
        self.vector
    }

    /// Writes `kernel(inputs[i])` into `out[i]` for every `i`.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the input and output lengths differ.
    pub fn compute(&self, kernel: BatchKernel, inputs: &BatchInputs<'_>, out: &mut [f64]) -> Result<()> {
        inputs.check(out.len())?;

        #[cfg(target_arch = "x86_64")]
        if self.vector {
            // SAFETY: `vector` is only set after AVX was detected at runtime,
            // and all slices were checked to have `out.len()` elements.
            unsafe { avx::compute(kernel, inputs, out) };
            return Ok(());
        }

        for (i, slot) in out.iter_mut().enumerate() {
            let (s, k, r, sigma, t) = inputs.at(i);
            *slot = kernel.scalar(s, k, r, sigma, t);
        }
        Ok(())
    }

    /// All five Greeks per contract for a chain of one option type.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the input and output lengths differ.
    pub fn greeks(
        &self,
        option_type: OptionType,
        inputs: &BatchInputs<'_>,
        out: &mut [Greeks],
    ) -> Result<()> {
        inputs.check(out.len())?;

        #[cfg(target_arch = "x86_64")]
        if self.vector && option_type != OptionType::Unknown {
            // SAFETY: see `compute`.
            unsafe { avx::greeks(option_type == OptionType::Call, inputs, out) };
            return Ok(());
        }

        for (i, slot) in out.iter_mut().enumerate() {
            let (s, k, r, sigma, t) = inputs.at(i);
            *slot = bs::greeks(option_type, s, k, r, sigma, t);
        }
        Ok(())
    }
}

macro_rules! batch_fn {
    ($(#[$doc:meta] $name:ident => $kernel:ident),* $(,)?) => {
        $(
            #[$doc]
            ///
            /// # Errors
            ///
            /// `InvalidArgument` if the input and output lengths differ.
            pub fn $name(inputs: &BatchInputs<'_>, out: &mut [f64]) -> Result<()> {
                BatchPricer::new().compute(BatchKernel::$kernel, inputs, out)
            }
        )*
    };
}

batch_fn! {
    /// Batch [`bs::call_price`].
    call_price => CallPrice,
    /// Batch [`bs::put_price`].
    put_price => PutPrice,
    /// Batch [`bs::call_delta`].
    call_delta => CallDelta,
    /// Batch [`bs::put_delta`].
    put_delta => PutDelta,
    /// Batch [`bs::gamma`].
    gamma => Gamma,
    /// Batch [`bs::vega`].
    vega => Vega,
    /// Batch [`bs::call_theta`].
    call_theta => CallTheta,
    /// Batch [`bs::put_theta`].
    put_theta => PutTheta,
    /// Batch [`bs::call_rho`].
    call_rho => CallRho,
    /// Batch [`bs::put_rho`].
    put_rho => PutRho,
}

/// Batch [`bs::greeks`] for a chain of one option type.
///
/// # Errors
///
/// `InvalidArgument` if the input and output lengths differ.
pub fn greeks_batch(option_type: OptionType, inputs: &BatchInputs<'_>, out: &mut [Greeks]) -> Result<()> {
    BatchPricer::new().greeks(option_type, inputs, out)
}

#[cfg(target_arch = "x86_64")]
mod avx {
    use std::arch::x86_64::*;

    use thales_core::Greeks;

    use super::{BatchInputs, BatchKernel, LANES};
    use crate::black_scholes::{self as bs, DAYS_PER_YEAR, PERCENT};
    use crate::normal::{B1, B2, B3, B4, B5, C, INV_SQRT_2PI, P};

    // ========================================================================
    // Lane helpers
    // ========================================================================

    #[inline]
    #[target_feature(enable = "avx")]
    unsafe fn splat(x: f64) -> __m256d {
        _mm256_set1_pd(x)
    }

    #[inline]
    #[target_feature(enable = "avx")]
    unsafe fn neg(x: __m256d) -> __m256d {
        _mm256_xor_pd(x, _mm256_set1_pd(-0.0))
    }

    #[inline]
    #[target_feature(enable = "avx")]
    unsafe fn abs(x: __m256d) -> __m256d {
        _mm256_andnot_pd(_mm256_set1_pd(-0.0), x)
    }

    /// Applies a scalar function to each lane.
    #[inline]
    #[target_feature(enable = "avx")]
    unsafe fn map(x: __m256d, f: fn(f64) -> f64) -> __m256d {
        let mut lanes = [0.0_f64; LANES];
        _mm256_storeu_pd(lanes.as_mut_ptr(), x);
        for lane in &mut lanes {
            *lane = f(*lane);
        }
        _mm256_loadu_pd(lanes.as_ptr())
    }

    #[inline]
    #[target_feature(enable = "avx")]
    unsafe fn select(mask: __m256d, if_set: __m256d, otherwise: __m256d) -> __m256d {
        _mm256_blendv_pd(otherwise, if_set, mask)
    }

    #[inline]
    #[target_feature(enable = "avx")]
    unsafe fn poly(t: __m256d) -> __m256d {
        let mut acc = _mm256_add_pd(_mm256_mul_pd(t, splat(B5)), splat(B4));
        acc = _mm256_add_pd(_mm256_mul_pd(t, acc), splat(B3));
        acc = _mm256_add_pd(_mm256_mul_pd(t, acc), splat(B2));
        _mm256_add_pd(_mm256_mul_pd(t, acc), splat(B1))
    }

    #[inline]
    #[target_feature(enable = "avx")]
    unsafe fn cdf(x: __m256d) -> __m256d {
        let one = splat(1.0);
        let ax = abs(x);
        let t = _mm256_div_pd(one, _mm256_add_pd(one, _mm256_mul_pd(splat(P), ax)));
        let e = map(_mm256_div_pd(_mm256_mul_pd(neg(ax), ax), splat(2.0)), f64::exp);
        let tail = _mm256_mul_pd(_mm256_mul_pd(_mm256_mul_pd(splat(C), e), t), poly(t));
        let non_negative = _mm256_cmp_pd(x, _mm256_setzero_pd(), _CMP_GE_OQ);
        select(non_negative, _mm256_sub_pd(one, tail), tail)
    }

    #[inline]
    #[target_feature(enable = "avx")]
    unsafe fn pdf(x: __m256d) -> __m256d {
        let e = map(_mm256_mul_pd(_mm256_mul_pd(splat(-0.5), x), x), f64::exp);
        _mm256_mul_pd(splat(INV_SQRT_2PI), e)
    }

    // ========================================================================
    // Per-chunk terms
    // ========================================================================

    struct Chunk {
        s: __m256d,
        k: __m256d,
        r: __m256d,
        sigma: __m256d,
        t: __m256d,
        sqrt_t: __m256d,
        d1: __m256d,
        d2: __m256d,
        discount: __m256d,
        /// `t <= 0`
        expired: __m256d,
        /// `sigma <= 0`
        bad_vol: __m256d,
    }

    impl Chunk {
        #[inline]
        #[target_feature(enable = "avx")]
        unsafe fn load(inputs: &BatchInputs<'_>, i: usize) -> Self {
            let s = _mm256_loadu_pd(inputs.spot.as_ptr().add(i));
            let k = _mm256_loadu_pd(inputs.strike.as_ptr().add(i));
            let r = _mm256_loadu_pd(inputs.rate.as_ptr().add(i));
            let sigma = _mm256_loadu_pd(inputs.volatility.as_ptr().add(i));
            let t = _mm256_loadu_pd(inputs.time.as_ptr().add(i));

            let sqrt_t = _mm256_sqrt_pd(t);
            let log_moneyness = map(_mm256_div_pd(s, k), f64::ln);
            let drift = _mm256_add_pd(r, _mm256_div_pd(_mm256_mul_pd(sigma, sigma), splat(2.0)));
            let vol_sqrt_t = _mm256_mul_pd(sigma, sqrt_t);
            let d1 = _mm256_div_pd(_mm256_add_pd(log_moneyness, _mm256_mul_pd(drift, t)), vol_sqrt_t);
            let d2 = _mm256_sub_pd(d1, vol_sqrt_t);
            let discount = map(_mm256_mul_pd(neg(r), t), f64::exp);

            let zero = _mm256_setzero_pd();
            Self {
                s,
                k,
                r,
                sigma,
                t,
                sqrt_t,
                d1,
                d2,
                discount,
                expired: _mm256_cmp_pd(t, zero, _CMP_LE_OQ),
                bad_vol: _mm256_cmp_pd(sigma, zero, _CMP_LE_OQ),
            }
        }

        /// Expiry takes precedence over invalid volatility.
        #[inline]
        #[target_feature(enable = "avx")]
        unsafe fn finish(&self, live: __m256d, at_expiry: __m256d) -> __m256d {
            let live = select(self.bad_vol, splat(f64::NAN), live);
            select(self.expired, at_expiry, live)
        }

        #[inline]
        #[target_feature(enable = "avx")]
        unsafe fn zero_if_degenerate(&self, live: __m256d) -> __m256d {
            let degenerate = _mm256_or_pd(self.expired, self.bad_vol);
            select(degenerate, _mm256_setzero_pd(), live)
        }
    }

    // ========================================================================
    // Kernels
    // ========================================================================

    #[inline]
    #[target_feature(enable = "avx")]
    unsafe fn call_price(c: &Chunk) -> __m256d {
        let live = _mm256_sub_pd(
            _mm256_mul_pd(c.s, cdf(c.d1)),
            _mm256_mul_pd(_mm256_mul_pd(c.k, c.discount), cdf(c.d2)),
        );
        c.finish(live, _mm256_max_pd(_mm256_sub_pd(c.s, c.k), _mm256_setzero_pd()))
    }

    #[inline]
    #[target_feature(enable = "avx")]
    unsafe fn put_price(c: &Chunk) -> __m256d {
        let live = _mm256_sub_pd(
            _mm256_mul_pd(_mm256_mul_pd(c.k, c.discount), cdf(neg(c.d2))),
            _mm256_mul_pd(c.s, cdf(neg(c.d1))),
        );
        c.finish(live, _mm256_max_pd(_mm256_sub_pd(c.k, c.s), _mm256_setzero_pd()))
    }

    #[inline]
    #[target_feature(enable = "avx")]
    unsafe fn call_delta(c: &Chunk) -> __m256d {
        let itm = _mm256_cmp_pd(c.s, c.k, _CMP_GT_OQ);
        c.finish(cdf(c.d1), _mm256_and_pd(itm, splat(1.0)))
    }

    #[inline]
    #[target_feature(enable = "avx")]
    unsafe fn put_delta(c: &Chunk) -> __m256d {
        let itm = _mm256_cmp_pd(c.s, c.k, _CMP_LT_OQ);
        c.finish(_mm256_sub_pd(cdf(c.d1), splat(1.0)), _mm256_and_pd(itm, splat(-1.0)))
    }

    #[inline]
    #[target_feature(enable = "avx")]
    unsafe fn gamma(c: &Chunk) -> __m256d {
        let denom = _mm256_mul_pd(_mm256_mul_pd(c.s, c.sigma), c.sqrt_t);
        c.zero_if_degenerate(_mm256_div_pd(pdf(c.d1), denom))
    }

    #[inline]
    #[target_feature(enable = "avx")]
    unsafe fn vega(c: &Chunk) -> __m256d {
        let raw = _mm256_mul_pd(_mm256_mul_pd(c.s, c.sqrt_t), pdf(c.d1));
        c.zero_if_degenerate(_mm256_div_pd(raw, splat(PERCENT)))
    }

    #[inline]
    #[target_feature(enable = "avx")]
    unsafe fn decay(c: &Chunk) -> __m256d {
        _mm256_div_pd(
            _mm256_mul_pd(_mm256_mul_pd(neg(c.s), c.sigma), pdf(c.d1)),
            _mm256_mul_pd(splat(2.0), c.sqrt_t),
        )
    }

    #[inline]
    #[target_feature(enable = "avx")]
    unsafe fn call_theta(c: &Chunk) -> __m256d {
        let carry = _mm256_mul_pd(
            _mm256_mul_pd(_mm256_mul_pd(neg(c.r), c.k), c.discount),
            cdf(c.d2),
        );
        let live = _mm256_div_pd(_mm256_add_pd(decay(c), carry), splat(DAYS_PER_YEAR));
        c.finish(live, _mm256_setzero_pd())
    }

    #[inline]
    #[target_feature(enable = "avx")]
    unsafe fn put_theta(c: &Chunk) -> __m256d {
        let carry = _mm256_mul_pd(
            _mm256_mul_pd(_mm256_mul_pd(c.r, c.k), c.discount),
            cdf(neg(c.d2)),
        );
        let live = _mm256_div_pd(_mm256_add_pd(decay(c), carry), splat(DAYS_PER_YEAR));
        c.finish(live, _mm256_setzero_pd())
    }

    #[inline]
    #[target_feature(enable = "avx")]
    unsafe fn call_rho(c: &Chunk) -> __m256d {
        let raw = _mm256_mul_pd(
            _mm256_mul_pd(_mm256_mul_pd(c.k, c.t), c.discount),
            cdf(c.d2),
        );
        c.finish(_mm256_div_pd(raw, splat(PERCENT)), _mm256_setzero_pd())
    }

    #[inline]
    #[target_feature(enable = "avx")]
    unsafe fn put_rho(c: &Chunk) -> __m256d {
        let raw = _mm256_mul_pd(
            _mm256_mul_pd(_mm256_mul_pd(neg(c.k), c.t), c.discount),
            cdf(neg(c.d2)),
        );
        c.finish(_mm256_div_pd(raw, splat(PERCENT)), _mm256_setzero_pd())
    }

    // ========================================================================
    // Drivers
    // ========================================================================

    /// # Safety
    ///
    /// AVX must be available and every input slice must have `out.len()` elements.
    #[target_feature(enable = "avx")]
    pub(super) unsafe fn compute(kernel: BatchKernel, inputs: &BatchInputs<'_>, out: &mut [f64]) {
        let n = out.len();
        let full = n - n % LANES;

        let mut i = 0;
        while i < full {
            let c = Chunk::load(inputs, i);
            let v = match kernel {
                BatchKernel::CallPrice => call_price(&c),
                BatchKernel::PutPrice => put_price(&c),
                BatchKernel::CallDelta => call_delta(&c),
                BatchKernel::PutDelta => put_delta(&c),
                BatchKernel::Gamma => gamma(&c),
                BatchKernel::Vega => vega(&c),
                BatchKernel::CallTheta => call_theta(&c),
                BatchKernel::PutTheta => put_theta(&c),
                BatchKernel::CallRho => call_rho(&c),
                BatchKernel::PutRho => put_rho(&c),
            };
            _mm256_storeu_pd(out.as_mut_ptr().add(i), v);
            i += LANES;
        }

        for (j, slot) in out.iter_mut().enumerate().skip(full) {
            let (s, k, r, sigma, t) = inputs.at(j);
            *slot = kernel.scalar(s, k, r, sigma, t);
        }
    }

    /// # Safety
    ///
    /// Same contract as [`compute`].
    #[target_feature(enable = "avx")]
    pub(super) unsafe fn greeks(is_call: bool, inputs: &BatchInputs<'_>, out: &mut [Greeks]) {
        let n = out.len();
        let full = n - n % LANES;

        let mut delta = [0.0_f64; LANES];
        let mut gamma_out = [0.0_f64; LANES];
        let mut theta = [0.0_f64; LANES];
        let mut vega_out = [0.0_f64; LANES];
        let mut rho = [0.0_f64; LANES];

        let mut i = 0;
        while i < full {
            let c = Chunk::load(inputs, i);
            let (d, th, rh) = if is_call {
                (call_delta(&c), call_theta(&c), call_rho(&c))
            } else {
                (put_delta(&c), put_theta(&c), put_rho(&c))
            };
            _mm256_storeu_pd(delta.as_mut_ptr(), d);
            _mm256_storeu_pd(gamma_out.as_mut_ptr(), gamma(&c));
            _mm256_storeu_pd(theta.as_mut_ptr(), th);
            _mm256_storeu_pd(vega_out.as_mut_ptr(), vega(&c));
            _mm256_storeu_pd(rho.as_mut_ptr(), rh);

            for lane in 0..LANES {
                out[i + lane] = Greeks {
                    delta: delta[lane],
                    gamma: gamma_out[lane],
                    theta: theta[lane],
                    vega: vega_out[lane],
                    rho: rho[lane],
                };
            }
            i += LANES;
        }

        let option_type = if is_call {
            thales_core::OptionType::Call
        } else {
            thales_core::OptionType::Put
        };
        for (j, slot) in out.iter_mut().enumerate().skip(full) {
            let (s, k, r, sigma, t) = inputs.at(j);
            *slot = bs::greeks(option_type, s, k, r, sigma, t);
        }
    }
}
