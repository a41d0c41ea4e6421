//! Error types for the pricing models.

use thiserror::Error;

/// Errors raised by a single pricing calculation.
///
/// These never describe process-level failures: a caller that prices a whole
/// chain should log the error for the affected contract and carry on.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PricingError {
    /// Inputs the model cannot accept (non-positive expiry for the solver,
    /// arbitrage-violating target price, mismatched batch lengths, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Iteration budget exhausted before the price error fell below epsilon.
    #[error("implied volatility did not converge within {iterations} iterations")]
    NonConvergence {
        /// Number of Newton steps taken.
        iterations: u32,
    },

    /// The iterate left the supported volatility range.
    #[error("implied volatility iterate {sigma} exceeds the supported maximum of {max}")]
    VolatilityOutOfRange {
        /// Offending iterate.
        sigma: f64,
        /// Supported maximum.
        max: f64,
    },

    /// Zero derivative at an iterate; Newton's method cannot proceed.
    #[error("degenerate input: {0}")]
    DegenerateInput(String),
}

impl PricingError {
    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Creates a degenerate input error.
    pub fn degenerate(message: impl Into<String>) -> Self {
        Self::DegenerateInput(message.into())
    }

    /// Returns true if the caller supplied bad input.
    #[must_use]
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }

    /// Returns true if the solver gave up on otherwise valid input.
    #[must_use]
    pub fn is_non_convergence(&self) -> bool {
        matches!(
            self,
            Self::NonConvergence { .. } | Self::VolatilityOutOfRange { .. }
        )
    }

    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        matches!(self, Self::DegenerateInput(_))
    }
}

pub type Result<T> = std::result::Result<T, PricingError>;
