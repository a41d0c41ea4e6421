//! Error types for the ledger and risk manager.

use thales_core::SymbolId;
use thiserror::Error;

/// Ledger mutations that cannot be applied.
///
/// "Not found" is deliberately absent: unknown order ids and symbols on
/// update/cancel are routine and reported as `false`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortfolioError {
    /// A bounded collection is full.
    #[error("{collection} capacity of {capacity} exceeded")]
    CapacityExceeded {
        /// "positions" or "orders".
        collection: &'static str,
        capacity: usize,
    },

    /// The symbol id was never interned in the shared symbol table.
    #[error("unknown symbol id {0}")]
    UnknownSymbol(SymbolId),

    #[error("order {order_id} rejected: {reason}")]
    InvalidOrder { order_id: u64, reason: &'static str },
}

impl PortfolioError {
    pub(crate) fn positions_full(capacity: usize) -> Self {
        Self::CapacityExceeded {
            collection: "positions",
            capacity,
        }
    }

    pub(crate) fn orders_full(capacity: usize) -> Self {
        Self::CapacityExceeded {
            collection: "orders",
            capacity,
        }
    }
}

/// Risk manager construction errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RiskError {
    #[error("invalid risk limits: {0}")]
    InvalidLimits(String),
}

/// Why an order was refused by the risk manager.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RiskViolation {
    #[error("position size {size} would exceed limit {limit}")]
    PositionSize { size: f64, limit: f64 },

    #[error("trade risk {risk:.4} exceeds per-trade limit {limit:.4}")]
    TradeRisk { risk: f64, limit: f64 },

    #[error("leverage {leverage:.2} would exceed limit {limit:.2}")]
    Leverage { leverage: f64, limit: f64 },

    #[error("daily loss {loss:.2} reached limit {limit:.2}")]
    DailyLoss { loss: f64, limit: f64 },

    #[error("order references unknown symbol id {0}")]
    UnknownSymbol(SymbolId),

    #[error("no reference price to size order {order_id}")]
    NoReferencePrice { order_id: u64 },
}
