use serde::{Deserialize, Serialize};
use thales_core::SymbolId;

use crate::contract::OptionContract;

/// Holding in one instrument.
///
/// Invariant: `unrealized_pnl == quantity * (last_price - average_price)`,
/// and 0 when flat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub contract: OptionContract,
    /// Signed: positive long, negative short.
    pub quantity: i64,
    pub average_price: f64,
    pub last_price: f64,
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
}

impl Position {
    /// A flat position.
    #[must_use]
    pub fn new(contract: OptionContract) -> Self {
        Self {
            contract,
            quantity: 0,
            average_price: 0.0,
            last_price: 0.0,
            realized_pnl: 0.0,
            unrealized_pnl: 0.0,
        }
    }

    /// A position opened at `average_price` and marked at `last_price`.
    #[must_use]
    pub fn opened(contract: OptionContract, quantity: i64, average_price: f64, last_price: f64) -> Self {
        let mut position = Self {
            quantity,
            average_price,
            last_price,
            ..Self::new(contract)
        };
        position.refresh_unrealized();
        position
    }

    #[must_use]
    pub fn symbol_id(&self) -> SymbolId {
        self.contract.symbol_id
    }

    #[must_use]
    pub fn is_flat(&self) -> bool {
        self.quantity == 0
    }

    /// Mark-to-market value.
    #[must_use]
    pub fn value(&self) -> f64 {
        self.quantity as f64 * self.last_price
    }

    #[must_use]
    pub fn compute_unrealized_pnl(&self) -> f64 {
        if self.quantity == 0 {
            return 0.0;
        }
        self.quantity as f64 * (self.last_price - self.average_price)
    }

    pub(crate) fn refresh_unrealized(&mut self) {
        self.unrealized_pnl = self.compute_unrealized_pnl();
    }

    pub fn mark(&mut self, last_price: f64) {
        self.last_price = last_price;
        self.refresh_unrealized();
    }

    /// Applies one fill of `signed_qty` at `price` and returns the P&L it realized.
    ///
    /// - Opening or adding: the entry price becomes the quantity-weighted average.
    /// - Reducing: realizes `closed * (price - avg) * sign(old)`; entry price unchanged.
    /// - Flipping: realizes on the closed part; the remainder is entered at `price`.
    /// - Closing to flat: entry price resets to 0; realized P&L is kept.
    pub fn apply_fill(&mut self, signed_qty: i64, price: f64) -> f64 {
        if signed_qty == 0 {
            return 0.0;
        }

        let old = self.quantity;
        let new = old + signed_qty;
        let mut realized = 0.0;

        if old == 0 || old.signum() == signed_qty.signum() {
            let old_cost = self.average_price * old.unsigned_abs() as f64;
            let add_cost = price * signed_qty.unsigned_abs() as f64;
            self.average_price = (old_cost + add_cost) / new.unsigned_abs() as f64;
        } else {
            let closed = signed_qty.unsigned_abs().min(old.unsigned_abs()) as f64;
            realized = closed * (price - self.average_price) * old.signum() as f64;
            if new == 0 {
                self.average_price = 0.0;
            } else if new.signum() != old.signum() {
                self.average_price = price;
            }
        }

        self.quantity = new;
        self.realized_pnl += realized;
        if self.last_price <= 0.0 {
            self.last_price = price;
        }
        self.refresh_unrealized();
        realized
    }
}
