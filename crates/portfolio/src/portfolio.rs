//! Thread-safe position and order ledger.
//!
//! Every public method takes the single ledger mutex for its full duration.
//! Collections are small contiguous vectors with fixed capacity, scanned
//! linearly.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thales_core::{Greeks, SymbolId, SymbolTable};
use tracing::{debug, info, warn};

use crate::contract::OptionContract;
use crate::error::PortfolioError;
use crate::order::{Order, OrderStatus};
use crate::position::Position;

/// Maximum number of positions held by one portfolio.
pub const MAX_POSITIONS: usize = 256;

/// Maximum number of orders (active and historical) held by one portfolio.
pub const MAX_ORDERS: usize = 256;

#[derive(Debug, Default)]
struct Ledger {
    positions: Vec<Position>,
    orders: Vec<Order>,
}

impl Ledger {
    fn position_index(&self, symbol: SymbolId) -> Option<usize> {
        self.positions.iter().position(|p| p.symbol_id() == symbol)
    }

    fn order_index(&self, order_id: u64) -> Option<usize> {
        self.orders.iter().position(|o| o.order_id == order_id)
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// Point-in-time copy of the ledger, taken under one lock acquisition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub positions: Vec<Position>,
    pub orders: Vec<Order>,
}

impl PortfolioSnapshot {
    #[must_use]
    pub fn position(&self, symbol: SymbolId) -> Option<&Position> {
        self.positions.iter().find(|p| p.symbol_id() == symbol)
    }

    #[must_use]
    pub fn total_value(&self) -> f64 {
        total_value(&self.positions)
    }

    #[must_use]
    pub fn total_unrealized_pnl(&self) -> f64 {
        self.positions.iter().map(|p| p.unrealized_pnl).sum()
    }

    #[must_use]
    pub fn total_realized_pnl(&self) -> f64 {
        self.positions.iter().map(|p| p.realized_pnl).sum()
    }

    #[must_use]
    pub fn total_exposure(&self) -> f64 {
        total_exposure(&self.positions)
    }

    pub fn open_orders(&self) -> impl Iterator<Item = &Order> {
        self.orders.iter().filter(|o| o.is_active())
    }
}

fn total_value(positions: &[Position]) -> f64 {
    positions.iter().map(Position::value).sum()
}

fn total_exposure(positions: &[Position]) -> f64 {
    positions.iter().map(|p| p.value().abs()).sum()
}

// ============================================================================
// Portfolio
// ============================================================================

pub struct Portfolio {
    symbols: Arc<SymbolTable>,
    ledger: Mutex<Ledger>,
    next_order_id: AtomicU64,
}

impl Portfolio {
    #[must_use]
    pub fn new(symbols: Arc<SymbolTable>) -> Self {
        Self {
            symbols,
            ledger: Mutex::new(Ledger {
                positions: Vec::with_capacity(MAX_POSITIONS),
                orders: Vec::with_capacity(MAX_ORDERS),
            }),
            next_order_id: AtomicU64::new(1),
        }
    }

    #[must_use]
    pub fn symbols(&self) -> &Arc<SymbolTable> {
        &self.symbols
    }

    /// Allocates a fresh order id. Ids are unique per portfolio.
    pub fn next_order_id(&self) -> u64 {
        self.next_order_id.fetch_add(1, Ordering::Relaxed)
    }

    fn check_symbol(&self, symbol: SymbolId) -> Result<(), PortfolioError> {
        if self.symbols.contains_id(symbol) {
            Ok(())
        } else {
            Err(PortfolioError::UnknownSymbol(symbol))
        }
    }

    // ------------------------------------------------------------------------
    // Positions
    // ------------------------------------------------------------------------

    /// Inserts a position, replacing any existing position on the same symbol.
    ///
    /// # Errors
    ///
    /// `UnknownSymbol` if the contract's symbol was never interned,
    /// `CapacityExceeded` if a new slot is needed and the ledger is full.
    pub fn add_position(&self, mut position: Position) -> Result<(), PortfolioError> {
        let symbol = position.symbol_id();
        self.check_symbol(symbol)?;
        position.refresh_unrealized();

        let mut ledger = self.ledger.lock();
        if let Some(idx) = ledger.position_index(symbol) {
            ledger.positions[idx] = position;
            return Ok(());
        }
        if ledger.positions.len() >= MAX_POSITIONS {
            return Err(PortfolioError::positions_full(MAX_POSITIONS));
        }
        debug!(symbol = %symbol, quantity = position.quantity, "position added");
        ledger.positions.push(position);
        Ok(())
    }

    /// Registers the contract terms for a symbol without changing any holding.
    ///
    /// Creates a flat position if none exists; an existing position whose
    /// contract terms are unknown adopts `contract`.
    ///
    /// # Errors
    ///
    /// Same as [`Portfolio::add_position`].
    pub fn ensure_position(&self, contract: OptionContract) -> Result<(), PortfolioError> {
        let symbol = contract.symbol_id;
        self.check_symbol(symbol)?;

        let mut ledger = self.ledger.lock();
        if let Some(idx) = ledger.position_index(symbol) {
            let existing = &mut ledger.positions[idx];
            if !existing.contract.is_option() {
                existing.contract = contract;
            }
            return Ok(());
        }
        if ledger.positions.len() >= MAX_POSITIONS {
            return Err(PortfolioError::positions_full(MAX_POSITIONS));
        }
        ledger.positions.push(Position::new(contract));
        Ok(())
    }

    /// Marks the position on `symbol` at `new_price`. Returns false if absent.
    pub fn update_position(&self, symbol: SymbolId, new_price: f64) -> bool {
        let mut ledger = self.ledger.lock();
        match ledger.position_index(symbol) {
            Some(idx) => {
                ledger.positions[idx].mark(new_price);
                true
            }
            None => false,
        }
    }

    /// Writes revalued Greeks into the position's contract. Returns false if absent.
    pub fn update_greeks(&self, symbol: SymbolId, greeks: Greeks) -> bool {
        let mut ledger = self.ledger.lock();
        match ledger.position_index(symbol) {
            Some(idx) => {
                ledger.positions[idx].contract.greeks = greeks;
                true
            }
            None => false,
        }
    }

    /// Drops flat positions, returning how many were removed.
    pub fn prune_flat_positions(&self) -> usize {
        let mut ledger = self.ledger.lock();
        let before = ledger.positions.len();
        ledger.positions.retain(|p| !p.is_flat());
        before - ledger.positions.len()
    }

    #[must_use]
    pub fn positions(&self) -> Vec<Position> {
        self.ledger.lock().positions.clone()
    }

    #[must_use]
    pub fn position(&self, symbol: SymbolId) -> Option<Position> {
        let ledger = self.ledger.lock();
        ledger.position_index(symbol).map(|idx| ledger.positions[idx].clone())
    }

    #[must_use]
    pub fn position_count(&self) -> usize {
        self.ledger.lock().positions.len()
    }

    // ------------------------------------------------------------------------
    // Orders
    // ------------------------------------------------------------------------

    /// Records a new order.
    ///
    /// # Errors
    ///
    /// `UnknownSymbol` for an uninterned symbol, `InvalidOrder` for a zero
    /// quantity or a duplicate id, `CapacityExceeded` when the order book is full.
    pub fn add_order(&self, order: Order) -> Result<(), PortfolioError> {
        self.check_symbol(order.symbol_id)?;
        if order.quantity == 0 {
            return Err(PortfolioError::InvalidOrder {
                order_id: order.order_id,
                reason: "zero quantity",
            });
        }

        let mut ledger = self.ledger.lock();
        if ledger.order_index(order.order_id).is_some() {
            return Err(PortfolioError::InvalidOrder {
                order_id: order.order_id,
                reason: "duplicate order id",
            });
        }
        if ledger.orders.len() >= MAX_ORDERS {
            return Err(PortfolioError::orders_full(MAX_ORDERS));
        }
        info!(
            order_id = order.order_id,
            symbol = %order.symbol_id,
            side = %order.side,
            order_type = %order.order_type,
            quantity = order.quantity,
            "order added"
        );
        ledger.orders.push(order);
        Ok(())
    }

    /// Applies a status report and an incremental fill to an order.
    ///
    /// `filled_delta` is the quantity filled since the previous report, at
    /// `fill_price`. It is capped at the remaining quantity, folded into the
    /// volume-weighted average fill price, and applied to the position on the
    /// order's symbol exactly once. An order becomes FILLED only once its
    /// whole quantity is filled; a FILLED report short of that is treated as
    /// PARTIALLY_FILLED (or ignored with no fill yet). A stale status older
    /// than the current one is ignored.
    ///
    /// Returns false when the order is unknown or already terminal, when the
    /// fill price is not a finite non-negative number, or when the fill would
    /// need a new position slot and the ledger is full. Nothing is changed in
    /// those cases.
    pub fn update_order(
        &self,
        order_id: u64,
        status: OrderStatus,
        filled_delta: u32,
        fill_price: f64,
    ) -> bool {
        let mut ledger = self.ledger.lock();
        let Some(idx) = ledger.order_index(order_id) else {
            debug!(order_id, "update for unknown order");
            return false;
        };

        let (symbol, sign, current, fill) = {
            let order = &ledger.orders[idx];
            (
                order.symbol_id,
                order.side.sign(),
                order.status,
                filled_delta.min(order.remaining_quantity()),
            )
        };

        if current.is_terminal() {
            debug!(order_id, status = %current, "update for terminal order ignored");
            return false;
        }
        if fill > 0 && !(fill_price.is_finite() && fill_price >= 0.0) {
            warn!(order_id, fill_price, "fill with invalid price ignored");
            return false;
        }
        let position_idx = ledger.position_index(symbol);
        if fill > 0 && position_idx.is_none() && ledger.positions.len() >= MAX_POSITIONS {
            warn!(order_id, symbol = %symbol, "no position slot for fill");
            return false;
        }

        let order = &mut ledger.orders[idx];
        if fill > 0 {
            let previous = f64::from(order.filled_quantity);
            let total = order.filled_quantity + fill;
            order.prices.average_fill = (order.prices.average_fill * previous
                + fill_price * f64::from(fill))
                / f64::from(total);
            order.filled_quantity = total;
        }

        let requested = if order.filled_quantity == order.quantity {
            OrderStatus::Filled
        } else if matches!(status, OrderStatus::Pending | OrderStatus::Filled) {
            if order.filled_quantity > 0 {
                OrderStatus::PartiallyFilled
            } else {
                current
            }
        } else {
            status
        };
        if current.can_transition_to(requested) {
            order.status = requested;
        } else {
            debug!(order_id, current = %current, requested = %requested, "stale status kept");
        }
        debug!(
            order_id,
            status = %order.status,
            filled = order.filled_quantity,
            average_fill = order.prices.average_fill,
            "order updated"
        );

        if fill > 0 {
            let signed = sign * i64::from(fill);
            let position = match position_idx {
                Some(p) => &mut ledger.positions[p],
                None => {
                    ledger
                        .positions
                        .push(Position::new(OptionContract::unknown(symbol)));
                    let last = ledger.positions.len() - 1;
                    &mut ledger.positions[last]
                }
            };
            let realized = position.apply_fill(signed, fill_price);
            if realized != 0.0 {
                info!(symbol = %symbol, realized, quantity = position.quantity, "pnl realized");
            }
        }
        true
    }

    /// Cancels an active order. Returns false if unknown or already terminal.
    pub fn cancel_order(&self, order_id: u64) -> bool {
        let mut ledger = self.ledger.lock();
        let Some(idx) = ledger.order_index(order_id) else {
            return false;
        };
        let order = &mut ledger.orders[idx];
        if !order.is_active() {
            debug!(order_id, status = %order.status, "cancel refused");
            return false;
        }
        order.status = OrderStatus::Canceled;
        info!(order_id, "order canceled");
        true
    }

    #[must_use]
    pub fn order(&self, order_id: u64) -> Option<Order> {
        let ledger = self.ledger.lock();
        ledger.order_index(order_id).map(|idx| ledger.orders[idx].clone())
    }

    #[must_use]
    pub fn open_orders(&self) -> Vec<Order> {
        self.ledger
            .lock()
            .orders
            .iter()
            .filter(|o| o.is_active())
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn orders_for(&self, symbol: SymbolId) -> Vec<Order> {
        self.ledger
            .lock()
            .orders
            .iter()
            .filter(|o| o.symbol_id == symbol)
            .cloned()
            .collect()
    }

    /// Drops FILLED, CANCELED and REJECTED orders, returning how many were removed.
    pub fn prune_terminal_orders(&self) -> usize {
        let mut ledger = self.ledger.lock();
        let before = ledger.orders.len();
        ledger.orders.retain(Order::is_active);
        before - ledger.orders.len()
    }

    #[must_use]
    pub fn order_count(&self) -> usize {
        self.ledger.lock().orders.len()
    }

    // ------------------------------------------------------------------------
    // Aggregates
    // ------------------------------------------------------------------------

    #[must_use]
    pub fn total_value(&self) -> f64 {
        total_value(&self.ledger.lock().positions)
    }

    #[must_use]
    pub fn total_unrealized_pnl(&self) -> f64 {
        self.ledger.lock().positions.iter().map(|p| p.unrealized_pnl).sum()
    }

    #[must_use]
    pub fn total_realized_pnl(&self) -> f64 {
        self.ledger.lock().positions.iter().map(|p| p.realized_pnl).sum()
    }

    #[must_use]
    pub fn total_exposure(&self) -> f64 {
        total_exposure(&self.ledger.lock().positions)
    }

    #[must_use]
    pub fn snapshot(&self) -> PortfolioSnapshot {
        let ledger = self.ledger.lock();
        PortfolioSnapshot {
            positions: ledger.positions.clone(),
            orders: ledger.orders.clone(),
        }
    }
}

impl std::fmt::Debug for Portfolio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ledger = self.ledger.lock();
        f.debug_struct("Portfolio")
            .field("positions", &ledger.positions.len())
            .field("orders", &ledger.orders.len())
            .finish()
    }
}
