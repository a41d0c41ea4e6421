use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thales_core::SymbolId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Market,
    Limit,
    Stop,
    StopLimit,
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Market => write!(f, "MARKET"),
            Self::Limit => write!(f, "LIMIT"),
            Self::Stop => write!(f, "STOP"),
            Self::StopLimit => write!(f, "STOP_LIMIT"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// +1 for buys, -1 for sells.
    #[must_use]
    pub const fn sign(self) -> i64 {
        match self {
            Self::Buy => 1,
            Self::Sell => -1,
        }
    }
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// Order lifecycle.
///
/// ```text
/// PENDING -> PARTIALLY_FILLED -> ... -> FILLED
///    |              |
///    +--------------+--> CANCELED | REJECTED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
}

impl OrderStatus {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Filled | Self::Canceled | Self::Rejected)
    }

    #[must_use]
    pub const fn is_active(self) -> bool {
        !self.is_terminal()
    }

    const fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::PartiallyFilled => 1,
            Self::Filled | Self::Canceled | Self::Rejected => 2,
        }
    }

    /// Transitions never move backwards and never leave a terminal state.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        !self.is_terminal() && next.rank() >= self.rank()
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::PartiallyFilled => write!(f, "PARTIALLY_FILLED"),
            Self::Filled => write!(f, "FILLED"),
            Self::Canceled => write!(f, "CANCELED"),
            Self::Rejected => write!(f, "REJECTED"),
        }
    }
}

/// Price block. Zero means "not set".
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderPrices {
    pub limit: f64,
    pub stop: f64,
    /// Volume-weighted average of all fills so far.
    pub average_fill: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: u64,
    pub symbol_id: SymbolId,
    pub order_type: OrderType,
    pub side: OrderSide,
    pub quantity: u32,
    pub filled_quantity: u32,
    pub prices: OrderPrices,
    pub status: OrderStatus,
    pub timestamp: DateTime<Utc>,
}

impl Order {
    #[must_use]
    pub fn new(
        order_id: u64,
        symbol_id: SymbolId,
        order_type: OrderType,
        side: OrderSide,
        quantity: u32,
    ) -> Self {
        Self {
            order_id,
            symbol_id,
            order_type,
            side,
            quantity,
            filled_quantity: 0,
            prices: OrderPrices::default(),
            status: OrderStatus::Pending,
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn market(order_id: u64, symbol_id: SymbolId, side: OrderSide, quantity: u32) -> Self {
        Self::new(order_id, symbol_id, OrderType::Market, side, quantity)
    }

    #[must_use]
    pub fn limit(
        order_id: u64,
        symbol_id: SymbolId,
        side: OrderSide,
        quantity: u32,
        limit_price: f64,
    ) -> Self {
        let mut order = Self::new(order_id, symbol_id, OrderType::Limit, side, quantity);
        order.prices.limit = limit_price;
        order
    }

    #[must_use]
    pub fn with_stop(mut self, stop_price: f64) -> Self {
        self.order_type = match self.order_type {
            OrderType::Limit | OrderType::StopLimit => OrderType::StopLimit,
            OrderType::Market | OrderType::Stop => OrderType::Stop,
        };
        self.prices.stop = stop_price;
        self
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    #[must_use]
    pub fn remaining_quantity(&self) -> u32 {
        self.quantity.saturating_sub(self.filled_quantity)
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Signed quantity: positive for buys.
    #[must_use]
    pub fn signed_quantity(&self) -> i64 {
        self.side.sign() * i64::from(self.quantity)
    }

    /// Best known price for sizing the order: limit, then stop, then last fill.
    #[must_use]
    pub fn reference_price(&self) -> Option<f64> {
        [self.prices.limit, self.prices.stop, self.prices.average_fill]
            .into_iter()
            .find(|p| *p > 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_are_final() {
        for terminal in [OrderStatus::Filled, OrderStatus::Canceled, OrderStatus::Rejected] {
            assert!(terminal.is_terminal());
            for next in [
                OrderStatus::Pending,
                OrderStatus::PartiallyFilled,
                OrderStatus::Filled,
                OrderStatus::Canceled,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn transitions_never_move_backwards() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::PartiallyFilled));
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Rejected));
        assert!(OrderStatus::PartiallyFilled.can_transition_to(OrderStatus::PartiallyFilled));
        assert!(OrderStatus::PartiallyFilled.can_transition_to(OrderStatus::Filled));
        assert!(!OrderStatus::PartiallyFilled.can_transition_to(OrderStatus::Pending));
    }

    #[test]
    fn display_names() {
        assert_eq!(OrderType::StopLimit.to_string(), "STOP_LIMIT");
        assert_eq!(OrderSide::Sell.to_string(), "SELL");
        assert_eq!(OrderStatus::PartiallyFilled.to_string(), "PARTIALLY_FILLED");
        assert_eq!(
            serde_json::to_string(&OrderStatus::PartiallyFilled).unwrap(),
            "\"PARTIALLY_FILLED\""
        );
    }

    #[test]
    fn builders_and_quantities() {
        let order = Order::limit(7, SymbolId(0), OrderSide::Sell, 10, 4.5).with_stop(4.0);
        assert_eq!(order.order_type, OrderType::StopLimit);
        assert_eq!(order.signed_quantity(), -10);
        assert_eq!(order.remaining_quantity(), 10);
        assert_eq!(order.reference_price(), Some(4.5));
        assert!(order.is_active());

        let market = Order::market(8, SymbolId(0), OrderSide::Buy, 5);
        assert_eq!(market.reference_price(), None);
        assert_eq!(market.with_stop(3.0).order_type, OrderType::Stop);
    }
}
