//! Paper trading execution.
//!
//! Simulates fills locally against the latest observed prices. Makes no
//! external calls.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use thales_core::SymbolId;
use thales_portfolio::{Order, OrderSide};
use tracing::{debug, info};

use crate::events::Fill;
use crate::traits::ExecutionHandler;

/// Per-contract commission charged on every simulated fill.
pub const COMMISSION_PER_CONTRACT: f64 = 0.65;

pub struct PaperExecution {
    commission_per_contract: f64,
    last_prices: HashMap<SymbolId, f64>,
}

impl Default for PaperExecution {
    fn default() -> Self {
        Self::new()
    }
}

impl PaperExecution {
    #[must_use]
    pub fn new() -> Self {
        Self {
            commission_per_contract: COMMISSION_PER_CONTRACT,
            last_prices: HashMap::new(),
        }
    }

    #[must_use]
    pub const fn with_commission(mut self, commission_per_contract: f64) -> Self {
        self.commission_per_contract = commission_per_contract;
        self
    }

    #[must_use]
    pub fn last_price(&self, symbol: SymbolId) -> Option<f64> {
        self.last_prices.get(&symbol).copied()
    }

    /// Limit orders fill at their limit once the market trades through it;
    /// market and stop orders fill at the last price.
    fn fill_price(&self, order: &Order) -> Option<f64> {
        let market = self.last_price(order.symbol_id);
        let limit = order.prices.limit;
        if limit > 0.0 {
            return match (order.side, market) {
                (_, None) => Some(limit),
                (OrderSide::Buy, Some(m)) if m <= limit => Some(limit),
                (OrderSide::Sell, Some(m)) if m >= limit => Some(limit),
                _ => None,
            };
        }
        market
    }
}

#[async_trait]
impl ExecutionHandler for PaperExecution {
    async fn execute_order(&mut self, order: &Order) -> Result<Option<Fill>> {
        let quantity = order.remaining_quantity();
        if !order.is_active() || quantity == 0 {
            return Ok(None);
        }
        let Some(price) = self.fill_price(order) else {
            debug!(order_id = order.order_id, "paper order not marketable");
            return Ok(None);
        };

        let fill = Fill {
            order_id: order.order_id,
            symbol_id: order.symbol_id,
            side: order.side,
            quantity,
            price,
            commission: self.commission_per_contract * f64::from(quantity),
            timestamp: Utc::now(),
        };

        info!(
            order_id = fill.order_id,
            symbol = %fill.symbol_id,
            side = %fill.side,
            price = fill.price,
            quantity = fill.quantity,
            commission = fill.commission,
            "paper fill simulated"
        );
        Ok(Some(fill))
    }

    fn on_market_price(&mut self, symbol: SymbolId, price: f64) {
        self.last_prices.insert(symbol, price);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn market_order_fills_at_last_price_with_commission() {
        let mut paper = PaperExecution::new();
        paper.on_market_price(SymbolId(1), 3.25);

        let order = Order::market(1, SymbolId(1), OrderSide::Buy, 10);
        let fill = paper.execute_order(&order).await.unwrap().unwrap();

        assert_eq!(fill.price, 3.25);
        assert_eq!(fill.quantity, 10);
        assert!((fill.commission - 6.5).abs() < 1e-12);
    }

    #[tokio::test]
    async fn market_order_without_price_waits() {
        let mut paper = PaperExecution::new();
        let order = Order::market(1, SymbolId(1), OrderSide::Sell, 1);
        assert!(paper.execute_order(&order).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn limit_orders_fill_only_when_marketable() {
        let mut paper = PaperExecution::new().with_commission(1.0);
        paper.on_market_price(SymbolId(2), 5.0);

        let buy = Order::limit(1, SymbolId(2), OrderSide::Buy, 2, 4.5);
        assert!(paper.execute_order(&buy).await.unwrap().is_none());

        let sell = Order::limit(2, SymbolId(2), OrderSide::Sell, 2, 4.5);
        let fill = paper.execute_order(&sell).await.unwrap().unwrap();
        assert_eq!(fill.price, 4.5);
        assert_eq!(fill.commission, 2.0);
    }

    #[tokio::test]
    async fn partially_filled_order_fills_remainder() {
        let mut paper = PaperExecution::new();
        paper.on_market_price(SymbolId(3), 1.0);
        let mut order = Order::market(9, SymbolId(3), OrderSide::Buy, 10);
        order.filled_quantity = 4;
        let fill = paper.execute_order(&order).await.unwrap().unwrap();
        assert_eq!(fill.quantity, 6);
    }
}
