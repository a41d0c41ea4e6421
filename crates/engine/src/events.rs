use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thales_core::SymbolId;
use thales_portfolio::OrderSide;

/// What a signal source wants to trade. The engine assigns the order id and
/// runs it past the risk manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderIntent {
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: u32,
    /// Market order when `None`.
    pub limit_price: Option<f64>,
}

impl OrderIntent {
    #[must_use]
    pub fn market(symbol: impl Into<String>, side: OrderSide, quantity: u32) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            quantity,
            limit_price: None,
        }
    }

    #[must_use]
    pub fn limit(symbol: impl Into<String>, side: OrderSide, quantity: u32, price: f64) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            quantity,
            limit_price: Some(price),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub order_id: u64,
    pub symbol_id: SymbolId,
    pub side: OrderSide,
    pub quantity: u32,
    pub price: f64,
    pub commission: f64,
    pub timestamp: DateTime<Utc>,
}
