use anyhow::Result;
use async_trait::async_trait;
use thales_core::{MarketEvent, SymbolId};
use thales_portfolio::Order;

use crate::events::{Fill, OrderIntent};

#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Events observed since the previous call. `None` once the source is exhausted.
    async fn next_events(&mut self) -> Result<Option<Vec<MarketEvent>>>;
}

#[async_trait]
pub trait SignalSource: Send + Sync {
    async fn on_market_event(&mut self, event: &MarketEvent) -> Result<Vec<OrderIntent>>;
    fn name(&self) -> &str;
}

#[async_trait]
pub trait ExecutionHandler: Send + Sync {
    /// Attempts to fill an active order. `None` means nothing filled this time.
    async fn execute_order(&mut self, order: &Order) -> Result<Option<Fill>>;

    /// Latest traded price for an instrument, used to fill market orders.
    fn on_market_price(&mut self, _symbol: SymbolId, _price: f64) {}
}
