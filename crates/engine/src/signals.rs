//! Reference signal source: trades option quotes that stray from fair value.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use thales_core::{MarketEvent, OptionTick};
use thales_portfolio::OrderSide;
use thales_pricing::black_scholes as bs;
use tracing::debug;

use crate::events::OrderIntent;
use crate::traits::SignalSource;

/// Buys options quoted below fair value by more than `edge` (relative) and
/// sells those quoted above it. Fair value uses a fixed volatility estimate
/// and the latest spot seen for the underlying.
pub struct MispricingSignal {
    edge: f64,
    quantity: u32,
    volatility: f64,
    risk_free_rate: f64,
    spots: HashMap<String, f64>,
}

impl MispricingSignal {
    #[must_use]
    pub fn new(volatility: f64, risk_free_rate: f64) -> Self {
        Self {
            edge: 0.03,
            quantity: 1,
            volatility,
            risk_free_rate,
            spots: HashMap::new(),
        }
    }

    #[must_use]
    pub const fn with_edge(mut self, edge: f64) -> Self {
        self.edge = edge;
        self
    }

    #[must_use]
    pub const fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }

    fn evaluate(&self, tick: &OptionTick) -> Option<OrderIntent> {
        let spot = *self.spots.get(&tick.underlying)?;
        let t = tick.time_to_expiry(tick.quote.timestamp);
        if t <= 0.0 {
            return None;
        }
        let fair = bs::theoretical_price(
            tick.option_type,
            spot,
            tick.strike,
            self.risk_free_rate,
            self.volatility,
            t,
        );
        if !(fair.is_finite() && fair > 0.0) {
            return None;
        }

        let quoted = tick.quote.price;
        let mispricing = (quoted - fair) / fair;
        debug!(symbol = %tick.quote.symbol, quoted, fair, mispricing, "option evaluated");

        let side = if mispricing < -self.edge {
            OrderSide::Buy
        } else if mispricing > self.edge {
            OrderSide::Sell
        } else {
            return None;
        };
        Some(OrderIntent::limit(
            tick.quote.symbol.clone(),
            side,
            self.quantity,
            quoted,
        ))
    }
}

#[async_trait]
impl SignalSource for MispricingSignal {
    async fn on_market_event(&mut self, event: &MarketEvent) -> Result<Vec<OrderIntent>> {
        match event {
            MarketEvent::Equity(tick) => {
                self.spots.insert(tick.symbol.clone(), tick.price);
                Ok(Vec::new())
            }
            MarketEvent::Option(tick) => Ok(self.evaluate(tick).into_iter().collect()),
        }
    }

    fn name(&self) -> &str {
        "mispricing"
    }
}
