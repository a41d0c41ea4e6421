use crate::types::{Greeks, OptionType};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

const DAYS_PER_YEAR: f64 = 365.0;

/// Top-of-book plus bar snapshot for one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityTick {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    pub bid: f64,
    pub ask: f64,
    pub bid_size: u64,
    pub ask_size: u64,
}

impl EquityTick {
    /// A tick where every price field is `price`.
    #[must_use]
    pub fn at_price(symbol: impl Into<String>, price: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.into(),
            timestamp,
            price,
            open: price,
            high: price,
            low: price,
            close: price,
            volume: 0,
            bid: price,
            ask: price,
            bid_size: 0,
            ask_size: 0,
        }
    }

    #[must_use]
    pub fn mid(&self) -> f64 {
        if self.bid > 0.0 && self.ask > 0.0 {
            (self.bid + self.ask) / 2.0
        } else {
            self.price
        }
    }
}

/// Option quote: the instrument's own market snapshot plus contract terms
/// and whatever analytics the venue published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionTick {
    pub quote: EquityTick,
    pub underlying: String,
    pub expiry: NaiveDate,
    pub strike: f64,
    pub option_type: OptionType,
    /// Venue-published implied volatility, if any.
    pub implied_volatility: Option<f64>,
    pub greeks: Greeks,
    pub open_interest: u64,
}

impl OptionTick {
    /// Year fraction from `now` to expiry on an ACT/365 basis. Negative once expired.
    #[must_use]
    pub fn time_to_expiry(&self, now: DateTime<Utc>) -> f64 {
        let days = (self.expiry - now.date_naive()).num_days();
        days as f64 / DAYS_PER_YEAR
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MarketEvent {
    Equity(EquityTick),
    Option(OptionTick),
}

impl MarketEvent {
    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.quote().symbol
    }

    #[must_use]
    pub fn price(&self) -> f64 {
        self.quote().price
    }

    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.quote().timestamp
    }

    #[must_use]
    pub fn quote(&self) -> &EquityTick {
        match self {
            Self::Equity(tick) => tick,
            Self::Option(tick) => &tick.quote,
        }
    }

    #[must_use]
    pub fn as_option(&self) -> Option<&OptionTick> {
        match self {
            Self::Option(tick) => Some(tick),
            Self::Equity(_) => None,
        }
    }
}
