use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thales_core::{ExchangeCode, Greeks, OptionType, SymbolId};

/// An instrument held in the ledger.
///
/// `symbol_id` names the instrument itself (the key for positions and
/// orders); `underlying_id` names the asset whose spot drives its price. For
/// a plain equity both are the same id. Identity fields never change after
/// construction; only `greeks` is rewritten on revaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionContract {
    pub symbol_id: SymbolId,
    pub underlying_id: SymbolId,
    pub exchange: ExchangeCode,
    pub option_type: OptionType,
    pub expiry: Option<NaiveDate>,
    pub strike: f64,
    pub greeks: Greeks,
}

impl OptionContract {
    #[must_use]
    pub fn new(
        symbol_id: SymbolId,
        underlying_id: SymbolId,
        option_type: OptionType,
        expiry: NaiveDate,
        strike: f64,
    ) -> Self {
        Self {
            symbol_id,
            underlying_id,
            exchange: ExchangeCode::new("SMART"),
            option_type,
            expiry: Some(expiry),
            strike,
            greeks: Greeks::default(),
        }
    }

    /// Contract with no known terms, as created from a bare fill.
    #[must_use]
    pub fn unknown(symbol_id: SymbolId) -> Self {
        Self {
            symbol_id,
            underlying_id: symbol_id,
            exchange: ExchangeCode::default(),
            option_type: OptionType::Unknown,
            expiry: None,
            strike: 0.0,
            greeks: Greeks::default(),
        }
    }

    #[must_use]
    pub fn with_exchange(mut self, exchange: &str) -> Self {
        self.exchange = ExchangeCode::new(exchange);
        self
    }

    /// True when the right, strike and expiry are all known.
    #[must_use]
    pub fn is_option(&self) -> bool {
        self.option_type != OptionType::Unknown && self.expiry.is_some() && self.strike > 0.0
    }

    /// Year fraction to expiry on an ACT/365 basis; negative once expired.
    #[must_use]
    pub fn time_to_expiry(&self, now: DateTime<Utc>) -> Option<f64> {
        self.expiry
            .map(|expiry| (expiry - now.date_naive()).num_days() as f64 / 365.0)
    }
}
