//! Seeded market simulator for demos and tests.
//!
//! Each batch advances every underlying one geometric Brownian motion step
//! and quotes an at-the-money call and put priced with the closed-form
//! model plus multiplicative noise. Identical seeds give identical streams.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};
use thales_core::{EquityTick, MarketEvent, OptionTick, OptionType};
use thales_pricing::black_scholes as bs;

use crate::traits::DataProvider;

const SECONDS_PER_YEAR: f64 = 365.0 * 24.0 * 3600.0;
const HALF_SPREAD: f64 = 0.0005;

/// Symbol for a listed option, e.g. `SPY 20250620 C500`.
#[must_use]
pub fn option_symbol(underlying: &str, expiry: NaiveDate, option_type: OptionType, strike: f64) -> String {
    let right = match option_type {
        OptionType::Call => 'C',
        OptionType::Put => 'P',
        OptionType::Unknown => '?',
    };
    format!("{underlying} {} {right}{strike:.0}", expiry.format("%Y%m%d"))
}

struct Underlying {
    symbol: String,
    spot: f64,
}

pub struct SimulatedFeed {
    underlyings: Vec<Underlying>,
    rng: ChaCha8Rng,
    clock: DateTime<Utc>,
    step: Duration,
    drift: f64,
    volatility: f64,
    risk_free_rate: f64,
    expiry: NaiveDate,
    strike_step: f64,
    quote_noise: f64,
    max_batches: Option<u64>,
    emitted: u64,
}

impl SimulatedFeed {
    /// Feed over `symbols`, all starting at 100.0, with 20% volatility and
    /// options expiring 30 days after the start.
    #[must_use]
    pub fn new<S: AsRef<str>>(symbols: &[S], seed: u64) -> Self {
        let clock = Utc
            .with_ymd_and_hms(2025, 1, 2, 14, 30, 0)
            .single()
            .unwrap_or_else(Utc::now);
        Self {
            underlyings: symbols
                .iter()
                .map(|s| Underlying {
                    symbol: s.as_ref().to_string(),
                    spot: 100.0,
                })
                .collect(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            clock,
            step: Duration::minutes(1),
            drift: 0.0,
            volatility: 0.20,
            risk_free_rate: 0.05,
            expiry: clock.date_naive() + Duration::days(30),
            strike_step: 5.0,
            quote_noise: 0.02,
            max_batches: None,
            emitted: 0,
        }
    }

    #[must_use]
    pub fn with_initial_price(mut self, price: f64) -> Self {
        for u in &mut self.underlyings {
            u.spot = price;
        }
        self
    }

    #[must_use]
    pub const fn with_volatility(mut self, volatility: f64) -> Self {
        self.volatility = volatility;
        self
    }

    #[must_use]
    pub const fn with_risk_free_rate(mut self, rate: f64) -> Self {
        self.risk_free_rate = rate;
        self
    }

    /// Relative standard deviation of option quotes around fair value.
    #[must_use]
    pub const fn with_quote_noise(mut self, noise: f64) -> Self {
        self.quote_noise = noise;
        self
    }

    #[must_use]
    pub fn with_expiry_days(mut self, days: i64) -> Self {
        self.expiry = self.clock.date_naive() + Duration::days(days);
        self
    }

    /// Stop after `batches` calls to `next_events`.
    #[must_use]
    pub const fn with_max_batches(mut self, batches: u64) -> Self {
        self.max_batches = Some(batches);
        self
    }

    #[must_use]
    pub const fn now(&self) -> DateTime<Utc> {
        self.clock
    }

    #[must_use]
    pub const fn expiry(&self) -> NaiveDate {
        self.expiry
    }

    fn normal(&mut self) -> f64 {
        StandardNormal.sample(&mut self.rng)
    }

    fn step_spot(&mut self, idx: usize) -> f64 {
        let dt = self.step.num_seconds() as f64 / SECONDS_PER_YEAR;
        let z = self.normal();
        let sigma = self.volatility;
        let growth = ((self.drift - 0.5 * sigma * sigma) * dt + sigma * dt.sqrt() * z).exp();
        let u = &mut self.underlyings[idx];
        u.spot *= growth;
        u.spot
    }

    fn equity_tick(&self, symbol: &str, price: f64, open: f64) -> EquityTick {
        EquityTick {
            symbol: symbol.to_string(),
            timestamp: self.clock,
            price,
            open,
            high: price.max(open),
            low: price.min(open),
            close: price,
            volume: 1_000,
            bid: price * (1.0 - HALF_SPREAD),
            ask: price * (1.0 + HALF_SPREAD),
            bid_size: 100,
            ask_size: 100,
        }
    }

    fn option_tick(&mut self, underlying: &str, spot: f64, option_type: OptionType) -> OptionTick {
        let strike = (spot / self.strike_step).round() * self.strike_step;
        let t = (self.expiry - self.clock.date_naive()).num_days() as f64 / 365.0;
        let (r, sigma) = (self.risk_free_rate, self.volatility);

        let fair = bs::theoretical_price(option_type, spot, strike, r, sigma, t);
        let noise = self.quote_noise * self.normal();
        let price = (fair * (1.0 + noise)).max(0.01);
        let symbol = option_symbol(underlying, self.expiry, option_type, strike);

        // Venues publish vols on alternate batches; the rest must be solved for.
        let implied_volatility = (self.emitted % 2 == 0).then_some(sigma);

        OptionTick {
            quote: self.equity_tick(&symbol, price, fair),
            underlying: underlying.to_string(),
            expiry: self.expiry,
            strike,
            option_type,
            implied_volatility,
            greeks: bs::greeks(option_type, spot, strike, r, sigma, t),
            open_interest: 500,
        }
    }

    /// Produces the next batch regardless of the batch limit.
    pub fn next_batch(&mut self) -> Vec<MarketEvent> {
        self.clock += self.step;
        let live = self.clock.date_naive() < self.expiry;
        let mut events = Vec::with_capacity(self.underlyings.len() * 3);

        for idx in 0..self.underlyings.len() {
            let open = self.underlyings[idx].spot;
            let spot = self.step_spot(idx);
            let symbol = self.underlyings[idx].symbol.clone();
            events.push(MarketEvent::Equity(self.equity_tick(&symbol, spot, open)));

            if live {
                for option_type in [OptionType::Call, OptionType::Put] {
                    let tick = self.option_tick(&symbol, spot, option_type);
                    events.push(MarketEvent::Option(tick));
                }
            }
        }
        self.emitted += 1;
        events
    }
}

#[async_trait]
impl DataProvider for SimulatedFeed {
    async fn next_events(&mut self) -> Result<Option<Vec<MarketEvent>>> {
        if self.max_batches.is_some_and(|max| self.emitted >= max) {
            return Ok(None);
        }
        Ok(Some(self.next_batch()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let mut a = SimulatedFeed::new(&["SPY"], 7);
        let mut b = SimulatedFeed::new(&["SPY"], 7);
        for _ in 0..20 {
            assert_eq!(a.next_batch(), b.next_batch());
        }
        let mut c = SimulatedFeed::new(&["SPY"], 8);
        assert_ne!(a.next_batch(), c.next_batch());
    }

    #[test]
    fn batch_has_equity_then_options() {
        let mut feed = SimulatedFeed::new(&["SPY", "QQQ"], 1).with_initial_price(400.0);
        let events = feed.next_batch();
        assert_eq!(events.len(), 6);
        assert!(matches!(events[0], MarketEvent::Equity(_)));

        let call = events[1].as_option().unwrap();
        assert_eq!(call.option_type, OptionType::Call);
        assert_eq!(call.underlying, "SPY");
        assert_eq!(call.strike % 5.0, 0.0);
        assert!(call.quote.symbol.starts_with("SPY 20250201 C"));
        assert_eq!(call.implied_volatility, Some(0.20));

        let next = feed.next_batch();
        assert_eq!(next[1].as_option().unwrap().implied_volatility, None);
    }

    #[test]
    fn expired_feed_quotes_only_equities() {
        let mut feed = SimulatedFeed::new(&["SPY"], 1).with_expiry_days(0);
        assert_eq!(feed.next_batch().len(), 1);
    }

    #[tokio::test]
    async fn batch_limit_exhausts_feed() {
        let mut feed = SimulatedFeed::new(&["SPY"], 3).with_max_batches(2);
        assert!(feed.next_events().await.unwrap().is_some());
        assert!(feed.next_events().await.unwrap().is_some());
        assert!(feed.next_events().await.unwrap().is_none());
    }

    #[test]
    fn option_symbols_are_readable() {
        let expiry = NaiveDate::from_ymd_opt(2025, 6, 20).unwrap();
        assert_eq!(option_symbol("SPY", expiry, OptionType::Put, 500.0), "SPY 20250620 P500");
    }
}
