//! Batch revaluation of ledger positions from the latest market state.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use thales_core::{EngineConfig, Greeks, MarketEvent, OptionType, PricingConfig, SymbolId, SymbolTable};
use thales_portfolio::{OptionContract, Portfolio};
use thales_pricing::vectorized::{BatchInputs, BatchKernel, BatchPricer};
use thales_pricing::{ImpliedVolSolver, PricingError};
use tracing::debug;

// ============================================================================
// Market state
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptionQuote {
    pub price: f64,
    pub implied_volatility: Option<f64>,
}

/// Latest prices and contract terms seen on the feed, keyed by symbol id.
#[derive(Debug, Default)]
pub struct MarketState {
    now: Option<DateTime<Utc>>,
    spots: HashMap<SymbolId, f64>,
    quotes: HashMap<SymbolId, OptionQuote>,
    contracts: HashMap<SymbolId, OptionContract>,
}

impl MarketState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an event and returns the interned id of its instrument.
    pub fn apply(&mut self, event: &MarketEvent, symbols: &SymbolTable) -> SymbolId {
        let id = symbols.intern(event.symbol());
        let timestamp = event.timestamp();
        if self.now.map_or(true, |now| timestamp > now) {
            self.now = Some(timestamp);
        }

        match event {
            MarketEvent::Equity(tick) => {
                self.spots.insert(id, tick.price);
            }
            MarketEvent::Option(tick) => {
                self.quotes.insert(
                    id,
                    OptionQuote {
                        price: tick.quote.price,
                        implied_volatility: tick.implied_volatility,
                    },
                );
                self.contracts.entry(id).or_insert_with(|| {
                    let underlying = symbols.intern(&tick.underlying);
                    OptionContract::new(id, underlying, tick.option_type, tick.expiry, tick.strike)
                });
            }
        }
        id
    }

    /// Time of the newest event seen, or the wall clock before any event.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.now.unwrap_or_else(Utc::now)
    }

    #[must_use]
    pub fn spot(&self, symbol: SymbolId) -> Option<f64> {
        self.spots.get(&symbol).copied()
    }

    #[must_use]
    pub fn quote(&self, symbol: SymbolId) -> Option<OptionQuote> {
        self.quotes.get(&symbol).copied()
    }

    #[must_use]
    pub fn contract(&self, symbol: SymbolId) -> Option<&OptionContract> {
        self.contracts.get(&symbol)
    }

    /// Last traded price of any instrument.
    #[must_use]
    pub fn last_price(&self, symbol: SymbolId) -> Option<f64> {
        self.spot(symbol).or_else(|| self.quote(symbol).map(|q| q.price))
    }
}

// ============================================================================
// Revaluation
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolSource {
    Quoted,
    Implied,
    Default,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RevaluationSummary {
    pub options: usize,
    pub equities: usize,
    /// Option positions whose underlying has no spot yet.
    pub skipped: usize,
    pub quoted_vols: usize,
    pub implied_vols: usize,
    pub default_vols: usize,
    /// Position-weighted delta across all revalued options.
    pub net_delta: f64,
}

impl RevaluationSummary {
    fn count(&mut self, source: VolSource) {
        match source {
            VolSource::Quoted => self.quoted_vols += 1,
            VolSource::Implied => self.implied_vols += 1,
            VolSource::Default => self.default_vols += 1,
        }
    }
}

#[derive(Default)]
struct Chain {
    symbols: Vec<SymbolId>,
    quantities: Vec<i64>,
    quoted: Vec<Option<f64>>,
    spot: Vec<f64>,
    strike: Vec<f64>,
    rate: Vec<f64>,
    volatility: Vec<f64>,
    time: Vec<f64>,
}

impl Chain {
    fn inputs(&self) -> BatchInputs<'_> {
        BatchInputs::new(&self.spot, &self.strike, &self.rate, &self.volatility, &self.time)
    }
}

#[derive(Debug, Clone)]
pub struct Revaluer {
    pricer: BatchPricer,
    solver: ImpliedVolSolver,
    risk_free_rate: f64,
    default_volatility: f64,
}

impl Revaluer {
    #[must_use]
    pub fn new(engine: &EngineConfig, pricing: &PricingConfig) -> Self {
        Self {
            pricer: BatchPricer::new(),
            solver: ImpliedVolSolver::new(pricing.iv_epsilon, pricing.iv_max_iterations),
            risk_free_rate: engine.risk_free_rate,
            default_volatility: engine.default_volatility,
        }
    }

    #[must_use]
    pub const fn with_pricer(mut self, pricer: BatchPricer) -> Self {
        self.pricer = pricer;
        self
    }

    #[must_use]
    pub const fn pricer(&self) -> BatchPricer {
        self.pricer
    }

    pub fn reconfigure(&mut self, engine: &EngineConfig, pricing: &PricingConfig) {
        *self = Self::new(engine, pricing).with_pricer(self.pricer);
    }

    /// Quoted vol if the venue published a positive one, else the vol implied
    /// by the quote, else the configured default.
    #[must_use]
    pub fn resolve_volatility(
        &self,
        option_type: OptionType,
        spot: f64,
        strike: f64,
        t: f64,
        quote: Option<OptionQuote>,
    ) -> (f64, VolSource) {
        let Some(quote) = quote else {
            return (self.default_volatility, VolSource::Default);
        };
        if let Some(iv) = quote.implied_volatility.filter(|v| v.is_finite() && *v > 0.0) {
            return (iv, VolSource::Quoted);
        }

        let r = self.risk_free_rate;
        let solved = match option_type {
            OptionType::Call => self.solver.call(quote.price, spot, strike, r, t),
            OptionType::Put => self.solver.put(quote.price, spot, strike, r, t),
            OptionType::Unknown => Err(PricingError::invalid_argument("unknown option type")),
        };
        match solved {
            Ok(sigma) => (sigma, VolSource::Implied),
            Err(e) => {
                debug!(error = %e, price = quote.price, strike, "implied vol unavailable, using default");
                (self.default_volatility, VolSource::Default)
            }
        }
    }

    /// Marks every position and rewrites option Greeks.
    ///
    /// Options are grouped by right and priced in one batch per group. An
    /// option is marked at its latest quote, or at model value when the
    /// feed has not quoted it. Equities are marked at their spot.
    ///
    /// # Errors
    ///
    /// Propagates batch pricer errors; the ledger is left partially updated.
    pub fn revalue_positions(
        &self,
        portfolio: &Portfolio,
        market: &MarketState,
    ) -> thales_pricing::Result<RevaluationSummary> {
        let now = market.now();
        let mut summary = RevaluationSummary::default();
        let mut calls = Chain::default();
        let mut puts = Chain::default();

        for position in portfolio.positions() {
            let contract = &position.contract;
            let symbol = contract.symbol_id;

            if !contract.is_option() {
                if let Some(spot) = market.last_price(symbol) {
                    portfolio.update_position(symbol, spot);
                    summary.equities += 1;
                }
                continue;
            }

            let (Some(spot), Some(t)) = (market.spot(contract.underlying_id), contract.time_to_expiry(now))
            else {
                summary.skipped += 1;
                continue;
            };
            let quote = market.quote(symbol);
            let (sigma, source) =
                self.resolve_volatility(contract.option_type, spot, contract.strike, t, quote);
            summary.count(source);

            let chain = if contract.option_type == OptionType::Call { &mut calls } else { &mut puts };
            chain.symbols.push(symbol);
            chain.quantities.push(position.quantity);
            chain.quoted.push(quote.map(|q| q.price));
            chain.spot.push(spot);
            chain.strike.push(contract.strike);
            chain.rate.push(self.risk_free_rate);
            chain.volatility.push(sigma);
            chain.time.push(t);
        }

        for (option_type, kernel, chain) in [
            (OptionType::Call, BatchKernel::CallPrice, &calls),
            (OptionType::Put, BatchKernel::PutPrice, &puts),
        ] {
            if chain.symbols.is_empty() {
                continue;
            }
            let inputs = chain.inputs();
            let mut greeks = vec![Greeks::default(); chain.symbols.len()];
            let mut prices = vec![0.0; chain.symbols.len()];
            self.pricer.greeks(option_type, &inputs, &mut greeks)?;
            self.pricer.compute(kernel, &inputs, &mut prices)?;

            for (i, &symbol) in chain.symbols.iter().enumerate() {
                let mark = chain.quoted[i].unwrap_or(prices[i]);
                if mark.is_finite() {
                    portfolio.update_position(symbol, mark);
                }
                portfolio.update_greeks(symbol, greeks[i]);
                summary.net_delta += greeks[i].delta * chain.quantities[i] as f64;
                summary.options += 1;
            }
        }

        debug!(
            options = summary.options,
            equities = summary.equities,
            skipped = summary.skipped,
            net_delta = summary.net_delta,
            "positions revalued"
        );
        Ok(summary)
    }
}
