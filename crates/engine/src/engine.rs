//! Periodic trading loop.
//!
//! One cycle: ingest market events, collect signals, gate them through the
//! risk manager, execute open orders, revalue the book, then adapt risk
//! limits. Cycle failures are logged and the loop carries on. The daily loss
//! baseline resets whenever market time crosses into a new calendar date.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use thales_core::{AppConfig, EngineConfig, MarketEvent};
use thales_portfolio::{
    Order, OrderStatus, Portfolio, RiskAdjustment, RiskLimits, RiskManager, MAX_ORDERS,
};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::events::OrderIntent;
use crate::revaluation::{MarketState, RevaluationSummary, Revaluer};
use crate::traits::{DataProvider, ExecutionHandler, SignalSource};

/// What one cycle did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CycleReport {
    pub events: usize,
    pub orders_submitted: usize,
    pub orders_rejected: usize,
    pub fills: usize,
    /// Orders still unfilled after execution, canceled as immediate-or-cancel.
    pub orders_canceled: usize,
    pub commission: f64,
    pub options_revalued: usize,
    pub net_delta: f64,
    pub risk_level: f64,
    /// The data provider has no more events.
    pub exhausted: bool,
}

/// Totals over every cycle the engine has run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EngineStats {
    pub cycles: u64,
    pub failed_cycles: u64,
    pub events: usize,
    pub orders_submitted: usize,
    pub orders_rejected: usize,
    pub fills: usize,
    pub commission: f64,
}

impl EngineStats {
    fn record(&mut self, report: &CycleReport) {
        self.cycles += 1;
        self.events += report.events;
        self.orders_submitted += report.orders_submitted;
        self.orders_rejected += report.orders_rejected;
        self.fills += report.fills;
        self.commission += report.commission;
    }
}

pub struct TradingEngine<D, E>
where
    D: DataProvider,
    E: ExecutionHandler,
{
    data_provider: D,
    execution_handler: E,
    signals: Vec<Box<dyn SignalSource>>,
    portfolio: Arc<Portfolio>,
    risk: Arc<RiskManager>,
    revaluer: Revaluer,
    market: MarketState,
    trading_day: Option<NaiveDate>,
    config: EngineConfig,
    config_rx: Option<watch::Receiver<AppConfig>>,
    stop: Arc<AtomicBool>,
    stats: EngineStats,
}

impl<D, E> TradingEngine<D, E>
where
    D: DataProvider,
    E: ExecutionHandler,
{
    /// Builds an engine from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured risk limits are invalid.
    pub fn new(
        data_provider: D,
        execution_handler: E,
        portfolio: Arc<Portfolio>,
        config: &AppConfig,
    ) -> Result<Self> {
        let risk = RiskManager::from_config(&config.risk).context("invalid risk configuration")?;
        for symbol in &config.engine.symbols {
            portfolio.symbols().intern(symbol);
        }
        Ok(Self {
            data_provider,
            execution_handler,
            signals: Vec::new(),
            portfolio,
            risk: Arc::new(risk),
            revaluer: Revaluer::new(&config.engine, &config.pricing),
            market: MarketState::new(),
            trading_day: None,
            config: config.engine.clone(),
            config_rx: None,
            stop: Arc::new(AtomicBool::new(false)),
            stats: EngineStats::default(),
        })
    }

    #[must_use]
    pub fn with_signal(mut self, signal: Box<dyn SignalSource>) -> Self {
        self.signals.push(signal);
        self
    }

    #[must_use]
    pub fn with_revaluer(mut self, revaluer: Revaluer) -> Self {
        self.revaluer = revaluer;
        self
    }

    /// Applies configuration published by a [`thales_core::ConfigWatcher`] between cycles.
    #[must_use]
    pub fn with_config_updates(mut self, rx: watch::Receiver<AppConfig>) -> Self {
        self.config_rx = Some(rx);
        self
    }

    /// Flag that stops [`TradingEngine::run`] after the current cycle.
    #[must_use]
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    #[must_use]
    pub fn portfolio(&self) -> &Arc<Portfolio> {
        &self.portfolio
    }

    #[must_use]
    pub fn risk_manager(&self) -> &Arc<RiskManager> {
        &self.risk
    }

    #[must_use]
    pub const fn stats(&self) -> &EngineStats {
        &self.stats
    }

    #[must_use]
    pub const fn market(&self) -> &MarketState {
        &self.market
    }

    // ========================================================================
    // Cycle
    // ========================================================================

    /// Runs one full cycle.
    ///
    /// # Errors
    ///
    /// Returns an error if the data provider, a signal source, the execution
    /// handler or the revaluation pass fails. Ledger state from the steps
    /// completed before the failure is kept.
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        let mut report = CycleReport::default();

        let Some(events) = self
            .data_provider
            .next_events()
            .await
            .context("failed to fetch market events")?
        else {
            report.exhausted = true;
            return Ok(report);
        };
        report.events = events.len();

        let mut intents = Vec::new();
        for event in &events {
            self.ingest(event);
            for signal in &mut self.signals {
                let generated = signal
                    .on_market_event(event)
                    .await
                    .with_context(|| format!("signal source {} failed", signal.name()))?;
                intents.extend(generated);
            }
        }
        if !events.is_empty() {
            self.roll_trading_day();
        }

        for intent in intents {
            if self.submit(&intent) {
                report.orders_submitted += 1;
            } else {
                report.orders_rejected += 1;
            }
        }

        self.execute_open_orders(&mut report).await?;
        for order in self.portfolio.open_orders() {
            if self.portfolio.cancel_order(order.order_id) {
                report.orders_canceled += 1;
            }
        }
        self.housekeeping();

        let summary: RevaluationSummary = self
            .revaluer
            .revalue_positions(&self.portfolio, &self.market)
            .context("revaluation failed")?;
        report.options_revalued = summary.options;
        report.net_delta = summary.net_delta;

        if self.risk.update_risk_params(&self.portfolio) != RiskAdjustment::Unchanged {
            debug!(limits = ?self.risk.limits(), "adaptive risk limits in force");
        }
        report.risk_level = self.risk.current_risk_level(&self.portfolio);

        self.stats.record(&report);
        Ok(report)
    }

    /// Resets the daily loss baseline on the first cycle of each market date.
    fn roll_trading_day(&mut self) {
        let today = self.market.now().date_naive();
        if self.trading_day == Some(today) {
            return;
        }
        self.risk.reset_daily_baseline(&self.portfolio);
        self.trading_day = Some(today);
        info!(date = %today, "daily loss baseline reset");
    }

    /// Keeps the bounded ledger collections from filling up with history.
    fn housekeeping(&self) {
        if self.portfolio.order_count() >= MAX_ORDERS / 2 {
            let pruned = self.portfolio.prune_terminal_orders();
            debug!(pruned, "terminal orders pruned");
        }
    }

    fn ingest(&mut self, event: &MarketEvent) {
        let symbol = self.market.apply(event, self.portfolio.symbols());
        self.execution_handler.on_market_price(symbol, event.price());
    }

    /// Turns an intent into a ledger order. Orders refused by the risk
    /// manager are recorded as REJECTED. Returns whether it was accepted.
    fn submit(&self, intent: &OrderIntent) -> bool {
        let symbols = self.portfolio.symbols();
        let symbol = symbols.intern(&intent.symbol);
        let order_id = self.portfolio.next_order_id();
        let order = match intent.limit_price {
            Some(price) => Order::limit(order_id, symbol, intent.side, intent.quantity, price),
            None => Order::market(order_id, symbol, intent.side, intent.quantity),
        };
        let allowed = self.risk.is_order_allowed(&order, &self.portfolio);

        if let Err(e) = self.portfolio.add_order(order) {
            warn!(order_id, error = %e, "order not recorded");
            return false;
        }
        if !allowed {
            self.portfolio.update_order(order_id, OrderStatus::Rejected, 0, 0.0);
        }
        allowed
    }

    async fn execute_open_orders(&mut self, report: &mut CycleReport) -> Result<()> {
        for order in self.portfolio.open_orders() {
            let Some(fill) = self
                .execution_handler
                .execute_order(&order)
                .await
                .with_context(|| format!("execution failed for order {}", order.order_id))?
            else {
                continue;
            };

            if let Some(contract) = self.market.contract(fill.symbol_id) {
                if let Err(e) = self.portfolio.ensure_position(contract.clone()) {
                    warn!(order_id = fill.order_id, error = %e, "contract terms not recorded");
                }
            }

            let status = if fill.quantity >= order.remaining_quantity() {
                OrderStatus::Filled
            } else {
                OrderStatus::PartiallyFilled
            };
            if self
                .portfolio
                .update_order(fill.order_id, status, fill.quantity, fill.price)
            {
                report.fills += 1;
                report.commission += fill.commission;
            } else {
                warn!(order_id = fill.order_id, "fill not applied to ledger");
            }
        }
        Ok(())
    }

    // ========================================================================
    // Loop
    // ========================================================================

    fn apply_config_updates(&mut self) {
        let Some(rx) = self.config_rx.as_mut() else {
            return;
        };
        if !rx.has_changed().unwrap_or(false) {
            return;
        }
        let config = rx.borrow_and_update().clone();

        match self.risk.set_limits(RiskLimits::from(&config.risk)) {
            Ok(()) => info!("risk limits reloaded"),
            Err(e) => error!(error = %e, "rejected reloaded risk limits"),
        }
        self.revaluer.reconfigure(&config.engine, &config.pricing);
        self.config = config.engine;
        info!(
            loop_interval_ms = self.config.loop_interval_ms,
            risk_free_rate = self.config.risk_free_rate,
            "engine configuration reloaded"
        );
    }

    fn interval(&self) -> tokio::time::Interval {
        let mut interval =
            tokio::time::interval(Duration::from_millis(self.config.loop_interval_ms.max(1)));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        interval
    }

    /// Runs cycles every `loop_interval_ms` until the stop flag is set, the
    /// data provider is exhausted, or `max_cycles` cycles have run.
    ///
    /// # Errors
    ///
    /// Never fails on a cycle error; those are logged. The `Result` is kept
    /// for symmetry with the other long-running services.
    pub async fn run(&mut self, max_cycles: Option<u64>) -> Result<()> {
        info!(
            interval_ms = self.config.loop_interval_ms,
            signals = self.signals.len(),
            vector_path = self.revaluer.pricer().uses_vector_path(),
            "trading engine started"
        );
        let mut interval_ms = self.config.loop_interval_ms;
        let mut interval = self.interval();
        let mut completed = 0u64;

        while !self.stop.load(Ordering::Relaxed) {
            if max_cycles.is_some_and(|max| completed >= max) {
                break;
            }
            interval.tick().await;

            self.apply_config_updates();
            if self.config.loop_interval_ms != interval_ms {
                interval_ms = self.config.loop_interval_ms;
                interval = self.interval();
            }

            match self.run_cycle().await {
                Ok(report) if report.exhausted => {
                    info!("market data exhausted");
                    break;
                }
                Ok(report) => {
                    debug!(?report, "cycle complete");
                }
                Err(e) => {
                    self.stats.failed_cycles += 1;
                    error!(error = ?e, "cycle failed");
                }
            }
            completed += 1;
        }

        info!(
            cycles = self.stats.cycles,
            failed = self.stats.failed_cycles,
            fills = self.stats.fills,
            realized_pnl = self.portfolio.total_realized_pnl(),
            unrealized_pnl = self.portfolio.total_unrealized_pnl(),
            "trading engine stopped"
        );
        Ok(())
    }
}
