//! Pre-trade risk gate and adaptive limits.
//!
//! Portfolio value for risk purposes is account equity plus realized and
//! unrealized P&L. Exposure is the sum of absolute position values. Every
//! check reads one [`PortfolioSnapshot`] so the figures are consistent.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thales_core::{RiskConfig, SymbolId};
use tracing::{debug, info, warn};

use crate::error::{RiskError, RiskViolation};
use crate::order::{Order, OrderSide};
use crate::portfolio::{Portfolio, PortfolioSnapshot};

/// Risk level above which limits are tightened.
pub const TIGHTEN_ABOVE: f64 = 0.8;
/// Risk level below which limits are relaxed.
pub const RELAX_BELOW: f64 = 0.3;
const ADJUSTMENT: f64 = 0.10;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskLimits {
    /// Largest absolute notional allowed in one symbol.
    pub max_position_size: f64,
    /// Unrealized P&L, as a fraction of portfolio value, treated as full risk.
    pub max_drawdown: f64,
    pub max_leverage: f64,
    /// Largest order notional as a fraction of portfolio value.
    pub max_risk_per_trade: f64,
    pub max_daily_loss: f64,
    pub account_equity: f64,
}

impl RiskLimits {
    /// # Errors
    ///
    /// `InvalidLimits` naming the first limit that is not a positive finite number.
    pub fn validate(&self) -> Result<(), RiskError> {
        let fields = [
            ("max_position_size", self.max_position_size),
            ("max_drawdown", self.max_drawdown),
            ("max_leverage", self.max_leverage),
            ("max_risk_per_trade", self.max_risk_per_trade),
            ("max_daily_loss", self.max_daily_loss),
            ("account_equity", self.account_equity),
        ];
        for (name, value) in fields {
            if !(value.is_finite() && value > 0.0) {
                return Err(RiskError::InvalidLimits(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        Ok(())
    }
}

impl From<&RiskConfig> for RiskLimits {
    fn from(config: &RiskConfig) -> Self {
        Self {
            max_position_size: config.max_position_size,
            max_drawdown: config.max_drawdown,
            max_leverage: config.max_leverage,
            max_risk_per_trade: config.max_risk_per_trade,
            max_daily_loss: config.max_daily_loss,
            account_equity: config.account_equity,
        }
    }
}

/// Outcome of one adaptive pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskAdjustment {
    Tightened,
    Relaxed,
    Unchanged,
}

#[derive(Debug)]
struct State {
    /// Limits as configured; relaxation never goes past these.
    configured: RiskLimits,
    /// Limits currently enforced.
    active: RiskLimits,
    /// Total P&L at the start of the trading day.
    daily_baseline: f64,
}

#[derive(Debug)]
pub struct RiskManager {
    state: RwLock<State>,
}

impl RiskManager {
    /// # Errors
    ///
    /// `InvalidLimits` if any limit is not positive.
    pub fn new(limits: RiskLimits) -> Result<Self, RiskError> {
        limits.validate()?;
        Ok(Self {
            state: RwLock::new(State {
                configured: limits,
                active: limits,
                daily_baseline: 0.0,
            }),
        })
    }

    /// # Errors
    ///
    /// `InvalidLimits` if any configured limit is not positive.
    pub fn from_config(config: &RiskConfig) -> Result<Self, RiskError> {
        Self::new(RiskLimits::from(config))
    }

    /// Limits currently enforced (after adaptive adjustment).
    #[must_use]
    pub fn limits(&self) -> RiskLimits {
        self.state.read().active
    }

    #[must_use]
    pub fn configured_limits(&self) -> RiskLimits {
        self.state.read().configured
    }

    /// Replaces both configured and active limits, e.g. after a config reload.
    ///
    /// # Errors
    ///
    /// `InvalidLimits` if any limit is not positive; the old limits stay in force.
    pub fn set_limits(&self, limits: RiskLimits) -> Result<(), RiskError> {
        limits.validate()?;
        let mut state = self.state.write();
        state.configured = limits;
        state.active = limits;
        info!(
            max_position_size = limits.max_position_size,
            max_leverage = limits.max_leverage,
            max_risk_per_trade = limits.max_risk_per_trade,
            "risk limits replaced"
        );
        Ok(())
    }

    /// Starts a new trading day: daily loss is measured from the current total P&L.
    pub fn reset_daily_baseline(&self, portfolio: &Portfolio) {
        let snapshot = portfolio.snapshot();
        self.state.write().daily_baseline =
            snapshot.total_realized_pnl() + snapshot.total_unrealized_pnl();
    }

    // ========================================================================
    // Portfolio measures
    // ========================================================================

    #[must_use]
    pub fn portfolio_value(&self, snapshot: &PortfolioSnapshot) -> f64 {
        self.state.read().active.account_equity
            + snapshot.total_realized_pnl()
            + snapshot.total_unrealized_pnl()
    }

    /// P&L since the daily baseline. Negative is a loss.
    #[must_use]
    pub fn daily_pnl(&self, snapshot: &PortfolioSnapshot) -> f64 {
        snapshot.total_realized_pnl() + snapshot.total_unrealized_pnl()
            - self.state.read().daily_baseline
    }

    /// Blended score in [0, 1]: the larger of leverage used relative to the
    /// limit and unrealized P&L relative to the drawdown budget.
    #[must_use]
    pub fn current_risk_level(&self, portfolio: &Portfolio) -> f64 {
        self.risk_level(&portfolio.snapshot())
    }

    fn risk_level(&self, snapshot: &PortfolioSnapshot) -> f64 {
        let limits = self.limits();
        let value = self.portfolio_value(snapshot);
        if value <= 0.0 {
            return 1.0;
        }
        let leverage = snapshot.total_exposure() / value / limits.max_leverage;
        let drawdown = snapshot.total_unrealized_pnl().abs() / (value * limits.max_drawdown);
        leverage.max(drawdown).min(1.0)
    }

    /// Additional long notional that may still be put on `symbol`.
    ///
    /// Starts from the position-size limit less any existing long value,
    /// caps it at the per-trade budget and scales it down by the current risk
    /// level. Never negative; zero when portfolio value is not positive.
    #[must_use]
    pub fn max_position_size(&self, symbol: SymbolId, portfolio: &Portfolio) -> f64 {
        let snapshot = portfolio.snapshot();
        let limits = self.limits();
        let value = self.portfolio_value(&snapshot);
        if value <= 0.0 {
            return 0.0;
        }
        let existing_long = snapshot
            .position(symbol)
            .map_or(0.0, |p| p.value().max(0.0));
        let available =
            (limits.max_position_size - existing_long).min(value * limits.max_risk_per_trade);
        (available * (1.0 - self.risk_level(&snapshot))).max(0.0)
    }

    // ========================================================================
    // Order gate
    // ========================================================================

    /// Checks an order against every limit, in order: position size, trade
    /// risk, leverage, daily loss.
    ///
    /// An order that shrinks the absolute position skips the leverage and
    /// daily loss checks so a breached book can still be unwound.
    ///
    /// # Errors
    ///
    /// The first [`RiskViolation`] found.
    pub fn check_order(&self, order: &Order, portfolio: &Portfolio) -> Result<(), RiskViolation> {
        if !portfolio.symbols().contains_id(order.symbol_id) {
            return Err(RiskViolation::UnknownSymbol(order.symbol_id));
        }
        let snapshot = portfolio.snapshot();
        let limits = self.limits();
        let position = snapshot.position(order.symbol_id);

        let price = order
            .reference_price()
            .or_else(|| position.map(|p| p.last_price).filter(|p| *p > 0.0))
            .ok_or(RiskViolation::NoReferencePrice {
                order_id: order.order_id,
            })?;

        let current_qty = position.map_or(0, |p| p.quantity);
        let post_qty = current_qty + order.signed_quantity();
        let size = post_qty.unsigned_abs() as f64 * price;
        if size > limits.max_position_size {
            return Err(RiskViolation::PositionSize {
                size,
                limit: limits.max_position_size,
            });
        }

        let value = self.portfolio_value(&snapshot);
        let notional = f64::from(order.quantity) * price;
        let risk = if value > 0.0 { notional / value } else { f64::INFINITY };
        if risk > limits.max_risk_per_trade {
            return Err(RiskViolation::TradeRisk {
                risk,
                limit: limits.max_risk_per_trade,
            });
        }

        let reducing = post_qty.unsigned_abs() < current_qty.unsigned_abs();
        if !reducing {
            let leverage = (snapshot.total_exposure() + notional) / value;
            if leverage > limits.max_leverage {
                return Err(RiskViolation::Leverage {
                    leverage,
                    limit: limits.max_leverage,
                });
            }

            let loss = -self.daily_pnl(&snapshot);
            if loss >= limits.max_daily_loss {
                return Err(RiskViolation::DailyLoss {
                    loss,
                    limit: limits.max_daily_loss,
                });
            }
        }

        debug!(
            order_id = order.order_id,
            side = %order.side,
            notional,
            post_qty,
            "order passed risk checks"
        );
        Ok(())
    }

    #[must_use]
    pub fn is_order_allowed(&self, order: &Order, portfolio: &Portfolio) -> bool {
        match self.check_order(order, portfolio) {
            Ok(()) => true,
            Err(violation) => {
                warn!(order_id = order.order_id, %violation, "order rejected by risk");
                false
            }
        }
    }

    /// Adaptive pass: tightens position and per-trade limits by 10% when the
    /// risk level is above 0.8, relaxes them by 10% (never past the configured
    /// values) when it is below 0.3.
    pub fn update_risk_params(&self, portfolio: &Portfolio) -> RiskAdjustment {
        let level = self.current_risk_level(portfolio);
        let mut state = self.state.write();
        let configured = state.configured;
        let active = &mut state.active;

        let adjustment = if level > TIGHTEN_ABOVE {
            active.max_position_size *= 1.0 - ADJUSTMENT;
            active.max_risk_per_trade *= 1.0 - ADJUSTMENT;
            RiskAdjustment::Tightened
        } else if level < RELAX_BELOW
            && (active.max_position_size < configured.max_position_size
                || active.max_risk_per_trade < configured.max_risk_per_trade)
        {
            active.max_position_size =
                (active.max_position_size * (1.0 + ADJUSTMENT)).min(configured.max_position_size);
            active.max_risk_per_trade = (active.max_risk_per_trade * (1.0 + ADJUSTMENT))
                .min(configured.max_risk_per_trade);
            RiskAdjustment::Relaxed
        } else {
            RiskAdjustment::Unchanged
        };

        if adjustment != RiskAdjustment::Unchanged {
            info!(
                risk_level = level,
                ?adjustment,
                max_position_size = active.max_position_size,
                max_risk_per_trade = active.max_risk_per_trade,
                "risk limits adjusted"
            );
        }
        adjustment
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use thales_core::SymbolTable;

    use super::*;
    use crate::contract::OptionContract;
    use crate::position::Position;

    fn limits() -> RiskLimits {
        RiskLimits::from(&RiskConfig::default())
    }

    fn setup() -> (RiskManager, Portfolio, SymbolId) {
        let symbols = Arc::new(SymbolTable::new());
        let id = symbols.intern("SPY");
        (RiskManager::new(limits()).unwrap(), Portfolio::new(symbols), id)
    }

    #[test]
    fn non_positive_limits_are_rejected() {
        let mut bad = limits();
        bad.max_leverage = 0.0;
        assert!(matches!(
            RiskManager::new(bad),
            Err(RiskError::InvalidLimits(msg)) if msg.contains("max_leverage")
        ));
    }

    #[test]
    fn small_order_passes() {
        let (risk, portfolio, spy) = setup();
        let order = Order::limit(1, spy, OrderSide::Buy, 10, 400.0);
        assert_eq!(risk.check_order(&order, &portfolio), Ok(()));
        assert!(risk.is_order_allowed(&order, &portfolio));
    }

    #[test]
    fn oversized_position_is_rejected() {
        let (risk, portfolio, spy) = setup();
        portfolio
            .add_position(Position::opened(OptionContract::unknown(spy), 240, 400.0, 400.0))
            .unwrap();
        // 240 + 20 shares at 400 is 104k notional.
        let order = Order::limit(1, spy, OrderSide::Buy, 20, 400.0);
        assert!(matches!(
            risk.check_order(&order, &portfolio),
            Err(RiskViolation::PositionSize { .. })
        ));
        // Selling down is fine.
        let order = Order::limit(2, spy, OrderSide::Sell, 20, 400.0);
        assert_eq!(risk.check_order(&order, &portfolio), Ok(()));
    }

    #[test]
    fn per_trade_risk_is_enforced() {
        let (risk, portfolio, spy) = setup();
        // 60 * 400 = 24k, above 2% of 1M but under the position limit.
        let order = Order::limit(1, spy, OrderSide::Buy, 60, 400.0);
        assert!(matches!(
            risk.check_order(&order, &portfolio),
            Err(RiskViolation::TradeRisk { .. })
        ));
    }

    #[test]
    fn leverage_is_enforced() {
        let (risk, portfolio, spy) = setup();
        let symbols = portfolio.symbols().clone();
        for i in 0..21 {
            let id = symbols.intern(&format!("L{i}"));
            portfolio
                .add_position(Position::opened(OptionContract::unknown(id), 1000, 100.0, 100.0))
                .unwrap();
        }
        let order = Order::limit(1, spy, OrderSide::Buy, 10, 100.0);
        assert!(matches!(
            risk.check_order(&order, &portfolio),
            Err(RiskViolation::Leverage { .. })
        ));
    }

    #[test]
    fn reducing_order_passes_over_leverage() {
        let (risk, portfolio, _) = setup();
        let symbols = portfolio.symbols().clone();
        let mut first = None;
        for i in 0..21 {
            let id = symbols.intern(&format!("L{i}"));
            first.get_or_insert(id);
            portfolio
                .add_position(Position::opened(OptionContract::unknown(id), 1000, 100.0, 100.0))
                .unwrap();
        }
        let held = first.unwrap();

        let sell = Order::limit(1, held, OrderSide::Sell, 10, 100.0);
        assert_eq!(risk.check_order(&sell, &portfolio), Ok(()));
        let buy = Order::limit(2, held, OrderSide::Buy, 10, 100.0);
        assert!(matches!(
            risk.check_order(&buy, &portfolio),
            Err(RiskViolation::Leverage { .. })
        ));
    }

    #[test]
    fn daily_loss_is_enforced_from_baseline() {
        let (risk, portfolio, spy) = setup();
        portfolio
            .add_position(Position::opened(OptionContract::unknown(spy), 100, 400.0, 400.0))
            .unwrap();
        risk.reset_daily_baseline(&portfolio);
        portfolio.update_position(spy, 349.0);

        let buy = Order::limit(1, spy, OrderSide::Buy, 1, 349.0);
        assert!(matches!(
            risk.check_order(&buy, &portfolio),
            Err(RiskViolation::DailyLoss { .. })
        ));
        // Cutting the losing position stays open.
        let sell = Order::limit(2, spy, OrderSide::Sell, 10, 349.0);
        assert_eq!(risk.check_order(&sell, &portfolio), Ok(()));

        risk.reset_daily_baseline(&portfolio);
        assert_eq!(risk.check_order(&buy, &portfolio), Ok(()));
    }

    #[test]
    fn market_order_without_price_is_refused() {
        let (risk, portfolio, spy) = setup();
        let order = Order::market(5, spy, OrderSide::Buy, 1);
        assert_eq!(
            risk.check_order(&order, &portfolio),
            Err(RiskViolation::NoReferencePrice { order_id: 5 })
        );
        let unknown = Order::limit(6, SymbolId(99), OrderSide::Buy, 1, 1.0);
        assert_eq!(
            risk.check_order(&unknown, &portfolio),
            Err(RiskViolation::UnknownSymbol(SymbolId(99)))
        );
    }

    #[test]
    fn risk_level_blends_leverage_and_drawdown() {
        let (risk, portfolio, spy) = setup();
        assert_eq!(risk.current_risk_level(&portfolio), 0.0);

        portfolio
            .add_position(Position::opened(OptionContract::unknown(spy), 1000, 500.0, 500.0))
            .unwrap();
        // 500k exposure on 1M value at 2x leverage limit.
        assert!((risk.current_risk_level(&portfolio) - 0.25).abs() < 1e-12);

        // A 60k loss: drawdown ratio 60k / (940k * 0.1) dominates.
        portfolio.update_position(spy, 440.0);
        let level = risk.current_risk_level(&portfolio);
        assert!((level - 60_000.0 / 94_000.0).abs() < 1e-9);
    }

    #[test]
    fn max_position_size_shrinks_with_risk() {
        let (risk, portfolio, spy) = setup();
        assert!((risk.max_position_size(spy, &portfolio) - 20_000.0).abs() < 1e-9);

        portfolio
            .add_position(Position::opened(OptionContract::unknown(spy), 1000, 99.0, 99.0))
            .unwrap();
        // 100k limit less 99k long leaves 1k, scaled by risk level.
        let level = risk.current_risk_level(&portfolio);
        let want = 1_000.0 * (1.0 - level);
        assert!((risk.max_position_size(spy, &portfolio) - want).abs() < 1e-9);
    }

    #[test]
    fn adaptive_limits_tighten_then_relax_to_configured() {
        let (risk, portfolio, spy) = setup();
        portfolio
            .add_position(Position::opened(OptionContract::unknown(spy), 9000, 200.0, 200.0))
            .unwrap();
        assert_eq!(risk.update_risk_params(&portfolio), RiskAdjustment::Tightened);
        let tightened = risk.limits();
        assert!((tightened.max_position_size - 90_000.0).abs() < 1e-9);
        assert!((tightened.max_risk_per_trade - 0.018).abs() < 1e-12);

        // Flatten: risk drops to zero and limits climb back, capped.
        portfolio
            .add_position(Position::new(OptionContract::unknown(spy)))
            .unwrap();
        assert_eq!(risk.update_risk_params(&portfolio), RiskAdjustment::Relaxed);
        assert!(risk.limits().max_position_size < 100_000.0);
        assert_eq!(risk.update_risk_params(&portfolio), RiskAdjustment::Relaxed);
        assert_eq!(risk.update_risk_params(&portfolio), RiskAdjustment::Unchanged);
        assert_eq!(risk.limits(), risk.configured_limits());
    }

    #[test]
    fn set_limits_validates_and_replaces() {
        let (risk, _, _) = setup();
        let mut next = limits();
        next.max_leverage = 3.0;
        risk.set_limits(next).unwrap();
        assert_eq!(risk.limits().max_leverage, 3.0);

        next.max_daily_loss = -1.0;
        assert!(risk.set_limits(next).is_err());
        assert_eq!(risk.limits().max_daily_loss, 5_000.0);
    }
}
