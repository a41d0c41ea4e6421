//! Paper-trades a simulated option chain through the full engine loop.

use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use thales_core::{AppConfig, ConfigLoader, ConfigWatcher, SymbolTable};
use thales_engine::{
    EngineStats, MispricingSignal, PaperExecution, SimulatedFeed, TradingEngine,
};
use thales_portfolio::{Portfolio, RiskLimits};
use tracing::{info, warn};

const DEFAULT_UNDERLYING: &str = "SPY";

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Config file path
    #[arg(short, long, default_value = "config/Config.toml")]
    pub config: PathBuf,

    /// Reload the config file while running
    #[arg(long)]
    pub watch: bool,

    /// Stop after this many cycles (runs until Ctrl-C otherwise)
    #[arg(long)]
    pub cycles: Option<u64>,

    /// Override the configured loop interval
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Seed for the simulated feed
    #[arg(long, default_value_t = 7)]
    pub seed: u64,

    /// Relative noise on simulated option quotes
    #[arg(long, default_value_t = 0.05)]
    pub quote_noise: f64,

    /// Minimum relative mispricing before trading
    #[arg(long, default_value_t = 0.03)]
    pub edge: f64,

    /// Contracts per signal
    #[arg(long, default_value_t = 1)]
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct PositionRow {
    pub symbol: String,
    pub quantity: i64,
    pub average_price: f64,
    pub last_price: f64,
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
    pub delta: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub stats: EngineStats,
    pub positions: Vec<PositionRow>,
    pub total_value: f64,
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
    pub exposure: f64,
    pub risk_level: f64,
    pub limits: RiskLimits,
}

/// Loads `path` when it exists, defaults otherwise.
///
/// # Errors
/// Returns an error if the file exists but cannot be parsed.
pub fn load_config(path: &Path) -> Result<AppConfig> {
    if path.exists() {
        ConfigLoader::load_from(path)
            .with_context(|| format!("failed to load config from {}", path.display()))
    } else {
        warn!(path = %path.display(), "config file not found, using defaults");
        Ok(AppConfig::default())
    }
}

fn apply_overrides(config: &mut AppConfig, args: &RunArgs) {
    if let Some(interval_ms) = args.interval_ms {
        config.engine.loop_interval_ms = interval_ms;
    }
    if config.engine.symbols.is_empty() {
        config.engine.symbols.push(DEFAULT_UNDERLYING.to_string());
    }
}

/// Builds the engine, runs it and summarizes the book.
///
/// # Errors
/// Returns an error if the config is invalid or the engine cannot start.
pub async fn run_report(args: &RunArgs, config: &AppConfig) -> Result<RunReport> {
    let mut config = config.clone();
    apply_overrides(&mut config, args);

    let feed = SimulatedFeed::new(&config.engine.symbols, args.seed)
        .with_volatility(config.engine.default_volatility)
        .with_risk_free_rate(config.engine.risk_free_rate)
        .with_quote_noise(args.quote_noise);
    let signal = MispricingSignal::new(config.engine.default_volatility, config.engine.risk_free_rate)
        .with_edge(args.edge)
        .with_quantity(args.quantity);

    let portfolio = Arc::new(Portfolio::new(Arc::new(SymbolTable::new())));
    let mut engine = TradingEngine::new(feed, PaperExecution::new(), Arc::clone(&portfolio), &config)?
        .with_signal(Box::new(signal));

    let watcher = if args.watch {
        let (watcher, rx) = ConfigWatcher::new(config.clone());
        engine = engine.with_config_updates(rx);
        let watcher = Arc::new(watcher);
        let task_watcher = Arc::clone(&watcher);
        let path = args.config.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = task_watcher.watch(path).await {
                warn!(error = %e, "config watcher stopped");
            }
        }))
    } else {
        None
    };

    let stop = engine.stop_handle();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, stopping after the current cycle");
            stop.store(true, Ordering::SeqCst);
        }
    });

    engine.run(args.cycles).await?;
    ctrl_c.abort();
    if let Some(task) = watcher {
        task.abort();
    }

    Ok(summarize(&engine))
}

fn summarize(engine: &TradingEngine<SimulatedFeed, PaperExecution>) -> RunReport {
    let portfolio = engine.portfolio();
    let risk = engine.risk_manager();
    let snapshot = portfolio.snapshot();

    let positions = snapshot
        .positions
        .iter()
        .map(|p| PositionRow {
            symbol: portfolio
                .symbols()
                .symbol(p.symbol_id())
                .unwrap_or_else(|| p.symbol_id().to_string()),
            quantity: p.quantity,
            average_price: p.average_price,
            last_price: p.last_price,
            realized_pnl: p.realized_pnl,
            unrealized_pnl: p.unrealized_pnl,
            delta: p.contract.greeks.delta * p.quantity as f64,
        })
        .collect();

    RunReport {
        stats: engine.stats().clone(),
        positions,
        total_value: risk.portfolio_value(&snapshot),
        realized_pnl: snapshot.total_realized_pnl(),
        unrealized_pnl: snapshot.total_unrealized_pnl(),
        exposure: snapshot.total_exposure(),
        risk_level: risk.current_risk_level(portfolio),
        limits: risk.limits(),
    }
}

/// Runs the run command.
///
/// # Errors
/// Returns an error if the config cannot be loaded or the engine fails to start.
pub async fn run_engine(args: &RunArgs, json: bool) -> Result<()> {
    info!(config = %args.config.display(), "starting paper trading engine");
    let config = load_config(&args.config)?;
    let report = run_report(args, &config).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let s = &report.stats;
    println!(
        "{} cycles ({} failed), {} events, {} orders, {} rejected, {} fills, commission {:.2}",
        s.cycles, s.failed_cycles, s.events, s.orders_submitted, s.orders_rejected, s.fills, s.commission
    );
    println!(
        "{:<24} {:>6} {:>10} {:>10} {:>10} {:>10} {:>8}",
        "symbol", "qty", "avg", "last", "realized", "unreal.", "delta"
    );
    for p in report.positions.iter().filter(|p| p.quantity != 0 || p.realized_pnl != 0.0) {
        println!(
            "{:<24} {:>6} {:>10.4} {:>10.4} {:>10.2} {:>10.2} {:>8.2}",
            p.symbol, p.quantity, p.average_price, p.last_price, p.realized_pnl, p.unrealized_pnl, p.delta
        );
    }
    println!(
        "value {:.2}  realized {:.2}  unrealized {:.2}  exposure {:.2}  risk {:.3}",
        report.total_value, report.realized_pnl, report.unrealized_pnl, report.exposure, report.risk_level
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(cycles: u64) -> RunArgs {
        RunArgs {
            config: PathBuf::from("does/not/exist.toml"),
            watch: false,
            cycles: Some(cycles),
            interval_ms: Some(1),
            seed: 3,
            quote_noise: 0.10,
            edge: 0.03,
            quantity: 1,
        }
    }

    #[test]
    fn missing_config_falls_back_to_defaults() {
        let config = load_config(Path::new("does/not/exist.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn overrides_fill_in_symbols_and_interval() {
        let mut config = AppConfig::default();
        apply_overrides(&mut config, &args(1));
        assert_eq!(config.engine.symbols, vec![DEFAULT_UNDERLYING.to_string()]);
        assert_eq!(config.engine.loop_interval_ms, 1);
    }

    #[tokio::test]
    async fn report_covers_every_cycle() {
        let report = run_report(&args(8), &AppConfig::default()).await.unwrap();
        assert_eq!(report.stats.cycles, 8);
        assert_eq!(report.stats.events, 8 * 3);
        assert!((0.0..=1.0).contains(&report.risk_level));
        for p in &report.positions {
            let want = p.quantity as f64 * (p.last_price - p.average_price);
            assert!((p.unrealized_pnl - want).abs() < 1e-9);
        }
    }
}
