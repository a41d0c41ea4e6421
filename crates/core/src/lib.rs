pub mod config;
pub mod config_loader;
pub mod config_watcher;
pub mod events;
pub mod symbols;
pub mod types;

pub use config::{AppConfig, EngineConfig, MonteCarloSettings, PricingConfig, RiskConfig, Settings};
pub use config_loader::ConfigLoader;
pub use config_watcher::ConfigWatcher;
pub use events::{EquityTick, MarketEvent, OptionTick};
pub use symbols::{SymbolId, SymbolTable};
pub use types::{ExchangeCode, Greeks, OptionType};
