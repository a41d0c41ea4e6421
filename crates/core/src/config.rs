use figment::Figment;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub risk: RiskConfig,
    pub pricing: PricingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Main loop cadence.
    pub loop_interval_ms: u64,
    /// Underlyings the engine trades and interns at startup.
    pub symbols: Vec<String>,
    /// Fallback volatility when neither a quoted nor an implied vol is available.
    pub default_volatility: f64,
    pub risk_free_rate: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            loop_interval_ms: 1000,
            symbols: Vec::new(),
            default_volatility: 0.20,
            risk_free_rate: 0.05,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub max_position_size: f64,
    pub max_drawdown: f64,
    pub max_leverage: f64,
    pub max_risk_per_trade: f64,
    pub max_daily_loss: f64,
    pub account_equity: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_position_size: 100_000.0,
            max_drawdown: 0.10,
            max_leverage: 2.0,
            max_risk_per_trade: 0.02,
            max_daily_loss: 5_000.0,
            account_equity: 1_000_000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    pub monte_carlo: MonteCarloSettings,
    pub iv_epsilon: f64,
    pub iv_max_iterations: u32,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            monte_carlo: MonteCarloSettings::default(),
            iv_epsilon: 1e-4,
            iv_max_iterations: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonteCarloSettings {
    pub num_simulations: u32,
    pub num_steps: u32,
    pub seed: u64,
}

impl Default for MonteCarloSettings {
    fn default() -> Self {
        Self {
            num_simulations: 10_000,
            num_steps: 100,
            seed: 0,
        }
    }
}

/// Typed key-value view over the merged configuration sources.
///
/// Keys are dotted paths (`"engine.loop_interval_ms"`). A key that is absent
/// or holds a value of the wrong type yields the supplied default.
#[derive(Debug, Clone)]
pub struct Settings {
    figment: Figment,
}

impl Settings {
    #[must_use]
    pub fn new(figment: Figment) -> Self {
        Self { figment }
    }

    fn lookup<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.figment.extract_inner::<T>(key) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::trace!(key, error = %e, "Config lookup fell back to default");
                None
            }
        }
    }

    #[must_use]
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.lookup(key).unwrap_or(default)
    }

    #[must_use]
    pub fn get_int(&self, key: &str, default: i64) -> i64 {
        self.lookup(key).unwrap_or(default)
    }

    #[must_use]
    pub fn get_double(&self, key: &str, default: f64) -> f64 {
        self.lookup(key).unwrap_or(default)
    }

    #[must_use]
    pub fn get_string(&self, key: &str, default: &str) -> String {
        self.lookup(key).unwrap_or_else(|| default.to_string())
    }

    #[must_use]
    pub fn get_string_list(&self, key: &str, default: &[&str]) -> Vec<String> {
        self.lookup(key)
            .unwrap_or_else(|| default.iter().map(|s| (*s).to_string()).collect())
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.figment.find_value(key).is_ok()
    }

    /// Extracts the full typed configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any present value fails to deserialize.
    pub fn app_config(&self) -> Result<AppConfig, figment::Error> {
        self.figment.extract()
    }
}
