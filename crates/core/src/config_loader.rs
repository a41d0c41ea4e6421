use crate::config::{AppConfig, Settings};
use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Json, Toml},
    Figment,
};
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "config/Config.toml";
const JSON_OVERRIDE_PATH: &str = "config/Config.json";
const ENV_PREFIX: &str = "THALES_";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Builds the merged provider chain: TOML file, optional profile file,
    /// `THALES_` environment variables (`__` separates nested keys), then JSON.
    #[must_use]
    pub fn figment(path: &Path, profile: Option<&str>) -> Figment {
        let mut figment = Figment::new().merge(Toml::file(path));

        if let Some(profile) = profile {
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("Config");
            let profile_path = path.with_file_name(format!("{stem}.{profile}.toml"));
            figment = figment.merge(Toml::file(profile_path));
        }

        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .join(Json::file(JSON_OVERRIDE_PATH))
    }

    /// Loads application configuration from the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read or parsed.
    pub fn load() -> Result<AppConfig> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Loads application configuration with a specific profile.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read or parsed.
    pub fn load_with_profile(profile: &str) -> Result<AppConfig> {
        Self::figment(Path::new(DEFAULT_CONFIG_PATH), Some(profile))
            .extract()
            .with_context(|| format!("Failed to load config profile '{profile}'"))
    }

    /// Loads application configuration rooted at an explicit TOML file.
    /// A missing file is not an error; defaults apply.
    ///
    /// # Errors
    ///
    /// Returns an error if a present source cannot be parsed.
    pub fn load_from(path: impl AsRef<Path>) -> Result<AppConfig> {
        let path = path.as_ref();
        Self::figment(path, None)
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.display()))
    }

    /// Typed key-value lookups over the same sources.
    #[must_use]
    pub fn settings(path: impl AsRef<Path>) -> Settings {
        Settings::new(Self::figment(path.as_ref(), None))
    }
}
