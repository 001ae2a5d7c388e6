//! # harvest-config
//!
//! Layered configuration loading for Harvest using figment.
//!
//! Configuration sources (in priority order, highest wins):
//! 1. Environment variables (`HARVEST_*` prefix, `__` as separator)
//! 2. Explicit overrides passed to [`HarvestConfig::load_with_env_overrides`]
//! 3. Project-level `.harvest/config.toml`
//! 4. User-level `~/.config/harvest/config.toml`
//! 5. Built-in defaults
//!
//! # Environment Variable Mapping
//!
//! Figment maps `HARVEST_BACKEND__URL` -> `backend.url`,
//! `HARVEST_AUTH__REQUEST_TIMEOUT_SECS` -> `auth.request_timeout_secs`, etc.
//!
//! # Usage
//!
//! ```no_run
//! use harvest_config::HarvestConfig;
//!
//! let config = HarvestConfig::load_with_dotenv().expect("config");
//! if config.backend.is_configured() {
//!     println!("backend: {}", config.backend.url);
//! }
//! ```

mod auth;
mod backend;
mod error;
mod market;
mod storage;

pub use auth::AuthConfig;
pub use backend::{BackendConfig, BackendMode};
pub use error::ConfigError;
pub use market::MarketConfig;
pub use storage::StorageConfig;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
    value::Value,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const ENV_PREFIX: &str = "HARVEST_";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HarvestConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub market: MarketConfig,
}

impl HarvestConfig {
    /// Load configuration from all sources (TOML files + environment variables).
    ///
    /// Does NOT call `dotenvy` -- use [`Self::load_with_dotenv`] for `.env` loading.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env_overrides(&[])
    }

    /// Load configuration with `.env` file support.
    pub fn load_with_dotenv() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::load()
    }

    /// Load configuration with extra `HARVEST_*` key/value pairs layered above
    /// the TOML files and below the process environment.
    pub fn load_with_env_overrides(overrides: &[(String, String)]) -> Result<Self, ConfigError> {
        let mut figment = Self::file_figment();
        for (key, value) in overrides {
            let Some(path) = env_key_to_path(key) else {
                continue;
            };
            let parsed: Value = value.parse().unwrap_or_else(|never| match never {});
            figment = figment.merge(Serialized::default(&path, parsed));
        }
        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(ConfigError::from)
    }

    /// Build the full figment provider chain (defaults, files, environment).
    ///
    /// Public so tests can inspect the figment directly or add providers on top.
    pub fn figment() -> Figment {
        Self::file_figment().merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    fn file_figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Layer 1: User-global config
        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                figment = figment.merge(Toml::file(global_path));
            }
        }

        // Layer 2: Project-local config
        let local_path = PathBuf::from(".harvest/config.toml");
        if local_path.exists() {
            figment = figment.merge(Toml::file(local_path));
        }

        figment
    }

    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("harvest").join("config.toml"))
    }
}

/// `HARVEST_AUTH__REQUEST_TIMEOUT_SECS` -> `auth.request_timeout_secs`.
fn env_key_to_path(key: &str) -> Option<String> {
    let rest = key.strip_prefix(ENV_PREFIX)?;
    if rest.is_empty() {
        return None;
    }
    Some(rest.to_ascii_lowercase().replace("__", "."))
}
