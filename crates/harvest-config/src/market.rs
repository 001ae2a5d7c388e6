//! Vendor directory defaults.

use serde::{Deserialize, Serialize};

const fn default_radius_km() -> f64 {
    10.0
}

const fn default_limit() -> u32 {
    20
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MarketConfig {
    /// Radius used by `vendors near` when none is given.
    #[serde(default = "default_radius_km")]
    pub default_radius_km: f64,

    /// Default result limit for vendor listings.
    #[serde(default = "default_limit")]
    pub default_limit: u32,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            default_radius_km: default_radius_km(),
            default_limit: default_limit(),
        }
    }
}
