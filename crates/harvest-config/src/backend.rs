//! Hosted backend (auth + row store) configuration.

use serde::{Deserialize, Serialize};

/// Which `AuthBackend` implementation to build at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendMode {
    /// Remote when `url` and `anon_key` are set, local otherwise.
    #[default]
    Auto,
    Remote,
    Local,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Project base URL (e.g., `https://abc.example-backend.co`).
    #[serde(default)]
    pub url: String,

    /// Public anonymous API key sent with every request.
    #[serde(default)]
    pub anon_key: String,

    #[serde(default)]
    pub mode: BackendMode,
}

impl BackendConfig {
    /// Check if the remote backend has the minimum required fields.
    pub fn is_configured(&self) -> bool {
        !self.url.is_empty() && !self.anon_key.is_empty()
    }

    /// Resolve `Auto` against the configured fields.
    pub fn resolved_mode(&self) -> BackendMode {
        match self.mode {
            BackendMode::Auto if self.is_configured() => BackendMode::Remote,
            BackendMode::Auto => BackendMode::Local,
            explicit => explicit,
        }
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }
}
