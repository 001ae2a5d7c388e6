//! Cross-cutting error types for Harvest.
//!
//! Domain-specific errors (`AuthError`, `MarketError`, `ConfigError`) live in
//! their respective crates and converge in `harvest-cli` as `anyhow::Error`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// A value failed to parse or violated a format constraint.
    #[error("Validation error: {0}")]
    Validation(String),
}
