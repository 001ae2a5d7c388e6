//! # harvest-market
//!
//! The vendor side of Harvest: a directory of verified vendors with text,
//! PIN-code and radius search, vendor applications, and the admin review
//! workflow that promotes or demotes the applicant's role.

pub mod error;
pub mod local;
pub mod remote;
pub mod search;
pub mod service;
pub mod store;

use std::sync::Arc;

use harvest_auth::{AuthBackend, SessionStore};
use harvest_config::{BackendMode, HarvestConfig};

pub use error::MarketError;
pub use local::LocalVendorStore;
pub use remote::RemoteVendorStore;
pub use search::{NearbyVendor, SearchFilter, within_radius};
pub use service::{Marketplace, ReviewDecision};
pub use store::VendorStore;

/// Build the vendor store matching the configured backend mode.
///
/// # Errors
///
/// Returns `MarketError::InvalidInput` if remote mode lacks credentials, or
/// `MarketError::Storage` if the local data directory is unusable.
pub fn connect(
    config: &HarvestConfig,
    auth: Arc<dyn AuthBackend>,
) -> Result<Arc<dyn VendorStore>, MarketError> {
    let store: Arc<dyn VendorStore> = match config.backend.resolved_mode() {
        BackendMode::Remote => Arc::new(RemoteVendorStore::new(&config.backend, auth)?),
        BackendMode::Local | BackendMode::Auto => {
            let dir = config
                .storage
                .data_dir()
                .map_err(|e| MarketError::Storage(e.to_string()))?;
            Arc::new(LocalVendorStore::open(&dir)?)
        }
    };
    tracing::debug!(store = store.name(), "vendor store selected");
    Ok(store)
}

/// Marketplace over the configured vendor store and an existing session store.
///
/// # Errors
///
/// See [`connect`].
pub fn marketplace(
    config: &HarvestConfig,
    session: Arc<SessionStore>,
) -> Result<Marketplace, MarketError> {
    let vendors = connect(config, session.backend().clone())?;
    Ok(Marketplace::new(vendors, session, config.market.clone()))
}
