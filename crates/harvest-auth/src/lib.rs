//! # harvest-auth
//!
//! Client-side authentication and authorization for Harvest.
//!
//! - [`AuthBackend`]: the hosted auth service contract, with a remote HTTP
//!   implementation and a local file-backed fallback chosen once by [`connect`]
//! - [`SessionStore`]: who the current caller is, published atomically
//! - [`RoleFlags`]: admin / vendor / pending-vendor flags derived on demand
//! - [`guard::evaluate`]: pure route gating
//! - [`AuthEvent`]: notices and navigation for the presentation layer

pub mod backend;
pub mod connectivity;
pub mod error;
pub mod events;
pub mod guard;
pub mod local;
pub mod remote;
pub mod roles;
pub mod store;
pub mod token_store;

use std::sync::Arc;

use harvest_config::{BackendMode, HarvestConfig};

pub use backend::{AuthBackend, SessionChange, SessionEvent, SignUpOutcome, SignUpRequest};
pub use connectivity::{AlwaysOnline, Connectivity, ConnectivityFlag};
pub use error::AuthError;
pub use events::{AuthEvent, NoticeLevel};
pub use guard::{GuardDecision, RequiredRole, Route};
pub use local::LocalBackend;
pub use remote::RemoteBackend;
pub use roles::RoleFlags;
pub use store::{Observer, Phase, SessionState, SessionStore, SessionView, SignedIn, StoreOptions};
pub use token_store::TokenStore;

/// Build the configured backend.
///
/// `backend.mode = auto` picks the remote backend when `backend.url` and
/// `backend.anon_key` are set, and the local file backend otherwise.
///
/// # Errors
///
/// Returns `AuthError::InvalidInput` if remote mode is forced without
/// credentials, or `AuthError::TokenStore` if the data directory is unusable.
pub fn connect(config: &HarvestConfig) -> Result<Arc<dyn AuthBackend>, AuthError> {
    let data_dir = config
        .storage
        .data_dir()
        .map_err(|e| AuthError::TokenStore(e.to_string()))?;

    let backend: Arc<dyn AuthBackend> = match config.backend.resolved_mode() {
        BackendMode::Remote => {
            let tokens = TokenStore::new(&data_dir, config.auth.use_keyring);
            Arc::new(RemoteBackend::new(&config.backend, &config.auth, tokens)?)
        }
        BackendMode::Local | BackendMode::Auto => Arc::new(LocalBackend::open(
            &data_dir,
            config.auth.refresh_buffer_secs,
        )?),
    };
    tracing::debug!(backend = backend.name(), dir = %data_dir.display(), "auth backend selected");
    Ok(backend)
}

/// Session store over the configured backend, with options taken from `config.auth`.
///
/// # Errors
///
/// See [`connect`].
pub fn session_store(config: &HarvestConfig) -> Result<Arc<SessionStore>, AuthError> {
    let backend = connect(config)?;
    Ok(Arc::new(SessionStore::new(
        backend,
        StoreOptions::from(&config.auth),
    )))
}
