use std::sync::Arc;

use anyhow::Context;
use harvest_auth::{AuthEvent, Observer, SessionStore};
use harvest_config::HarvestConfig;
use harvest_market::Marketplace;
use tokio::sync::broadcast::{self, error::TryRecvError};

/// Everything a command handler needs: config, a ready session store, and the
/// events it has emitted since the last drain.
pub struct AppContext {
    pub config: HarvestConfig,
    pub session: Arc<SessionStore>,
    events: broadcast::Receiver<AuthEvent>,
    // Picks up token refreshes the vendor store triggers through the backend.
    _observer: Observer,
}

impl AppContext {
    pub async fn init(config: HarvestConfig) -> anyhow::Result<Self> {
        let session =
            harvest_auth::session_store(&config).context("failed to open auth backend")?;
        let events = session.subscribe_events();
        session.initialize().await;
        let observer = session.observe();
        tracing::debug!(
            backend = session.backend().name(),
            signed_in = session.effective_user().is_some(),
            "session ready"
        );
        Ok(Self {
            config,
            session,
            events,
            _observer: observer,
        })
    }

    pub fn marketplace(&self) -> anyhow::Result<Marketplace> {
        harvest_market::marketplace(&self.config, Arc::clone(&self.session))
            .context("failed to open vendor store")
    }

    /// Events emitted since the previous call.
    pub fn take_events(&mut self) -> Vec<AuthEvent> {
        let mut drained = Vec::new();
        loop {
            match self.events.try_recv() {
                Ok(event) => drained.push(event),
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "auth events dropped before display");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
        drained
    }
}
