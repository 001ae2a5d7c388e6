//! Proactive connectivity signal consulted before sign-in and sign-up.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Reports whether the host currently believes it has network access.
pub trait Connectivity: Send + Sync {
    fn is_online(&self) -> bool;
}

/// Default signal for hosts that cannot detect connectivity.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOnline;

impl Connectivity for AlwaysOnline {
    fn is_online(&self) -> bool {
        true
    }
}

/// Shared flag the embedding application flips when its own check changes.
#[derive(Debug, Clone)]
pub struct ConnectivityFlag(Arc<AtomicBool>);

impl ConnectivityFlag {
    #[must_use]
    pub fn new(online: bool) -> Self {
        Self(Arc::new(AtomicBool::new(online)))
    }

    pub fn set_online(&self, online: bool) {
        self.0.store(online, Ordering::SeqCst);
    }
}

impl Default for ConnectivityFlag {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Connectivity for ConnectivityFlag {
    fn is_online(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
