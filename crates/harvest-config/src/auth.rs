//! Session and sign-in behavior.

use harvest_core::RolePolicy;
use serde::{Deserialize, Serialize};

/// Default upper bound on a sign-in/sign-up round trip, in seconds.
const fn default_request_timeout_secs() -> u64 {
    30
}

/// Default refresh window before session expiry, in seconds.
const fn default_refresh_buffer_secs() -> i64 {
    60
}

const fn default_use_keyring() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// Timeout applied to sign-in and sign-up requests.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Sessions expiring within this many seconds are refreshed on restore.
    #[serde(default = "default_refresh_buffer_secs")]
    pub refresh_buffer_secs: i64,

    /// How metadata and profile roles combine into role flags.
    #[serde(default)]
    pub role_policy: RolePolicy,

    /// Store the persisted session in the OS keychain before falling back to a file.
    #[serde(default = "default_use_keyring")]
    pub use_keyring: bool,

    /// Reject admin sign-ups and record vendor sign-ups as pending review.
    /// Off by default: the requested role is stored as given.
    #[serde(default)]
    pub restrict_signup_roles: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            refresh_buffer_secs: default_refresh_buffer_secs(),
            role_policy: RolePolicy::default(),
            use_keyring: default_use_keyring(),
            restrict_signup_roles: false,
        }
    }
}

impl AuthConfig {
    pub const fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }
}
