//! The hosted auth/row-store collaborator, seen only through its contract.
//!
//! Two implementations exist: [`crate::remote::RemoteBackend`] talks HTTP to
//! the hosted service, [`crate::local::LocalBackend`] keeps accounts in a local
//! JSON file. One is chosen at startup by [`crate::connect`].

use async_trait::async_trait;
use harvest_core::identity::display_name_from_email;
use harvest_core::{Identity, Profile, ProfilePatch, Role, Session};
use serde_json::{Map, Value, json};
use tokio::sync::broadcast;

use crate::error::AuthError;

/// Capacity of each backend's session-change channel.
pub const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Why the backend's session changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn,
    SignedOut,
    TokenRefreshed,
}

/// Backend-pushed notification: the new session, or `None` when signed out.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionChange {
    pub event: SessionEvent,
    pub session: Option<Session>,
}

impl SessionChange {
    #[must_use]
    pub const fn signed_in(session: Session) -> Self {
        Self {
            event: SessionEvent::SignedIn,
            session: Some(session),
        }
    }

    #[must_use]
    pub const fn refreshed(session: Session) -> Self {
        Self {
            event: SessionEvent::TokenRefreshed,
            session: Some(session),
        }
    }

    #[must_use]
    pub const fn signed_out() -> Self {
        Self {
            event: SessionEvent::SignedOut,
            session: None,
        }
    }
}

/// Account creation request. `metadata` is stored on the identity.
#[derive(Debug, Clone, PartialEq)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub metadata: Map<String, Value>,
}

impl SignUpRequest {
    /// Request carrying `role` and a display name derived from the email.
    #[must_use]
    pub fn with_role(email: &str, password: &str, role: Role) -> Self {
        let mut metadata = Map::new();
        metadata.insert("role".into(), json!(role.as_str()));
        metadata.insert("full_name".into(), json!(display_name_from_email(email)));
        Self {
            email: email.to_string(),
            password: password.to_string(),
            metadata,
        }
    }

    #[must_use]
    pub fn role(&self) -> Option<Role> {
        self.metadata
            .get("role")
            .and_then(Value::as_str)
            .and_then(Role::parse_lenient)
    }
}

/// Result of a successful sign-up. No session is established either way.
#[derive(Debug, Clone, PartialEq)]
pub struct SignUpOutcome {
    /// The account must be confirmed (e.g., by email) before sign-in works.
    pub requires_confirmation: bool,
    pub identity: Option<Identity>,
}

#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Short implementation name for logs and status output.
    fn name(&self) -> &'static str;

    /// Current session, restored from persisted storage if needed.
    async fn get_session(&self) -> Result<Option<Session>, AuthError>;

    /// Register for session-change notifications. Dropping the receiver unregisters.
    fn subscribe(&self) -> broadcast::Receiver<SessionChange>;

    async fn sign_in_with_password(&self, email: &str, password: &str)
    -> Result<Session, AuthError>;

    async fn sign_up(&self, request: &SignUpRequest) -> Result<SignUpOutcome, AuthError>;

    /// Invalidate the session server-side. Implementations clear their own
    /// persisted session even when the server call fails.
    async fn sign_out(&self) -> Result<(), AuthError>;

    async fn refresh_session(&self) -> Result<Session, AuthError>;

    /// Returns `AuthError::ProfileNotFound` when no row exists.
    async fn fetch_profile_by_id(&self, id: &str) -> Result<Profile, AuthError>;

    async fn update_profile(&self, id: &str, patch: &ProfilePatch) -> Result<(), AuthError>;
}
