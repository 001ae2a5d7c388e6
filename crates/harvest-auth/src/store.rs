//! The session store: single owner of "who is the current caller".
//!
//! State lives in a `tokio::sync::watch` channel so every reader sees either
//! the old or the new [`SessionState`], never a half-merged one. Presentation
//! side effects go out on a separate broadcast channel of [`AuthEvent`]s.
//!
//! Operations that change the session take a fresh *epoch*. A result is only
//! committed if no newer operation has started since, so a slow response can
//! never overwrite the outcome of a later sign-in or sign-out.

use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use harvest_config::AuthConfig;
use harvest_core::{EffectiveUser, ProfilePatch, Role, RolePolicy, Session};
use schemars::JsonSchema;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::backend::{AuthBackend, SessionChange, SignUpOutcome, SignUpRequest};
use crate::connectivity::{AlwaysOnline, Connectivity};
use crate::error::AuthError;
use crate::events::AuthEvent;
use crate::guard::{self, GuardDecision, RequiredRole, Route};
use crate::roles::RoleFlags;

const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    /// Upper bound on each backend round trip.
    pub request_timeout: Duration,
    pub role_policy: RolePolicy,
    /// Refuse self-registered admins and queue vendor sign-ups for review.
    pub restrict_signup_roles: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self::from(&AuthConfig::default())
    }
}

impl From<&AuthConfig> for StoreOptions {
    fn from(config: &AuthConfig) -> Self {
        Self {
            request_timeout: config.request_timeout(),
            role_policy: config.role_policy,
            restrict_signup_roles: config.restrict_signup_roles,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Uninitialized,
    Initializing,
    Authenticated,
    Anonymous,
}

/// An active session together with the user merged from it.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedIn {
    pub session: Session,
    pub user: EffectiveUser,
}

/// Snapshot published on every change.
///
/// `current` is `Some` exactly when `phase` is `Authenticated`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub phase: Phase,
    pub current: Option<SignedIn>,
    pub busy: bool,
    /// User-facing message from the most recent failed operation.
    pub last_error: Option<String>,
}

impl SessionState {
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self.phase, Phase::Authenticated | Phase::Anonymous)
    }

    #[must_use]
    pub fn effective_user(&self) -> Option<&EffectiveUser> {
        self.current.as_ref().map(|c| &c.user)
    }

    fn settle(&mut self, signed_in: Option<SignedIn>) {
        self.phase = if signed_in.is_some() {
            Phase::Authenticated
        } else {
            Phase::Anonymous
        };
        self.current = signed_in;
    }
}

/// What the application layer reads: user, readiness, and derived flags.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct SessionView {
    pub effective_user: Option<EffectiveUser>,
    pub ready: bool,
    pub busy: bool,
    pub role_flags: RoleFlags,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct SessionStore {
    backend: Arc<dyn AuthBackend>,
    connectivity: Arc<dyn Connectivity>,
    options: StoreOptions,
    state: watch::Sender<SessionState>,
    events: broadcast::Sender<AuthEvent>,
    epoch: AtomicU64,
    in_flight: AtomicUsize,
}

/// Marks the store busy for as long as it is alive.
struct BusyGuard<'a> {
    store: &'a SessionStore,
}

impl<'a> BusyGuard<'a> {
    fn enter(store: &'a SessionStore) -> Self {
        store.in_flight.fetch_add(1, Ordering::SeqCst);
        store.state.send_modify(|s| {
            s.busy = true;
            s.last_error = None;
        });
        Self { store }
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        if self.store.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.store.state.send_modify(|s| s.busy = false);
        }
    }
}

impl SessionStore {
    #[must_use]
    pub fn new(backend: Arc<dyn AuthBackend>, options: StoreOptions) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            backend,
            connectivity: Arc::new(AlwaysOnline),
            options,
            state,
            events,
            epoch: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn with_connectivity(mut self, connectivity: Arc<dyn Connectivity>) -> Self {
        self.connectivity = connectivity;
        self
    }

    #[must_use]
    pub fn backend(&self) -> &Arc<dyn AuthBackend> {
        &self.backend
    }

    #[must_use]
    pub const fn options(&self) -> StoreOptions {
        self.options
    }

    // -- Reads -------------------------------------------------------------

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn subscribe_events(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state.borrow().is_ready()
    }

    #[must_use]
    pub fn effective_user(&self) -> Option<EffectiveUser> {
        self.state.borrow().effective_user().cloned()
    }

    #[must_use]
    pub fn current_session(&self) -> Option<Session> {
        self.state.borrow().current.as_ref().map(|c| c.session.clone())
    }

    /// Flags for the user as of this call. Do not hold on to them.
    #[must_use]
    pub fn role_flags(&self) -> RoleFlags {
        RoleFlags::resolve(self.state.borrow().effective_user(), self.options.role_policy)
    }

    #[must_use]
    pub fn view(&self) -> SessionView {
        let state = self.state.borrow();
        SessionView {
            effective_user: state.effective_user().cloned(),
            ready: state.is_ready(),
            busy: state.busy,
            role_flags: RoleFlags::resolve(state.effective_user(), self.options.role_policy),
            error: state.last_error.clone(),
        }
    }

    /// Gate a view at `location` against the current state.
    #[must_use]
    pub fn guard(&self, required: RequiredRole, location: &str) -> GuardDecision {
        let state = self.state.borrow();
        guard::evaluate(
            state.is_ready(),
            state.effective_user(),
            required,
            location,
            self.options.role_policy,
        )
    }

    // -- Internals ---------------------------------------------------------

    fn next_epoch(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn current_epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Publish `signed_in` unless an operation newer than `epoch` has started.
    fn commit(&self, epoch: u64, signed_in: Option<SignedIn>) -> bool {
        self.state.send_if_modified(|state| {
            if self.current_epoch() != epoch {
                return false;
            }
            state.settle(signed_in);
            true
        })
    }

    fn emit(&self, event: AuthEvent) {
        // No subscribers is fine; the CLI only listens when it prints.
        let _ = self.events.send(event);
    }

    fn fail(&self, error: &AuthError) {
        let message = error.user_message();
        self.state
            .send_modify(|s| s.last_error = Some(message.clone()));
        self.emit(AuthEvent::error(message));
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, AuthError>
    where
        F: Future<Output = Result<T, AuthError>>,
    {
        let limit = self.options.request_timeout;
        tokio::time::timeout(limit, call)
            .await
            .map_err(|_| AuthError::RequestTimeout(limit))?
    }

    /// Merge the session identity with its profile. Profile problems degrade
    /// to an identity-only user.
    async fn resolve_user(&self, session: &Session) -> EffectiveUser {
        let id = &session.identity.id;
        let profile = match self.bounded(self.backend.fetch_profile_by_id(id)).await {
            Ok(profile) => Some(profile),
            Err(AuthError::ProfileNotFound(_)) => {
                tracing::debug!(user = %id, "no profile row yet");
                None
            }
            Err(error) => {
                tracing::warn!(user = %id, %error, "profile fetch failed; using identity only");
                None
            }
        };
        EffectiveUser::merge(session.identity.clone(), profile)
    }

    async fn signed_in(&self, session: Session) -> SignedIn {
        let user = self.resolve_user(&session).await;
        SignedIn { session, user }
    }

    fn signup_role(&self, requested: Role) -> Result<Role, AuthError> {
        if !self.options.restrict_signup_roles {
            return Ok(requested);
        }
        match requested {
            Role::Admin => {
                let error =
                    AuthError::InvalidInput("Admin accounts cannot be self-registered.".into());
                self.fail(&error);
                Err(error)
            }
            Role::Vendor => Ok(Role::PendingVendor),
            other => Ok(other),
        }
    }

    fn check_credentials(&self, email: &str, password: &str) -> Result<(), AuthError> {
        if email.is_empty() || password.is_empty() {
            let error = AuthError::InvalidInput("Email and password are required.".into());
            self.fail(&error);
            return Err(error);
        }
        if !self.connectivity.is_online() {
            self.fail(&AuthError::NoNetwork);
            return Err(AuthError::NoNetwork);
        }
        Ok(())
    }

    // -- Lifecycle ---------------------------------------------------------

    /// Restore any existing session. Always leaves the store ready.
    pub async fn initialize(&self) {
        if self.state.borrow().phase != Phase::Uninitialized {
            return;
        }
        let epoch = self.next_epoch();
        self.state.send_modify(|s| s.phase = Phase::Initializing);

        let signed_in = match self.bounded(self.backend.get_session()).await {
            Ok(Some(session)) => Some(self.signed_in(session).await),
            Ok(None) => None,
            Err(error) => {
                tracing::warn!(%error, backend = self.backend.name(), "session restore failed");
                None
            }
        };

        if !self.commit(epoch, signed_in) {
            // A newer operation owns the session; only make sure we are ready.
            self.state.send_if_modified(|s| {
                if s.phase != Phase::Initializing {
                    return false;
                }
                let current = s.current.take();
                s.settle(current);
                true
            });
        }
        tracing::debug!(phase = ?self.state.borrow().phase, "session store initialized");
    }

    /// Follow backend-pushed session changes until the returned [`Observer`]
    /// is stopped or dropped.
    #[must_use]
    pub fn observe(self: &Arc<Self>) -> Observer {
        let mut changes = self.backend.subscribe();
        let store: Weak<Self> = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            loop {
                let change = match changes.recv().await {
                    Ok(change) => change,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "session observer lagged");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                let change = latest(&mut changes, change);
                let Some(store) = store.upgrade() else {
                    break;
                };
                store.apply_change(change).await;
            }
            tracing::debug!("session observer stopped");
        });
        Observer {
            handle: Some(handle),
        }
    }

    async fn apply_change(&self, change: SessionChange) {
        let epoch = self.current_epoch();
        tracing::debug!(event = ?change.event, "backend session change");
        let signed_in = match change.session {
            Some(session) => Some(self.signed_in(session).await),
            None => None,
        };
        if !self.commit(epoch, signed_in) {
            tracing::debug!("dropping session change superseded by a local operation");
        }
    }

    // -- Operations --------------------------------------------------------

    /// Sign in and return the role-based destination.
    ///
    /// # Errors
    ///
    /// Returns the backend failure, `NoNetwork`, `RequestTimeout`, or
    /// `Superseded`. On error the current user is left untouched.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Route, AuthError> {
        let email = email.trim();
        self.check_credentials(email, password)?;

        let _busy = BusyGuard::enter(self);
        let epoch = self.next_epoch();
        let session = match self
            .bounded(self.backend.sign_in_with_password(email, password))
            .await
        {
            Ok(session) => session,
            Err(error) => {
                tracing::warn!(%error, "sign in failed");
                self.fail(&error);
                return Err(error);
            }
        };

        let signed_in = self.signed_in(session).await;
        let flags = RoleFlags::resolve(Some(&signed_in.user), self.options.role_policy);
        if !self.commit(epoch, Some(signed_in)) {
            return Err(AuthError::Superseded);
        }

        let route = Route::after_sign_in(flags);
        tracing::info!(%route, "signed in");
        self.emit(AuthEvent::success("Signed in successfully"));
        self.emit(AuthEvent::navigate(route));
        Ok(route)
    }

    /// Create an account. Never establishes a session.
    ///
    /// `role` defaults to [`Role::User`] and is recorded as requested. With
    /// `restrict_signup_roles` set, admin cannot be requested and a vendor
    /// request is recorded as a pending vendor awaiting review.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput`, `AlreadyRegistered`, `NoNetwork`,
    /// `RequestTimeout`, or the backend failure.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        role: Option<Role>,
    ) -> Result<SignUpOutcome, AuthError> {
        let email = email.trim();
        self.check_credentials(email, password)?;
        let role = self.signup_role(role.unwrap_or_default())?;

        let _busy = BusyGuard::enter(self);
        let request = SignUpRequest::with_role(email, password, role);
        let outcome = match self.bounded(self.backend.sign_up(&request)).await {
            Ok(outcome) => outcome,
            Err(error) => {
                tracing::warn!(%error, "sign up failed");
                self.fail(&error);
                return Err(error);
            }
        };

        tracing::info!(%role, confirm = outcome.requires_confirmation, "account created");
        if outcome.requires_confirmation {
            self.emit(AuthEvent::success(
                "Signed up successfully! Please check your email for confirmation.",
            ));
            self.emit(AuthEvent::info(
                "You must confirm your email before you can sign in.",
            ));
        } else {
            self.emit(AuthEvent::success(
                "Signed up successfully! You can now sign in.",
            ));
        }
        Ok(outcome)
    }

    /// Sign out. Local state is cleared and the landing route is emitted
    /// whether or not the backend call succeeds.
    ///
    /// # Errors
    ///
    /// Returns the backend failure after the local state has been cleared.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let _busy = BusyGuard::enter(self);
        self.next_epoch();
        let result = self.bounded(self.backend.sign_out()).await;

        // Anything merged while the backend call was pending is stale.
        self.next_epoch();
        self.state.send_modify(|s| s.settle(None));
        match &result {
            Ok(()) => self.emit(AuthEvent::success("Signed out successfully")),
            Err(error) => {
                tracing::warn!(%error, "backend sign out failed; cleared local session anyway");
                self.state
                    .send_modify(|s| s.last_error = Some(error.user_message()));
                self.emit(AuthEvent::info(
                    "Signed out on this device. The server could not be reached.",
                ));
            }
        }
        self.emit(AuthEvent::navigate(Route::Landing));
        result
    }

    /// Refresh the backend session and re-fetch the profile, then publish the
    /// merged user in one step. A no-op when signed out.
    ///
    /// # Errors
    ///
    /// Returns the backend failure or `Superseded`. A rejected refresh token
    /// (`NotAuthenticated`) also signs the store out.
    pub async fn refresh(&self) -> Result<(), AuthError> {
        if self.state.borrow().current.is_none() {
            return Ok(());
        }
        let _busy = BusyGuard::enter(self);
        let epoch = self.next_epoch();

        let session = match self.bounded(self.backend.refresh_session()).await {
            Ok(session) => session,
            Err(AuthError::NotAuthenticated) => {
                tracing::warn!("refresh token rejected; signing out locally");
                self.commit(epoch, None);
                return Err(AuthError::NotAuthenticated);
            }
            Err(error) => {
                tracing::warn!(%error, "session refresh failed");
                return Err(error);
            }
        };

        let signed_in = self.signed_in(session).await;
        if !self.commit(epoch, Some(signed_in)) {
            return Err(AuthError::Superseded);
        }
        tracing::debug!("session refreshed");
        Ok(())
    }

    /// Update the caller's own profile, then re-fetch it so the merged user
    /// reflects the change.
    ///
    /// Roles are not self-service; a patch carrying one is rejected.
    ///
    /// # Errors
    ///
    /// Returns `NotAuthenticated` when signed out, `InvalidInput`,
    /// `NoNetwork`, `RequestTimeout`, or the backend failure.
    pub async fn update_profile(&self, patch: &ProfilePatch) -> Result<(), AuthError> {
        let Some(session) = self.current_session() else {
            return Err(AuthError::NotAuthenticated);
        };
        if patch.is_empty() || patch.role.is_some() {
            let error = AuthError::InvalidInput(if patch.role.is_some() {
                "Roles are assigned by an administrator.".into()
            } else {
                "Nothing to update.".into()
            });
            self.fail(&error);
            return Err(error);
        }
        if !self.connectivity.is_online() {
            self.fail(&AuthError::NoNetwork);
            return Err(AuthError::NoNetwork);
        }

        let _busy = BusyGuard::enter(self);
        let id = session.identity.id.clone();
        if let Err(error) = self
            .bounded(self.backend.update_profile(&id, patch))
            .await
        {
            tracing::warn!(user = %id, %error, "profile update failed");
            self.fail(&error);
            return Err(error);
        }

        let epoch = self.next_epoch();
        let signed_in = self.signed_in(session).await;
        if !self.commit(epoch, Some(signed_in)) {
            tracing::debug!("profile re-fetch superseded; update is stored");
        }
        tracing::info!(user = %id, "profile updated");
        self.emit(AuthEvent::success("Profile updated"));
        Ok(())
    }
}

/// Coalesce queued changes: only the most recent one matters.
fn latest(
    changes: &mut broadcast::Receiver<SessionChange>,
    mut change: SessionChange,
) -> SessionChange {
    loop {
        match changes.try_recv() {
            Ok(next) => change = next,
            Err(broadcast::error::TryRecvError::Lagged(_)) => {}
            Err(_) => return change,
        }
    }
}

/// Handle for a running [`SessionStore::observe`] subscription.
///
/// Dropping it unregisters the subscription.
pub struct Observer {
    handle: Option<JoinHandle<()>>,
}

impl Observer {
    /// Unregister and wait until the subscription is released.
    pub async fn stop(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            let _ = handle.await;
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for Observer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
