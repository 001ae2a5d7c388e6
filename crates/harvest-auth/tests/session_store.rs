//! Session store scenarios against a scripted in-memory backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use harvest_auth::{
    AuthBackend, AuthError, AuthEvent, ConnectivityFlag, GuardDecision, NoticeLevel, Phase,
    RequiredRole, Route, SessionChange, SessionStore, SignUpOutcome, SignUpRequest, StoreOptions,
};
use harvest_core::{Identity, Profile, ProfilePatch, Role, Session};
use pretty_assertions::assert_eq;
use serde_json::{Map, json};
use tokio::sync::broadcast;

#[derive(Clone)]
enum SignInScript {
    Accept,
    Reject,
    Unconfirmed,
    /// Answer successfully, but only after this long.
    Hang(Duration),
}

struct ScriptedBackend {
    identity: Identity,
    session: Mutex<Option<Session>>,
    profiles: Mutex<HashMap<String, Profile>>,
    sign_in: Mutex<SignInScript>,
    sign_out_fails: AtomicBool,
    sign_in_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    last_sign_up: Mutex<Option<SignUpRequest>>,
    sign_up_delay: Mutex<Option<Duration>>,
    sign_out_delay: Mutex<Option<Duration>>,
    profile_delay: Mutex<Option<Duration>>,
    changes: broadcast::Sender<SessionChange>,
}

impl ScriptedBackend {
    fn new(metadata_role: Option<&str>, profile_role: Option<Role>) -> Arc<Self> {
        let mut metadata = Map::new();
        if let Some(role) = metadata_role {
            metadata.insert("role".into(), json!(role));
        }
        let identity = Identity {
            id: "u-1".into(),
            email: "a@b.com".into(),
            metadata,
        };
        let mut profiles = HashMap::new();
        if let Some(role) = profile_role {
            profiles.insert(
                "u-1".to_string(),
                Profile::for_new_account("u-1", "a@b.com", role, Utc::now()),
            );
        }
        let (changes, _) = broadcast::channel(16);
        Arc::new(Self {
            identity,
            session: Mutex::new(None),
            profiles: Mutex::new(profiles),
            sign_in: Mutex::new(SignInScript::Accept),
            sign_out_fails: AtomicBool::new(false),
            sign_in_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            last_sign_up: Mutex::new(None),
            sign_up_delay: Mutex::new(None),
            sign_out_delay: Mutex::new(None),
            profile_delay: Mutex::new(None),
            changes,
        })
    }

    fn issue(&self, tag: &str) -> Session {
        Session {
            access_token: format!("access-{tag}"),
            refresh_token: format!("refresh-{tag}"),
            expires_at: Utc::now() + TimeDelta::hours(1),
            identity: self.identity.clone(),
        }
    }

    fn with_existing_session(self: Arc<Self>) -> Arc<Self> {
        *self.session.lock().unwrap() = Some(self.issue("restored"));
        self
    }

    fn script_sign_in(&self, script: SignInScript) {
        *self.sign_in.lock().unwrap() = script;
    }

    fn set_profile_role(&self, role: Role) {
        self.profiles
            .lock()
            .unwrap()
            .entry("u-1".into())
            .or_insert_with(|| Profile::for_new_account("u-1", "a@b.com", role, Utc::now()))
            .role = role;
    }

    fn delay(slot: &Mutex<Option<Duration>>, delay: Duration) {
        *slot.lock().unwrap() = Some(delay);
    }

    async fn wait(slot: &Mutex<Option<Duration>>) {
        let delay = *slot.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn push(&self, change: SessionChange) {
        *self.session.lock().unwrap() = change.session.clone();
        let _ = self.changes.send(change);
    }
}

#[async_trait]
impl AuthBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn get_session(&self) -> Result<Option<Session>, AuthError> {
        Ok(self.session.lock().unwrap().clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionChange> {
        self.changes.subscribe()
    }

    async fn sign_in_with_password(&self, _: &str, _: &str) -> Result<Session, AuthError> {
        self.sign_in_calls.fetch_add(1, Ordering::SeqCst);
        let script = self.sign_in.lock().unwrap().clone();
        match script {
            SignInScript::Accept => {}
            SignInScript::Reject => return Err(AuthError::InvalidCredentials),
            SignInScript::Unconfirmed => return Err(AuthError::UnconfirmedAccount),
            SignInScript::Hang(delay) => tokio::time::sleep(delay).await,
        }
        let session = self.issue("signed-in");
        *self.session.lock().unwrap() = Some(session.clone());
        Ok(session)
    }

    async fn sign_up(&self, request: &SignUpRequest) -> Result<SignUpOutcome, AuthError> {
        Self::wait(&self.sign_up_delay).await;
        *self.last_sign_up.lock().unwrap() = Some(request.clone());
        Ok(SignUpOutcome {
            requires_confirmation: true,
            identity: None,
        })
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        Self::wait(&self.sign_out_delay).await;
        if self.sign_out_fails.load(Ordering::SeqCst) {
            return Err(AuthError::BackendUnavailable("logout: HTTP 502".into()));
        }
        *self.session.lock().unwrap() = None;
        Ok(())
    }

    async fn refresh_session(&self) -> Result<Session, AuthError> {
        let n = self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        let session = self.issue(&format!("refresh-{n}"));
        *self.session.lock().unwrap() = Some(session.clone());
        Ok(session)
    }

    async fn fetch_profile_by_id(&self, id: &str) -> Result<Profile, AuthError> {
        Self::wait(&self.profile_delay).await;
        self.profiles
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| AuthError::ProfileNotFound(id.to_string()))
    }

    async fn update_profile(&self, id: &str, patch: &ProfilePatch) -> Result<(), AuthError> {
        let mut profiles = self.profiles.lock().unwrap();
        let profile = profiles
            .get_mut(id)
            .ok_or_else(|| AuthError::ProfileNotFound(id.to_string()))?;
        profile.apply(patch);
        Ok(())
    }
}

fn store(backend: &Arc<ScriptedBackend>) -> Arc<SessionStore> {
    Arc::new(SessionStore::new(backend.clone(), StoreOptions::default()))
}

fn drain(events: &mut broadcast::Receiver<AuthEvent>) -> Vec<AuthEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

fn error_notices(events: &[AuthEvent]) -> Vec<&str> {
    events
        .iter()
        .filter_map(|e| match e {
            AuthEvent::Notice {
                level: NoticeLevel::Error,
                message,
            } => Some(message.as_str()),
            _ => None,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// initialize
// ---------------------------------------------------------------------------

#[tokio::test]
async fn guard_waits_until_initialized() {
    let backend = ScriptedBackend::new(None, None);
    let store = store(&backend);
    assert_eq!(store.state().phase, Phase::Uninitialized);
    assert_eq!(store.guard(RequiredRole::Admin, "/admin"), GuardDecision::Loading);

    store.initialize().await;
    assert_eq!(store.state().phase, Phase::Anonymous);
    assert!(store.is_ready());
    assert_eq!(
        store.guard(RequiredRole::Admin, "/admin"),
        GuardDecision::Redirect {
            to: Route::Auth,
            from: Some("/admin".into())
        }
    );
}

#[tokio::test]
async fn initialize_restores_session_and_merges_profile() {
    let backend = ScriptedBackend::new(Some("user"), Some(Role::Admin)).with_existing_session();
    let store = store(&backend);
    store.initialize().await;

    let view = store.view();
    assert!(view.ready);
    assert_eq!(store.state().phase, Phase::Authenticated);
    assert_eq!(view.effective_user.unwrap().profile_role(), Some(Role::Admin));
    assert!(view.role_flags.is_admin);
    assert_eq!(store.guard(RequiredRole::Admin, "/admin"), GuardDecision::Render);
}

#[tokio::test]
async fn missing_profile_degrades_to_identity_only() {
    let backend = ScriptedBackend::new(Some("vendor"), None).with_existing_session();
    let store = store(&backend);
    let mut events = store.subscribe_events();
    store.initialize().await;

    let user = store.effective_user().expect("user from identity");
    assert!(user.profile.is_none());
    assert_eq!(user.id(), "u-1");
    assert!(store.role_flags().is_vendor);
    assert!(drain(&mut events).is_empty(), "profile absence is not shown to the user");
}

// ---------------------------------------------------------------------------
// sign_in
// ---------------------------------------------------------------------------

#[tokio::test]
async fn wrong_password_leaves_anonymous_user_untouched() {
    let backend = ScriptedBackend::new(None, Some(Role::User));
    backend.script_sign_in(SignInScript::Reject);
    let store = store(&backend);
    store.initialize().await;
    let mut events = store.subscribe_events();

    let err = store.sign_in("a@b.com", "wrongpass").await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));

    let state = store.state();
    assert!(state.current.is_none());
    assert!(!state.busy);
    let events = drain(&mut events);
    let notices = error_notices(&events);
    assert_eq!(notices, vec![AuthError::InvalidCredentials.user_message().as_str()]);
    assert!(!notices[0].contains("confirm"));
}

#[tokio::test]
async fn wrong_password_keeps_existing_session() {
    let backend = ScriptedBackend::new(None, Some(Role::Vendor)).with_existing_session();
    let store = store(&backend);
    store.initialize().await;
    let before = store.state().current;
    assert!(before.is_some());

    backend.script_sign_in(SignInScript::Reject);
    assert!(store.sign_in("a@b.com", "wrongpass").await.is_err());
    assert_eq!(store.state().current, before);
    assert!(!store.state().busy);
}

#[tokio::test]
async fn unconfirmed_account_gets_its_own_message() {
    let backend = ScriptedBackend::new(None, None);
    backend.script_sign_in(SignInScript::Unconfirmed);
    let store = store(&backend);
    store.initialize().await;
    let mut events = store.subscribe_events();

    assert!(store.sign_in("a@b.com", "pw").await.is_err());
    let events = drain(&mut events);
    let notices = error_notices(&events);
    assert_eq!(notices.len(), 1);
    assert!(notices[0].contains("confirm"));
}

#[tokio::test(start_paused = true)]
async fn timed_out_sign_in_ignores_late_response() {
    let backend = ScriptedBackend::new(None, Some(Role::Admin));
    backend.script_sign_in(SignInScript::Hang(Duration::from_secs(31)));
    let store = store(&backend);
    store.initialize().await;

    let err = store.sign_in("a@b.com", "pw").await.unwrap_err();
    assert!(matches!(err, AuthError::RequestTimeout(d) if d == Duration::from_secs(30)));
    let message = store.view().error.expect("timeout message");
    assert!(message.contains("timed out"));

    tokio::time::sleep(Duration::from_secs(5)).await;
    let state = store.state();
    assert!(state.current.is_none());
    assert_eq!(state.phase, Phase::Anonymous);
    assert!(!state.busy);
}

#[tokio::test]
async fn offline_sign_in_fails_fast() {
    let backend = ScriptedBackend::new(None, None);
    let online = ConnectivityFlag::new(false);
    let store = Arc::new(
        SessionStore::new(backend.clone(), StoreOptions::default())
            .with_connectivity(Arc::new(online.clone())),
    );
    store.initialize().await;
    let mut events = store.subscribe_events();

    let err = store.sign_in("a@b.com", "pw").await.unwrap_err();
    assert!(matches!(err, AuthError::NoNetwork));
    assert_eq!(backend.sign_in_calls.load(Ordering::SeqCst), 0);
    assert!(error_notices(&drain(&mut events))[0].contains("offline"));

    online.set_online(true);
    assert!(store.sign_in("a@b.com", "pw").await.is_ok());
}

#[tokio::test]
async fn empty_credentials_are_rejected_locally() {
    let backend = ScriptedBackend::new(None, None);
    let store = store(&backend);
    store.initialize().await;

    assert!(matches!(
        store.sign_in("  ", "pw").await,
        Err(AuthError::InvalidInput(_))
    ));
    assert!(matches!(
        store.sign_in("a@b.com", "").await,
        Err(AuthError::InvalidInput(_))
    ));
    assert_eq!(backend.sign_in_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn sign_in_redirects_by_role() {
    for (metadata, profile, expected) in [
        (None, Some(Role::Admin), Route::Admin),
        (Some("vendor"), Some(Role::User), Route::VendorDashboard),
        (None, Some(Role::PendingVendor), Route::Profile),
        (None, None, Route::Profile),
    ] {
        let backend = ScriptedBackend::new(metadata, profile);
        let store = store(&backend);
        store.initialize().await;
        let mut events = store.subscribe_events();

        let route = store.sign_in("a@b.com", "pw").await.unwrap();
        assert_eq!(route, expected);
        assert!(drain(&mut events).contains(&AuthEvent::Navigate { route: expected }));
        assert_eq!(store.state().phase, Phase::Authenticated);
    }
}

#[tokio::test(start_paused = true)]
async fn busy_while_sign_in_is_in_flight() {
    let backend = ScriptedBackend::new(None, None);
    backend.script_sign_in(SignInScript::Hang(Duration::from_secs(2)));
    let store = store(&backend);
    store.initialize().await;
    let mut state = store.subscribe_state();

    let task = tokio::spawn({
        let store = store.clone();
        async move { store.sign_in("a@b.com", "pw").await }
    });
    state.wait_for(|s| s.busy).await.unwrap();

    assert!(task.await.unwrap().is_ok());
    assert!(!store.state().busy);
}

// ---------------------------------------------------------------------------
// sign_up
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sign_up_defaults_to_user_and_asks_for_confirmation() {
    let backend = ScriptedBackend::new(None, None);
    let store = store(&backend);
    store.initialize().await;
    let mut events = store.subscribe_events();

    let outcome = store.sign_up("meera@farm.in", "secret1", None).await.unwrap();
    assert!(outcome.requires_confirmation);
    assert!(store.state().current.is_none());

    let request = backend.last_sign_up.lock().unwrap().clone().unwrap();
    assert_eq!(request.role(), Some(Role::User));
    assert_eq!(request.metadata["full_name"], json!("Meera"));

    let events = drain(&mut events);
    assert!(events.iter().any(|e| matches!(
        e,
        AuthEvent::Notice { message, .. } if message.contains("check your email")
    )));
    assert!(!events.iter().any(|e| matches!(e, AuthEvent::Navigate { .. })));
}

#[tokio::test]
async fn sign_up_records_the_requested_role() {
    let backend = ScriptedBackend::new(None, None);
    let store = store(&backend);
    store.initialize().await;

    for role in [Role::Vendor, Role::Admin, Role::PendingVendor] {
        store.sign_up("a@b.com", "secret1", Some(role)).await.unwrap();
        let request = backend.last_sign_up.lock().unwrap().clone().unwrap();
        assert_eq!(request.role(), Some(role));
    }
}

#[tokio::test]
async fn restricted_sign_up_refuses_admin_and_queues_vendors() {
    let backend = ScriptedBackend::new(None, None);
    let options = StoreOptions {
        restrict_signup_roles: true,
        ..StoreOptions::default()
    };
    let store = SessionStore::new(backend.clone(), options);
    store.initialize().await;

    assert!(matches!(
        store.sign_up("a@b.com", "secret1", Some(Role::Admin)).await,
        Err(AuthError::InvalidInput(_))
    ));
    assert!(backend.last_sign_up.lock().unwrap().is_none());

    store
        .sign_up("a@b.com", "secret1", Some(Role::Vendor))
        .await
        .unwrap();
    let request = backend.last_sign_up.lock().unwrap().clone().unwrap();
    assert_eq!(request.role(), Some(Role::PendingVendor));
}

#[tokio::test]
async fn offline_sign_up_never_reaches_the_backend() {
    let backend = ScriptedBackend::new(None, None);
    let store = SessionStore::new(backend.clone(), StoreOptions::default())
        .with_connectivity(Arc::new(ConnectivityFlag::new(false)));
    store.initialize().await;
    let mut events = store.subscribe_events();

    let err = store.sign_up("a@b.com", "secret1", None).await.unwrap_err();
    assert!(matches!(err, AuthError::NoNetwork));
    assert!(backend.last_sign_up.lock().unwrap().is_none());
    assert!(error_notices(&drain(&mut events))[0].contains("offline"));
    assert!(!store.state().busy);
}

#[tokio::test(start_paused = true)]
async fn hanging_sign_up_times_out() {
    let backend = ScriptedBackend::new(None, None);
    ScriptedBackend::delay(&backend.sign_up_delay, Duration::from_secs(31));
    let store = store(&backend);
    store.initialize().await;

    let err = store.sign_up("a@b.com", "secret1", None).await.unwrap_err();
    assert!(matches!(err, AuthError::RequestTimeout(d) if d == Duration::from_secs(30)));
    assert!(store.view().error.expect("timeout message").contains("timed out"));
    assert!(store.state().current.is_none());
    assert!(!store.state().busy);
}

// ---------------------------------------------------------------------------
// sign_out
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_backend_sign_out_still_clears_and_navigates() {
    let backend = ScriptedBackend::new(None, Some(Role::Vendor)).with_existing_session();
    let store = store(&backend);
    store.initialize().await;
    assert!(store.effective_user().is_some());

    backend.sign_out_fails.store(true, Ordering::SeqCst);
    let mut events = store.subscribe_events();
    assert!(store.sign_out().await.is_err());

    let state = store.state();
    assert!(state.current.is_none());
    assert!(store.current_session().is_none());
    assert_eq!(state.phase, Phase::Anonymous);
    assert!(!state.busy);
    assert!(drain(&mut events).contains(&AuthEvent::Navigate {
        route: Route::Landing
    }));
}

#[tokio::test(start_paused = true)]
async fn backend_change_merged_during_sign_out_is_discarded() {
    let backend = ScriptedBackend::new(None, Some(Role::Vendor)).with_existing_session();
    let store = store(&backend);
    store.initialize().await;
    let observer = store.observe();

    backend.sign_out_fails.store(true, Ordering::SeqCst);
    ScriptedBackend::delay(&backend.sign_out_delay, Duration::from_secs(1));
    ScriptedBackend::delay(&backend.profile_delay, Duration::from_secs(2));

    let sign_out = tokio::spawn({
        let store = store.clone();
        async move { store.sign_out().await }
    });
    tokio::task::yield_now().await;
    // Token refresh from another tab lands while the logout call is pending.
    backend.push(SessionChange::refreshed(backend.issue("late")));

    assert!(sign_out.await.unwrap().is_err());
    tokio::time::sleep(Duration::from_secs(5)).await;

    let state = store.state();
    assert_eq!(state.phase, Phase::Anonymous);
    assert!(state.current.is_none());
    assert!(!store.role_flags().any());
    observer.stop().await;
}

#[tokio::test]
async fn sign_out_navigates_to_landing() {
    let backend = ScriptedBackend::new(None, None).with_existing_session();
    let store = store(&backend);
    store.initialize().await;
    let mut events = store.subscribe_events();

    store.sign_out().await.unwrap();
    let events = drain(&mut events);
    assert_eq!(events.last(), Some(&AuthEvent::Navigate { route: Route::Landing }));
}

// ---------------------------------------------------------------------------
// refresh
// ---------------------------------------------------------------------------

#[tokio::test]
async fn repeated_refresh_yields_same_user() {
    let backend = ScriptedBackend::new(Some("pending_vendor"), Some(Role::PendingVendor))
        .with_existing_session();
    let store = store(&backend);
    store.initialize().await;

    store.refresh().await.unwrap();
    let first = store.effective_user();
    store.refresh().await.unwrap();
    let second = store.effective_user();

    assert!(first.is_some());
    assert_eq!(first, second);
    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn refresh_picks_up_server_side_role_change() {
    let backend = ScriptedBackend::new(None, Some(Role::PendingVendor)).with_existing_session();
    let store = store(&backend);
    store.initialize().await;
    assert_eq!(
        store.guard(RequiredRole::Vendor, "/vendor/dashboard"),
        GuardDecision::Redirect {
            to: Route::Landing,
            from: None
        }
    );

    backend.set_profile_role(Role::Vendor);
    store.refresh().await.unwrap();
    assert!(store.role_flags().is_vendor);
    assert_eq!(
        store.guard(RequiredRole::Vendor, "/vendor/dashboard"),
        GuardDecision::Render
    );
}

#[tokio::test]
async fn refresh_when_signed_out_is_a_no_op() {
    let backend = ScriptedBackend::new(None, None);
    let store = store(&backend);
    store.initialize().await;

    store.refresh().await.unwrap();
    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 0);
    assert!(store.effective_user().is_none());
}

// ---------------------------------------------------------------------------
// observe
// ---------------------------------------------------------------------------

#[tokio::test]
async fn observer_follows_backend_changes_until_stopped() {
    let backend = ScriptedBackend::new(None, Some(Role::Vendor));
    let store = store(&backend);
    store.initialize().await;
    let mut state = store.subscribe_state();

    let observer = store.observe();
    assert!(observer.is_running());
    assert_eq!(backend.changes.receiver_count(), 1);

    backend.push(SessionChange::signed_in(backend.issue("other-tab")));
    tokio::time::timeout(Duration::from_secs(5), state.wait_for(|s| s.current.is_some()))
        .await
        .expect("observer applied sign-in")
        .unwrap();
    assert!(store.role_flags().is_vendor);

    backend.push(SessionChange::signed_out());
    tokio::time::timeout(Duration::from_secs(5), state.wait_for(|s| s.current.is_none()))
        .await
        .expect("observer applied sign-out")
        .unwrap();
    assert_eq!(store.state().phase, Phase::Anonymous);

    observer.stop().await;
    assert_eq!(backend.changes.receiver_count(), 0);
}

// ---------------------------------------------------------------------------
// update_profile
// ---------------------------------------------------------------------------

#[tokio::test]
async fn update_profile_republishes_merged_user() {
    let backend = ScriptedBackend::new(None, Some(Role::User)).with_existing_session();
    let store = store(&backend);
    store.initialize().await;
    let mut events = store.subscribe_events();

    let patch = ProfilePatch {
        full_name: Some("Meera Nair".into()),
        phone_number: Some("+91 98450 00000".into()),
        ..ProfilePatch::default()
    };
    store.update_profile(&patch).await.unwrap();

    let user = store.effective_user().unwrap();
    let profile = user.profile.expect("profile row");
    assert_eq!(profile.full_name.as_deref(), Some("Meera Nair"));
    assert_eq!(profile.phone_number.as_deref(), Some("+91 98450 00000"));
    assert_eq!(profile.role, Role::User);
    assert!(drain(&mut events).iter().any(|e| matches!(
        e,
        AuthEvent::Notice { level: NoticeLevel::Success, message } if message == "Profile updated"
    )));
}

#[tokio::test]
async fn update_profile_rejects_role_changes_and_empty_patches() {
    let backend = ScriptedBackend::new(None, Some(Role::User)).with_existing_session();
    let store = store(&backend);
    store.initialize().await;

    for patch in [ProfilePatch::role(Role::Admin), ProfilePatch::default()] {
        assert!(matches!(
            store.update_profile(&patch).await,
            Err(AuthError::InvalidInput(_))
        ));
    }
    assert_eq!(store.effective_user().unwrap().profile_role(), Some(Role::User));
}

#[tokio::test]
async fn update_profile_requires_a_session() {
    let backend = ScriptedBackend::new(None, Some(Role::User));
    let store = store(&backend);
    store.initialize().await;

    let patch = ProfilePatch {
        full_name: Some("Nobody".into()),
        ..ProfilePatch::default()
    };
    assert!(matches!(
        store.update_profile(&patch).await,
        Err(AuthError::NotAuthenticated)
    ));
}
