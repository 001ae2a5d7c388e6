//! `LocalBackend` behavior against a temporary data directory.

use harvest_auth::{AuthBackend, AuthError, LocalBackend, SessionEvent, SignUpRequest};
use harvest_core::{ProfilePatch, Role};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn open(dir: &TempDir) -> LocalBackend {
    LocalBackend::open(dir.path(), 60).expect("open local backend")
}

#[tokio::test]
async fn sign_up_creates_profile_without_session() {
    let dir = TempDir::new().unwrap();
    let backend = open(&dir);

    let outcome = backend
        .sign_up(&SignUpRequest::with_role("rosa@farm.io", "secret1", Role::PendingVendor))
        .await
        .unwrap();
    assert!(!outcome.requires_confirmation);
    let identity = outcome.identity.expect("identity");
    assert_eq!(identity.metadata_role(), Some(Role::PendingVendor));

    assert!(backend.get_session().await.unwrap().is_none());

    let profile = backend.fetch_profile_by_id(&identity.id).await.unwrap();
    assert_eq!(profile.role, Role::PendingVendor);
    assert_eq!(profile.full_name.as_deref(), Some("Rosa"));
    assert_eq!(profile.preferences.show_in_map, Some(true));
}

#[tokio::test]
async fn duplicate_email_is_rejected_case_insensitively() {
    let dir = TempDir::new().unwrap();
    let backend = open(&dir);
    backend
        .sign_up(&SignUpRequest::with_role("rosa@farm.io", "secret1", Role::User))
        .await
        .unwrap();

    let err = backend
        .sign_up(&SignUpRequest::with_role("Rosa@Farm.io", "secret2", Role::User))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::AlreadyRegistered(_)));
}

#[tokio::test]
async fn short_password_is_invalid_input() {
    let dir = TempDir::new().unwrap();
    let err = open(&dir)
        .sign_up(&SignUpRequest::with_role("a@b.com", "123", Role::User))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidInput(_)));
}

#[tokio::test]
async fn sign_in_checks_password_and_broadcasts() {
    let dir = TempDir::new().unwrap();
    let backend = open(&dir);
    backend
        .sign_up(&SignUpRequest::with_role("a@b.com", "rightpass", Role::User))
        .await
        .unwrap();
    let mut changes = backend.subscribe();

    let err = backend
        .sign_in_with_password("a@b.com", "wrongpass")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));
    assert!(backend.get_session().await.unwrap().is_none());

    let session = backend
        .sign_in_with_password("a@b.com", "rightpass")
        .await
        .unwrap();
    assert_eq!(changes.recv().await.unwrap().event, SessionEvent::SignedIn);
    assert_eq!(backend.get_session().await.unwrap(), Some(session));
}

#[tokio::test]
async fn state_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let user_id = {
        let backend = open(&dir);
        let outcome = backend
            .sign_up(&SignUpRequest::with_role("a@b.com", "secret1", Role::User))
            .await
            .unwrap();
        backend.sign_in_with_password("a@b.com", "secret1").await.unwrap();
        outcome.identity.unwrap().id
    };

    let reopened = open(&dir);
    let session = reopened.get_session().await.unwrap().expect("restored session");
    assert_eq!(session.identity.id, user_id);
}

#[tokio::test]
async fn refresh_rotates_tokens_and_keeps_identity() {
    let dir = TempDir::new().unwrap();
    let backend = open(&dir);
    backend
        .sign_up(&SignUpRequest::with_role("a@b.com", "secret1", Role::User))
        .await
        .unwrap();
    let first = backend.sign_in_with_password("a@b.com", "secret1").await.unwrap();

    let refreshed = backend.refresh_session().await.unwrap();
    assert_ne!(refreshed.access_token, first.access_token);
    assert_eq!(refreshed.identity, first.identity);
}

#[tokio::test]
async fn refresh_without_session_is_not_authenticated() {
    let dir = TempDir::new().unwrap();
    let err = open(&dir).refresh_session().await.unwrap_err();
    assert!(matches!(err, AuthError::NotAuthenticated));
}

#[tokio::test]
async fn sign_out_clears_session() {
    let dir = TempDir::new().unwrap();
    let backend = open(&dir);
    backend
        .sign_up(&SignUpRequest::with_role("a@b.com", "secret1", Role::User))
        .await
        .unwrap();
    backend.sign_in_with_password("a@b.com", "secret1").await.unwrap();
    let mut changes = backend.subscribe();

    backend.sign_out().await.unwrap();
    assert!(backend.get_session().await.unwrap().is_none());
    assert_eq!(changes.recv().await.unwrap().event, SessionEvent::SignedOut);
}

#[tokio::test]
async fn update_profile_and_assign_role() {
    let dir = TempDir::new().unwrap();
    let backend = open(&dir);
    let id = backend
        .sign_up(&SignUpRequest::with_role("a@b.com", "secret1", Role::User))
        .await
        .unwrap()
        .identity
        .unwrap()
        .id;

    backend
        .update_profile(&id, &ProfilePatch::role(Role::PendingVendor))
        .await
        .unwrap();
    assert_eq!(
        backend.fetch_profile_by_id(&id).await.unwrap().role,
        Role::PendingVendor
    );

    let admin = backend.assign_role("A@B.com", Role::Admin).unwrap();
    assert_eq!(admin.role, Role::Admin);
    assert!(backend.assign_role("nobody@b.com", Role::Admin).is_err());

    let err = backend
        .update_profile("missing", &ProfilePatch::role(Role::User))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::ProfileNotFound(_)));
}

#[cfg(unix)]
#[tokio::test]
async fn database_file_is_private() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    let backend = open(&dir);
    backend
        .sign_up(&SignUpRequest::with_role("a@b.com", "secret1", Role::User))
        .await
        .unwrap();
    let mode = std::fs::metadata(backend.path()).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode, 0o600);
}
