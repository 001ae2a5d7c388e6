//! HTTP backend for the hosted auth service and its `profiles` table.
//!
//! Auth calls go to `/auth/v1/*`, row reads and writes to `/rest/v1/*`. Every
//! request carries the public `apikey` header; row requests also carry the
//! session's bearer token when one exists.

use base64::Engine as _;
use chrono::{DateTime, TimeDelta, Utc};
use harvest_config::{AuthConfig, BackendConfig};
use harvest_core::{Identity, Profile, ProfilePatch, Session};
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::{RwLock, broadcast};

use crate::backend::{
    AuthBackend, CHANGE_CHANNEL_CAPACITY, SessionChange, SignUpOutcome, SignUpRequest,
};
use crate::error::AuthError;
use crate::token_store::TokenStore;

/// Lifetime assumed when the token response carries no expiry at all.
const FALLBACK_SESSION_SECS: i64 = 3600;

/// Token endpoint payload shared by password sign-in and refresh.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: Identity,
}

impl TokenResponse {
    fn into_session(self) -> Session {
        let expires_at = self
            .expires_at
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
            .or_else(|| {
                self.expires_in
                    .map(|secs| Utc::now() + TimeDelta::seconds(secs))
            })
            .or_else(|| decode_expiry(&self.access_token).ok())
            .unwrap_or_else(|| Utc::now() + TimeDelta::seconds(FALLBACK_SESSION_SECS));
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            identity: self.user,
        }
    }
}

/// Expiry of an access token, taken from its `exp` claim.
///
/// Used only when the token endpoint omits both `expires_at` and
/// `expires_in`. The signature is not checked: the server that issued the
/// token is the one that will judge it.
///
/// # Errors
///
/// Returns `AuthError::InvalidResponse` if the token is not a JWT or has no `exp`.
pub fn decode_expiry(jwt: &str) -> Result<DateTime<Utc>, AuthError> {
    let parts: Vec<&str> = jwt.split('.').collect();
    if parts.len() != 3 {
        return Err(AuthError::InvalidResponse("invalid JWT format".into()));
    }
    let payload = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(parts[1])
        .map_err(|e| AuthError::InvalidResponse(format!("base64 decode failed: {e}")))?;
    let value: serde_json::Value = serde_json::from_slice(&payload)
        .map_err(|e| AuthError::InvalidResponse(format!("JWT payload: {e}")))?;
    let exp = value["exp"]
        .as_i64()
        .ok_or_else(|| AuthError::InvalidResponse("missing exp claim".into()))?;
    DateTime::from_timestamp(exp, 0)
        .ok_or_else(|| AuthError::InvalidResponse("invalid exp timestamp".into()))
}

/// Which call failed, for status-code classification.
#[derive(Debug, Clone, Copy)]
enum Call {
    SignIn,
    SignUp,
    Refresh,
    SignOut,
    Rows,
}

impl Call {
    const fn label(self) -> &'static str {
        match self {
            Self::SignIn => "sign in",
            Self::SignUp => "sign up",
            Self::Refresh => "refresh",
            Self::SignOut => "sign out",
            Self::Rows => "profiles",
        }
    }
}

fn classify(call: Call, status: StatusCode, body: &str) -> AuthError {
    let lowered = body.to_ascii_lowercase();
    if lowered.contains("email_not_confirmed") || lowered.contains("not confirmed") {
        return AuthError::UnconfirmedAccount;
    }
    if status.is_server_error() {
        return AuthError::BackendUnavailable(format!("{}: HTTP {status}", call.label()));
    }
    match call {
        Call::SignIn
            if matches!(
                status,
                StatusCode::BAD_REQUEST
                | StatusCode::UNAUTHORIZED
                | StatusCode::UNPROCESSABLE_ENTITY
            ) =>
        {
            AuthError::InvalidCredentials
        }
        Call::SignUp
            if lowered.contains("already registered") || lowered.contains("user_already_exists") =>
        {
            AuthError::AlreadyRegistered(extract_message(body))
        }
        Call::SignUp => AuthError::InvalidInput(extract_message(body)),
        Call::Refresh | Call::Rows
            if matches!(status, StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED) =>
        {
            AuthError::NotAuthenticated
        }
        _ => AuthError::InvalidResponse(format!("{}: HTTP {status}: {body}", call.label())),
    }
}

/// Human-readable message from an auth error body, or the raw body.
fn extract_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            ["msg", "error_description", "message", "error"]
                .iter()
                .find_map(|key| v[*key].as_str().map(str::to_string))
        })
        .unwrap_or_else(|| body.to_string())
}

fn transport(call: Call, error: &reqwest::Error) -> AuthError {
    AuthError::BackendUnavailable(format!("{}: {error}", call.label()))
}

async fn check(call: Call, resp: Response) -> Result<Response, AuthError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    tracing::debug!(call = call.label(), %status, "backend rejected request");
    Err(classify(call, status, &body))
}

pub struct RemoteBackend {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
    token_store: TokenStore,
    refresh_buffer_secs: i64,
    session: RwLock<Option<Session>>,
    changes: broadcast::Sender<SessionChange>,
}

impl RemoteBackend {
    /// Build a backend and restore any persisted session into memory.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidInput` if the backend URL or key is missing.
    pub fn new(
        backend: &BackendConfig,
        auth: &AuthConfig,
        token_store: TokenStore,
    ) -> Result<Self, AuthError> {
        if !backend.is_configured() {
            return Err(AuthError::InvalidInput(
                "backend.url and backend.anon_key must be set for the remote backend".into(),
            ));
        }
        let restored = token_store.load();
        if restored.is_some() {
            tracing::debug!(path = %token_store.path().display(), "restored persisted session");
        }
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Ok(Self {
            client: reqwest::Client::new(),
            base_url: backend.base_url().to_string(),
            anon_key: backend.anon_key.clone(),
            token_store,
            refresh_buffer_secs: auth.refresh_buffer_secs,
            session: RwLock::new(restored),
            changes,
        })
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.base_url)
    }

    fn profile_url(&self, id: &str) -> String {
        format!(
            "{}/rest/v1/profiles?id=eq.{}",
            self.base_url,
            urlencoding::encode(id)
        )
    }

    /// Bearer for row requests: the session token if signed in, else the anon key.
    async fn bearer(&self) -> String {
        self.session.read().await.as_ref().map_or_else(
            || self.anon_key.clone(),
            |session| session.access_token.clone(),
        )
    }

    async fn post_token(
        &self,
        grant_type: &str,
        body: serde_json::Value,
        call: Call,
    ) -> Result<Session, AuthError> {
        let url = format!(
            "{}?grant_type={}",
            self.auth_url("token"),
            urlencoding::encode(grant_type)
        );
        let resp = self
            .client
            .post(&url)
            .header("apikey", &self.anon_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport(call, &e))?;
        let token: TokenResponse = check(call, resp)
            .await?
            .json()
            .await
            .map_err(|e| AuthError::InvalidResponse(format!("{}: {e}", call.label())))?;
        Ok(token.into_session())
    }

    async fn install(&self, session: Session, change: fn(Session) -> SessionChange) {
        if let Err(error) = self.token_store.store(&session) {
            tracing::warn!(%error, "failed to persist session");
        }
        *self.session.write().await = Some(session.clone());
        let _ = self.changes.send(change(session));
    }

    async fn clear(&self) {
        if let Err(error) = self.token_store.delete() {
            tracing::warn!(%error, "failed to delete persisted session");
        }
        let had_session = self.session.write().await.take().is_some();
        if had_session {
            let _ = self.changes.send(SessionChange::signed_out());
        }
    }
}

#[async_trait::async_trait]
impl AuthBackend for RemoteBackend {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn get_session(&self) -> Result<Option<Session>, AuthError> {
        let current = self.session.read().await.clone();
        let Some(session) = current else {
            return Ok(None);
        };
        if !session.is_near_expiry(self.refresh_buffer_secs) {
            return Ok(Some(session));
        }

        tracing::debug!(expires_at = %session.expires_at, "session near expiry; refreshing");
        match self.refresh_session().await {
            Ok(fresh) => Ok(Some(fresh)),
            Err(error) if session.is_expired() => {
                tracing::warn!(%error, "expired session could not be refreshed; clearing");
                self.clear().await;
                Ok(None)
            }
            Err(error) => {
                tracing::warn!(%error, "refresh failed; keeping unexpired session");
                Ok(Some(session))
            }
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionChange> {
        self.changes.subscribe()
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        let session = self
            .post_token(
                "password",
                json!({ "email": email, "password": password }),
                Call::SignIn,
            )
            .await?;
        tracing::info!(user = %session.identity.id, "signed in");
        self.install(session.clone(), SessionChange::signed_in).await;
        Ok(session)
    }

    async fn sign_up(&self, request: &SignUpRequest) -> Result<SignUpOutcome, AuthError> {
        let resp = self
            .client
            .post(self.auth_url("signup"))
            .header("apikey", &self.anon_key)
            .json(&json!({
                "email": request.email,
                "password": request.password,
                "data": request.metadata,
            }))
            .send()
            .await
            .map_err(|e| transport(Call::SignUp, &e))?;
        let body: serde_json::Value = check(Call::SignUp, resp)
            .await?
            .json()
            .await
            .map_err(|e| AuthError::InvalidResponse(format!("sign up: {e}")))?;

        // With auto-confirm the service answers with tokens; otherwise with the bare user.
        let requires_confirmation = body.get("access_token").is_none();
        let identity_value = body.get("user").cloned().unwrap_or(body);
        let identity = serde_json::from_value::<Identity>(identity_value).ok();
        Ok(SignUpOutcome {
            requires_confirmation,
            identity,
        })
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let token = self
            .session
            .read()
            .await
            .as_ref()
            .map(|s| s.access_token.clone());

        let result = match token {
            Some(token) => match self
                .client
                .post(self.auth_url("logout"))
                .header("apikey", &self.anon_key)
                .bearer_auth(token)
                .send()
                .await
            {
                Ok(resp) => check(Call::SignOut, resp).await.map(|_| ()),
                Err(e) => Err(transport(Call::SignOut, &e)),
            },
            None => Ok(()),
        };

        self.clear().await;
        result
    }

    async fn refresh_session(&self) -> Result<Session, AuthError> {
        let refresh_token = self
            .session
            .read()
            .await
            .as_ref()
            .map(|s| s.refresh_token.clone())
            .ok_or(AuthError::NotAuthenticated)?;
        let session = self
            .post_token(
                "refresh_token",
                json!({ "refresh_token": refresh_token }),
                Call::Refresh,
            )
            .await?;
        self.install(session.clone(), SessionChange::refreshed).await;
        Ok(session)
    }

    async fn fetch_profile_by_id(&self, id: &str) -> Result<Profile, AuthError> {
        let url = format!("{}&select=*", self.profile_url(id));
        let resp = self
            .client
            .get(&url)
            .header("apikey", &self.anon_key)
            .bearer_auth(self.bearer().await)
            .send()
            .await
            .map_err(|e| transport(Call::Rows, &e))?;
        let rows: Vec<Profile> = check(Call::Rows, resp)
            .await?
            .json()
            .await
            .map_err(|e| AuthError::InvalidResponse(format!("profiles: {e}")))?;
        rows.into_iter()
            .next()
            .ok_or_else(|| AuthError::ProfileNotFound(id.to_string()))
    }

    async fn update_profile(&self, id: &str, patch: &ProfilePatch) -> Result<(), AuthError> {
        if patch.is_empty() {
            return Ok(());
        }
        let resp = self
            .client
            .patch(self.profile_url(id))
            .header("apikey", &self.anon_key)
            .header("Prefer", "return=minimal")
            .bearer_auth(self.bearer().await)
            .json(patch)
            .send()
            .await
            .map_err(|e| transport(Call::Rows, &e))?;
        check(Call::Rows, resp).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_jwt_with_exp(exp: i64) -> String {
        let engine = base64::engine::general_purpose::URL_SAFE_NO_PAD;
        let header = engine.encode(r#"{"alg":"HS256"}"#);
        let payload = engine.encode(format!(r#"{{"sub":"u-1","exp":{exp}}}"#));
        format!("{header}.{payload}.{}", engine.encode("sig"))
    }

    #[test]
    fn decode_expiry_reads_exp_claim() {
        let exp = Utc::now().timestamp() + 3600;
        let decoded = decode_expiry(&make_jwt_with_exp(exp)).unwrap();
        assert_eq!(decoded.timestamp(), exp);
    }

    #[test]
    fn decode_expiry_rejects_non_jwt() {
        assert!(decode_expiry("opaque-token").is_err());
    }

    #[test]
    fn token_response_prefers_absolute_expiry() {
        let response: TokenResponse = serde_json::from_value(json!({
            "access_token": "a",
            "refresh_token": "r",
            "expires_in": 3600,
            "expires_at": 2_000_000_000,
            "user": {"id": "u-1", "email": "a@b.com"}
        }))
        .unwrap();
        let session = response.into_session();
        assert_eq!(session.expires_at.timestamp(), 2_000_000_000);
        assert_eq!(session.identity.id, "u-1");
    }

    #[test]
    fn unconfirmed_body_wins_over_status() {
        let err = classify(
            Call::SignIn,
            StatusCode::BAD_REQUEST,
            r#"{"error_code":"email_not_confirmed","msg":"Email not confirmed"}"#,
        );
        assert!(matches!(err, AuthError::UnconfirmedAccount));
    }

    #[test]
    fn sign_in_rejection_is_invalid_credentials() {
        let err = classify(
            Call::SignIn,
            StatusCode::BAD_REQUEST,
            r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#,
        );
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[test]
    fn server_error_is_backend_unavailable() {
        let err = classify(Call::SignIn, StatusCode::BAD_GATEWAY, "");
        assert!(err.is_connection_problem());
    }

    #[test]
    fn duplicate_sign_up_is_already_registered() {
        let err = classify(
            Call::SignUp,
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"code":422,"error_code":"user_already_exists","msg":"User already registered"}"#,
        );
        match err {
            AuthError::AlreadyRegistered(msg) => assert_eq!(msg, "User already registered"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
