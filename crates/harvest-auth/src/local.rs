//! File-backed fallback used when no hosted backend is configured.
//!
//! Accounts, profiles, and the current session live in one JSON document
//! (`local-auth.json`) under the data directory. Passwords are stored as
//! salted SHA-256 digests. Sign-up never requires confirmation.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, TimeDelta, Utc};
use harvest_core::{Identity, Profile, ProfilePatch, Role, Session};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::broadcast;

use crate::backend::{
    AuthBackend, CHANGE_CHANNEL_CAPACITY, SessionChange, SignUpOutcome, SignUpRequest,
};
use crate::error::AuthError;
use crate::token_store::write_private;

const DB_FILE_NAME: &str = "local-auth.json";
const SESSION_LIFETIME_SECS: i64 = 3600;
const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LocalAccount {
    identity: Identity,
    salt: String,
    password_hash: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct LocalDb {
    #[serde(default)]
    accounts: Vec<LocalAccount>,
    #[serde(default)]
    profiles: Vec<Profile>,
    #[serde(default)]
    session: Option<Session>,
}

impl LocalDb {
    fn account_by_email(&self, email: &str) -> Option<&LocalAccount> {
        self.accounts
            .iter()
            .find(|a| a.identity.email.eq_ignore_ascii_case(email))
    }

    fn account_by_id(&self, id: &str) -> Option<&LocalAccount> {
        self.accounts.iter().find(|a| a.identity.id == id)
    }

    fn profile_mut(&mut self, id: &str) -> Option<&mut Profile> {
        self.profiles.iter_mut().find(|p| p.id == id)
    }
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn issue_session(identity: Identity) -> Session {
    Session {
        access_token: format!("local-access-{}", uuid::Uuid::new_v4()),
        refresh_token: format!("local-refresh-{}", uuid::Uuid::new_v4()),
        expires_at: Utc::now() + TimeDelta::seconds(SESSION_LIFETIME_SECS),
        identity,
    }
}

pub struct LocalBackend {
    path: PathBuf,
    refresh_buffer_secs: i64,
    db: Mutex<LocalDb>,
    changes: broadcast::Sender<SessionChange>,
}

impl LocalBackend {
    /// Open (or create on first write) the local account database in `dir`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenStore` if an existing database cannot be read or parsed.
    pub fn open(dir: &Path, refresh_buffer_secs: i64) -> Result<Self, AuthError> {
        let path = dir.join(DB_FILE_NAME);
        let db = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .map_err(|e| AuthError::TokenStore(format!("read {}: {e}", path.display())))?;
            if raw.trim().is_empty() {
                LocalDb::default()
            } else {
                serde_json::from_str(&raw)
                    .map_err(|e| AuthError::TokenStore(format!("parse {}: {e}", path.display())))?
            }
        } else {
            LocalDb::default()
        };
        tracing::debug!(
            path = %path.display(),
            accounts = db.accounts.len(),
            "opened local auth database"
        );
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Ok(Self {
            path,
            refresh_buffer_secs,
            db: Mutex::new(db),
            changes,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, LocalDb>, AuthError> {
        self.db
            .lock()
            .map_err(|_| AuthError::TokenStore("local auth database lock poisoned".into()))
    }

    fn save(&self, db: &LocalDb) -> Result<(), AuthError> {
        let json = serde_json::to_vec_pretty(db)
            .map_err(|e| AuthError::TokenStore(format!("serialize local db: {e}")))?;
        write_private(&self.path, &json)
    }

    /// Identity registered under `email`, if any.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenStore` if the database lock is poisoned.
    pub fn find_identity(&self, email: &str) -> Result<Option<Identity>, AuthError> {
        Ok(self.lock()?.account_by_email(email).map(|a| a.identity.clone()))
    }

    /// Set the profile role of the account registered under `email`.
    ///
    /// Local mode has no operator console, so this is how an admin is made.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidInput` if no account exists for `email`.
    pub fn assign_role(&self, email: &str, role: Role) -> Result<Profile, AuthError> {
        let mut db = self.lock()?;
        let identity = db
            .account_by_email(email)
            .map(|a| a.identity.clone())
            .ok_or_else(|| AuthError::InvalidInput(format!("no local account for {email}")))?;
        let profile = if let Some(profile) = db.profile_mut(&identity.id) {
            profile.role = role;
            profile.clone()
        } else {
            let profile = Profile::for_new_account(&identity.id, &identity.email, role, Utc::now());
            db.profiles.push(profile.clone());
            profile
        };
        self.save(&db)?;
        tracing::info!(user = %identity.id, %role, "assigned local role");
        Ok(profile)
    }

    fn rotate(&self, expected_refresh: Option<&str>) -> Result<Session, AuthError> {
        let mut db = self.lock()?;
        let current = db.session.clone().ok_or(AuthError::NotAuthenticated)?;
        if expected_refresh.is_some_and(|token| token != current.refresh_token) {
            return Err(AuthError::NotAuthenticated);
        }
        let identity = db
            .account_by_id(&current.identity.id)
            .map(|a| a.identity.clone())
            .ok_or(AuthError::NotAuthenticated)?;
        let session = issue_session(identity);
        db.session = Some(session.clone());
        self.save(&db)?;
        drop(db);
        let _ = self.changes.send(SessionChange::refreshed(session.clone()));
        Ok(session)
    }
}

#[async_trait::async_trait]
impl AuthBackend for LocalBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn get_session(&self) -> Result<Option<Session>, AuthError> {
        let current = self.lock()?.session.clone();
        match current {
            Some(session) if session.is_near_expiry(self.refresh_buffer_secs) => {
                tracing::debug!("local session near expiry; rotating");
                match self.rotate(None) {
                    Ok(fresh) => Ok(Some(fresh)),
                    Err(AuthError::NotAuthenticated) => Ok(None),
                    Err(other) => Err(other),
                }
            }
            other => Ok(other),
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
        let mut db = self.lock()?;
        let account = db
            .account_by_email(email.trim())
            .ok_or(AuthError::InvalidCredentials)?;
        if digest(&account.salt, password) != account.password_hash {
            return Err(AuthError::InvalidCredentials);
        }
        let session = issue_session(account.identity.clone());
        db.session = Some(session.clone());
        self.save(&db)?;
        drop(db);
        tracing::info!(user = %session.identity.id, "signed in (local)");
        let _ = self.changes.send(SessionChange::signed_in(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, request: &SignUpRequest) -> Result<SignUpOutcome, AuthError> {
        let email = request.email.trim();
        if !email.contains('@') {
            return Err(AuthError::InvalidInput(format!(
                "'{email}' is not a valid email address"
            )));
        }
        if request.password.len() < MIN_PASSWORD_LEN {
            return Err(AuthError::InvalidInput(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        let mut db = self.lock()?;
        if db.account_by_email(email).is_some() {
            return Err(AuthError::AlreadyRegistered(email.to_string()));
        }

        let now = Utc::now();
        let identity = Identity {
            id: uuid::Uuid::new_v4().to_string(),
            email: email.to_string(),
            metadata: request.metadata.clone(),
        };
        let salt = uuid::Uuid::new_v4().simple().to_string();
        let password_hash = digest(&salt, &request.password);
        let role = request.role().unwrap_or_default();
        db.profiles
            .push(Profile::for_new_account(&identity.id, email, role, now));
        db.accounts.push(LocalAccount {
            identity: identity.clone(),
            salt,
            password_hash,
            created_at: now,
        });
        self.save(&db)?;
        tracing::info!(user = %identity.id, %role, "registered local account");

        Ok(SignUpOutcome {
            requires_confirmation: false,
            identity: Some(identity),
        })
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let mut db = self.lock()?;
        let had_session = db.session.take().is_some();
        self.save(&db)?;
        drop(db);
        if had_session {
            let _ = self.changes.send(SessionChange::signed_out());
        }
        Ok(())
    }

    async fn refresh_session(&self) -> Result<Session, AuthError> {
        let expected = self
            .lock()?
            .session
            .as_ref()
            .map(|s| s.refresh_token.clone())
            .ok_or(AuthError::NotAuthenticated)?;
        self.rotate(Some(&expected))
    }

    async fn fetch_profile_by_id(&self, id: &str) -> Result<Profile, AuthError> {
        self.lock()?
            .profiles
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| AuthError::ProfileNotFound(id.to_string()))
    }

    async fn update_profile(&self, id: &str, patch: &ProfilePatch) -> Result<(), AuthError> {
        let mut db = self.lock()?;
        let profile = db
            .profile_mut(id)
            .ok_or_else(|| AuthError::ProfileNotFound(id.to_string()))?;
        profile.apply(patch);
        self.save(&db)
    }
}
