use std::fs;
use std::path::{Path, PathBuf};

use harvest_core::Session;

use crate::error::AuthError;

const DEFAULT_KEYRING_SERVICE: &str = "harvest-cli";
const KEYRING_USER: &str = "session";
const SESSION_FILE_NAME: &str = "session.json";

/// Returns the keyring service name.
///
/// Defaults to `"harvest-cli"`. Override via `HARVEST_KEYRING_SERVICE` for
/// testing to avoid touching real credentials.
fn keyring_service() -> String {
    std::env::var("HARVEST_KEYRING_SERVICE")
        .unwrap_or_else(|_| DEFAULT_KEYRING_SERVICE.to_string())
}

/// Persists the current session so it can be restored on the next start.
///
/// Priority: OS keychain → `session.json` (mode `0600`) under the data dir.
#[derive(Debug, Clone)]
pub struct TokenStore {
    dir: PathBuf,
    use_keyring: bool,
}

impl TokenStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, use_keyring: bool) -> Self {
        Self {
            dir: dir.into(),
            use_keyring,
        }
    }

    /// File-only store (tests, headless machines without a keychain).
    #[must_use]
    pub fn file_only(dir: impl Into<PathBuf>) -> Self {
        Self::new(dir, false)
    }

    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.dir.join(SESSION_FILE_NAME)
    }

    /// Store a session. Falls back to file if the keyring is unavailable.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenStore` if serialization or file storage fails.
    pub fn store(&self, session: &Session) -> Result<(), AuthError> {
        let json = serde_json::to_string(session)
            .map_err(|e| AuthError::TokenStore(format!("serialize session: {e}")))?;

        if self.use_keyring {
            match keyring::Entry::new(&keyring_service(), KEYRING_USER) {
                Ok(entry) => match entry.set_password(&json) {
                    Ok(()) => return Ok(()),
                    Err(error) => {
                        tracing::warn!(%error, "keyring store failed; falling back to file");
                    }
                },
                Err(error) => {
                    tracing::warn!(%error, "keyring unavailable; falling back to file");
                }
            }
        }

        write_private(&self.path(), json.as_bytes())
    }

    /// Load the persisted session, if any.
    #[must_use]
    pub fn load(&self) -> Option<Session> {
        if self.use_keyring
            && let Ok(entry) = keyring::Entry::new(&keyring_service(), KEYRING_USER)
            && let Ok(json) = entry.get_password()
            && let Some(session) = parse_session(&json)
        {
            return Some(session);
        }

        fs::read_to_string(self.path())
            .ok()
            .and_then(|json| parse_session(&json))
    }

    /// Delete the persisted session from keyring and file.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenStore` if the session file cannot be removed.
    pub fn delete(&self) -> Result<(), AuthError> {
        if self.use_keyring
            && let Ok(entry) = keyring::Entry::new(&keyring_service(), KEYRING_USER)
        {
            let _ = entry.delete_credential();
        }

        let path = self.path();
        if path.exists() {
            fs::remove_file(&path).map_err(|e| {
                AuthError::TokenStore(format!("failed to delete {}: {e}", path.display()))
            })?;
        }
        Ok(())
    }

    /// Where the current session came from (for status display).
    #[must_use]
    pub fn detect_source(&self) -> Option<&'static str> {
        if self.use_keyring
            && let Ok(entry) = keyring::Entry::new(&keyring_service(), KEYRING_USER)
            && entry.get_password().is_ok_and(|s| parse_session(&s).is_some())
        {
            return Some("keyring");
        }
        if fs::read_to_string(self.path())
            .ok()
            .and_then(|s| parse_session(&s))
            .is_some()
        {
            return Some("file");
        }
        None
    }
}

fn parse_session(json: &str) -> Option<Session> {
    if json.trim().is_empty() {
        return None;
    }
    match serde_json::from_str(json) {
        Ok(session) => Some(session),
        Err(error) => {
            tracing::warn!(%error, "ignoring unreadable persisted session");
            None
        }
    }
}

/// Write `bytes` to `path`, creating the parent with `0700` and the file with `0600`.
pub(crate) fn write_private(path: &Path, bytes: &[u8]) -> Result<(), AuthError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| AuthError::TokenStore(format!("mkdir {}: {e}", parent.display())))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Err(e) = fs::set_permissions(parent, fs::Permissions::from_mode(0o700)) {
                tracing::warn!("failed to chmod 0700 {}: {e}", parent.display());
            }
        }
    }

    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes)
        .map_err(|e| AuthError::TokenStore(format!("write {}: {e}", tmp.display())))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600))
            .map_err(|e| AuthError::TokenStore(format!("chmod {}: {e}", tmp.display())))?;
    }

    fs::rename(&tmp, path)
        .map_err(|e| AuthError::TokenStore(format!("rename {}: {e}", path.display())))
}
