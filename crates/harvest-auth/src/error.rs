use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("account email has not been confirmed")]
    UnconfirmedAccount,

    #[error("no network connection")]
    NoNetwork,

    #[error("request timed out after {}s", .0.as_secs())]
    RequestTimeout(Duration),

    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Absorbed by the session store; the effective user simply lacks profile fields.
    #[error("no profile row for {0}")]
    ProfileNotFound(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("an account already exists for {0}")]
    AlreadyRegistered(String),

    #[error("not authenticated: run `harvest auth login`")]
    NotAuthenticated,

    /// A newer sign-in, sign-out, or refresh started before this one finished.
    #[error("superseded by a newer session change")]
    Superseded,

    #[error("token store error: {0}")]
    TokenStore(String),

    #[error("unexpected backend response: {0}")]
    InvalidResponse(String),
}

impl AuthError {
    /// Message suitable for a user-facing notification.
    ///
    /// Offline, timeout, and transport failures are worded differently from a
    /// server-side rejection so the user can tell them apart.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidCredentials => "Failed to sign in. Check your email and password.".into(),
            Self::UnconfirmedAccount => {
                "Please check your email and confirm your account before signing in.".into()
            }
            Self::NoNetwork => {
                "You appear to be offline. Check your internet connection and try again.".into()
            }
            Self::RequestTimeout(_) => {
                "The request timed out. Check your internet connection and try again.".into()
            }
            Self::BackendUnavailable(_) | Self::InvalidResponse(_) => {
                "Connection error. The service could not be reached, please try again later.".into()
            }
            Self::AlreadyRegistered(_) => "An account with this email already exists.".into(),
            Self::NotAuthenticated => "You are not signed in.".into(),
            other => other.to_string(),
        }
    }

    /// True for failures caused by connectivity rather than a server decision.
    #[must_use]
    pub const fn is_connection_problem(&self) -> bool {
        matches!(
            self,
            Self::NoNetwork | Self::RequestTimeout(_) | Self::BackendUnavailable(_)
        )
    }
}
