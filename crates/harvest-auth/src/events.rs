//! Presentation-side effects emitted by the session store.
//!
//! The store never shows anything itself. It publishes [`AuthEvent`]s and the
//! embedding layer (CLI output, a UI toast host) decides how to present them.

use schemars::JsonSchema;
use serde::Serialize;

use crate::guard::Route;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuthEvent {
    /// A user-facing notification.
    Notice { level: NoticeLevel, message: String },
    /// The caller should move to this route.
    Navigate { route: Route },
}

impl AuthEvent {
    pub(crate) fn success(message: impl Into<String>) -> Self {
        Self::Notice {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub(crate) fn info(message: impl Into<String>) -> Self {
        Self::Notice {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub(crate) fn error(message: impl Into<String>) -> Self {
        Self::Notice {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }

    pub(crate) const fn navigate(route: Route) -> Self {
        Self::Navigate { route }
    }
}
