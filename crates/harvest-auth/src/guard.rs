//! Route gating as a pure decision function.
//!
//! [`evaluate`] takes readiness, the effective user, and the required role and
//! returns what the caller should do. It has no access to the session store,
//! so every branch can be tested without one.

use std::fmt;
use std::str::FromStr;

use harvest_core::{EffectiveUser, RolePolicy};
use schemars::JsonSchema;
use serde::Serialize;

use crate::error::AuthError;
use crate::roles::RoleFlags;

/// Role a protected view demands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RequiredRole {
    #[default]
    None,
    /// Any signed-in caller.
    User,
    Vendor,
    Admin,
}

impl FromStr for RequiredRole {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "user" => Ok(Self::User),
            "vendor" => Ok(Self::Vendor),
            "admin" => Ok(Self::Admin),
            other => Err(AuthError::InvalidInput(format!(
                "unknown required role '{other}' (expected none, user, vendor, admin)"
            ))),
        }
    }
}

/// Named destinations the auth layer navigates to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Landing,
    Auth,
    Admin,
    VendorDashboard,
    Profile,
    VendorSignup,
}

impl Route {
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Landing => "/",
            Self::Auth => "/auth",
            Self::Admin => "/admin",
            Self::VendorDashboard => "/vendor/dashboard",
            Self::Profile => "/profile",
            Self::VendorSignup => "/become-vendor",
        }
    }

    /// Where a successful sign-in lands: admin, then vendor, then profile.
    #[must_use]
    pub const fn after_sign_in(flags: RoleFlags) -> Self {
        if flags.is_admin {
            Self::Admin
        } else if flags.is_vendor {
            Self::VendorDashboard
        } else {
            Self::Profile
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GuardDecision {
    /// Session state is still being resolved; show a placeholder.
    Loading,
    Render,
    Redirect {
        to: Route,
        /// Originally requested location, kept so sign-in can return there.
        #[serde(skip_serializing_if = "Option::is_none")]
        from: Option<String>,
    },
}

impl GuardDecision {
    const fn redirect(to: Route) -> Self {
        Self::Redirect { to, from: None }
    }
}

/// Decide whether the view at `location` renders for the current caller.
#[must_use]
pub fn evaluate(
    ready: bool,
    user: Option<&EffectiveUser>,
    required: RequiredRole,
    location: &str,
    policy: RolePolicy,
) -> GuardDecision {
    if !ready {
        return GuardDecision::Loading;
    }
    let Some(user) = user else {
        return GuardDecision::Redirect {
            to: Route::Auth,
            from: Some(location.to_string()),
        };
    };

    let flags = RoleFlags::resolve(Some(user), policy);
    match required {
        RequiredRole::Admin if !flags.is_admin => GuardDecision::redirect(Route::Landing),
        RequiredRole::Vendor if !flags.is_vendor => {
            if flags.is_pending_vendor {
                GuardDecision::redirect(Route::Landing)
            } else {
                GuardDecision::redirect(Route::VendorSignup)
            }
        }
        _ => GuardDecision::Render,
    }
}
