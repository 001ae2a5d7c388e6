//! Role and verification-status enums for Harvest.
//!
//! All enums use `snake_case` serialization via `#[serde(rename_all = "snake_case")]`,
//! matching the strings stored by the backend row store and in identity metadata.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::CoreError;

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// Canonical application role of an account.
///
/// `PendingVendor` is a user whose vendor application is awaiting review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    User,
    Vendor,
    Admin,
    PendingVendor,
}

impl Role {
    /// Every role, in privilege-agnostic declaration order.
    pub const ALL: [Self; 4] = [Self::User, Self::Vendor, Self::Admin, Self::PendingVendor];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Vendor => "vendor",
            Self::Admin => "admin",
            Self::PendingVendor => "pending_vendor",
        }
    }

    /// Lenient parse used for free-form metadata: unknown strings yield `None`.
    #[must_use]
    pub fn parse_lenient(value: &str) -> Option<Self> {
        value.parse().ok()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "vendor" => Ok(Self::Vendor),
            "admin" => Ok(Self::Admin),
            "pending_vendor" => Ok(Self::PendingVendor),
            other => Err(CoreError::Validation(format!("unknown role '{other}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// RolePolicy
// ---------------------------------------------------------------------------

/// How the two role sources (identity metadata, profile row) combine.
///
/// - `AnySource`: a flag is set when either source names the role.
/// - `ProfileFirst`: the profile role alone decides when a profile exists;
///   metadata is consulted only when no profile row is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RolePolicy {
    #[default]
    AnySource,
    ProfileFirst,
}

impl RolePolicy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AnySource => "any_source",
            Self::ProfileFirst => "profile_first",
        }
    }
}

impl fmt::Display for RolePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// VerificationStatus
// ---------------------------------------------------------------------------

/// Review status of a vendor application.
///
/// ```text
/// pending → verified
///         → rejected
/// verified ⇄ rejected (admin may revoke or reinstate)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    #[default]
    Pending,
    Verified,
    Rejected,
}

impl VerificationStatus {
    /// Valid next states from the current state.
    #[must_use]
    pub const fn allowed_next_states(self) -> &'static [Self] {
        match self {
            Self::Pending => &[Self::Verified, Self::Rejected],
            Self::Verified => &[Self::Rejected],
            Self::Rejected => &[Self::Verified],
        }
    }

    /// Check whether transitioning to `next` is allowed.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.allowed_next_states().contains(&next)
    }

    /// Role the vendor's owner holds while the application is in this state.
    #[must_use]
    pub const fn owner_role(self) -> Role {
        match self {
            Self::Pending => Role::PendingVendor,
            Self::Verified => Role::Vendor,
            Self::Rejected => Role::User,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Verified => "verified",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VerificationStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "verified" => Ok(Self::Verified),
            "rejected" => Ok(Self::Rejected),
            other => Err(CoreError::Validation(format!(
                "unknown verification status '{other}'"
            ))),
        }
    }
}
