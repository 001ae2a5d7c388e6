//! Role flags derived from the effective user.
//!
//! Flags are recomputed from the current [`EffectiveUser`] on every read and
//! never stored alongside it.

use harvest_core::{EffectiveUser, Role, RolePolicy};
use schemars::JsonSchema;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, JsonSchema)]
pub struct RoleFlags {
    pub is_admin: bool,
    pub is_vendor: bool,
    pub is_pending_vendor: bool,
}

impl RoleFlags {
    /// Derive flags from `user` under `policy`. No user means no flags.
    #[must_use]
    pub fn resolve(user: Option<&EffectiveUser>, policy: RolePolicy) -> Self {
        let Some(user) = user else {
            return Self::default();
        };
        let metadata = user.metadata_role();
        let profile = user.profile_role();
        let has = |role: Role| match policy {
            RolePolicy::AnySource => metadata == Some(role) || profile == Some(role),
            RolePolicy::ProfileFirst => profile.or(metadata) == Some(role),
        };
        Self {
            is_admin: has(Role::Admin),
            is_vendor: has(Role::Vendor),
            is_pending_vendor: has(Role::PendingVendor),
        }
    }

    #[must_use]
    pub const fn any(self) -> bool {
        self.is_admin || self.is_vendor || self.is_pending_vendor
    }
}
