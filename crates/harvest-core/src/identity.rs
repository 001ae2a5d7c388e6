//! Identity, Profile, Session, and the merged `EffectiveUser`.
//!
//! The backend issues the `Identity` (account record) and the `Session`
//! (credential plus expiry). The application keeps a `Profile` row per
//! identity. `EffectiveUser` is the client-held union of the two and is never
//! persisted.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::enums::Role;

/// Backend-issued account record.
///
/// `metadata` is free-form; it may carry a `role` string written at sign-up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Identity {
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, alias = "user_metadata")]
    pub metadata: Map<String, Value>,
}

impl Identity {
    /// Role recorded in identity metadata. Unknown strings are treated as absent.
    #[must_use]
    pub fn metadata_role(&self) -> Option<Role> {
        self.metadata_str("role").and_then(Role::parse_lenient)
    }

    /// String value of a metadata key, if present and a string.
    #[must_use]
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }
}

/// Per-role user preferences stored on the profile row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Preferences {
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "showInMap")]
    pub show_in_map: Option<bool>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        rename = "allowContactByEmail"
    )]
    pub allow_contact_by_email: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notifications: Option<bool>,
}

impl Preferences {
    /// Defaults written when a profile is first created.
    #[must_use]
    pub fn defaults_for(role: Role) -> Self {
        match role {
            Role::Vendor | Role::PendingVendor => Self {
                show_in_map: Some(true),
                allow_contact_by_email: Some(true),
                ..Self::default()
            },
            Role::User | Role::Admin => Self {
                language: Some("english".into()),
                notifications: Some(true),
                ..Self::default()
            },
        }
    }
}

/// Application-level record keyed by `Identity::id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Profile {
    pub id: String,
    #[serde(default)]
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub favorites: Vec<String>,
    #[serde(default)]
    pub preferences: Preferences,
}

impl Profile {
    /// Build the profile row created alongside a new account.
    #[must_use]
    pub fn for_new_account(id: &str, email: &str, role: Role, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.to_string(),
            email: email.to_string(),
            role,
            full_name: Some(display_name_from_email(email)),
            avatar_url: None,
            phone_number: None,
            created_at: Some(created_at),
            favorites: Vec::new(),
            preferences: Preferences::defaults_for(role),
        }
    }

    /// Apply the set fields of `patch` in place.
    pub fn apply(&mut self, patch: &ProfilePatch) {
        if let Some(role) = patch.role {
            self.role = role;
        }
        if let Some(full_name) = &patch.full_name {
            self.full_name = Some(full_name.clone());
        }
        if let Some(avatar_url) = &patch.avatar_url {
            self.avatar_url = Some(avatar_url.clone());
        }
        if let Some(phone_number) = &patch.phone_number {
            self.phone_number = Some(phone_number.clone());
        }
        if let Some(preferences) = &patch.preferences {
            self.preferences = preferences.clone();
        }
    }
}

/// Partial profile update. Only `Some` fields are sent to the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferences: Option<Preferences>,
}

impl ProfilePatch {
    /// Patch that only changes the role.
    #[must_use]
    pub fn role(role: Role) -> Self {
        Self {
            role: Some(role),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.role.is_none()
            && self.full_name.is_none()
            && self.avatar_url.is_none()
            && self.phone_number.is_none()
            && self.preferences.is_none()
    }
}

/// Authentication credential plus expiry, issued by the backend.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub identity: Identity,
}

impl Session {
    /// Check if the session is expired or expires within `buffer_secs`.
    #[must_use]
    pub fn is_near_expiry(&self, buffer_secs: i64) -> bool {
        let threshold = Utc::now() + TimeDelta::seconds(buffer_secs);
        self.expires_at <= threshold
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_near_expiry(0)
    }
}

// Tokens never reach logs.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("identity", &self.identity.id)
            .finish()
    }
}

/// Merged, client-held view of Identity + Profile.
///
/// A missing profile is not an error: the profile fields are simply absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EffectiveUser {
    pub identity: Identity,
    pub profile: Option<Profile>,
}

impl EffectiveUser {
    /// Merge an identity with its profile.
    ///
    /// A profile whose id does not match the identity is discarded.
    #[must_use]
    pub fn merge(identity: Identity, profile: Option<Profile>) -> Self {
        let profile = profile.filter(|p| p.id == identity.id);
        Self { identity, profile }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.identity.id
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.identity.email
    }

    #[must_use]
    pub fn metadata_role(&self) -> Option<Role> {
        self.identity.metadata_role()
    }

    #[must_use]
    pub fn profile_role(&self) -> Option<Role> {
        self.profile.as_ref().map(|p| p.role)
    }

    /// Profile name first, then the `full_name` written into metadata at sign-up.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.profile
            .as_ref()
            .and_then(|p| p.full_name.as_deref())
            .or_else(|| self.identity.metadata_str("full_name"))
    }
}

/// Default display name: the email local part with its first letter upper-cased.
#[must_use]
pub fn display_name_from_email(email: &str) -> String {
    let local = email.split('@').next().unwrap_or_default();
    let mut chars = local.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn identity_with_role(role: Option<&str>) -> Identity {
        let mut metadata = Map::new();
        if let Some(role) = role {
            metadata.insert("role".into(), json!(role));
        }
        Identity {
            id: "u-1".into(),
            email: "grower@example.com".into(),
            metadata,
        }
    }

    fn profile(id: &str, role: Role) -> Profile {
        Profile::for_new_account(id, "grower@example.com", role, Utc::now())
    }

    #[test]
    fn metadata_role_reads_known_roles() {
        assert_eq!(
            identity_with_role(Some("vendor")).metadata_role(),
            Some(Role::Vendor)
        );
        assert_eq!(identity_with_role(Some("farmer")).metadata_role(), None);
        assert_eq!(identity_with_role(None).metadata_role(), None);
    }

    #[test]
    fn identity_accepts_user_metadata_alias() {
        let identity: Identity = serde_json::from_value(json!({
            "id": "abc",
            "email": "a@b.com",
            "user_metadata": {"role": "admin"}
        }))
        .unwrap();
        assert_eq!(identity.metadata_role(), Some(Role::Admin));
    }

    #[test]
    fn merge_keeps_matching_profile() {
        let admin = profile("u-1", Role::Admin);
        let user = EffectiveUser::merge(identity_with_role(None), Some(admin));
        assert_eq!(user.profile_role(), Some(Role::Admin));
    }

    #[test]
    fn merge_discards_foreign_profile() {
        let foreign = profile("u-2", Role::Admin);
        let user = EffectiveUser::merge(identity_with_role(None), Some(foreign));
        assert!(user.profile.is_none());
        assert_eq!(user.profile_role(), None);
    }

    #[test]
    fn display_name_prefers_profile() {
        let mut identity = identity_with_role(None);
        identity.metadata.insert("full_name".into(), json!("meta"));
        let mut p = profile("u-1", Role::User);
        p.full_name = Some("Profile Name".into());

        assert_eq!(
            EffectiveUser::merge(identity.clone(), Some(p)).display_name(),
            Some("Profile Name")
        );
        assert_eq!(EffectiveUser::merge(identity, None).display_name(), Some("meta"));
    }

    #[test]
    fn display_name_from_email_capitalizes_local_part() {
        assert_eq!(display_name_from_email("rosa@farm.io"), "Rosa");
        assert_eq!(display_name_from_email(""), "");
    }

    #[test]
    fn preferences_default_by_role() {
        let vendor = Preferences::defaults_for(Role::Vendor);
        assert_eq!(vendor.show_in_map, Some(true));
        assert!(vendor.language.is_none());

        let user = Preferences::defaults_for(Role::User);
        assert_eq!(user.language.as_deref(), Some("english"));
        assert_eq!(user.notifications, Some(true));
    }

    #[test]
    fn profile_apply_only_touches_set_fields() {
        let mut p = profile("u-1", Role::PendingVendor);
        let before_name = p.full_name.clone();
        p.apply(&ProfilePatch::role(Role::Vendor));
        assert_eq!(p.role, Role::Vendor);
        assert_eq!(p.full_name, before_name);
    }

    #[test]
    fn profile_patch_serializes_only_set_fields() {
        let json = serde_json::to_value(ProfilePatch::role(Role::Vendor)).unwrap();
        assert_eq!(json, json!({"role": "vendor"}));
        assert!(ProfilePatch::default().is_empty());
    }

    #[test]
    fn session_debug_redacts_tokens() {
        let session = Session {
            access_token: "secret-access".into(),
            refresh_token: "secret-refresh".into(),
            expires_at: Utc::now(),
            identity: identity_with_role(None),
        };
        let rendered = format!("{session:?}");
        assert!(!rendered.contains("secret-access"));
        assert!(!rendered.contains("secret-refresh"));
    }

    #[test]
    fn session_near_expiry_uses_buffer() {
        let session = Session {
            access_token: String::new(),
            refresh_token: String::new(),
            expires_at: Utc::now() + TimeDelta::seconds(30),
            identity: identity_with_role(None),
        };
        assert!(session.is_near_expiry(60));
        assert!(!session.is_expired());
    }
}
