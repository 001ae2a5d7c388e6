//! # harvest-core
//!
//! Core types shared across all Harvest crates.
//!
//! - Role and verification-status enums (with state machine transitions)
//! - Identity, Profile, Session, and the merged `EffectiveUser`
//! - Marketplace entities (vendors, products)
//! - Great-circle distance helpers for the vendor map
//! - Cross-cutting error types

pub mod entities;
pub mod enums;
pub mod errors;
pub mod geo;
pub mod identity;

pub use enums::{Role, RolePolicy, VerificationStatus};
pub use identity::{EffectiveUser, Identity, Preferences, Profile, ProfilePatch, Session};
