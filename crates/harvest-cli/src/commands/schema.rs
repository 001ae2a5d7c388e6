use anyhow::bail;
use harvest_auth::{AuthEvent, GuardDecision, RoleFlags, SessionView};
use harvest_core::entities::{NewProduct, NewVendor, Product, Vendor, VendorPatch};
use harvest_core::{EffectiveUser, Profile};
use schemars::{Schema, schema_for};

use crate::cli::GlobalFlags;
use crate::cli::root_commands::SchemaArgs;
use crate::output::output;

/// Names accepted by `harvest schema`.
pub const SCHEMA_TYPES: &[&str] = &[
    "auth-event",
    "effective-user",
    "guard-decision",
    "new-product",
    "new-vendor",
    "product",
    "profile",
    "role-flags",
    "session-view",
    "vendor",
    "vendor-patch",
];

fn schema(type_name: &str) -> Option<Schema> {
    let schema = match type_name {
        "auth-event" => schema_for!(AuthEvent),
        "effective-user" => schema_for!(EffectiveUser),
        "guard-decision" => schema_for!(GuardDecision),
        "new-product" => schema_for!(NewProduct),
        "new-vendor" => schema_for!(NewVendor),
        "product" => schema_for!(Product),
        "profile" => schema_for!(Profile),
        "role-flags" => schema_for!(RoleFlags),
        "session-view" => schema_for!(SessionView),
        "vendor" => schema_for!(Vendor),
        "vendor-patch" => schema_for!(VendorPatch),
        _ => return None,
    };
    Some(schema)
}

/// Handle `harvest schema <type>`.
pub fn handle(args: &SchemaArgs, flags: &GlobalFlags) -> anyhow::Result<()> {
    if args.type_name == "list" {
        return output(&SCHEMA_TYPES, flags.format);
    }
    let Some(schema) = schema(&args.type_name) else {
        bail!(
            "unknown schema type '{}' (expected one of: {})",
            args.type_name,
            SCHEMA_TYPES.join(", ")
        );
    };
    output(&schema, flags.format)
}
