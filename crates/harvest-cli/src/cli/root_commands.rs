use clap::{Args, Subcommand};
use harvest_auth::RequiredRole;

use crate::cli::subcommands::{
    AdminCommands, AuthCommands, ProfileCommands, ShopCommands, VendorCommands,
};

/// Top-level command tree.
#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    /// Sign up, sign in, and inspect the current session.
    Auth {
        #[command(subcommand)]
        action: AuthCommands,
    },
    /// Decide whether the current user may open a route.
    Guard(GuardArgs),
    /// Browse the vendor directory and apply to sell.
    Vendors {
        #[command(subcommand)]
        action: VendorCommands,
    },
    /// Show or edit your profile.
    Profile {
        #[command(subcommand)]
        action: ProfileCommands,
    },
    /// Manage your storefront and products (verified vendors).
    Shop {
        #[command(subcommand)]
        action: ShopCommands,
    },
    /// Review vendor applications.
    Admin {
        #[command(subcommand)]
        action: AdminCommands,
    },
    /// Print the JSON schema of an output type.
    Schema(SchemaArgs),
}

#[derive(Clone, Debug, Args)]
pub struct GuardArgs {
    /// Route path, e.g. /vendor/dashboard.
    pub path: String,
    /// Role the route requires: none, user, vendor, admin.
    #[arg(long, default_value = "none")]
    pub require: RequiredRole,
}

#[derive(Clone, Debug, Args)]
pub struct SchemaArgs {
    /// Type name (see `harvest schema list`).
    pub type_name: String,
}
