use clap::{Args, Subcommand};

/// Vendor directory commands.
#[derive(Clone, Debug, Subcommand)]
pub enum VendorCommands {
    /// List verified vendors.
    List,
    /// Search verified vendors by name, address, product, or PIN code prefix.
    Search(VendorSearchArgs),
    /// Verified vendors within a radius of a point, nearest first.
    Near(VendorNearArgs),
    /// Apply to become a vendor.
    Apply(VendorApplyArgs),
    /// Your own vendor applications.
    Mine,
}

#[derive(Clone, Debug, Args)]
pub struct VendorSearchArgs {
    pub query: String,
}

#[derive(Clone, Debug, Args)]
pub struct VendorNearArgs {
    #[arg(long, allow_hyphen_values = true)]
    pub lat: f64,
    #[arg(long, allow_hyphen_values = true)]
    pub lng: f64,
    /// Radius in kilometres (defaults to `market.default_radius_km`).
    #[arg(long)]
    pub radius: Option<f64>,
}

#[derive(Clone, Debug, Args)]
pub struct VendorApplyArgs {
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub address: String,
    /// Postal PIN code (digits only).
    #[arg(long)]
    pub pin: String,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub phone: Option<String>,
    /// Contact email (defaults to your account email).
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long, allow_hyphen_values = true, requires = "lng")]
    pub lat: Option<f64>,
    #[arg(long, allow_hyphen_values = true, requires = "lat")]
    pub lng: Option<f64>,
}
