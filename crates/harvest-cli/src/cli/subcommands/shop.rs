use clap::{Args, Subcommand};

/// Storefront commands for verified vendors.
#[derive(Clone, Debug, Subcommand)]
pub enum ShopCommands {
    /// Show your storefront and its products.
    Show,
    /// Edit storefront details. Only the given fields change.
    Update(ShopUpdateArgs),
    /// List a new product.
    AddProduct(ProductAddArgs),
    /// Change a product. Only the given fields change.
    UpdateProduct(ProductUpdateArgs),
    /// Take a product off your storefront.
    RemoveProduct(ProductIdArgs),
}

#[derive(Clone, Debug, Args)]
pub struct ShopUpdateArgs {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub address: Option<String>,
    #[arg(long)]
    pub pin: Option<String>,
    #[arg(long)]
    pub phone: Option<String>,
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long, allow_hyphen_values = true, requires = "lng")]
    pub lat: Option<f64>,
    #[arg(long, allow_hyphen_values = true, requires = "lat")]
    pub lng: Option<f64>,
}

#[derive(Clone, Debug, Args)]
pub struct ProductAddArgs {
    pub name: String,
    /// Price per unit.
    #[arg(long)]
    pub price: f64,
    /// Selling unit, e.g. kg or dozen.
    #[arg(long)]
    pub unit: String,
    #[arg(long, default_value_t = 0)]
    pub stock: u32,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub category: Option<String>,
    #[arg(long)]
    pub image_url: Option<String>,
}

#[derive(Clone, Debug, Args)]
pub struct ProductUpdateArgs {
    pub product_id: String,
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub price: Option<f64>,
    #[arg(long)]
    pub unit: Option<String>,
    #[arg(long)]
    pub stock: Option<u32>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub category: Option<String>,
    #[arg(long)]
    pub image_url: Option<String>,
}

#[derive(Clone, Debug, Args)]
pub struct ProductIdArgs {
    pub product_id: String,
}
