pub mod admin;
pub mod auth;
pub mod profile;
pub mod shop;
pub mod vendors;

pub use admin::AdminCommands;
pub use auth::AuthCommands;
pub use profile::ProfileCommands;
pub use shop::ShopCommands;
pub use vendors::VendorCommands;
