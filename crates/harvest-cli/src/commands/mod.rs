pub mod admin;
pub mod auth;
pub mod dispatch;
pub mod guard;
pub mod profile;
pub mod schema;
pub mod shop;
pub mod vendors;
