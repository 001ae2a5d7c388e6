//! Marketplace entity structs.

mod vendor;

pub use vendor::{
    DayHours, NewProduct, NewVendor, OpeningHours, Product, ProductPatch, Vendor, VendorPatch,
};
