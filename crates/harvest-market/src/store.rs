//! Row-store contract for vendor records.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use harvest_core::VerificationStatus;
use harvest_core::entities::{Product, ProductPatch, Vendor, VendorPatch};

use crate::error::MarketError;

#[async_trait]
pub trait VendorStore: Send + Sync {
    fn name(&self) -> &'static str;

    /// Vendors with their products, optionally restricted to one status.
    async fn list_vendors(
        &self,
        status: Option<VerificationStatus>,
    ) -> Result<Vec<Vendor>, MarketError>;

    /// Returns `MarketError::NotFound` when no row exists.
    async fn get_vendor(&self, id: &str) -> Result<Vendor, MarketError>;

    async fn vendors_for_owner(&self, owner_id: &str) -> Result<Vec<Vendor>, MarketError>;

    async fn insert_vendor(&self, vendor: &Vendor) -> Result<(), MarketError>;

    async fn set_verification(
        &self,
        id: &str,
        status: VerificationStatus,
        verified_at: Option<DateTime<Utc>>,
    ) -> Result<(), MarketError>;

    /// Returns `MarketError::NotFound` when no row exists.
    async fn update_vendor(&self, id: &str, patch: &VendorPatch) -> Result<(), MarketError>;

    async fn insert_product(&self, vendor_id: &str, product: &Product) -> Result<(), MarketError>;

    async fn update_product(
        &self,
        vendor_id: &str,
        product_id: &str,
        patch: &ProductPatch,
    ) -> Result<(), MarketError>;

    async fn delete_product(&self, vendor_id: &str, product_id: &str) -> Result<(), MarketError>;
}
