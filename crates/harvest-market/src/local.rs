//! JSON-file vendor store paired with the local auth backend.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use harvest_core::VerificationStatus;
use harvest_core::entities::{Product, ProductPatch, Vendor, VendorPatch};
use serde::{Deserialize, Serialize};

use crate::error::MarketError;
use crate::store::VendorStore;

const DB_FILE_NAME: &str = "local-market.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct MarketDb {
    #[serde(default)]
    vendors: Vec<Vendor>,
}

pub struct LocalVendorStore {
    path: PathBuf,
    db: Mutex<MarketDb>,
}

impl LocalVendorStore {
    /// Open (or create on first write) the vendor file in `dir`.
    ///
    /// # Errors
    ///
    /// Returns `MarketError::Storage` if an existing file cannot be read or parsed.
    pub fn open(dir: &Path) -> Result<Self, MarketError> {
        let path = dir.join(DB_FILE_NAME);
        let db = match std::fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => MarketDb::default(),
            Ok(raw) => serde_json::from_str(&raw)
                .map_err(|e| MarketError::Storage(format!("parse {}: {e}", path.display())))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => MarketDb::default(),
            Err(e) => {
                return Err(MarketError::Storage(format!("read {}: {e}", path.display())));
            }
        };
        Ok(Self {
            path,
            db: Mutex::new(db),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, MarketDb>, MarketError> {
        self.db
            .lock()
            .map_err(|_| MarketError::Storage("vendor store lock poisoned".into()))
    }

    /// Run `edit` against one vendor record and persist the result.
    fn edit_vendor<F>(&self, id: &str, edit: F) -> Result<(), MarketError>
    where
        F: FnOnce(&mut Vendor) -> Result<(), MarketError>,
    {
        let mut db = self.lock()?;
        let vendor = db
            .vendors
            .iter_mut()
            .find(|v| v.id == id)
            .ok_or_else(|| MarketError::NotFound(id.to_string()))?;
        edit(vendor)?;
        self.save(&db)
    }

    fn save(&self, db: &MarketDb) -> Result<(), MarketError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| MarketError::Storage(format!("mkdir {}: {e}", parent.display())))?;
        }
        let json = serde_json::to_vec_pretty(db)
            .map_err(|e| MarketError::Storage(format!("serialize vendors: {e}")))?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, json)
            .map_err(|e| MarketError::Storage(format!("write {}: {e}", tmp.display())))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| MarketError::Storage(format!("rename {}: {e}", self.path.display())))
    }
}

#[async_trait]
impl VendorStore for LocalVendorStore {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn list_vendors(
        &self,
        status: Option<VerificationStatus>,
    ) -> Result<Vec<Vendor>, MarketError> {
        Ok(self
            .lock()?
            .vendors
            .iter()
            .filter(|v| status.is_none_or(|s| v.verification_status == s))
            .cloned()
            .collect())
    }

    async fn get_vendor(&self, id: &str) -> Result<Vendor, MarketError> {
        self.lock()?
            .vendors
            .iter()
            .find(|v| v.id == id)
            .cloned()
            .ok_or_else(|| MarketError::NotFound(id.to_string()))
    }

    async fn vendors_for_owner(&self, owner_id: &str) -> Result<Vec<Vendor>, MarketError> {
        Ok(self
            .lock()?
            .vendors
            .iter()
            .filter(|v| v.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn insert_vendor(&self, vendor: &Vendor) -> Result<(), MarketError> {
        let mut db = self.lock()?;
        if db.vendors.iter().any(|v| v.id == vendor.id) {
            return Err(MarketError::InvalidInput(format!(
                "vendor {} already exists",
                vendor.id
            )));
        }
        db.vendors.push(vendor.clone());
        self.save(&db)
    }

    async fn set_verification(
        &self,
        id: &str,
        status: VerificationStatus,
        verified_at: Option<DateTime<Utc>>,
    ) -> Result<(), MarketError> {
        self.edit_vendor(id, |vendor| {
            vendor.verification_status = status;
            vendor.verified_at = verified_at;
            Ok(())
        })
    }

    async fn update_vendor(&self, id: &str, patch: &VendorPatch) -> Result<(), MarketError> {
        self.edit_vendor(id, |vendor| {
            vendor.apply(patch);
            Ok(())
        })
    }

    async fn insert_product(&self, vendor_id: &str, product: &Product) -> Result<(), MarketError> {
        self.edit_vendor(vendor_id, |vendor| {
            if vendor.products.iter().any(|p| p.id == product.id) {
                return Err(MarketError::InvalidInput(format!(
                    "product {} already exists",
                    product.id
                )));
            }
            vendor.products.push(product.clone());
            Ok(())
        })
    }

    async fn update_product(
        &self,
        vendor_id: &str,
        product_id: &str,
        patch: &ProductPatch,
    ) -> Result<(), MarketError> {
        self.edit_vendor(vendor_id, |vendor| {
            let product = vendor
                .products
                .iter_mut()
                .find(|p| p.id == product_id)
                .ok_or_else(|| MarketError::ProductNotFound(product_id.to_string()))?;
            product.apply(patch);
            Ok(())
        })
    }

    async fn delete_product(&self, vendor_id: &str, product_id: &str) -> Result<(), MarketError> {
        self.edit_vendor(vendor_id, |vendor| {
            let before = vendor.products.len();
            vendor.products.retain(|p| p.id != product_id);
            if vendor.products.len() == before {
                return Err(MarketError::ProductNotFound(product_id.to_string()));
            }
            Ok(())
        })
    }
}
