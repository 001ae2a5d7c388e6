//! Vendor rows over the hosted backend's REST interface.
//!
//! Products are embedded with `select=*,products(*)` so a listing is one
//! round trip. Requests carry the signed-in user's token when there is one.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use harvest_auth::AuthBackend;
use harvest_config::BackendConfig;
use harvest_core::VerificationStatus;
use harvest_core::entities::{Product, ProductPatch, Vendor, VendorPatch};
use reqwest::{RequestBuilder, Response};
use serde_json::{Value, json};

use crate::error::MarketError;
use crate::store::VendorStore;

const VENDOR_SELECT: &str = "*,products(*)";
const VENDORS: &str = "vendors";
const PRODUCTS: &str = "products";

pub struct RemoteVendorStore {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
    auth: Arc<dyn AuthBackend>,
}

impl RemoteVendorStore {
    /// # Errors
    ///
    /// Returns `MarketError::InvalidInput` if the backend URL or key is missing.
    pub fn new(config: &BackendConfig, auth: Arc<dyn AuthBackend>) -> Result<Self, MarketError> {
        if !config.is_configured() {
            return Err(MarketError::InvalidInput(
                "backend.url and backend.anon_key must be set for the remote vendor store".into(),
            ));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base_url: config.base_url().to_string(),
            anon_key: config.anon_key.clone(),
            auth,
        })
    }

    fn table_url(&self, table: &str, filters: &[(&str, String)]) -> String {
        let mut url = format!("{}/rest/v1/{table}", self.base_url);
        for (i, (key, value)) in filters.iter().enumerate() {
            url.push(if i == 0 { '?' } else { '&' });
            url.push_str(key);
            url.push('=');
            url.push_str(&urlencoding::encode(value));
        }
        url
    }

    async fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, MarketError> {
        let bearer = self
            .auth
            .get_session()
            .await?
            .map_or_else(|| self.anon_key.clone(), |s| s.access_token);
        Ok(request.header("apikey", &self.anon_key).bearer_auth(bearer))
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response, MarketError> {
        let resp = self
            .authorized(request)
            .await?
            .send()
            .await
            .map_err(|e| MarketError::Backend(format!("{what}: {e}")))?;
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        Err(MarketError::Backend(format!("{what}: HTTP {status}: {body}")))
    }

    async fn fetch(
        &self,
        filters: &[(&str, String)],
        what: &str,
    ) -> Result<Vec<Vendor>, MarketError> {
        let mut all = vec![("select", VENDOR_SELECT.to_string())];
        all.extend(filters.iter().cloned());
        let resp = self.send(self.client.get(self.table_url(VENDORS, &all)), what).await?;
        resp.json()
            .await
            .map_err(|e| MarketError::Backend(format!("{what}: unexpected response: {e}")))
    }
}

/// Row body for insert: products live in their own table.
fn insert_row(vendor: &Vendor) -> Result<Value, MarketError> {
    let mut row = serde_json::to_value(vendor)
        .map_err(|e| MarketError::Storage(format!("serialize vendor: {e}")))?;
    if let Some(map) = row.as_object_mut() {
        map.remove("products");
    }
    Ok(row)
}

/// Product rows carry their vendor as a foreign key.
fn product_row(vendor_id: &str, product: &Product) -> Result<Value, MarketError> {
    let mut row = serde_json::to_value(product)
        .map_err(|e| MarketError::Storage(format!("serialize product: {e}")))?;
    if let Some(map) = row.as_object_mut() {
        map.insert("vendor_id".into(), json!(vendor_id));
    }
    Ok(row)
}

fn product_filter(vendor_id: &str, product_id: &str) -> [(&'static str, String); 2] {
    [
        ("id", format!("eq.{product_id}")),
        ("vendor_id", format!("eq.{vendor_id}")),
    ]
}

#[async_trait]
impl VendorStore for RemoteVendorStore {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn list_vendors(
        &self,
        status: Option<VerificationStatus>,
    ) -> Result<Vec<Vendor>, MarketError> {
        let filters: Vec<(&str, String)> = status
            .map(|s| ("verification_status", format!("eq.{s}")))
            .into_iter()
            .collect();
        self.fetch(&filters, "list vendors").await
    }

    async fn get_vendor(&self, id: &str) -> Result<Vendor, MarketError> {
        self.fetch(&[("id", format!("eq.{id}"))], "get vendor")
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| MarketError::NotFound(id.to_string()))
    }

    async fn vendors_for_owner(&self, owner_id: &str) -> Result<Vec<Vendor>, MarketError> {
        self.fetch(&[("owner_id", format!("eq.{owner_id}"))], "owner vendors")
            .await
    }

    async fn insert_vendor(&self, vendor: &Vendor) -> Result<(), MarketError> {
        let request = self
            .client
            .post(self.table_url(VENDORS, &[]))
            .header("Prefer", "return=minimal")
            .json(&insert_row(vendor)?);
        self.send(request, "insert vendor").await.map(|_| ())
    }

    async fn set_verification(
        &self,
        id: &str,
        status: VerificationStatus,
        verified_at: Option<DateTime<Utc>>,
    ) -> Result<(), MarketError> {
        let request = self
            .client
            .patch(self.table_url(VENDORS, &[("id", format!("eq.{id}"))]))
            .header("Prefer", "return=minimal")
            .json(&json!({
                "verification_status": status,
                "verified_at": verified_at,
            }));
        self.send(request, "update verification").await.map(|_| ())
    }

    async fn update_vendor(&self, id: &str, patch: &VendorPatch) -> Result<(), MarketError> {
        let request = self
            .client
            .patch(self.table_url(VENDORS, &[("id", format!("eq.{id}"))]))
            .header("Prefer", "return=minimal")
            .json(patch);
        self.send(request, "update vendor").await.map(|_| ())
    }

    async fn insert_product(&self, vendor_id: &str, product: &Product) -> Result<(), MarketError> {
        let request = self
            .client
            .post(self.table_url(PRODUCTS, &[]))
            .header("Prefer", "return=minimal")
            .json(&product_row(vendor_id, product)?);
        self.send(request, "insert product").await.map(|_| ())
    }

    async fn update_product(
        &self,
        vendor_id: &str,
        product_id: &str,
        patch: &ProductPatch,
    ) -> Result<(), MarketError> {
        let request = self
            .client
            .patch(self.table_url(PRODUCTS, &product_filter(vendor_id, product_id)))
            .header("Prefer", "return=minimal")
            .json(patch);
        self.send(request, "update product").await.map(|_| ())
    }

    async fn delete_product(&self, vendor_id: &str, product_id: &str) -> Result<(), MarketError> {
        let request = self
            .client
            .delete(self.table_url(PRODUCTS, &product_filter(vendor_id, product_id)))
            .header("Prefer", "return=minimal");
        self.send(request, "delete product").await.map(|_| ())
    }
}
