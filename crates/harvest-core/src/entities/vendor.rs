use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::VerificationStatus;
use crate::geo::GeoPoint;

/// A farmer's storefront. Only `verified` vendors are publicly listed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Vendor {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub pin_code: Option<String>,
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub contact_phone: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub verification_status: VerificationStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub id_proof_url: Option<String>,
    #[serde(default)]
    pub application_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub verified_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub opening_hours: OpeningHours,
}

/// Weekday name → open/close times (`"08:00"`).
pub type OpeningHours = BTreeMap<String, DayHours>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DayHours {
    pub open: String,
    pub close: String,
}

/// Produce listed by a vendor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Product {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: f64,
    pub unit: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub category: Option<String>,
}

/// Fields a user supplies when applying to become a vendor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NewVendor {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub pin_code: Option<String>,
    #[serde(default)]
    pub contact_phone: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub id_proof_url: Option<String>,
}

/// Storefront fields an owner may change. Only `Some` fields are written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VendorPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pin_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opening_hours: Option<OpeningHours>,
}

impl VendorPatch {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.location.is_none()
            && self.address.is_none()
            && self.pin_code.is_none()
            && self.contact_phone.is_none()
            && self.contact_email.is_none()
            && self.opening_hours.is_none()
    }
}

/// A product as entered by its vendor, before it has an id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: f64,
    pub unit: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProductPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl ProductPatch {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.price.is_none()
            && self.unit.is_none()
            && self.image_url.is_none()
            && self.stock.is_none()
            && self.category.is_none()
    }
}

impl Product {
    #[must_use]
    pub fn from_new(id: String, input: NewProduct) -> Self {
        Self {
            id,
            name: input.name,
            description: input.description,
            price: input.price,
            unit: input.unit,
            image_url: input.image_url,
            stock: input.stock,
            category: input.category,
        }
    }

    pub fn apply(&mut self, patch: &ProductPatch) {
        if let Some(name) = &patch.name {
            self.name.clone_from(name);
        }
        if let Some(description) = &patch.description {
            self.description = Some(description.clone());
        }
        if let Some(price) = patch.price {
            self.price = price;
        }
        if let Some(unit) = &patch.unit {
            self.unit.clone_from(unit);
        }
        if let Some(image_url) = &patch.image_url {
            self.image_url = Some(image_url.clone());
        }
        if let Some(stock) = patch.stock {
            self.stock = stock;
        }
        if let Some(category) = &patch.category {
            self.category = Some(category.clone());
        }
    }
}

impl Vendor {
    /// Apply an owner's edit. Status, ownership and products are untouched.
    pub fn apply(&mut self, patch: &VendorPatch) {
        if let Some(name) = &patch.name {
            self.name.clone_from(name);
        }
        if let Some(description) = &patch.description {
            self.description = Some(description.clone());
        }
        if let Some(location) = patch.location {
            self.location = Some(location);
        }
        if let Some(address) = &patch.address {
            self.address = Some(address.clone());
        }
        if let Some(pin_code) = &patch.pin_code {
            self.pin_code = Some(pin_code.clone());
        }
        if let Some(contact_phone) = &patch.contact_phone {
            self.contact_phone = Some(contact_phone.clone());
        }
        if let Some(contact_email) = &patch.contact_email {
            self.contact_email = Some(contact_email.clone());
        }
        if let Some(opening_hours) = &patch.opening_hours {
            self.opening_hours.clone_from(opening_hours);
        }
    }

    /// Build a pending application record from user input.
    #[must_use]
    pub fn from_application(
        id: String,
        owner_id: &str,
        input: NewVendor,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            owner_id: owner_id.to_string(),
            name: input.name,
            description: input.description,
            location: input.location,
            address: input.address,
            pin_code: input.pin_code,
            products: Vec::new(),
            contact_phone: input.contact_phone,
            contact_email: input.contact_email,
            verification_status: VerificationStatus::Pending,
            created_at: now,
            id_proof_url: input.id_proof_url,
            application_date: Some(now),
            verified_at: None,
            opening_hours: OpeningHours::new(),
        }
    }
}
