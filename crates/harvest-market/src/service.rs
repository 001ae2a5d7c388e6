//! Marketplace operations that combine the vendor store with the session.
//!
//! Authorization is decided from the session store's role flags only. Every
//! action that changes someone's role ends with a session refresh so the
//! acting caller sees the new flags immediately. That refresh is best effort:
//! once the write is stored the operation has succeeded.
//!
//! Verified vendors manage their own storefront and product list here too.

use std::sync::Arc;

use chrono::Utc;
use harvest_auth::{AuthError, SessionStore};
use harvest_config::MarketConfig;
use harvest_core::entities::{NewProduct, NewVendor, Product, ProductPatch, Vendor, VendorPatch};
use harvest_core::geo::GeoPoint;
use harvest_core::{EffectiveUser, ProfilePatch, Role, VerificationStatus};

use crate::error::MarketError;
use crate::search::{NearbyVendor, SearchFilter, within_radius};
use crate::store::VendorStore;

/// Admin verdict on a vendor application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewDecision {
    Approve,
    Reject,
}

impl ReviewDecision {
    #[must_use]
    pub const fn target_status(self) -> VerificationStatus {
        match self {
            Self::Approve => VerificationStatus::Verified,
            Self::Reject => VerificationStatus::Rejected,
        }
    }
}

pub struct Marketplace {
    vendors: Arc<dyn VendorStore>,
    session: Arc<SessionStore>,
    config: MarketConfig,
}

impl Marketplace {
    #[must_use]
    pub fn new(
        vendors: Arc<dyn VendorStore>,
        session: Arc<SessionStore>,
        config: MarketConfig,
    ) -> Self {
        Self {
            vendors,
            session,
            config,
        }
    }

    #[must_use]
    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    fn limit(&self, limit: Option<u32>) -> usize {
        limit.unwrap_or(self.config.default_limit) as usize
    }

    /// Re-read the caller's session after a stored write. A failure only
    /// leaves the caller's flags stale until the next refresh.
    async fn refresh_after(&self, action: &str) {
        if let Err(error) = self.session.refresh().await {
            tracing::warn!(%error, action, "session refresh failed; change is stored");
        }
    }

    // -- Directory ---------------------------------------------------------

    /// Publicly listed (verified) vendors.
    ///
    /// # Errors
    ///
    /// Returns the vendor store failure.
    pub async fn directory(&self, limit: Option<u32>) -> Result<Vec<Vendor>, MarketError> {
        self.search("", limit).await
    }

    /// Verified vendors matching `query`. See [`SearchFilter::parse`].
    ///
    /// # Errors
    ///
    /// Returns the vendor store failure.
    pub async fn search(
        &self,
        query: &str,
        limit: Option<u32>,
    ) -> Result<Vec<Vendor>, MarketError> {
        let filter = SearchFilter::parse(query);
        let vendors = self
            .vendors
            .list_vendors(Some(VerificationStatus::Verified))
            .await?;
        let matched: Vec<Vendor> = vendors
            .into_iter()
            .filter(|v| filter.matches(v))
            .take(self.limit(limit))
            .collect();
        tracing::debug!(?filter, results = matched.len(), "vendor search");
        Ok(matched)
    }

    /// Verified vendors within `radius_km` (default from config), nearest first.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for a non-positive radius, or the store failure.
    pub async fn near(
        &self,
        origin: GeoPoint,
        radius_km: Option<f64>,
    ) -> Result<Vec<NearbyVendor>, MarketError> {
        let radius_km = radius_km.unwrap_or(self.config.default_radius_km);
        if !radius_km.is_finite() || radius_km <= 0.0 {
            return Err(MarketError::InvalidInput(format!(
                "radius must be a positive number of kilometres, got {radius_km}"
            )));
        }
        let vendors = self
            .vendors
            .list_vendors(Some(VerificationStatus::Verified))
            .await?;
        Ok(within_radius(vendors, origin, radius_km))
    }

    // -- Vendor applications -------------------------------------------------

    /// Submit a vendor application for the signed-in user.
    ///
    /// Creates a pending vendor record, marks the profile `pending_vendor`,
    /// and refreshes the session.
    ///
    /// # Errors
    ///
    /// Returns `Auth(NotAuthenticated)` when signed out, `InvalidInput` for a
    /// missing field, an existing storefront or a duplicate application, or
    /// the backend failure.
    pub async fn apply(&self, mut input: NewVendor) -> Result<Vendor, MarketError> {
        let user = self
            .session
            .effective_user()
            .ok_or(AuthError::NotAuthenticated)?;
        validate_application(&input)?;

        let existing = self.vendors.vendors_for_owner(user.id()).await?;
        let has = |status: VerificationStatus| {
            existing.iter().any(|v| v.verification_status == status)
        };
        if has(VerificationStatus::Verified) {
            return Err(MarketError::InvalidInput(
                "You are already a verified vendor.".into(),
            ));
        }
        if has(VerificationStatus::Pending) {
            return Err(MarketError::InvalidInput(
                "You already have an application under review.".into(),
            ));
        }

        if input.contact_email.is_none() && !user.email().is_empty() {
            input.contact_email = Some(user.email().to_string());
        }
        let vendor = Vendor::from_application(
            uuid::Uuid::new_v4().to_string(),
            user.id(),
            input,
            Utc::now(),
        );
        self.vendors.insert_vendor(&vendor).await?;
        self.session
            .backend()
            .update_profile(user.id(), &ProfilePatch::role(Role::PendingVendor))
            .await?;
        tracing::info!(vendor = %vendor.id, owner = %user.id(), "vendor application submitted");

        self.refresh_after("vendor application").await;
        Ok(vendor)
    }

    /// The signed-in user's own vendor records.
    ///
    /// # Errors
    ///
    /// Returns `Auth(NotAuthenticated)` when signed out, or the store failure.
    pub async fn my_applications(&self) -> Result<Vec<Vendor>, MarketError> {
        let user = self
            .session
            .effective_user()
            .ok_or(AuthError::NotAuthenticated)?;
        self.vendors.vendors_for_owner(user.id()).await
    }

    // -- Admin ---------------------------------------------------------------

    fn require_admin(&self) -> Result<(), MarketError> {
        if self.session.effective_user().is_none() {
            return Err(AuthError::NotAuthenticated.into());
        }
        if !self.session.role_flags().is_admin {
            return Err(MarketError::Forbidden(
                "Only administrators can review vendor applications.".into(),
            ));
        }
        Ok(())
    }

    /// Applications awaiting review. Admin only.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` for non-admins, or the store failure.
    pub async fn pending_applications(&self) -> Result<Vec<Vendor>, MarketError> {
        self.require_admin()?;
        self.vendors
            .list_vendors(Some(VerificationStatus::Pending))
            .await
    }

    /// Approve or reject a vendor. Admin only.
    ///
    /// The owner's profile role follows the new status (`vendor` when
    /// verified, `user` when rejected) and the admin's session is refreshed.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden`, `NotFound`, `InvalidTransition`, or the backend failure.
    pub async fn review(
        &self,
        vendor_id: &str,
        decision: ReviewDecision,
    ) -> Result<Vendor, MarketError> {
        self.require_admin()?;
        let vendor = self.vendors.get_vendor(vendor_id).await?;
        let to = decision.target_status();
        if !vendor.verification_status.can_transition_to(to) {
            return Err(MarketError::InvalidTransition {
                id: vendor.id,
                from: vendor.verification_status.to_string(),
                to: to.to_string(),
            });
        }

        let verified_at = (to == VerificationStatus::Verified).then(Utc::now);
        self.vendors
            .set_verification(&vendor.id, to, verified_at)
            .await?;

        let owner_role = to.owner_role();
        match self
            .session
            .backend()
            .update_profile(&vendor.owner_id, &ProfilePatch::role(owner_role))
            .await
        {
            Ok(()) => {}
            Err(AuthError::ProfileNotFound(owner)) => {
                tracing::warn!(%owner, "vendor owner has no profile row; role not updated");
            }
            Err(other) => return Err(other.into()),
        }
        tracing::info!(
            vendor = %vendor.id,
            owner = %vendor.owner_id,
            from = %vendor.verification_status,
            %to,
            "vendor application reviewed"
        );

        self.refresh_after("vendor review").await;
        Ok(Vendor {
            verification_status: to,
            verified_at,
            ..vendor
        })
    }

    // -- Vendor dashboard ----------------------------------------------------

    fn require_vendor(&self) -> Result<EffectiveUser, MarketError> {
        let user = self
            .session
            .effective_user()
            .ok_or(AuthError::NotAuthenticated)?;
        if !self.session.role_flags().is_vendor {
            return Err(MarketError::Forbidden(
                "Only verified vendors can manage a storefront.".into(),
            ));
        }
        Ok(user)
    }

    /// The signed-in vendor's verified storefront, products included.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` for non-vendors, `NotFound` when the caller has no
    /// verified vendor record, or the store failure.
    pub async fn my_vendor(&self) -> Result<Vendor, MarketError> {
        let user = self.require_vendor()?;
        self.vendors
            .vendors_for_owner(user.id())
            .await?
            .into_iter()
            .find(|v| v.verification_status == VerificationStatus::Verified)
            .ok_or_else(|| MarketError::NotFound(format!("owned by {}", user.id())))
    }

    /// Edit the caller's storefront details. Verification status and
    /// ownership cannot be changed this way.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an empty or malformed patch, plus the
    /// errors of [`Self::my_vendor`].
    pub async fn update_vendor_details(&self, patch: &VendorPatch) -> Result<Vendor, MarketError> {
        validate_vendor_patch(patch)?;
        let mut vendor = self.my_vendor().await?;
        self.vendors.update_vendor(&vendor.id, patch).await?;
        vendor.apply(patch);
        tracing::info!(vendor = %vendor.id, "storefront updated");
        Ok(vendor)
    }

    /// List a new product on the caller's storefront.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for a missing name or unit or a bad price, plus
    /// the errors of [`Self::my_vendor`].
    pub async fn add_product(&self, input: NewProduct) -> Result<Product, MarketError> {
        validate_product(Some(&input.name), Some(input.price), Some(&input.unit))?;
        let vendor = self.my_vendor().await?;
        let product = Product::from_new(uuid::Uuid::new_v4().to_string(), input);
        self.vendors.insert_product(&vendor.id, &product).await?;
        tracing::info!(vendor = %vendor.id, product = %product.id, "product added");
        Ok(product)
    }

    /// Change one of the caller's products.
    ///
    /// # Errors
    ///
    /// Returns `ProductNotFound` when the product is not on the caller's
    /// storefront, `InvalidInput` for a bad patch, plus the errors of
    /// [`Self::my_vendor`].
    pub async fn update_product(
        &self,
        product_id: &str,
        patch: &ProductPatch,
    ) -> Result<Product, MarketError> {
        if patch.is_empty() {
            return Err(MarketError::InvalidInput("Nothing to update.".into()));
        }
        validate_product(patch.name.as_deref(), patch.price, patch.unit.as_deref())?;
        let vendor = self.my_vendor().await?;
        let mut product = own_product(&vendor, product_id)?;
        self.vendors.update_product(&vendor.id, product_id, patch).await?;
        product.apply(patch);
        Ok(product)
    }

    /// Take one of the caller's products off the storefront.
    ///
    /// # Errors
    ///
    /// Returns `ProductNotFound` when the product is not on the caller's
    /// storefront, plus the errors of [`Self::my_vendor`].
    pub async fn remove_product(&self, product_id: &str) -> Result<(), MarketError> {
        let vendor = self.my_vendor().await?;
        own_product(&vendor, product_id)?;
        self.vendors.delete_product(&vendor.id, product_id).await?;
        tracing::info!(vendor = %vendor.id, product = %product_id, "product removed");
        Ok(())
    }
}

fn own_product(vendor: &Vendor, product_id: &str) -> Result<Product, MarketError> {
    vendor
        .products
        .iter()
        .find(|p| p.id == product_id)
        .cloned()
        .ok_or_else(|| MarketError::ProductNotFound(product_id.to_string()))
}

/// Checks the fields that are present; `None` means "not being set".
fn validate_product(
    name: Option<&str>,
    price: Option<f64>,
    unit: Option<&str>,
) -> Result<(), MarketError> {
    if name.is_some_and(|n| n.trim().is_empty()) {
        return Err(MarketError::InvalidInput("Product name is required.".into()));
    }
    if let Some(price) = price
        && (!price.is_finite() || price < 0.0)
    {
        return Err(MarketError::InvalidInput(format!(
            "Price must be zero or more, got {price}"
        )));
    }
    if unit.is_some_and(|u| u.trim().is_empty()) {
        return Err(MarketError::InvalidInput("Unit is required.".into()));
    }
    Ok(())
}

fn validate_vendor_patch(patch: &VendorPatch) -> Result<(), MarketError> {
    if patch.is_empty() {
        return Err(MarketError::InvalidInput("Nothing to update.".into()));
    }
    if patch.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(MarketError::InvalidInput("Vendor name is required.".into()));
    }
    if let Some(pin) = patch.pin_code.as_deref().map(str::trim)
        && (pin.is_empty() || !pin.chars().all(|c| c.is_ascii_digit()))
    {
        return Err(MarketError::InvalidInput(format!(
            "PIN code must contain only digits, got '{pin}'"
        )));
    }
    Ok(())
}

fn validate_application(input: &NewVendor) -> Result<(), MarketError> {
    let missing = |value: Option<&str>| value.is_none_or(|v| v.trim().is_empty());
    if input.name.trim().is_empty() {
        return Err(MarketError::InvalidInput("Vendor name is required.".into()));
    }
    if missing(input.address.as_deref()) {
        return Err(MarketError::InvalidInput("Address is required.".into()));
    }
    match input.pin_code.as_deref().map(str::trim) {
        Some(pin) if !pin.is_empty() && pin.chars().all(|c| c.is_ascii_digit()) => Ok(()),
        Some(pin) if !pin.is_empty() => Err(MarketError::InvalidInput(format!(
            "PIN code must contain only digits, got '{pin}'"
        ))),
        _ => Err(MarketError::InvalidInput("PIN code is required.".into())),
    }
}
