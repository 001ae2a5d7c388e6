//! Client-side vendor filtering: text or PIN-code search and radius lookup.

use harvest_core::entities::Vendor;
use harvest_core::geo::GeoPoint;
use serde::Serialize;

/// Parsed directory query.
///
/// An all-digit query is a PIN code prefix; anything else is a
/// case-insensitive substring match on name, address, and product names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchFilter {
    All,
    PinPrefix(String),
    Text(String),
}

impl SearchFilter {
    #[must_use]
    pub fn parse(query: &str) -> Self {
        let query = query.trim();
        if query.is_empty() {
            Self::All
        } else if query.chars().all(|c| c.is_ascii_digit()) {
            Self::PinPrefix(query.to_string())
        } else {
            Self::Text(query.to_lowercase())
        }
    }

    #[must_use]
    pub fn matches(&self, vendor: &Vendor) -> bool {
        match self {
            Self::All => true,
            Self::PinPrefix(prefix) => vendor
                .pin_code
                .as_deref()
                .is_some_and(|pin| pin.starts_with(prefix.as_str())),
            Self::Text(needle) => {
                let contains = |s: &str| s.to_lowercase().contains(needle.as_str());
                contains(&vendor.name)
                    || vendor.address.as_deref().is_some_and(contains)
                    || vendor.products.iter().any(|p| contains(&p.name))
            }
        }
    }
}

/// A vendor with its distance from the search origin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearbyVendor {
    #[serde(flatten)]
    pub vendor: Vendor,
    pub distance_km: f64,
}

/// Vendors within `radius_km` of `origin`, nearest first.
///
/// Vendors without a location are skipped.
#[must_use]
pub fn within_radius(vendors: Vec<Vendor>, origin: GeoPoint, radius_km: f64) -> Vec<NearbyVendor> {
    let mut nearby: Vec<NearbyVendor> = vendors
        .into_iter()
        .filter_map(|vendor| {
            let distance_km = origin.distance_km(vendor.location?);
            (distance_km <= radius_km).then_some(NearbyVendor {
                vendor,
                distance_km,
            })
        })
        .collect();
    nearby.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    nearby
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use harvest_core::entities::{NewVendor, Product};
    use rstest::rstest;

    fn vendor(name: &str, pin: Option<&str>, location: Option<GeoPoint>) -> Vendor {
        let mut v = Vendor::from_application(
            format!("v-{name}"),
            "u-1",
            NewVendor {
                name: name.into(),
                address: Some("Sector 18, Noida".into()),
                pin_code: pin.map(String::from),
                location,
                ..NewVendor::default()
            },
            Utc::now(),
        );
        v.products.push(Product {
            id: "p-1".into(),
            name: "Organic Spinach".into(),
            description: None,
            price: 20.0,
            unit: "bunch".into(),
            image_url: None,
            stock: 30,
            category: Some("vegetables".into()),
        });
        v
    }

    #[rstest]
    #[case("", SearchFilter::All)]
    #[case("  1100 ", SearchFilter::PinPrefix("1100".into()))]
    #[case("Green", SearchFilter::Text("green".into()))]
    #[case("110 north", SearchFilter::Text("110 north".into()))]
    fn parse_classifies_queries(#[case] query: &str, #[case] expected: SearchFilter) {
        assert_eq!(SearchFilter::parse(query), expected);
    }

    #[rstest]
    #[case("110", true)]
    #[case("110001", true)]
    #[case("2013", false)]
    #[case("spinach", true)]
    #[case("NOIDA", true)]
    #[case("green acres", true)]
    #[case("mango", false)]
    fn matches_name_address_products_or_pin(#[case] query: &str, #[case] expected: bool) {
        let v = vendor("Green Acres", Some("110001"), None);
        assert_eq!(SearchFilter::parse(query).matches(&v), expected);
    }

    #[test]
    fn pin_search_skips_vendors_without_pin() {
        assert!(!SearchFilter::parse("1").matches(&vendor("No Pin", None, None)));
    }

    #[test]
    fn within_radius_filters_and_sorts() {
        let origin = GeoPoint::new(28.6139, 77.2090); // New Delhi
        let vendors = vec![
            vendor("Noida", None, Some(GeoPoint::new(28.5355, 77.3910))),
            vendor("Gurgaon", None, Some(GeoPoint::new(28.4595, 77.0266))),
            vendor("Connaught", None, Some(GeoPoint::new(28.6315, 77.2167))),
            vendor("Nowhere", None, None),
        ];

        let names: Vec<String> = within_radius(vendors.clone(), origin, 10.0)
            .into_iter()
            .map(|n| n.vendor.name)
            .collect();
        assert_eq!(names, vec!["Connaught".to_string()]);

        let wide = within_radius(vendors, origin, 30.0);
        assert_eq!(wide.len(), 3);
        assert!(wide.windows(2).all(|w| w[0].distance_km <= w[1].distance_km));
    }
}
