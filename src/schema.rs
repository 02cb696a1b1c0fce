//! Static per-entity schemas.
//!
//! The sync engine is generic over these descriptors; the only differences
//! between orders, customers and products are which fields carry dates, how
//! the list endpoint is filtered, and which collection receives the records.

use serde::Serialize;

/// The three WooCommerce record kinds the tool migrates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Orders,
    Customers,
    Products,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [Self::Orders, Self::Customers, Self::Products];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Orders => "orders",
            Self::Customers => "customers",
            Self::Products => "products",
        }
    }

    /// Parse from the string stored in the sync-run history.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "orders" => Some(Self::Orders),
            "customers" => Some(Self::Customers),
            "products" => Some(Self::Products),
            _ => None,
        }
    }

    /// Singular noun used in log lines ("order 7", "customer 42").
    pub fn singular(&self) -> &'static str {
        match self {
            Self::Orders => "order",
            Self::Customers => "customer",
            Self::Products => "product",
        }
    }

    pub fn schema(&self) -> &'static EntitySchema {
        match self {
            Self::Orders => &ORDERS,
            Self::Customers => &CUSTOMERS,
            Self::Products => &PRODUCTS,
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the requested date window is applied to a list request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFilter {
    /// `after`/`before` query parameters are sent to the list endpoint.
    Remote,
    /// The list endpoint is queried unfiltered and records are checked
    /// against the window after fetching.
    ClientSide,
}

/// Date fields inside each element of a nested array (e.g. product images).
#[derive(Debug)]
pub struct NestedDateFields {
    pub field: &'static str,
    pub date_fields: &'static [&'static str],
}

/// Immutable description of one entity kind.
#[derive(Debug)]
pub struct EntitySchema {
    pub kind: EntityKind,
    /// Path segment of the REST endpoint, relative to `wc/v3`.
    pub endpoint: &'static str,
    pub date_fields: &'static [&'static str],
    pub nested: &'static [NestedDateFields],
    pub date_filter: DateFilter,
    /// `role` filter sent with list requests.
    pub role: Option<&'static str>,
}

const CREATED_MODIFIED: &[&str] = &[
    "date_created",
    "date_created_gmt",
    "date_modified",
    "date_modified_gmt",
];

static ORDERS: EntitySchema = EntitySchema {
    kind: EntityKind::Orders,
    endpoint: "orders",
    date_fields: &[
        "date_created",
        "date_created_gmt",
        "date_modified",
        "date_modified_gmt",
        "date_paid",
        "date_paid_gmt",
        "date_completed",
        "date_completed_gmt",
    ],
    nested: &[],
    date_filter: DateFilter::Remote,
    role: None,
};

// The customers list endpoint has no creation-date filter, so the window is
// applied per record after fetching. Every run pages through all sellers.
static CUSTOMERS: EntitySchema = EntitySchema {
    kind: EntityKind::Customers,
    endpoint: "customers",
    date_fields: CREATED_MODIFIED,
    nested: &[],
    date_filter: DateFilter::ClientSide,
    role: Some("seller"),
};

static PRODUCTS: EntitySchema = EntitySchema {
    kind: EntityKind::Products,
    endpoint: "products",
    date_fields: &[
        "date_created",
        "date_created_gmt",
        "date_modified",
        "date_modified_gmt",
        "date_on_sale_from",
        "date_on_sale_from_gmt",
        "date_on_sale_to",
        "date_on_sale_to_gmt",
    ],
    nested: &[NestedDateFields {
        field: "images",
        date_fields: CREATED_MODIFIED,
    }],
    date_filter: DateFilter::Remote,
    role: None,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trips_through_str() {
        for kind in EntityKind::ALL {
            assert_eq!(EntityKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(EntityKind::from_str("coupons"), None);
    }

    #[test]
    fn test_only_customers_filter_client_side() {
        assert_eq!(EntityKind::Orders.schema().date_filter, DateFilter::Remote);
        assert_eq!(EntityKind::Products.schema().date_filter, DateFilter::Remote);
        assert_eq!(
            EntityKind::Customers.schema().date_filter,
            DateFilter::ClientSide
        );
        assert_eq!(EntityKind::Customers.schema().role, Some("seller"));
    }

    #[test]
    fn test_product_images_exclude_sale_dates() {
        let nested = &EntityKind::Products.schema().nested[0];
        assert_eq!(nested.field, "images");
        assert!(nested.date_fields.iter().all(|f| !f.contains("on_sale")));
        assert_eq!(nested.date_fields.len(), 4);
    }
}
