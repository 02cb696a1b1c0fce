//! WooCommerce REST API (`wc/v3`) client.
//!
//! The sync engine talks to the shop through the [`CatalogApi`] trait so it
//! can be driven by a scripted fake in tests; [`WooClient`] is the reqwest
//! implementation used by the binary.

pub mod client;
pub mod error;

pub use client::WooClient;
pub use error::ApiError;

use serde_json::Value;

use crate::record::RecordId;
use crate::types::SortOrder;

/// Response header carrying the page count of a list request.
pub const TOTAL_PAGES_HEADER: &str = "X-WP-TotalPages";

/// Query parameters of a paginated list request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub page: u32,
    pub per_page: u32,
    pub order: Option<SortOrder>,
    pub after: Option<String>,
    pub before: Option<String>,
    pub role: Option<&'static str>,
}

impl ListQuery {
    /// Parameters in the order they appear on the wire.
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("per_page", self.per_page.to_string()),
            ("page", self.page.to_string()),
        ];
        if let Some(order) = self.order {
            params.push(("order", order.as_str().to_string()));
        }
        if let Some(after) = &self.after {
            params.push(("after", after.clone()));
        }
        if let Some(before) = &self.before {
            params.push(("before", before.clone()));
        }
        if let Some(role) = self.role {
            params.push(("role", role.to_string()));
        }
        params
    }
}

/// What the engine needs from one HTTP exchange.
///
/// `body` is only decoded for 2xx responses; otherwise it is `Null`.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub total_pages: Option<u32>,
    pub body: Value,
}

impl ApiResponse {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

#[async_trait::async_trait]
pub trait CatalogApi: Send + Sync {
    /// `GET <endpoint>` with list filters.
    async fn list(&self, endpoint: &str, query: &ListQuery) -> Result<ApiResponse, ApiError>;

    /// `GET <endpoint>/<id>`.
    async fn get_one(&self, endpoint: &str, id: &RecordId) -> Result<ApiResponse, ApiError>;
}

/// Parse the total-pages header. Missing or non-numeric values yield `None`.
pub fn parse_total_pages(raw: Option<&str>) -> Option<u32> {
    raw.and_then(|s| s.trim().parse::<u32>().ok())
}
