use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use super::{parse_total_pages, ApiError, ApiResponse, CatalogApi, ListQuery, TOTAL_PAGES_HEADER};
use crate::record::RecordId;

/// reqwest-backed WooCommerce client using HTTP basic auth with the REST
/// consumer key and secret.
pub struct WooClient {
    http: Client,
    base_url: String,
    consumer_key: String,
    consumer_secret: String,
}

impl std::fmt::Debug for WooClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WooClient")
            .field("base_url", &self.base_url)
            .field("consumer_key", &"<redacted>")
            .field("consumer_secret", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl WooClient {
    pub fn new(
        site: &str,
        consumer_key: &str,
        consumer_secret: &str,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        if site.trim().is_empty() {
            return Err(ApiError::Config("store URL (SITE) is empty".to_string()));
        }
        // WooCommerce only accepts basic auth over TLS; plain http needs OAuth.
        if !site.trim().starts_with("https://") {
            return Err(ApiError::Config(format!(
                "store URL must start with https://, got '{site}'"
            )));
        }
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("wc-migrate/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Config(e.to_string()))?;

        Ok(Self {
            http,
            base_url: api_base(site),
            consumer_key: consumer_key.to_string(),
            consumer_secret: consumer_secret.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// `<endpoint>/<id>`, with the id percent-encoded as one path segment.
    fn record_url(&self, endpoint: &str, id: &RecordId) -> Result<String, ApiError> {
        let mut url = reqwest::Url::parse(&self.url(endpoint))
            .map_err(|e| ApiError::Config(format!("invalid store URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| ApiError::Config("store URL cannot carry a path".to_string()))?
            .push(&id.to_string());
        Ok(url.into())
    }

    async fn send(&self, url: String, params: &[(&str, String)]) -> Result<ApiResponse, ApiError> {
        tracing::debug!(url = %url, ?params, "GET");
        let response = self
            .http
            .get(&url)
            .basic_auth(&self.consumer_key, Some(&self.consumer_secret))
            .query(params)
            .send()
            .await
            .map_err(|source| ApiError::Http {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        let total_pages = parse_total_pages(
            response
                .headers()
                .get(TOTAL_PAGES_HEADER)
                .and_then(|v| v.to_str().ok()),
        );

        let body = if status.is_success() {
            response
                .json::<Value>()
                .await
                .map_err(|source| ApiError::Body { url, source })?
        } else {
            Value::Null
        };

        Ok(ApiResponse {
            status: status.as_u16(),
            total_pages,
            body,
        })
    }
}

#[async_trait::async_trait]
impl CatalogApi for WooClient {
    async fn list(&self, endpoint: &str, query: &ListQuery) -> Result<ApiResponse, ApiError> {
        self.send(self.url(endpoint), &query.to_params()).await
    }

    async fn get_one(&self, endpoint: &str, id: &RecordId) -> Result<ApiResponse, ApiError> {
        self.send(self.record_url(endpoint, id)?, &[]).await
    }
}

fn api_base(site: &str) -> String {
    format!("{}/wp-json/wc/v3", site.trim().trim_end_matches('/'))
}
