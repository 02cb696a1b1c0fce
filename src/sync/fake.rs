//! Scripted in-memory shop used by the engine tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::record::RecordId;
use crate::woo::{ApiError, ApiResponse, CatalogApi, ListQuery};

#[derive(Default)]
pub(crate) struct FakeApi {
    pages: Vec<Vec<Value>>,
    total_pages_header: Option<Option<u32>>,
    probe_status: Option<u16>,
    failing_pages: HashMap<u32, u16>,
    broken_pages: HashSet<u32>,
    records: HashMap<RecordId, Value>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    list_calls: Mutex<Vec<ListQuery>>,
}

impl FakeApi {
    pub fn with_pages(pages: Vec<Vec<Value>>) -> Self {
        Self {
            pages,
            ..Default::default()
        }
    }

    /// Every page after the probe answers with `status`.
    pub fn fail_page(mut self, page: u32, status: u16) -> Self {
        self.failing_pages.insert(page, status);
        self
    }

    /// The page fails at the transport level.
    pub fn drop_connection(mut self, page: u32) -> Self {
        self.broken_pages.insert(page);
        self
    }

    pub fn probe_status(mut self, status: u16) -> Self {
        self.probe_status = Some(status);
        self
    }

    /// Override the total-pages header; `None` omits it.
    pub fn total_pages_header(mut self, value: Option<u32>) -> Self {
        self.total_pages_header = Some(value);
        self
    }

    pub fn with_record(mut self, id: RecordId, body: Value) -> Self {
        self.records.insert(id, body);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Pages requested, excluding the probe, in request order.
    pub fn requested_pages(&self) -> Vec<u32> {
        let calls = self.list_calls.lock().unwrap();
        calls.iter().skip(1).map(|q| q.page).collect()
    }

    pub fn list_calls(&self) -> Vec<ListQuery> {
        self.list_calls.lock().unwrap().clone()
    }

    fn transport_error(url: String) -> ApiError {
        let source = reqwest::Client::new()
            .get("not a url")
            .build()
            .unwrap_err();
        ApiError::Http { url, source }
    }
}

#[async_trait]
impl CatalogApi for FakeApi {
    async fn list(&self, endpoint: &str, query: &ListQuery) -> Result<ApiResponse, ApiError> {
        let is_probe = {
            let mut calls = self.list_calls.lock().unwrap();
            calls.push(query.clone());
            calls.len() == 1
        };

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        } else {
            tokio::task::yield_now().await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let total_pages = self
            .total_pages_header
            .unwrap_or(Some(self.pages.len() as u32));

        if is_probe {
            if let Some(status) = self.probe_status {
                return Ok(ApiResponse {
                    status,
                    total_pages: None,
                    body: Value::Null,
                });
            }
        } else {
            if self.broken_pages.contains(&query.page) {
                return Err(Self::transport_error(format!("{endpoint}?page={}", query.page)));
            }
            if let Some(&status) = self.failing_pages.get(&query.page) {
                return Ok(ApiResponse {
                    status,
                    total_pages,
                    body: Value::Null,
                });
            }
        }

        let body = self
            .pages
            .get(query.page.saturating_sub(1) as usize)
            .cloned()
            .unwrap_or_default();
        Ok(ApiResponse {
            status: 200,
            total_pages,
            body: Value::Array(body),
        })
    }

    async fn get_one(&self, _endpoint: &str, id: &RecordId) -> Result<ApiResponse, ApiError> {
        Ok(match self.records.get(id) {
            Some(body) => ApiResponse {
                status: 200,
                total_pages: None,
                body: body.clone(),
            },
            None => ApiResponse {
                status: 404,
                total_pages: None,
                body: Value::Null,
            },
        })
    }
}
