use serde_json::Value;

use super::error::FetchError;
use super::range::DateRange;
use crate::schema::{DateFilter, EntitySchema};
use crate::types::SortOrder;
use crate::woo::{CatalogApi, ListQuery};

/// Build the list request for one page of `schema`.
///
/// Remote-filtered kinds send the window as `after`/`before`; client-side
/// filtered kinds send their role filter instead and no dates.
pub(crate) fn list_query(
    schema: &EntitySchema,
    page: u32,
    per_page: u32,
    sort: SortOrder,
    range: &DateRange,
) -> ListQuery {
    let mut query = ListQuery {
        page,
        per_page,
        order: Some(sort),
        role: schema.role,
        ..Default::default()
    };
    if schema.date_filter == DateFilter::Remote {
        query.after = Some(range.remote_after());
        query.before = Some(range.remote_before());
    }
    query
}

/// Fetch one page of records. Any non-200 status, transport error, or
/// non-array body is a failure of this page only.
pub async fn fetch_page(
    api: &dyn CatalogApi,
    schema: &EntitySchema,
    page: u32,
    per_page: u32,
    sort: SortOrder,
    range: &DateRange,
) -> Result<Vec<Value>, FetchError> {
    let query = list_query(schema, page, per_page, sort, range);
    let response = api.list(schema.endpoint, &query).await?;
    if !response.is_ok() {
        return Err(FetchError::Status(response.status));
    }
    match response.body {
        Value::Array(records) => {
            tracing::debug!(kind = %schema.kind, page, records = records.len(), "Fetched page");
            Ok(records)
        }
        _ => Err(FetchError::Malformed),
    }
}
