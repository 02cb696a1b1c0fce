//! Paginated sync engine.
//!
//! One run imports a single entity kind over a creation-date window:
//!
//! 1. parse the window and, when requested, load the ids already stored for
//!    it (the sync set);
//! 2. probe page 1 for the total page count;
//! 3. fetch pages 1..=N through a bounded `buffer_unordered` pool, turning
//!    each record into a document via [`process::ProcessContext`];
//! 4. fold page outcomes and record counters into a [`RunReport`].
//!
//! Pages are never retried. A failed page is reported and the remaining
//! pages still run; whatever a failed page wrote before failing stays
//! written. Every write is a replace-by-id, so rerunning a window converges.

pub mod error;
mod fetch;
mod process;
pub mod range;
pub mod report;
pub mod syncset;

#[cfg(test)]
mod fake;

use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Instant;

use futures_util::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

pub use error::{FetchError, SyncError};
pub use range::DateRange;
pub use report::{FetchOneOutcome, PageFailure, PageOutcome, RunCounters, RunReport};
pub use syncset::SyncSet;

use crate::dates;
use crate::record::RecordId;
use crate::schema::{EntityKind, EntitySchema};
use crate::store::DocumentStore;
use crate::types::SortOrder;
use crate::woo::CatalogApi;
use process::ProcessContext;

/// Target collection per entity kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collections {
    pub orders: String,
    pub customers: String,
    pub products: String,
}

impl Default for Collections {
    fn default() -> Self {
        Self {
            orders: "orders".to_string(),
            customers: "vendors".to_string(),
            products: "products".to_string(),
        }
    }
}

impl Collections {
    pub fn for_kind(&self, kind: EntityKind) -> &str {
        match kind {
            EntityKind::Orders => &self.orders,
            EntityKind::Customers => &self.customers,
            EntityKind::Products => &self.products,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Upper bound on pages in flight.
    pub max_concurrency: usize,
    pub page_size: u32,
    pub no_progress_bar: bool,
    pub collections: Collections,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 10,
            page_size: 100,
            no_progress_bar: false,
            collections: Collections::default(),
        }
    }
}

/// Parameters of one paginated import.
#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub kind: EntityKind,
    pub sort: SortOrder,
    /// Inclusive lower bound, any ISO-8601 form.
    pub from: String,
    /// Inclusive upper bound.
    pub to: String,
    /// Skip records whose id is already stored for the window.
    pub sync: bool,
}

pub struct SyncEngine {
    api: Arc<dyn CatalogApi>,
    store: Arc<dyn DocumentStore>,
    config: SyncConfig,
}

fn create_progress_bar(no_progress_bar: bool, total: u64) -> ProgressBar {
    if no_progress_bar || !std::io::stdout().is_terminal() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total);
    match ProgressStyle::with_template(
        "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} pages ({eta}) {msg}",
    ) {
        Ok(style) => pb.set_style(style.progress_chars("=> ")),
        Err(e) => tracing::debug!("Progress bar template rejected: {}", e),
    }
    pb
}

impl SyncEngine {
    pub fn new(
        api: Arc<dyn CatalogApi>,
        store: Arc<dyn DocumentStore>,
        config: SyncConfig,
    ) -> Self {
        Self { api, store, config }
    }

    pub fn collection(&self, kind: EntityKind) -> &str {
        self.config.collections.for_kind(kind)
    }

    /// Import every page of `request.kind` created inside the window.
    ///
    /// Only setup failures are returned as errors: an unparseable window, a
    /// sync-set load failure, or a transport error on the probe. Page and
    /// record failures end up in the report.
    pub async fn import_all(
        &self,
        request: &ImportRequest,
        shutdown_token: CancellationToken,
    ) -> Result<RunReport, SyncError> {
        let started = Instant::now();
        let schema = request.kind.schema();
        let collection = self.collection(request.kind);
        let range = DateRange::parse(&request.from, &request.to)?;

        tracing::info!(
            kind = %request.kind,
            from = %range.from,
            to = %range.to,
            sort = %request.sort,
            sync = request.sync,
            "Starting import"
        );

        let sync_set = if request.sync {
            SyncSet::load(self.store.as_ref(), collection, &range).await?
        } else {
            SyncSet::empty()
        };
        tracing::info!("{} found in store: {}", request.kind, sync_set.len());
        if request.sync && sync_set.is_empty() {
            tracing::debug!("Nothing stored for this window yet, every record will be written");
        }

        let total_pages = self.probe_total_pages(schema, request.sort, &range).await?;
        tracing::info!("Total pages: {}", total_pages);

        let run_id = match self.store.start_sync_run(request.kind).await {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!("Failed to record sync run start: {}", e);
                None
            }
        };

        let counters = RunCounters::default();
        let ctx = ProcessContext {
            schema,
            collection,
            range: &range,
            sync_set: &sync_set,
            store: self.store.as_ref(),
        };
        let concurrency = self.config.max_concurrency.max(1);
        let pb = create_progress_bar(self.config.no_progress_bar, u64::from(total_pages));

        let page_stream = stream::iter(1..=total_pages)
            .take_while(|_| std::future::ready(!shutdown_token.is_cancelled()))
            .map(|page| self.sync_page(&ctx, page, request.sort, &counters))
            .buffer_unordered(concurrency);

        tokio::pin!(page_stream);

        let mut pages_completed = 0u32;
        let mut failures = Vec::new();
        while let Some(outcome) = page_stream.next().await {
            match outcome {
                PageOutcome::Completed { page, records } => {
                    pages_completed += 1;
                    pb.suspend(|| tracing::debug!(page, records, "Page done"));
                }
                PageOutcome::Failed(failure) => {
                    pb.suspend(|| tracing::error!("Page {} failed: {}", failure.page, failure.reason));
                    failures.push(failure);
                }
            }
            pb.inc(1);
        }
        pb.finish_and_clear();

        failures.sort_by_key(|f| f.page);
        let dispatched = pages_completed + failures.len() as u32;
        let interrupted = shutdown_token.is_cancelled() && dispatched < total_pages;
        if interrupted {
            tracing::info!("Shutdown requested, stopped after {} of {} pages", dispatched, total_pages);
        }

        let report = RunReport {
            kind: request.kind,
            total_pages,
            pages_completed,
            failures,
            counts: counters.snapshot(),
            sync_set_size: sync_set.len(),
            interrupted,
            elapsed: started.elapsed(),
        };

        if let Some(run_id) = run_id {
            if let Err(e) = self.store.complete_sync_run(run_id, &report.to_stats()).await {
                tracing::warn!("Failed to record sync run completion: {}", e);
            }
        }

        report.log_summary();
        Ok(report)
    }

    /// Fetch a single record by id and upsert it. A non-200 answer is not an
    /// error; it is reported as [`FetchOneOutcome::NotFound`].
    pub async fn fetch_one(
        &self,
        kind: EntityKind,
        id: &RecordId,
    ) -> Result<FetchOneOutcome, SyncError> {
        let schema = kind.schema();
        let response = self.api.get_one(schema.endpoint, id).await?;
        if !response.is_ok() {
            tracing::warn!(
                "{} {} not fetched: HTTP {}",
                kind.singular(),
                id,
                response.status
            );
            return Ok(FetchOneOutcome::NotFound {
                status: response.status,
            });
        }

        let Value::Object(mut entity) = response.body else {
            tracing::warn!("{} {}: response is not an object", kind.singular(), id);
            return Ok(FetchOneOutcome::MissingId);
        };
        let Some(record_id) = RecordId::of(&entity) else {
            tracing::warn!("{} {}: response carries no id", kind.singular(), id);
            return Ok(FetchOneOutcome::MissingId);
        };

        dates::normalize(&mut entity, schema).map_err(|source| SyncError::Date {
            id: record_id.clone(),
            source,
        })?;
        self.store
            .upsert_by_id(self.collection(kind), &record_id, &entity)
            .await?;
        tracing::info!("{} {} added or updated", kind.singular(), record_id);
        Ok(FetchOneOutcome::Written(record_id))
    }

    /// Request page 1 and read the total page count. A non-200 answer or a
    /// missing header means there is nothing to import.
    async fn probe_total_pages(
        &self,
        schema: &EntitySchema,
        sort: SortOrder,
        range: &DateRange,
    ) -> Result<u32, SyncError> {
        let query = fetch::list_query(schema, 1, self.config.page_size, sort, range);
        let response = self.api.list(schema.endpoint, &query).await?;
        if !response.is_ok() {
            tracing::warn!(
                "Probe for {} returned HTTP {}, nothing to import",
                schema.kind,
                response.status
            );
            return Ok(0);
        }
        Ok(response.total_pages.unwrap_or_else(|| {
            tracing::warn!(
                "Probe for {} carried no usable page count, nothing to import",
                schema.kind
            );
            0
        }))
    }

    async fn sync_page(
        &self,
        ctx: &ProcessContext<'_>,
        page: u32,
        sort: SortOrder,
        counters: &RunCounters,
    ) -> PageOutcome {
        let records = match fetch::fetch_page(
            self.api.as_ref(),
            ctx.schema,
            page,
            self.config.page_size,
            sort,
            ctx.range,
        )
        .await
        {
            Ok(records) => records,
            Err(e) => {
                if let FetchError::Transport(api) = &e {
                    if api.is_timeout() {
                        tracing::debug!(page, "Page request timed out");
                    }
                }
                return PageOutcome::Failed(PageFailure {
                    page,
                    reason: e.to_string(),
                });
            }
        };

        let total = records.len();
        for (index, record) in records.into_iter().enumerate() {
            match ctx.process(record).await {
                Ok(outcome) => counters.record(outcome),
                Err(SyncError::Date { id, source }) => {
                    counters.record_failed();
                    tracing::warn!(page, "Skipping {} {}: {}", ctx.schema.kind.singular(), id, source);
                }
                Err(e) => {
                    return PageOutcome::Failed(PageFailure {
                        page,
                        reason: format!("{} (after {} of {} records)", e, index, total),
                    });
                }
            }
        }
        PageOutcome::Completed {
            page,
            records: total,
        }
    }
}
