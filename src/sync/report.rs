//! Per-run aggregation: record counters shared by the page tasks, typed
//! page outcomes, and the report handed back to the caller.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::record::RecordId;
use crate::schema::EntityKind;
use crate::store::SyncRunStats;

/// What happened to one record of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityOutcome {
    Written,
    /// Id already present in the sync set.
    Skipped,
    /// No usable `id`; not counted as written or skipped.
    MissingId,
    /// Outside the requested window (client-side filtered kinds only).
    OutOfRange,
}

/// Counters for one run, passed by reference into every page task.
#[derive(Debug, Default)]
pub struct RunCounters {
    written: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
    missing_id: AtomicU64,
    out_of_range: AtomicU64,
}

impl RunCounters {
    pub fn record(&self, outcome: EntityOutcome) {
        let counter = match outcome {
            EntityOutcome::Written => &self.written,
            EntityOutcome::Skipped => &self.skipped,
            EntityOutcome::MissingId => &self.missing_id,
            EntityOutcome::OutOfRange => &self.out_of_range,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// A record with a valid id that could not be normalized.
    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            written: self.written.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            missing_id: self.missing_id.load(Ordering::Relaxed),
            out_of_range: self.out_of_range.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub written: u64,
    pub skipped: u64,
    pub failed: u64,
    pub missing_id: u64,
    pub out_of_range: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFailure {
    pub page: u32,
    pub reason: String,
}

impl std::fmt::Display for PageFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "page {}: {}", self.page, self.reason)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    Completed { page: u32, records: usize },
    Failed(PageFailure),
}

/// Result of one paginated import.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub kind: EntityKind,
    pub total_pages: u32,
    pub pages_completed: u32,
    /// Sorted by page number.
    pub failures: Vec<PageFailure>,
    pub counts: CounterSnapshot,
    pub sync_set_size: usize,
    pub interrupted: bool,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty() || self.counts.failed > 0 || self.interrupted
    }

    pub fn to_stats(&self) -> SyncRunStats {
        SyncRunStats {
            pages_total: u64::from(self.total_pages),
            pages_failed: self.failures.len() as u64,
            written: self.counts.written,
            skipped: self.counts.skipped,
            failed_records: self.counts.failed,
            interrupted: self.interrupted,
            failures: self.failures.iter().map(ToString::to_string).collect(),
        }
    }

    pub fn log_summary(&self) {
        tracing::info!("── Summary ({}) ──", self.kind);
        tracing::info!(
            "  pages: {} of {} completed, {} failed",
            self.pages_completed,
            self.total_pages,
            self.failures.len()
        );
        tracing::info!("  newly inserted records: {}", self.counts.written);
        tracing::info!(
            "  skipped records: {} (sync set held {})",
            self.counts.skipped,
            self.sync_set_size
        );
        if self.counts.failed > 0 {
            tracing::warn!("  records with unparseable dates: {}", self.counts.failed);
        }
        if self.counts.missing_id > 0 {
            tracing::warn!("  records without an id: {}", self.counts.missing_id);
        }
        if self.counts.out_of_range > 0 {
            tracing::info!("  outside the date window: {}", self.counts.out_of_range);
        }
        tracing::info!("  elapsed: {}", format_duration(self.elapsed));
        for failure in &self.failures {
            tracing::warn!("  failed {}", failure);
        }
        if self.interrupted {
            tracing::warn!("  interrupted before all pages were dispatched");
        }
    }
}

/// Result of a single-record import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOneOutcome {
    Written(RecordId),
    NotFound { status: u16 },
    MissingId,
}

pub(crate) fn format_duration(d: Duration) -> String {
    let total_secs = d.as_secs();
    let hours = total_secs / 3600;
    let mins = (total_secs % 3600) / 60;
    let secs = total_secs % 60;

    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, mins, secs)
    } else if mins > 0 {
        format!("{}m {:02}s", mins, secs)
    } else {
        format!("{}s", secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_record_each_outcome() {
        let counters = RunCounters::default();
        counters.record(EntityOutcome::Written);
        counters.record(EntityOutcome::Written);
        counters.record(EntityOutcome::Skipped);
        counters.record(EntityOutcome::MissingId);
        counters.record(EntityOutcome::OutOfRange);
        counters.record_failed();
        assert_eq!(
            counters.snapshot(),
            CounterSnapshot {
                written: 2,
                skipped: 1,
                failed: 1,
                missing_id: 1,
                out_of_range: 1,
            }
        );
    }

    #[test]
    fn test_counters_are_shareable_across_threads() {
        let counters = std::sync::Arc::new(RunCounters::default());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let c = counters.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        c.record(EntityOutcome::Written);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(counters.snapshot().written, 8000);
    }

    fn report() -> RunReport {
        RunReport {
            kind: EntityKind::Orders,
            total_pages: 5,
            pages_completed: 4,
            failures: vec![PageFailure {
                page: 3,
                reason: "HTTP 500".into(),
            }],
            counts: CounterSnapshot {
                written: 380,
                skipped: 20,
                ..Default::default()
            },
            sync_set_size: 20,
            interrupted: false,
            elapsed: Duration::from_secs(3),
        }
    }

    #[test]
    fn test_report_to_stats() {
        let stats = report().to_stats();
        assert_eq!(stats.pages_total, 5);
        assert_eq!(stats.pages_failed, 1);
        assert_eq!(stats.written, 380);
        assert_eq!(stats.skipped, 20);
        assert_eq!(stats.failures, vec!["page 3: HTTP 500".to_string()]);
    }

    #[test]
    fn test_report_has_failures() {
        assert!(report().has_failures());
        let mut clean = report();
        clean.failures.clear();
        assert!(!clean.has_failures());
        clean.interrupted = true;
        assert!(clean.has_failures());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(42)), "42s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 05s");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1h 02m 05s");
    }
}
