//! Types for the document store.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::schema::EntityKind;

/// Statistics recorded when a sync run completes.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncRunStats {
    pub pages_total: u64,
    pub pages_failed: u64,
    pub written: u64,
    pub skipped: u64,
    pub failed_records: u64,
    pub interrupted: bool,
    /// Human-readable page failure reasons, stored as a JSON array.
    pub failures: Vec<String>,
}

/// A row of the sync-run history.
#[derive(Debug, Clone, Serialize)]
pub struct SyncRunRecord {
    pub id: i64,
    pub kind: Option<EntityKind>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub stats: SyncRunStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct CollectionCount {
    pub kind: EntityKind,
    pub collection: String,
    pub documents: u64,
}

/// Snapshot printed by the `status` command.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStatus {
    pub path: PathBuf,
    pub collections: Vec<CollectionCount>,
    pub runs: Vec<SyncRunRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_status_serializes_kinds_and_timestamps() {
        let status = StoreStatus {
            path: PathBuf::from("/tmp/store.db"),
            collections: vec![CollectionCount {
                kind: EntityKind::Customers,
                collection: "vendors".into(),
                documents: 12,
            }],
            runs: vec![SyncRunRecord {
                id: 3,
                kind: Some(EntityKind::Orders),
                started_at: Utc.with_ymd_and_hms(2024, 1, 5, 10, 0, 0).unwrap(),
                completed_at: None,
                stats: SyncRunStats {
                    pages_total: 5,
                    pages_failed: 1,
                    failures: vec!["page 3: HTTP 500".into()],
                    ..Default::default()
                },
            }],
        };

        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["collections"][0]["kind"], json!("customers"));
        assert_eq!(value["collections"][0]["documents"], json!(12));
        let run = &value["runs"][0];
        assert_eq!(run["kind"], json!("orders"));
        assert_eq!(run["started_at"], json!("2024-01-05T10:00:00Z"));
        assert_eq!(run["completed_at"], json!(null));
        assert_eq!(run["pages_failed"], json!(1));
        assert_eq!(run["failures"], json!(["page 3: HTTP 500"]));
    }
}
