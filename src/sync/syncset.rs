use std::collections::HashSet;

use super::range::DateRange;
use crate::record::RecordId;
use crate::store::{DocumentStore, StoreError};

/// Ids already present in the store for the run's window. Loaded once
/// before the first page is fetched and read-only afterwards.
#[derive(Debug, Default)]
pub struct SyncSet {
    ids: HashSet<RecordId>,
}

impl SyncSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub async fn load(
        store: &dyn DocumentStore,
        collection: &str,
        range: &DateRange,
    ) -> Result<Self, StoreError> {
        let ids = store
            .ids_created_between(collection, range.from, range.to)
            .await?;
        Ok(Self { ids })
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl FromIterator<RecordId> for SyncSet {
    fn from_iter<I: IntoIterator<Item = RecordId>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteDocumentStore;
    use serde_json::json;

    #[tokio::test]
    async fn test_load_only_ids_in_window() {
        let store = SqliteDocumentStore::open_in_memory().unwrap();
        for (id, created) in [(1, "2024-01-01T00:00:00"), (2, "2024-03-01T00:00:00")] {
            let doc = serde_json::from_value(json!({
                "id": id,
                "date_created": {"$date": format!("{created}.000Z")}
            }))
            .unwrap();
            store
                .upsert_by_id("orders", &RecordId::Int(id), &doc)
                .await
                .unwrap();
        }
        let range = DateRange::parse("2024-01-01T00:00:00", "2024-01-31T00:00:00").unwrap();
        let set = SyncSet::load(&store, "orders", &range).await.unwrap();
        assert_eq!(set.len(), 1);
        assert!(set.contains(&RecordId::Int(1)));
        assert!(!set.contains(&RecordId::Int(2)));
    }

    #[test]
    fn test_empty() {
        let set = SyncSet::empty();
        assert!(set.is_empty());
        assert!(!set.contains(&RecordId::Int(1)));
    }
}
