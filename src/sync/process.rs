use serde_json::Value;

use super::error::SyncError;
use super::range::DateRange;
use super::report::EntityOutcome;
use super::syncset::SyncSet;
use crate::dates;
use crate::record::{Entity, RecordId};
use crate::schema::{DateFilter, EntitySchema};
use crate::store::DocumentStore;

/// Everything a page task needs to turn fetched records into documents.
pub(crate) struct ProcessContext<'a> {
    pub schema: &'static EntitySchema,
    pub collection: &'a str,
    pub range: &'a DateRange,
    pub sync_set: &'a SyncSet,
    pub store: &'a dyn DocumentStore,
}

impl ProcessContext<'_> {
    /// Run one fetched record through id extraction, the window check,
    /// date normalization, the sync-set check and the upsert.
    pub async fn process(&self, record: Value) -> Result<EntityOutcome, SyncError> {
        let Value::Object(mut entity) = record else {
            return Ok(EntityOutcome::MissingId);
        };
        let Some(id) = RecordId::of(&entity) else {
            tracing::debug!(kind = %self.schema.kind, "Record without id, ignoring");
            return Ok(EntityOutcome::MissingId);
        };

        if self.schema.date_filter == DateFilter::ClientSide && !self.in_window(&entity) {
            return Ok(EntityOutcome::OutOfRange);
        }

        dates::normalize(&mut entity, self.schema)
            .map_err(|source| SyncError::Date { id: id.clone(), source })?;

        if self.sync_set.contains(&id) {
            return Ok(EntityOutcome::Skipped);
        }

        self.store
            .upsert_by_id(self.collection, &id, &entity)
            .await?;
        Ok(EntityOutcome::Written)
    }

    // A missing or unparseable creation date is outside every window.
    fn in_window(&self, entity: &Entity) -> bool {
        entity
            .get("date_created")
            .and_then(dates::read_timestamp)
            .is_some_and(|created| self.range.contains(&created))
    }
}
