//! Document store for migrated records.
//!
//! Records are kept as whole JSON documents, one per collection and
//! external id, alongside a history of sync runs. The sync engine only needs
//! two operations from it: an inclusive creation-date window lookup that
//! seeds the "already synced" set, and replace-or-insert by id.

pub mod db;
pub mod error;
pub mod schema;
pub mod types;

pub use db::{DocumentStore, SqliteDocumentStore};
pub use error::StoreError;
pub use types::{CollectionCount, StoreStatus, SyncRunRecord, SyncRunStats};
