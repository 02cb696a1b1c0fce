//! Store schema definitions and migrations.

use rusqlite::Connection;

use super::error::StoreError;

/// Current schema version. Increment when making schema changes.
pub const SCHEMA_VERSION: i32 = 1;

/// Schema DDL for version 1.
///
/// Documents are JSON text keyed by collection and the JSON encoding of the
/// record id. `date_created` mirrors the document's creation timestamp in
/// epoch milliseconds so date-window lookups can use an index.
const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    collection TEXT NOT NULL,
    id TEXT NOT NULL,
    date_created INTEGER,
    body TEXT NOT NULL,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (collection, id)
);

CREATE INDEX IF NOT EXISTS idx_documents_date_created ON documents(collection, date_created);

CREATE TABLE IF NOT EXISTS sync_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_kind TEXT NOT NULL,
    started_at INTEGER NOT NULL,
    completed_at INTEGER,
    pages_total INTEGER DEFAULT 0,
    pages_failed INTEGER DEFAULT 0,
    written INTEGER DEFAULT 0,
    skipped INTEGER DEFAULT 0,
    failed_records INTEGER DEFAULT 0,
    interrupted INTEGER DEFAULT 0,
    failures TEXT
);
"#;

pub(crate) fn get_schema_version(conn: &Connection) -> Result<i32, StoreError> {
    let version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    Ok(version)
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<(), StoreError> {
    conn.pragma_update(None, "user_version", version)?;
    Ok(())
}

/// Initialize or migrate the schema. Safe to call on new and existing stores.
pub(crate) fn migrate(conn: &Connection) -> Result<(), StoreError> {
    let current_version = get_schema_version(conn)?;

    if current_version > SCHEMA_VERSION {
        return Err(StoreError::UnsupportedSchemaVersion {
            found: current_version,
            expected: SCHEMA_VERSION,
        });
    }

    if current_version < SCHEMA_VERSION {
        conn.execute_batch(SCHEMA_V1)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
        tracing::debug!("Initialized store schema at version {}", SCHEMA_VERSION);
    }

    Ok(())
}
