//! Date normalization for WooCommerce records.
//!
//! WooCommerce emits timestamps as ISO-8601 strings, usually without an
//! offset (`2024-01-05T10:22:31`) and sometimes with fractional seconds or an
//! explicit offset. Before a record is stored, every declared date field is
//! replaced by a structured timestamp so the store can range-query it.
//!
//! The structured form is the extended-JSON date object
//! `{"$date": "2024-01-05T10:22:31.000Z"}`. Naive timestamps are read as UTC.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::record::Entity;
use crate::schema::EntitySchema;

/// Key of the structured timestamp object.
pub const DATE_KEY: &str = "$date";

#[derive(Debug, Error)]
pub enum DateError {
    #[error("Cannot parse '{value}' as an ISO-8601 timestamp")]
    Unparseable { value: String },

    #[error("Field '{field}': {source}")]
    Field {
        field: String,
        #[source]
        source: Box<DateError>,
    },
}

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

/// Parse an ISO-8601 timestamp in any of the shapes WooCommerce produces.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, DateError> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    // Offsets without a colon (`+0200`) are not RFC 3339.
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%dT%H:%M:%S%z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Ok(dt.with_timezone(&Utc));
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc());
        }
    }
    Err(DateError::Unparseable {
        value: s.to_string(),
    })
}

/// Build the structured representation of a timestamp.
pub fn to_structured(dt: &DateTime<Utc>) -> Value {
    let mut obj = Map::with_capacity(1);
    obj.insert(
        DATE_KEY.to_string(),
        Value::String(dt.to_rfc3339_opts(SecondsFormat::Millis, true)),
    );
    Value::Object(obj)
}

/// Read a timestamp from either the structured form or a raw ISO string.
pub fn read_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) if !s.is_empty() => parse_timestamp(s).ok(),
        Value::Object(obj) => obj
            .get(DATE_KEY)
            .and_then(Value::as_str)
            .and_then(|s| parse_timestamp(s).ok()),
        _ => None,
    }
}

#[cfg(test)]
pub fn is_structured(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|obj| obj.len() == 1 && obj.contains_key(DATE_KEY))
}

/// Convert the listed fields of `entity` in place.
///
/// Absent, `null`, empty and already-structured values are left as they are.
/// Non-string values are left alone too; only strings are parsed.
pub fn normalize_fields(entity: &mut Entity, fields: &[&str]) -> Result<(), DateError> {
    for &field in fields {
        let Some(value) = entity.get_mut(field) else {
            continue;
        };
        let Value::String(raw) = value else {
            continue;
        };
        if raw.is_empty() {
            continue;
        }
        let parsed = parse_timestamp(raw).map_err(|e| DateError::Field {
            field: field.to_string(),
            source: Box::new(e),
        })?;
        *value = to_structured(&parsed);
    }
    Ok(())
}

/// Normalize every date field the schema declares, including nested arrays.
pub fn normalize(entity: &mut Entity, schema: &EntitySchema) -> Result<(), DateError> {
    normalize_fields(entity, schema.date_fields)?;

    for nested in schema.nested {
        let Some(Value::Array(items)) = entity.get_mut(nested.field) else {
            continue;
        };
        for (index, item) in items.iter_mut().enumerate() {
            if let Value::Object(obj) = item {
                normalize_fields(obj, nested.date_fields).map_err(|e| DateError::Field {
                    field: format!("{}[{}]", nested.field, index),
                    source: Box::new(e),
                })?;
            }
        }
    }
    Ok(())
}
