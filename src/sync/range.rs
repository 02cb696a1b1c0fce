use chrono::{DateTime, Utc};

use super::error::SyncError;
use crate::dates;

/// Format of the `after`/`before` list parameters.
const REMOTE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Inclusive creation-date window of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl DateRange {
    pub fn parse(from: &str, to: &str) -> Result<Self, SyncError> {
        let parse = |value: &str| {
            dates::parse_timestamp(value).map_err(|source| SyncError::InvalidDate {
                value: value.to_string(),
                source,
            })
        };
        Ok(Self {
            from: parse(from)?,
            to: parse(to)?,
        })
    }

    pub fn contains(&self, dt: &DateTime<Utc>) -> bool {
        self.from <= *dt && *dt <= self.to
    }

    pub fn remote_after(&self) -> String {
        self.from.format(REMOTE_FORMAT).to_string()
    }

    pub fn remote_before(&self) -> String {
        self.to.format(REMOTE_FORMAT).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cli_format() {
        let range = DateRange::parse("2024-01-01T00:00:00.000", "2024-01-31T23:59:59.000").unwrap();
        assert_eq!(range.remote_after(), "2024-01-01T00:00:00");
        assert_eq!(range.remote_before(), "2024-01-31T23:59:59");
    }

    #[test]
    fn test_parse_rejects_bad_bound() {
        let err = DateRange::parse("2024-01-01", "soon").unwrap_err();
        assert!(matches!(err, SyncError::InvalidDate { ref value, .. } if value == "soon"));
    }

    #[test]
    fn test_contains_is_inclusive() {
        let range = DateRange::parse("2024-01-01T00:00:00", "2024-01-02T00:00:00").unwrap();
        assert!(range.contains(&range.from));
        assert!(range.contains(&range.to));
        let after = dates::parse_timestamp("2024-01-02T00:00:01").unwrap();
        assert!(!range.contains(&after));
    }
}
