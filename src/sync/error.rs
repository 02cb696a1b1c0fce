use thiserror::Error;

use crate::dates::DateError;
use crate::record::RecordId;
use crate::store::StoreError;
use crate::woo::ApiError;

/// Why a single page could not be fetched. Never retried; the page is
/// reported as failed and the rest of the run continues.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {0}")]
    Status(u16),

    #[error(transparent)]
    Transport(#[from] ApiError),

    #[error("response body is not a JSON array of records")]
    Malformed,
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Invalid date range bound '{value}': {source}")]
    InvalidDate {
        value: String,
        #[source]
        source: DateError,
    },

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Record {id}: {source}")]
    Date {
        id: RecordId,
        #[source]
        source: DateError,
    },
}
