use thiserror::Error;

use crate::db::DatabaseError;
use crate::rates::RateFetchError;

/// Errors that abort an ingestion run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Exchange rates unavailable: {0}")]
    Rates(#[from] RateFetchError),

    #[error("Storage outage while persisting batch {batch}: {source}")]
    StorageOutage {
        batch: u32,
        #[source]
        source: DatabaseError,
    },

    #[error("Malformed CSV on line {line}: {reason}")]
    MalformedCsv { line: usize, reason: String },
}

/// Row problems that happen after validation and do not stop the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineWarning {
    RowNotPersisted { reference_no: String, error: String },
    DuplicateReference { reference_no: String },
}
