//! Upload intake: validate, store, record, queue.
//!
//! Accepting an upload never waits for ingestion. The receipt only says the
//! file was stored and queued; the outcome shows up in logs and alerts.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::config::Config;
use crate::db::{file_repo, Database, DatabaseError};
use crate::error::{StorageError, WorkerError};
use crate::model::FileRecord;
use crate::sanitize::redact_path;
use crate::storage::{payment_file_key, BlobStore};
use crate::worker::{IngestJob, JobSink};

/// MIME types a browser or client may report for a CSV/TXT upload.
const ALLOWED_MIME_TYPES: [&str; 5] = [
    "text/csv",
    "text/plain",
    "application/csv",
    "text/comma-separated-values",
    "application/vnd.ms-excel",
];

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("{0}")]
    Validation(String),

    #[error("Failed to store upload: {0}")]
    Storage(#[from] StorageError),

    #[error("Failed to record upload: {0}")]
    Database(#[from] DatabaseError),

    #[error("Failed to queue ingestion: {0}")]
    Queue(#[from] WorkerError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Accepted,
}

/// Returned as soon as the file is stored and queued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadReceipt {
    pub reference_id: String,
    pub status: UploadStatus,
    pub message: String,
}

/// Limits applied before any pipeline work.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    pub max_file_size: u64,
    pub allowed_extensions: Vec<String>,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_file_size: 10 * 1024 * 1024,
            allowed_extensions: vec!["csv".to_string(), "txt".to_string()],
        }
    }
}

impl UploadPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_file_size: config.upload.max_file_size,
            allowed_extensions: config.upload.allowed_extensions.clone(),
        }
    }

    /// Checks name, type and size, returning the MIME type to record.
    pub fn check(
        &self,
        filename: &str,
        mime_type: Option<&str>,
        size: u64,
    ) -> Result<String, UploadError> {
        if size == 0 {
            return Err(UploadError::Validation("A CSV file is required.".to_string()));
        }

        let extension = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        if !self.allowed_extensions.iter().any(|a| *a == extension) {
            return Err(UploadError::Validation(
                "Only CSV or TXT files are allowed.".to_string(),
            ));
        }

        let mime = match mime_type {
            Some(reported) => {
                let essence = reported
                    .split(';')
                    .next()
                    .unwrap_or_default()
                    .trim()
                    .to_ascii_lowercase();
                if !ALLOWED_MIME_TYPES.contains(&essence.as_str()) {
                    return Err(UploadError::Validation(
                        "Only CSV or TXT files are allowed.".to_string(),
                    ));
                }
                essence
            }
            None => mime_guess::from_path(filename)
                .first_or_text_plain()
                .essence_str()
                .to_string(),
        };

        if size > self.max_file_size {
            return Err(UploadError::Validation(format!(
                "File must not be larger than {} bytes.",
                self.max_file_size
            )));
        }

        Ok(mime)
    }
}

pub struct UploadService {
    policy: UploadPolicy,
    blobs: Arc<dyn BlobStore>,
    db: Database,
    jobs: Arc<dyn JobSink>,
}

impl UploadService {
    pub fn new(
        policy: UploadPolicy,
        blobs: Arc<dyn BlobStore>,
        db: Database,
        jobs: Arc<dyn JobSink>,
    ) -> Self {
        Self {
            policy,
            blobs,
            db,
            jobs,
        }
    }

    /// Accepts one uploaded file and queues it for ingestion.
    pub fn accept(
        &self,
        filename: &str,
        mime_type: Option<&str>,
        bytes: &[u8],
    ) -> Result<UploadReceipt, UploadError> {
        let file_type = self.policy.check(filename, mime_type, bytes.len() as u64)?;
        let content = std::str::from_utf8(bytes)
            .map_err(|_| UploadError::Validation("File is not valid UTF-8 text.".to_string()))?;

        let id = uuid::Uuid::new_v4().to_string();
        let key = payment_file_key(&id);
        self.blobs.put(&key, bytes)?;

        file_repo::insert(
            &self.db,
            &FileRecord {
                id: id.clone(),
                path: key,
                file_type,
                file_size: bytes.len() as i64,
            },
        )?;

        self.jobs
            .submit(IngestJob::new_with_source(id.clone(), content, "upload"))?;

        info!(
            file_id = %id,
            filename = %redact_path(Path::new(filename)),
            size = bytes.len(),
            "Upload accepted, ingestion queued"
        );

        Ok(UploadReceipt {
            reference_id: id,
            status: UploadStatus::Accepted,
            message: "File uploaded and processing has started.".to_string(),
        })
    }
}
