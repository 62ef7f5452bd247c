use chrono::{DateTime, Utc};

use crate::pipeline::IngestionSummary;

/// One uploaded file waiting to be ingested.
#[derive(Debug, Clone)]
pub struct IngestJob {
    pub id: String,
    /// Id of the `files` row the payments will point back to.
    pub file_id: String,
    /// Full CSV text of the upload.
    pub content: String,
    /// Where the job came from (upload, CLI), for logs only.
    pub source_name: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

impl IngestJob {
    pub fn new(file_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            file_id: file_id.into(),
            content: content.into(),
            source_name: None,
            submitted_at: Utc::now(),
        }
    }

    pub fn new_with_source(
        file_id: impl Into<String>,
        content: impl Into<String>,
        source_name: impl Into<String>,
    ) -> Self {
        Self {
            source_name: Some(source_name.into()),
            ..Self::new(file_id, content)
        }
    }
}

#[derive(Debug)]
pub struct IngestResult {
    pub job_id: String,
    pub file_id: String,
    pub success: bool,
    pub summary: Option<IngestionSummary>,
    pub error: Option<String>,
}

impl IngestResult {
    pub fn success(job: &IngestJob, summary: IngestionSummary) -> Self {
        Self {
            job_id: job.id.clone(),
            file_id: job.file_id.clone(),
            success: true,
            summary: Some(summary),
            error: None,
        }
    }

    pub fn failure(job: &IngestJob, error: String) -> Self {
        Self {
            job_id: job.id.clone(),
            file_id: job.file_id.clone(),
            success: false,
            summary: None,
            error: Some(error),
        }
    }
}
