use std::time::Instant;

use crate::rates::RateTable;
use crate::row::Header;
use crate::worker::job::IngestJob;

use super::batch::EnrichedRow;
use super::summary::IngestionSummary;

pub struct PipelineContext {
    // Input
    pub job: IngestJob,
    pub started: Instant,

    // Rates used for every row of this run
    pub rates: Option<RateTable>,

    // Non-blank, trimmed lines; the first one is the header
    pub lines: Vec<String>,
    pub header: Option<Header>,

    // Row loop state
    pub pending: Vec<EnrichedRow>,
    pub batches_flushed: u32,

    pub summary: IngestionSummary,
}

impl PipelineContext {
    pub fn new(job: IngestJob, error_sample_limit: usize) -> Self {
        let summary = IngestionSummary::new(job.file_id.clone(), error_sample_limit);
        Self {
            job,
            started: Instant::now(),
            rates: None,
            lines: Vec::new(),
            header: None,
            pending: Vec::new(),
            batches_flushed: 0,
            summary,
        }
    }
}
