//! Per-file ingestion accounting.

use std::time::Duration;

use serde::Serialize;

use crate::row::SkipReason;

/// A skipped row kept for the summary sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowError {
    /// 1-based position among the data rows.
    pub row_number: usize,
    pub message: String,
    pub row: String,
}

/// Outcome of one ingestion run. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestionSummary {
    pub file_id: String,
    pub total_rows: u64,
    /// Rows handed to the persister.
    pub processed: u64,
    pub skipped: u64,
    pub persisted: u64,
    pub failed: u64,
    pub duplicates: u64,
    pub batches: u32,
    pub errors: Vec<RowError>,
    #[serde(skip)]
    pub elapsed: Duration,
    #[serde(skip)]
    sample_limit: usize,
}

impl IngestionSummary {
    pub fn new(file_id: impl Into<String>, sample_limit: usize) -> Self {
        Self {
            file_id: file_id.into(),
            sample_limit,
            ..Self::default()
        }
    }

    /// Counts a skipped row; the row itself is kept only while the sample
    /// has room.
    pub fn record_skip(&mut self, row_number: usize, reason: &SkipReason, row: &str) {
        self.skipped += 1;
        if self.errors.len() < self.sample_limit {
            self.errors.push(RowError {
                row_number,
                message: reason.to_string(),
                row: row.to_string(),
            });
        }
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }

    /// Short human-readable digest for alert channels.
    pub fn digest(&self) -> String {
        format!(
            "Payment file {} imported: {} of {} rows processed, {} skipped, {} failed to save ({:.2}s)",
            self.file_id,
            self.processed,
            self.total_rows,
            self.skipped,
            self.failed,
            self.elapsed_secs()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_sample_is_capped() {
        let mut summary = IngestionSummary::new("f1", 2);
        for n in 1..=5 {
            summary.record_skip(n, &SkipReason::InvalidEmail, "x,y");
        }
        assert_eq!(summary.skipped, 5);
        assert_eq!(summary.errors.len(), 2);
        assert_eq!(summary.errors[1].row_number, 2);
        assert_eq!(summary.errors[0].message, "invalid email");
    }

    #[test]
    fn test_digest_mentions_counts() {
        let summary = IngestionSummary {
            total_rows: 10,
            processed: 8,
            skipped: 2,
            ..IngestionSummary::new("file-9", 10)
        };
        let digest = summary.digest();
        assert!(digest.contains("file-9"));
        assert!(digest.contains("8 of 10 rows processed"));
        assert!(digest.contains("2 skipped"));
    }
}
