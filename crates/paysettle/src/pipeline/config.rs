use crate::config::Config;

pub struct PipelineConfig {
    /// Rows per persisted batch. Always at least 1.
    pub batch_size: usize,
    /// Maximum number of skipped rows kept in a summary.
    pub error_sample_limit: usize,
    /// A digest is sent when more rows than this were processed.
    pub alert_threshold: u64,
    pub deduplicate_references: bool,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            batch_size: config.ingestion.batch_size.max(1),
            error_sample_limit: config.ingestion.error_sample_limit,
            alert_threshold: config.alerts.threshold,
            deduplicate_references: config.ingestion.deduplicate_references,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            error_sample_limit: 50,
            alert_threshold: 0,
            deduplicate_references: false,
        }
    }
}
