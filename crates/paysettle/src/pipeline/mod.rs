pub mod batch;
pub mod config;
pub mod context;
pub mod error;
pub mod progress;
pub mod runner;
pub mod summary;

pub use batch::{BatchOutcome, BatchPersister, EnrichedRow};
pub use config::PipelineConfig;
pub use context::PipelineContext;
pub use error::{PipelineError, PipelineWarning};
pub use progress::{IngestPhase, NoopProgress, ProgressEvent, ProgressReporter, RecordingProgress};
pub use runner::IngestionPipeline;
pub use summary::{IngestionSummary, RowError};
