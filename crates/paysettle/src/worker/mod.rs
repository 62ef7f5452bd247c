pub mod job;
pub mod pool;

pub use job::{IngestJob, IngestResult};
pub use pool::{JobSink, JobSubmitter, WorkerPool};

// Re-export crossbeam_channel for use in the daemon
pub use crossbeam_channel;
