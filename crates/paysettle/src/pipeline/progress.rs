use std::sync::Mutex;

use serde::Serialize;

/// States of one ingestion run. A run only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestPhase {
    Start,
    RatesRefreshed,
    Parsed,
    RowLoop,
    BatchesFlushed,
    Summarized,
    Alerted,
    Done,
    Failed,
}

/// Events emitted by the pipeline during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Phase {
        phase: IngestPhase,
        message: String,
    },
    BatchFlushed {
        batch_number: u32,
        size: usize,
        written: usize,
    },
    Failed {
        error: String,
    },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Keeps every event in memory, in order.
#[derive(Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().map(|g| g.clone()).unwrap_or_default()
    }

    /// Phases reached, in order.
    pub fn phases(&self) -> Vec<IngestPhase> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ProgressEvent::Phase { phase, .. } => Some(phase),
                _ => None,
            })
            .collect()
    }

    /// Sizes of the flushed batches, in order.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ProgressEvent::BatchFlushed { size, .. } => Some(size),
                _ => None,
            })
            .collect()
    }
}

impl ProgressReporter for RecordingProgress {
    fn report(&self, event: ProgressEvent) {
        if let Ok(mut guard) = self.events.lock() {
            guard.push(event);
        }
    }
}
