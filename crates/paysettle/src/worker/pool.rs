use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, error, info};

use crate::error::WorkerError;
use crate::pipeline::{IngestionPipeline, NoopProgress};
use crate::worker::job::{IngestJob, IngestResult};

/// Anything that accepts ingestion jobs.
pub trait JobSink: Send + Sync {
    fn submit(&self, job: IngestJob) -> Result<(), WorkerError>;
}

/// Fixed set of OS threads running ingestion jobs one at a time each.
pub struct WorkerPool {
    job_sender: Sender<IngestJob>,
    result_receiver: Receiver<IngestResult>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Starts `worker_count` workers sharing one pipeline.
    ///
    /// # Panics
    /// Panics if `worker_count` is 0.
    pub fn new(pipeline: Arc<IngestionPipeline>, worker_count: usize) -> Result<Self, WorkerError> {
        assert!(worker_count > 0, "worker_count must be > 0");
        let (job_sender, job_receiver) = bounded::<IngestJob>(worker_count * 2);
        let (result_sender, result_receiver) = bounded::<IngestResult>(worker_count * 2);
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let job_rx = job_receiver.clone();
            let result_tx = result_sender.clone();
            let shutdown_flag = Arc::clone(&shutdown);
            let worker_pipeline = Arc::clone(&pipeline);

            let handle = thread::Builder::new()
                .name(format!("ingest-worker-{}", worker_id))
                .spawn(move || {
                    run_worker(worker_id, job_rx, result_tx, shutdown_flag, worker_pipeline);
                })
                .map_err(|e| WorkerError::SpawnFailed(e.to_string()))?;

            workers.push(handle);
        }

        info!("Started {} ingestion workers", worker_count);

        Ok(Self {
            job_sender,
            result_receiver,
            workers,
            shutdown,
        })
    }

    pub fn submit(&self, job: IngestJob) -> Result<(), WorkerError> {
        if self.shutdown.load(Ordering::Relaxed) {
            return Err(WorkerError::ChannelClosed);
        }

        self.job_sender
            .send(job)
            .map_err(|_| WorkerError::ChannelClosed)
    }

    /// A cloneable handle for submitting jobs from elsewhere.
    pub fn submitter(&self) -> JobSubmitter {
        JobSubmitter {
            sender: self.job_sender.clone(),
            shutdown: Arc::clone(&self.shutdown),
        }
    }

    pub fn try_recv_result(&self) -> Option<IngestResult> {
        self.result_receiver.try_recv().ok()
    }

    pub fn recv_result(&self) -> Option<IngestResult> {
        self.result_receiver.recv().ok()
    }

    pub fn recv_result_timeout(&self, timeout: Duration) -> Option<IngestResult> {
        self.result_receiver.recv_timeout(timeout).ok()
    }

    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn wait(self) {
        // Drop sender to signal workers to exit
        drop(self.job_sender);

        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

impl JobSink for WorkerPool {
    fn submit(&self, job: IngestJob) -> Result<(), WorkerError> {
        WorkerPool::submit(self, job)
    }
}

/// Job intake detached from the pool's lifetime.
#[derive(Clone)]
pub struct JobSubmitter {
    sender: Sender<IngestJob>,
    shutdown: Arc<AtomicBool>,
}

impl JobSink for JobSubmitter {
    fn submit(&self, job: IngestJob) -> Result<(), WorkerError> {
        if self.shutdown.load(Ordering::Relaxed) {
            return Err(WorkerError::ChannelClosed);
        }
        self.sender.send(job).map_err(|_| WorkerError::ChannelClosed)
    }
}

fn run_worker(
    worker_id: usize,
    job_receiver: Receiver<IngestJob>,
    result_sender: Sender<IngestResult>,
    shutdown: Arc<AtomicBool>,
    pipeline: Arc<IngestionPipeline>,
) {
    debug!("Worker {} started", worker_id);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!("Worker {} failed to create runtime: {}", worker_id, e);
            return;
        }
    };

    loop {
        if shutdown.load(Ordering::Relaxed) {
            debug!("Worker {} received shutdown signal", worker_id);
            break;
        }

        match job_receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(job) => {
                debug!("Worker {} processing file {}", worker_id, job.file_id);

                let result = match runtime.block_on(pipeline.run(job.clone(), &NoopProgress)) {
                    Ok(summary) => IngestResult::success(&job, summary),
                    Err(e) => IngestResult::failure(&job, e.to_string()),
                };

                if let Err(e) = result_sender.send(result) {
                    error!("Worker {} failed to send result: {}", worker_id, e);
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                continue;
            }
            Err(RecvTimeoutError::Disconnected) => {
                debug!("Worker {} job channel disconnected", worker_id);
                break;
            }
        }
    }

    debug!("Worker {} stopped", worker_id);
}
