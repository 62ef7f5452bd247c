//! Daily invoice scheduler.
//!
//! Sleeps until the next configured wall-clock time (UTC) and runs the
//! invoice job. A broadcast trigger runs it immediately instead.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::{DateTime, NaiveTime, Utc};
use tokio::sync::broadcast;

use super::error::InvoiceError;
use super::job::InvoiceJob;
use crate::clock::Clock;
use crate::error::WorkerError;

/// Parses an `HH:MM` run time.
pub fn parse_run_at(value: &str) -> Result<NaiveTime, InvoiceError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|_| InvoiceError::InvalidRunAt(value.to_string()))
}

/// The first `run_at` strictly after `now`.
pub fn next_run_after(now: DateTime<Utc>, run_at: NaiveTime) -> DateTime<Utc> {
    let today = now.date_naive().and_time(run_at).and_utc();
    if today > now {
        today
    } else {
        today + chrono::Duration::days(1)
    }
}

pub struct InvoiceScheduler {
    job: Arc<InvoiceJob>,
    run_at: NaiveTime,
    clock: Arc<dyn Clock>,
    shutdown: Arc<AtomicBool>,
}

impl InvoiceScheduler {
    pub fn new(job: Arc<InvoiceJob>, run_at: NaiveTime, clock: Arc<dyn Clock>) -> Self {
        Self {
            job,
            run_at,
            clock,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Starts the schedule loop on its own thread.
    ///
    /// Every message on `trigger_rx` runs the job once, out of schedule.
    pub fn start(
        &self,
        mut trigger_rx: broadcast::Receiver<()>,
    ) -> Result<JoinHandle<()>, WorkerError> {
        let job = Arc::clone(&self.job);
        let clock = Arc::clone(&self.clock);
        let shutdown = Arc::clone(&self.shutdown);
        let run_at = self.run_at;

        std::thread::Builder::new()
            .name("invoice-scheduler".to_string())
            .spawn(move || {
                let rt = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        log::error!("Invoice scheduler failed to create runtime: {}", e);
                        return;
                    }
                };

                rt.block_on(async {
                    loop {
                        if shutdown.load(Ordering::Acquire) {
                            break;
                        }

                        let now = clock.now();
                        let next = next_run_after(now, run_at);
                        let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
                        log::debug!("Next invoice run at {}", next);

                        tokio::select! {
                            _ = tokio::time::sleep(wait) => {
                                log::info!("Scheduled invoice run");
                            },
                            Ok(()) = trigger_rx.recv() => {
                                log::info!("Manual invoice run triggered");
                            },
                        }

                        if shutdown.load(Ordering::Acquire) {
                            break;
                        }

                        match job.run().await {
                            Ok(report) if !report.failures.is_empty() => log::warn!(
                                "Invoice run: {} customers invoiced, {} failed",
                                report.customers_invoiced,
                                report.failures.len()
                            ),
                            Ok(report) => log::info!(
                                "Invoice run: {} customers invoiced",
                                report.customers_invoiced
                            ),
                            Err(e) => log::error!("Invoice run failed: {}", e),
                        }
                    }
                });
            })
            .map_err(|e| WorkerError::SpawnFailed(e.to_string()))
    }

    /// Signals the scheduler to stop. Send a trigger afterwards to wake it.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Release);
    }
}
