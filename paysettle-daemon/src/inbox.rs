//! Watches a directory for CSV drops and hands them to the upload service.
//!
//! Accepted files move to `accepted/`, files the upload policy refuses move
//! to `rejected/`. A file that failed for any other reason (database, queue)
//! stays in place and is retried.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use notify::{Config as NotifyConfig, PollWatcher, RecursiveMode, Watcher};
use notify_debouncer_mini::{new_debouncer_opt, Config as DebouncerConfig, DebouncedEventKind};
use paysettle::upload::{UploadError, UploadService};
use paysettle::WorkerError;
use walkdir::WalkDir;

const ACCEPTED_DIR: &str = "accepted";
const REJECTED_DIR: &str = "rejected";

/// Quiet period before a burst of changes is handled.
const DEBOUNCE: Duration = Duration::from_millis(500);

pub struct Inbox {
    root: PathBuf,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub accepted: usize,
    pub rejected: usize,
    /// Left in the inbox after a transient failure.
    pub deferred: usize,
}

impl ScanReport {
    fn is_empty(&self) -> bool {
        self.accepted + self.rejected + self.deferred == 0
    }
}

enum Outcome {
    Accepted,
    Rejected,
    Deferred,
}

impl Inbox {
    pub fn new(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(root.join(ACCEPTED_DIR))?;
        fs::create_dir_all(root.join(REJECTED_DIR))?;
        Ok(Self { root })
    }

    fn is_candidate(&self, path: &Path) -> bool {
        path.parent() == Some(self.root.as_path())
            && path.is_file()
            && !path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with('.'))
    }

    /// Files waiting at the top level of the inbox, in name order.
    fn pending(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|e| e.into_path())
            .filter(|path| self.is_candidate(path))
            .collect();
        files.sort();
        files
    }

    /// Submits every pending file once.
    pub fn scan(&self, uploads: &UploadService) -> ScanReport {
        let mut report = ScanReport::default();
        for path in self.pending() {
            match self.submit(&path, uploads) {
                Outcome::Accepted => report.accepted += 1,
                Outcome::Rejected => report.rejected += 1,
                Outcome::Deferred => report.deferred += 1,
            }
        }
        report
    }

    fn submit(&self, path: &Path, uploads: &UploadService) -> Outcome {
        let name = file_name(path);
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Cannot read inbox file {}: {}", name, e);
                return Outcome::Deferred;
            }
        };

        match uploads.accept(&name, None, &bytes) {
            Ok(receipt) => {
                info!("Inbox file {} queued as {}", name, receipt.reference_id);
                self.archive(path, ACCEPTED_DIR);
                Outcome::Accepted
            }
            Err(UploadError::Validation(reason)) => {
                warn!("Inbox file {} rejected: {}", name, reason);
                self.archive(path, REJECTED_DIR);
                Outcome::Rejected
            }
            Err(e) => {
                warn!("Inbox file {} left for retry: {}", name, e);
                Outcome::Deferred
            }
        }
    }

    fn archive(&self, path: &Path, bucket: &str) {
        let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S");
        let target = self
            .root
            .join(bucket)
            .join(format!("{}-{}", stamp, file_name(path)));
        if let Err(e) = fs::rename(path, &target) {
            error!("Failed to move {} to {}: {}", path.display(), bucket, e);
        }
    }

    /// Scans once, then rescans whenever the watcher reports a new or
    /// changed file, until `shutdown` is set. Deferred files are retried
    /// every `poll_interval`.
    pub fn watch(
        &self,
        uploads: &UploadService,
        poll_interval: Duration,
        shutdown: Arc<AtomicBool>,
    ) -> Result<(), WorkerError> {
        // PollWatcher also works on network and container mounts
        let debouncer_config = DebouncerConfig::default()
            .with_timeout(DEBOUNCE)
            .with_notify_config(NotifyConfig::default().with_poll_interval(poll_interval));

        let (tx, rx) = mpsc::channel();
        let mut debouncer = new_debouncer_opt::<_, PollWatcher>(debouncer_config, tx)
            .map_err(|e| WorkerError::WatchError(e.to_string()))?;
        debouncer
            .watcher()
            .watch(&self.root, RecursiveMode::NonRecursive)
            .map_err(|e| WorkerError::WatchError(e.to_string()))?;

        info!("Watching inbox {}", self.root.display());
        let mut retry_at = self.rescan(uploads, poll_interval);

        while !shutdown.load(Ordering::Relaxed) {
            match rx.recv_timeout(Duration::from_millis(100)) {
                Ok(Ok(events)) => {
                    let changed = events.iter().any(|event| {
                        matches!(event.kind, DebouncedEventKind::Any)
                            && self.is_candidate(&event.path)
                    });
                    if changed {
                        retry_at = self.rescan(uploads, poll_interval);
                    }
                }
                Ok(Err(e)) => warn!("Inbox watch error: {:?}", e),
                Err(RecvTimeoutError::Timeout) => {
                    if retry_at.is_some_and(|at| Instant::now() >= at) {
                        debug!("Retrying deferred inbox files");
                        retry_at = self.rescan(uploads, poll_interval);
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    error!("Inbox watch channel disconnected");
                    break;
                }
            }
        }

        info!("Inbox watcher shutting down");
        Ok(())
    }

    /// Scans and returns when to retry, if anything was deferred.
    fn rescan(&self, uploads: &UploadService, retry_after: Duration) -> Option<Instant> {
        let report = self.scan(uploads);
        if !report.is_empty() {
            info!(
                "Inbox scan: {} queued, {} rejected, {} deferred",
                report.accepted, report.rejected, report.deferred
            );
        }
        (report.deferred > 0).then(|| Instant::now() + retry_after)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
