//! Test harness for isolated integration tests.
//!
//! Every harness owns a temp directory holding the SQLite file and the
//! upload storage root, and a manual clock fixed at 2025-06-02 10:00 UTC.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use tempfile::TempDir;

use paysettle::clock::{Clock, ManualClock};
use paysettle::db::{payment_repo, Database, PaymentFilter};
use paysettle::invoice::{
    ConsistencyMode, InvoiceEmail, InvoiceJob, InvoiceSettings, MailError, Mailer,
};
use paysettle::model::Payment;
use paysettle::notify::Notifier;
use paysettle::pipeline::{IngestionPipeline, PipelineConfig};
use paysettle::rates::{ExchangeRates, InMemoryRateCache, RateFetchError, RateProvider, RateTable};

/// Answers with a fixed table, or fails when it has none.
pub struct StaticRates(pub Option<RateTable>);

#[async_trait]
impl RateProvider for StaticRates {
    async fn fetch_latest(&self) -> Result<RateTable, RateFetchError> {
        self.0
            .clone()
            .ok_or_else(|| RateFetchError::Transport("connection refused".to_string()))
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub messages: Mutex<Vec<String>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

/// Captures sent invoices; fails for one recipient when asked to.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<InvoiceEmail>>,
    pub fail_for: Option<String>,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &InvoiceEmail) -> Result<(), MailError> {
        if self.fail_for.as_deref() == Some(email.to.as_str()) {
            return Err(MailError::Rejected {
                status: 550,
                body: "mailbox unavailable".to_string(),
            });
        }
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

pub struct TestHarness {
    temp_dir: TempDir,
    pub db: Database,
    pub clock: Arc<ManualClock>,
    pub storage_dir: PathBuf,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db = Database::open(&temp_dir.path().join("data").join("paysettle.db"))
            .expect("Failed to open database");
        let storage_dir = temp_dir.path().join("files");

        Self {
            temp_dir,
            db,
            clock: Arc::new(ManualClock::new(Self::start_time())),
            storage_dir,
        }
    }

    pub fn start_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, 10, 0, 0).unwrap()
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    pub fn exchange_rates(&self, provider: Arc<dyn RateProvider>) -> Arc<ExchangeRates> {
        Arc::new(ExchangeRates::new(
            provider,
            Arc::new(InMemoryRateCache::new(self.clock())),
            self.clock(),
            Duration::hours(24),
        ))
    }

    pub fn pipeline_with(
        &self,
        config: PipelineConfig,
        rates: Arc<ExchangeRates>,
        notifier: Arc<dyn Notifier>,
    ) -> Arc<IngestionPipeline> {
        Arc::new(IngestionPipeline::new(
            config,
            rates,
            Arc::new(self.db.clone()),
            notifier,
            self.clock(),
        ))
    }

    /// Pipeline with default config and fixed rates.
    pub fn pipeline(
        &self,
        table: Option<RateTable>,
        notifier: Arc<dyn Notifier>,
    ) -> Arc<IngestionPipeline> {
        let rates = self.exchange_rates(Arc::new(StaticRates(table)));
        self.pipeline_with(PipelineConfig::default(), rates, notifier)
    }

    pub fn invoice_job(&self, mailer: Arc<dyn Mailer>, mode: ConsistencyMode) -> InvoiceJob {
        InvoiceJob::new(
            Arc::new(self.db.clone()),
            Arc::new(self.db.clone()),
            mailer,
            self.clock(),
            InvoiceSettings {
                consistency: mode,
                from: "billing@iposg.test".to_string(),
                ..InvoiceSettings::default()
            },
        )
    }

    /// All stored payments, oldest first.
    pub fn payments(&self) -> Vec<Payment> {
        let filter = PaymentFilter {
            limit: Some(10_000),
            ..PaymentFilter::default()
        };
        let (mut rows, _) = payment_repo::query(&self.db, &filter).expect("query payments");
        rows.reverse();
        rows
    }

    pub fn path(&self) -> &std::path::Path {
        self.temp_dir.path()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
