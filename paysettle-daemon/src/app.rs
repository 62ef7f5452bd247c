//! Wires library services together from a loaded [`Config`].

use std::sync::Arc;
use std::time::Duration;

use paysettle::clock::{Clock, SystemClock};
use paysettle::config::Config;
use paysettle::db::{Database, InvoiceStore, PaymentStore};
use paysettle::invoice::{HttpMailer, InvoiceJob, InvoiceSettings, LogMailer, Mailer};
use paysettle::notify::{NoopNotifier, Notifier, WebhookNotifier};
use paysettle::payments::PaymentService;
use paysettle::pipeline::{IngestionPipeline, PipelineConfig};
use paysettle::rates::{ExchangeRates, HttpRateProvider, InMemoryRateCache};
use paysettle::storage::FilesystemBlobStore;
use paysettle::upload::{UploadPolicy, UploadService};
use paysettle::worker::JobSink;
use paysettle::Result;

pub struct App {
    pub config: Config,
    pub db: Database,
    pub clock: Arc<dyn Clock>,
}

impl App {
    pub fn open(config: Config) -> Result<Self> {
        let db = Database::open(&config.database_path())?;
        Ok(Self {
            config,
            db,
            clock: Arc::new(SystemClock),
        })
    }

    fn exchange_rates(&self) -> Result<Arc<ExchangeRates>> {
        let rates = &self.config.exchange_rates;
        let provider = HttpRateProvider::new(
            rates.base_url.clone(),
            self.config.rates_api_key()?,
            rates.base_currency.clone(),
            Duration::from_secs(rates.timeout_secs),
        )?;

        Ok(Arc::new(ExchangeRates::new(
            Arc::new(provider),
            Arc::new(InMemoryRateCache::new(Arc::clone(&self.clock))),
            Arc::clone(&self.clock),
            self.config.rates_ttl()?,
        )))
    }

    fn notifier(&self) -> Result<Arc<dyn Notifier>> {
        match self.config.alerts_webhook_url()? {
            Some(url) => {
                let timeout = Duration::from_secs(self.config.alerts.timeout_secs);
                Ok(Arc::new(WebhookNotifier::new(url, timeout)?))
            }
            None => Ok(Arc::new(NoopNotifier)),
        }
    }

    fn mailer(&self) -> Result<Arc<dyn Mailer>> {
        let invoice = &self.config.invoice;
        match &invoice.relay_url {
            Some(url) => {
                let timeout = Duration::from_secs(invoice.timeout_secs);
                Ok(Arc::new(HttpMailer::new(url.clone(), timeout)?))
            }
            None => {
                log::warn!("No mail relay configured, invoices will only be logged");
                Ok(Arc::new(LogMailer))
            }
        }
    }

    pub fn pipeline(&self) -> Result<Arc<IngestionPipeline>> {
        let store: Arc<dyn PaymentStore> = Arc::new(self.db.clone());
        Ok(Arc::new(IngestionPipeline::new(
            PipelineConfig::from_config(&self.config),
            self.exchange_rates()?,
            store,
            self.notifier()?,
            Arc::clone(&self.clock),
        )))
    }

    pub fn upload_service(&self, jobs: Arc<dyn JobSink>) -> UploadService {
        UploadService::new(
            UploadPolicy::from_config(&self.config),
            Arc::new(FilesystemBlobStore::new(self.config.storage_directory())),
            self.db.clone(),
            jobs,
        )
    }

    pub fn invoice_job(&self) -> Result<Arc<InvoiceJob>> {
        let payments: Arc<dyn PaymentStore> = Arc::new(self.db.clone());
        let invoices: Arc<dyn InvoiceStore> = Arc::new(self.db.clone());
        Ok(Arc::new(InvoiceJob::new(
            payments,
            invoices,
            self.mailer()?,
            Arc::clone(&self.clock),
            InvoiceSettings::from_config(&self.config),
        )))
    }

    pub fn payment_service(&self) -> PaymentService {
        PaymentService::new(self.db.clone(), Arc::clone(&self.clock))
    }
}
