pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod invoice;
pub mod model;
pub mod notify;
pub mod payments;
pub mod pipeline;
pub mod rates;
pub mod row;
pub mod sanitize;
pub mod secrets;
pub mod storage;
pub mod telemetry;
pub mod upload;
pub mod worker;

#[cfg(test)]
mod testing;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{load_config, load_config_from_str, Config};
pub use db::{Database, DatabaseError, InvoiceStore, PaymentStore};
pub use error::{ConfigError, PaysettleError, Result, StorageError, WorkerError};
pub use invoice::{ConsistencyMode, InvoiceJob, InvoiceRunReport, InvoiceScheduler};
pub use model::{FileRecord, Invoice, NewPayment, Payment};
pub use notify::{NoopNotifier, Notifier, WebhookNotifier};
pub use payments::{NewPaymentRequest, PaymentService};
pub use pipeline::{IngestionPipeline, IngestionSummary, PipelineConfig};
pub use rates::{ExchangeRates, RateTable};
pub use secrets::{SecretError, SecretRef};
pub use upload::{UploadReceipt, UploadService};
pub use worker::{IngestJob, WorkerPool};
