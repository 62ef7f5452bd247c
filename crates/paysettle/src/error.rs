use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PaysettleError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Exchange rate error: {0}")]
    Rates(#[from] crate::rates::RateFetchError),

    #[error("Ingestion failed: {0}")]
    Pipeline(#[from] crate::pipeline::PipelineError),

    #[error("Invoice run failed: {0}")]
    Invoice(#[from] crate::invoice::InvoiceError),

    #[error("Upload rejected: {0}")]
    Upload(#[from] crate::upload::UploadError),

    #[error("Payment rejected: {0}")]
    Payment(#[from] crate::payments::PaymentError),

    #[error("Mail transport error: {0}")]
    Mail(#[from] crate::invoice::MailError),

    #[error("Alert webhook error: {0}")]
    Notify(#[from] crate::notify::NotifyError),

    #[error("Logging setup failed: {0}")]
    Telemetry(#[from] crate::telemetry::TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Secret for '{field}' could not be resolved: {source}")]
    Secret {
        field: String,
        #[source]
        source: crate::secrets::SecretError,
    },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to spawn worker: {0}")]
    SpawnFailed(String),

    #[error("Worker channel closed unexpectedly")]
    ChannelClosed,

    #[error("Failed to watch directory: {0}")]
    WatchError(String),
}

pub type Result<T> = std::result::Result<T, PaysettleError>;
