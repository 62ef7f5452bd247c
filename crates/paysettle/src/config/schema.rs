use serde::{Deserialize, Serialize};

use crate::invoice::ConsistencyMode;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default = "default_storage_directory")]
    pub storage_directory: String,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    pub exchange_rates: ExchangeRatesConfig,
    #[serde(default)]
    pub ingestion: IngestionConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
    #[serde(default)]
    pub invoice: InvoiceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_database_path() -> String {
    "~/.paysettle/data/paysettle.db".to_string()
}

fn default_storage_directory() -> String {
    "~/.paysettle/files".to_string()
}

fn default_worker_count() -> usize {
    num_cpus::get()
}

/// Where and how exchange rates are fetched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeRatesConfig {
    pub base_url: String,
    #[serde(default = "default_base_currency")]
    pub base_currency: String,
    /// API key given directly (local testing only).
    #[serde(default)]
    pub api_key: Option<String>,
    /// File holding the API key.
    #[serde(default)]
    pub api_key_file: Option<String>,
    /// Environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_currency() -> String {
    "USD".to_string()
}

/// Longest rate cache lifetime accepted, one year.
pub const MAX_RATE_TTL_HOURS: u64 = 24 * 365;

fn default_ttl_hours() -> u64 {
    24
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_error_sample_limit")]
    pub error_sample_limit: usize,
    /// Skip rows whose reference was already stored for the same file.
    #[serde(default)]
    pub deduplicate_references: bool,
}

fn default_batch_size() -> usize {
    100
}

fn default_error_sample_limit() -> usize {
    50
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            error_sample_limit: default_error_sample_limit(),
            deduplicate_references: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024
}

fn default_allowed_extensions() -> Vec<String> {
    vec!["csv".to_string(), "txt".to_string()]
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: default_max_file_size(),
            allowed_extensions: default_allowed_extensions(),
        }
    }
}

/// Chat webhook alerts. Disabled when no URL source is set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertsConfig {
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub webhook_url_file: Option<String>,
    #[serde(default)]
    pub webhook_url_env: Option<String>,
    /// A digest is sent when more rows than this were processed.
    #[serde(default)]
    pub threshold: u64,
    #[serde(default = "default_alert_timeout")]
    pub timeout_secs: u64,
}

fn default_alert_timeout() -> u64 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceConfig {
    /// Daily run time, `HH:MM` in UTC.
    #[serde(default = "default_run_at")]
    pub run_at: String,
    #[serde(default)]
    pub consistency: ConsistencyMode,
    #[serde(default = "default_subject")]
    pub subject: String,
    #[serde(default = "default_company_name")]
    pub company_name: String,
    /// Mail relay endpoint. Invoices are only logged when absent.
    #[serde(default)]
    pub relay_url: Option<String>,
    #[serde(default = "default_from")]
    pub from: String,
    #[serde(default = "default_mail_timeout")]
    pub timeout_secs: u64,
}

fn default_run_at() -> String {
    "21:00".to_string()
}

fn default_subject() -> String {
    "Your Daily Invoice".to_string()
}

fn default_company_name() -> String {
    "IPOSG".to_string()
}

fn default_from() -> String {
    "billing@localhost".to_string()
}

fn default_mail_timeout() -> u64 {
    30
}

impl Default for InvoiceConfig {
    fn default() -> Self {
        Self {
            run_at: default_run_at(),
            consistency: ConsistencyMode::default(),
            subject: default_subject(),
            company_name: default_company_name(),
            relay_url: None,
            from: default_from(),
            timeout_secs: default_mail_timeout(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: default_log_level(),
        }
    }
}
