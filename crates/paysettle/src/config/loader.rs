use std::path::{Path, PathBuf};

use secrecy::SecretString;

use crate::config::schema::{Config, MAX_RATE_TTL_HOURS};
use crate::error::ConfigError;
use crate::invoice::parse_run_at;
use crate::secrets::{expand_home, SecretRef};

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.worker_count == 0 {
        return Err(ConfigError::Validation {
            message: "worker_count must be at least 1".to_string(),
        });
    }

    if config.ingestion.batch_size == 0 {
        return Err(ConfigError::Validation {
            message: "ingestion.batch_size must be at least 1".to_string(),
        });
    }

    if config.upload.max_file_size == 0 {
        return Err(ConfigError::Validation {
            message: "upload.max_file_size must be greater than 0".to_string(),
        });
    }

    let ttl = config.exchange_rates.ttl_hours;
    if ttl == 0 || ttl > MAX_RATE_TTL_HOURS {
        return Err(ConfigError::Validation {
            message: format!(
                "exchange_rates.ttl_hours must be between 1 and {}, got {}",
                MAX_RATE_TTL_HOURS, ttl
            ),
        });
    }

    if let Err(e) = parse_run_at(&config.invoice.run_at) {
        return Err(ConfigError::Validation {
            message: e.to_string(),
        });
    }

    Ok(())
}

impl Config {
    /// Database file with `~` expanded.
    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(expand_home(&self.database_path))
    }

    /// Upload storage root with `~` expanded.
    pub fn storage_directory(&self) -> PathBuf {
        PathBuf::from(expand_home(&self.storage_directory))
    }

    /// How long fetched rates stay usable as a fallback.
    pub fn rates_ttl(&self) -> Result<chrono::Duration, ConfigError> {
        let hours = self.exchange_rates.ttl_hours;
        i64::try_from(hours)
            .ok()
            .filter(|h| (1..=MAX_RATE_TTL_HOURS as i64).contains(h))
            .and_then(chrono::Duration::try_hours)
            .ok_or_else(|| ConfigError::Validation {
                message: format!("exchange_rates.ttl_hours out of range: {}", hours),
            })
    }

    /// Resolves the exchange-rate API key. One source is required.
    pub fn rates_api_key(&self) -> Result<SecretString, ConfigError> {
        let rates = &self.exchange_rates;
        SecretRef {
            value: rates.api_key.as_deref(),
            file: rates.api_key_file.as_deref(),
            env: rates.api_key_env.as_deref(),
        }
        .resolve()
        .map_err(|source| ConfigError::Secret {
            field: "exchange_rates.api_key".to_string(),
            source,
        })
    }

    /// Resolves the alert webhook URL, `None` when alerts are off.
    pub fn alerts_webhook_url(&self) -> Result<Option<SecretString>, ConfigError> {
        let alerts = &self.alerts;
        SecretRef {
            value: alerts.webhook_url.as_deref(),
            file: alerts.webhook_url_file.as_deref(),
            env: alerts.webhook_url_env.as_deref(),
        }
        .resolve_optional()
        .map_err(|source| ConfigError::Secret {
            field: "alerts.webhook_url".to_string(),
            source,
        })
    }
}
