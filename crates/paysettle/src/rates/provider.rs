//! Upstream exchange-rate API client.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, warn};

use super::{RateFetchError, RateTable};
use crate::sanitize::redact_secret_in_url;

/// Default connect timeout for rate requests.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Source of the latest rate table.
#[async_trait]
pub trait RateProvider: Send + Sync {
    async fn fetch_latest(&self) -> Result<RateTable, RateFetchError>;
}

/// Wire shape of `GET {base}/{key}/latest/{currency}`.
#[derive(Debug, Deserialize)]
struct LatestResponse {
    result: String,
    #[serde(rename = "error-type")]
    error_type: Option<String>,
    base_code: Option<String>,
    conversion_rates: Option<HashMap<String, f64>>,
}

/// Client for an exchangerate-api style `latest` endpoint.
pub struct HttpRateProvider {
    client: Client,
    base_url: String,
    api_key: SecretString,
    base_currency: String,
}

impl HttpRateProvider {
    pub fn new(
        base_url: impl Into<String>,
        api_key: SecretString,
        base_currency: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, RateFetchError> {
        let client = Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT.min(timeout))
            .timeout(timeout)
            .build()
            .map_err(|e| RateFetchError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            base_currency: base_currency.into(),
        })
    }

    fn latest_url(&self) -> String {
        format!(
            "{}/{}/latest/{}",
            self.base_url,
            self.api_key.expose_secret(),
            self.base_currency
        )
    }
}

#[async_trait]
impl RateProvider for HttpRateProvider {
    async fn fetch_latest(&self) -> Result<RateTable, RateFetchError> {
        let url = self.latest_url();
        let shown = redact_secret_in_url(&url, self.api_key.expose_secret());
        debug!(url = %shown, "Requesting exchange rates");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!(url = %shown, status = status.as_u16(), "Exchange rate request rejected");
            return Err(RateFetchError::Status {
                status: status.as_u16(),
            });
        }

        let body: LatestResponse = response.json().await?;
        if body.result != "success" {
            return Err(RateFetchError::ProviderFailure(
                body.error_type.unwrap_or(body.result),
            ));
        }

        let raw_rates = body
            .conversion_rates
            .ok_or_else(|| RateFetchError::Malformed("missing conversion_rates".to_string()))?;

        let mut conversion_rates = HashMap::with_capacity(raw_rates.len());
        for (code, value) in raw_rates {
            match Decimal::try_from(value) {
                Ok(rate) => {
                    conversion_rates.insert(code, rate);
                }
                Err(_) => warn!(currency = %code, value, "Ignoring unrepresentable rate"),
            }
        }

        Ok(RateTable {
            base_code: body.base_code.unwrap_or_else(|| self.base_currency.clone()),
            conversion_rates,
            fetched_at: Utc::now(),
        })
    }
}
