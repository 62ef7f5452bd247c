//! Exchange rates: a cached table of USD-based conversion rates.
//!
//! A successful refresh replaces the cached table for the configured TTL.
//! A failed refresh serves the cached table if one is still live and only
//! errors when there is nothing to fall back on.

pub mod cache;
pub mod error;
pub mod provider;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::clock::Clock;

pub use cache::{InMemoryRateCache, RateCache};
pub use error::RateFetchError;
pub use provider::{HttpRateProvider, RateProvider};

/// Snapshot of conversion rates keyed by ISO currency code.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateTable {
    pub base_code: String,
    pub conversion_rates: HashMap<String, Decimal>,
    pub fetched_at: DateTime<Utc>,
}

impl RateTable {
    /// Rate for one unit of the base currency, or `None` if unknown.
    pub fn rate(&self, code: &str) -> Option<Decimal> {
        self.conversion_rates.get(code).copied()
    }
}

/// The rate service used by ingestion.
pub struct ExchangeRates {
    provider: Arc<dyn RateProvider>,
    cache: Arc<dyn RateCache>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl ExchangeRates {
    pub fn new(
        provider: Arc<dyn RateProvider>,
        cache: Arc<dyn RateCache>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
    ) -> Self {
        Self {
            provider,
            cache,
            clock,
            ttl,
        }
    }

    /// Fetches fresh rates, falling back to the cached table on failure.
    pub async fn refresh(&self) -> Result<RateTable, RateFetchError> {
        match self.provider.fetch_latest().await {
            Ok(mut table) => {
                table.fetched_at = self.clock.now();
                info!(
                    base = %table.base_code,
                    currencies = table.conversion_rates.len(),
                    "Exchange rates refreshed"
                );
                self.cache.put(table.clone(), self.ttl);
                Ok(table)
            }
            Err(e) => match self.cache.get() {
                Some(cached) => {
                    warn!(
                        error = %e,
                        fetched_at = %cached.fetched_at,
                        "Exchange rate refresh failed, using cached rates"
                    );
                    Ok(cached)
                }
                None => {
                    error!(error = %e, "Exchange rate refresh failed with no cached rates");
                    Err(RateFetchError::NoFallback {
                        source: Box::new(e),
                    })
                }
            },
        }
    }

    /// Rate for `code` from the cached table. Ingestion looks rates up on
    /// the table [`refresh`](Self::refresh) returned instead, which is the
    /// same table unless another run refreshed in between.
    pub fn rate(&self, code: &str) -> Option<Decimal> {
        self.cache.get()?.rate(code)
    }

    /// The cached table, if any.
    pub fn current(&self) -> Option<RateTable> {
        self.cache.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use std::sync::Mutex;

    /// Replays a scripted sequence of responses.
    struct ScriptedProvider {
        responses: Mutex<Vec<Result<RateTable, RateFetchError>>>,
    }

    impl ScriptedProvider {
        fn new(mut responses: Vec<Result<RateTable, RateFetchError>>) -> Self {
            responses.reverse();
            Self {
                responses: Mutex::new(responses),
            }
        }
    }

    #[async_trait]
    impl RateProvider for ScriptedProvider {
        async fn fetch_latest(&self) -> Result<RateTable, RateFetchError> {
            self.responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(RateFetchError::Transport("exhausted".into())))
        }
    }

    fn table(pairs: &[(&str, Decimal)]) -> RateTable {
        RateTable {
            base_code: "USD".to_string(),
            conversion_rates: pairs.iter().map(|(c, r)| (c.to_string(), *r)).collect(),
            fetched_at: Utc::now(),
        }
    }

    fn service(
        responses: Vec<Result<RateTable, RateFetchError>>,
    ) -> (ExchangeRates, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap(),
        ));
        let cache = Arc::new(InMemoryRateCache::new(clock.clone()));
        let rates = ExchangeRates::new(
            Arc::new(ScriptedProvider::new(responses)),
            cache,
            clock.clone(),
            Duration::hours(24),
        );
        (rates, clock)
    }

    #[tokio::test]
    async fn test_refresh_caches_successful_fetch() {
        let (rates, clock) = service(vec![Ok(table(&[("LKR", dec!(300))]))]);

        let fetched = rates.refresh().await.unwrap();

        assert_eq!(fetched.fetched_at, clock.now());
        assert_eq!(rates.rate("LKR"), Some(dec!(300)));
        assert_eq!(rates.rate("XYZ"), None);
    }

    #[tokio::test]
    async fn test_failed_refresh_returns_cached_table_unchanged() {
        let (rates, _clock) = service(vec![
            Ok(table(&[("LKR", dec!(300))])),
            Err(RateFetchError::Status { status: 500 }),
        ]);

        let first = rates.refresh().await.unwrap();
        let second = rates.refresh().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(rates.rate("LKR"), Some(dec!(300)));
    }

    #[tokio::test]
    async fn test_failed_refresh_without_cache_propagates() {
        let (rates, _clock) = service(vec![Err(RateFetchError::Transport("refused".into()))]);

        let err = rates.refresh().await.unwrap_err();

        assert!(matches!(err, RateFetchError::NoFallback { .. }));
        assert!(rates.current().is_none());
    }

    #[tokio::test]
    async fn test_expired_cache_is_not_a_fallback() {
        let (rates, clock) = service(vec![
            Ok(table(&[("LKR", dec!(300))])),
            Err(RateFetchError::Status { status: 502 }),
        ]);

        rates.refresh().await.unwrap();
        clock.advance(Duration::hours(25));

        assert!(rates.refresh().await.is_err());
    }

    #[test]
    fn test_rate_is_none_before_first_refresh() {
        let (rates, _clock) = service(vec![]);
        assert_eq!(rates.rate("USD"), None);
    }
}
