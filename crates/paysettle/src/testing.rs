//! Test doubles shared by unit tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;

use crate::clock::{Clock, SystemClock};
use crate::db::Database;
use crate::notify::Notifier;
use crate::pipeline::{IngestionPipeline, PipelineConfig};
use crate::rates::{ExchangeRates, InMemoryRateCache, RateFetchError, RateProvider, RateTable};

/// Always answers with the same table, or fails when it has none.
pub struct FixedRates(pub Option<RateTable>);

#[async_trait]
impl RateProvider for FixedRates {
    async fn fetch_latest(&self) -> Result<RateTable, RateFetchError> {
        self.0
            .clone()
            .ok_or_else(|| RateFetchError::Transport("connection refused".into()))
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

pub fn rate_table(pairs: &[(&str, Decimal)]) -> RateTable {
    RateTable {
        base_code: "USD".into(),
        conversion_rates: pairs.iter().map(|(c, r)| (c.to_string(), *r)).collect(),
        fetched_at: Utc::now(),
    }
}

pub fn usd_lkr() -> RateTable {
    rate_table(&[("USD", Decimal::ONE), ("LKR", Decimal::new(3000, 1))])
}

pub fn exchange_rates(table: Option<RateTable>, clock: Arc<dyn Clock>) -> Arc<ExchangeRates> {
    Arc::new(ExchangeRates::new(
        Arc::new(FixedRates(table)),
        Arc::new(InMemoryRateCache::new(clock.clone())),
        clock,
        Duration::hours(24),
    ))
}

pub fn pipeline(
    db: &Database,
    config: PipelineConfig,
    table: Option<RateTable>,
    notifier: Arc<RecordingNotifier>,
) -> IngestionPipeline {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    IngestionPipeline::new(
        config,
        exchange_rates(table, clock.clone()),
        Arc::new(db.clone()),
        notifier,
        clock,
    )
}
