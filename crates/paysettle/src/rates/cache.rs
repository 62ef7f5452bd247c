//! The single process-wide rate slot.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};

use super::RateTable;
use crate::clock::Clock;

/// Storage for the most recent rate table.
///
/// Entries expire after the TTL given to `put`; an expired entry is
/// indistinguishable from an empty cache.
pub trait RateCache: Send + Sync {
    fn get(&self) -> Option<RateTable>;
    fn put(&self, table: RateTable, ttl: Duration);
}

struct Entry {
    table: RateTable,
    expires_at: DateTime<Utc>,
}

/// In-process cache driven by an injected clock.
pub struct InMemoryRateCache {
    slot: RwLock<Option<Entry>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryRateCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            slot: RwLock::new(None),
            clock,
        }
    }
}

impl RateCache for InMemoryRateCache {
    fn get(&self) -> Option<RateTable> {
        let guard = self.slot.read().ok()?;
        let entry = guard.as_ref()?;
        if self.clock.now() >= entry.expires_at {
            return None;
        }
        Some(entry.table.clone())
    }

    fn put(&self, table: RateTable, ttl: Duration) {
        let expires_at = self.clock.now() + ttl;
        match self.slot.write() {
            Ok(mut guard) => *guard = Some(Entry { table, expires_at }),
            Err(poisoned) => *poisoned.into_inner() = Some(Entry { table, expires_at }),
        }
    }
}
