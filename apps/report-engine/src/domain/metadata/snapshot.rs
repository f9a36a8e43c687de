//! Read-only store snapshot for diagnostics.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::record::{CacheHistoryRecord, CacheRecord};
use crate::domain::clock::Millis;

/// Point-in-time copy of the whole store, keyed by symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    /// Process-wide default refresh interval.
    pub global_refresh_interval_ms: Millis,
    /// Per-symbol state, sorted by symbol.
    pub tickers: BTreeMap<String, TickerSnapshot>,
}

/// Snapshot of one symbol's cache state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerSnapshot {
    /// Global interval at the time of the snapshot.
    pub global_refresh_interval_ms: Millis,
    /// Per-key interval overrides.
    pub intervals: BTreeMap<String, Millis>,
    /// Latest record per key.
    pub latest: BTreeMap<String, CacheRecord<Value>>,
    /// History per key, oldest first.
    pub history: BTreeMap<String, Vec<CacheHistoryRecord<Value>>>,
}

impl StoreSnapshot {
    /// Total number of cached slots across all symbols.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.tickers.values().map(|t| t.latest.len()).sum()
    }
}
