//! Metadata Store
//!
//! Per-(symbol, metric-key) cache of the latest computed value with a
//! bounded, append-only, versioned history and a two-level refresh
//! interval policy (per-slot override, else global default).
//!
//! # Design
//!
//! - Payloads are kept as `serde_json::Value`; the public API is generic
//!   so every call site reads and writes its own concrete type. A value
//!   that cannot be encoded is rejected before anything is committed, and
//!   a stored payload that does not decode as the requested type is an
//!   error, never a cache miss.
//! - Time is always supplied by the caller. The store never samples a
//!   clock, which keeps every decision deterministic under test.
//! - State sits behind a single `RwLock`. Each operation is atomic and no
//!   lock is ever held across an `.await`.
//! - There is no single-flight coalescing: two callers that both observe
//!   a stale slot both compute, and both writes land in call order.

use std::collections::{HashMap, VecDeque};
use std::future::Future;

use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::error::CacheError;
use super::record::{CacheHistoryRecord, CacheRecord};
use super::snapshot::{StoreSnapshot, TickerSnapshot};
use crate::domain::clock::Millis;
use crate::domain::symbol::Symbol;

/// Lowest refresh interval accepted by either setter. Smaller values are clamped up.
pub const MIN_REFRESH_INTERVAL_MS: Millis = 1_000;

/// Global refresh interval used when none is configured.
pub const DEFAULT_REFRESH_INTERVAL_MS: Millis = 60_000;

/// Number of history entries retained per slot.
pub const HISTORY_LIMIT: usize = 200;

// =============================================================================
// Internal State
// =============================================================================

/// History of a single slot.
#[derive(Debug, Default)]
struct SlotHistory {
    entries: VecDeque<CacheHistoryRecord<Value>>,
    /// Version of the most recent append; survives trimming.
    last_version: u64,
}

impl SlotHistory {
    fn append(&mut self, key: &str, value: Value, computed_at: Millis) {
        self.last_version += 1;
        self.entries.push_back(CacheHistoryRecord {
            key: key.to_string(),
            value,
            computed_at,
            version: self.last_version,
        });

        while self.entries.len() > HISTORY_LIMIT {
            self.entries.pop_front();
        }
    }
}

/// Mutable per-symbol container.
#[derive(Debug, Default)]
struct TickerState {
    latest: HashMap<String, CacheRecord<Value>>,
    history: HashMap<String, SlotHistory>,
    intervals: HashMap<String, Millis>,
}

#[derive(Debug)]
struct StoreState {
    global_interval: Millis,
    tickers: HashMap<Symbol, TickerState>,
}

impl StoreState {
    fn effective_interval(&self, symbol: &Symbol, key: &str) -> Millis {
        self.tickers
            .get(symbol)
            .and_then(|ticker| ticker.intervals.get(key))
            .copied()
            .unwrap_or(self.global_interval)
    }
}

const fn clamp_interval(ms: Millis) -> Millis {
    if ms < MIN_REFRESH_INTERVAL_MS {
        MIN_REFRESH_INTERVAL_MS
    } else {
        ms
    }
}

fn encode<T: Serialize>(key: &str, value: &T) -> Result<Value, CacheError> {
    serde_json::to_value(value).map_err(|e| {
        tracing::error!(key, error = %e, "Cache payload could not be encoded");
        CacheError::Encode {
            key: key.to_string(),
            message: e.to_string(),
        }
    })
}

fn decode<T: DeserializeOwned>(key: &str, value: Value) -> Result<T, CacheError> {
    serde_json::from_value(value).map_err(|e| {
        tracing::warn!(key, error = %e, "Cached payload does not match requested type");
        CacheError::PayloadMismatch {
            key: key.to_string(),
            message: e.to_string(),
        }
    })
}

fn decode_latest<T: DeserializeOwned>(
    record: CacheRecord<Value>,
) -> Result<CacheRecord<T>, CacheError> {
    let CacheRecord {
        key,
        value,
        computed_at,
    } = record;
    let value = decode(&key, value)?;
    Ok(CacheRecord {
        key,
        value,
        computed_at,
    })
}

fn decode_history<T: DeserializeOwned>(
    entry: CacheHistoryRecord<Value>,
) -> Result<CacheHistoryRecord<T>, CacheError> {
    let CacheHistoryRecord {
        key,
        value,
        computed_at,
        version,
    } = entry;
    let value = decode(&key, value)?;
    Ok(CacheHistoryRecord {
        key,
        value,
        computed_at,
        version,
    })
}

// =============================================================================
// Metadata Store
// =============================================================================

/// In-memory metadata cache shared by every report-building call.
///
/// # Example
///
/// ```rust
/// use report_engine::domain::metadata::MetadataStore;
///
/// let store = MetadataStore::new();
/// store.set_global_refresh_interval(5_000);
///
/// store.upsert("aapl", "sentiment", 0.42_f64, 0).unwrap();
///
/// assert!(!store.should_refresh("AAPL", "sentiment", 4_000));
/// assert!(store.should_refresh("AAPL", "sentiment", 5_000));
///
/// let latest = store.get_latest::<f64>("AAPL", "sentiment").unwrap().unwrap();
/// assert_eq!(latest.value, 0.42);
/// ```
#[derive(Debug)]
pub struct MetadataStore {
    state: RwLock<StoreState>,
}

impl Default for MetadataStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataStore {
    /// Create a store with the default global refresh interval.
    #[must_use]
    pub fn new() -> Self {
        Self::with_global_refresh_interval(DEFAULT_REFRESH_INTERVAL_MS)
    }

    /// Create a store with a specific global refresh interval (clamped).
    #[must_use]
    pub fn with_global_refresh_interval(ms: Millis) -> Self {
        Self {
            state: RwLock::new(StoreState {
                global_interval: clamp_interval(ms),
                tickers: HashMap::new(),
            }),
        }
    }

    // -------------------------------------------------------------------------
    // Interval configuration
    // -------------------------------------------------------------------------

    /// Set the process-wide default interval. Returns the stored (clamped) value.
    pub fn set_global_refresh_interval(&self, ms: Millis) -> Millis {
        let clamped = clamp_interval(ms);
        self.state.write().global_interval = clamped;
        clamped
    }

    /// Current process-wide default interval.
    #[must_use]
    pub fn global_refresh_interval(&self) -> Millis {
        self.state.read().global_interval
    }

    /// Override the interval for one (symbol, key) slot.
    ///
    /// Creates the symbol's state if it does not exist yet. Returns the
    /// stored (clamped) value.
    pub fn set_ticker_refresh_interval(&self, symbol: &str, key: &str, ms: Millis) -> Millis {
        let clamped = clamp_interval(ms);
        self.state
            .write()
            .tickers
            .entry(Symbol::new(symbol))
            .or_default()
            .intervals
            .insert(key.to_string(), clamped);
        clamped
    }

    /// Effective interval for a slot: the override if set, else the global default.
    #[must_use]
    pub fn refresh_interval(&self, symbol: &str, key: &str) -> Millis {
        self.state
            .read()
            .effective_interval(&Symbol::new(symbol), key)
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    /// Latest record for a slot, or `None` if it was never written.
    ///
    /// Never creates state.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::PayloadMismatch`] if the stored payload does
    /// not decode as `T`.
    pub fn get_latest<T: DeserializeOwned>(
        &self,
        symbol: &str,
        key: &str,
    ) -> Result<Option<CacheRecord<T>>, CacheError> {
        let record = {
            let state = self.state.read();
            state
                .tickers
                .get(&Symbol::new(symbol))
                .and_then(|ticker| ticker.latest.get(key))
                .cloned()
        };

        record.map(decode_latest).transpose()
    }

    /// Owned copy of a slot's full retained history, oldest first. Empty
    /// if none exists.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::PayloadMismatch`] if any retained entry does
    /// not decode as `T`; a partial history is never returned.
    pub fn get_history<T: DeserializeOwned>(
        &self,
        symbol: &str,
        key: &str,
    ) -> Result<Vec<CacheHistoryRecord<T>>, CacheError> {
        let entries: Vec<CacheHistoryRecord<Value>> = {
            let state = self.state.read();
            state
                .tickers
                .get(&Symbol::new(symbol))
                .and_then(|ticker| ticker.history.get(key))
                .map(|history| history.entries.iter().cloned().collect())
                .unwrap_or_default()
        };

        entries.into_iter().map(decode_history).collect()
    }

    /// Whether a slot needs recomputation at `now`.
    ///
    /// True when the slot is empty or `now - computed_at >= interval`.
    #[must_use]
    pub fn should_refresh(&self, symbol: &str, key: &str, now: Millis) -> bool {
        let symbol = Symbol::new(symbol);
        let state = self.state.read();
        let interval = state.effective_interval(&symbol, key);

        state
            .tickers
            .get(&symbol)
            .and_then(|ticker| ticker.latest.get(key))
            .is_none_or(|record| record.age(now) >= interval)
    }

    /// Sorted list of symbols that have any state.
    #[must_use]
    pub fn tracked_symbols(&self) -> Vec<Symbol> {
        let mut symbols: Vec<Symbol> = self.state.read().tickers.keys().cloned().collect();
        symbols.sort();
        symbols
    }

    // -------------------------------------------------------------------------
    // Writes
    // -------------------------------------------------------------------------

    /// Unconditionally write a new latest value and append it to history.
    ///
    /// No staleness check is performed; that is the caller's decision.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Encode`] if `value` cannot be serialized. The
    /// slot is left untouched in that case.
    pub fn upsert<T: Serialize>(
        &self,
        symbol: &str,
        key: &str,
        value: T,
        computed_at: Millis,
    ) -> Result<CacheRecord<T>, CacheError> {
        let encoded = encode(key, &value)?;
        self.commit(Symbol::new(symbol), key, encoded, computed_at);

        Ok(CacheRecord {
            key: key.to_string(),
            value,
            computed_at,
        })
    }

    /// Return the cached record if fresh, otherwise compute, store and return it.
    ///
    /// `compute` is invoked only when the slot is empty or stale.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::PayloadMismatch`] if the slot is fresh but its
    /// payload does not decode as `T` (`compute` is not called), or
    /// [`CacheError::Encode`] if the computed value cannot be serialized.
    pub fn get_or_compute<T, F>(
        &self,
        symbol: &str,
        key: &str,
        compute: F,
        now: Millis,
    ) -> Result<CacheRecord<T>, CacheError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> T,
    {
        if let Some(record) = self.fresh_latest(symbol, key, now)? {
            return Ok(record);
        }

        self.upsert(symbol, key, compute(), now)
    }

    /// Async variant of [`get_or_compute`](Self::get_or_compute).
    ///
    /// Suspends only while `compute` is pending. The store lock is released
    /// before awaiting.
    ///
    /// # Errors
    ///
    /// Same as [`get_or_compute`](Self::get_or_compute).
    pub async fn get_or_compute_async<T, F, Fut>(
        &self,
        symbol: &str,
        key: &str,
        compute: F,
        now: Millis,
    ) -> Result<CacheRecord<T>, CacheError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        if let Some(record) = self.fresh_latest(symbol, key, now)? {
            return Ok(record);
        }

        let value = compute().await;
        self.upsert(symbol, key, value, now)
    }

    // -------------------------------------------------------------------------
    // Diagnostics
    // -------------------------------------------------------------------------

    /// Read-only snapshot of all state.
    #[must_use]
    pub fn dump(&self) -> StoreSnapshot {
        let state = self.state.read();
        let global = state.global_interval;

        let tickers = state
            .tickers
            .iter()
            .map(|(symbol, ticker)| {
                let snapshot = TickerSnapshot {
                    global_refresh_interval_ms: global,
                    intervals: ticker
                        .intervals
                        .iter()
                        .map(|(k, v)| (k.clone(), *v))
                        .collect(),
                    latest: ticker
                        .latest
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect(),
                    history: ticker
                        .history
                        .iter()
                        .map(|(k, h)| (k.clone(), h.entries.iter().cloned().collect()))
                        .collect(),
                };
                (symbol.as_str().to_string(), snapshot)
            })
            .collect();

        StoreSnapshot {
            global_refresh_interval_ms: global,
            tickers,
        }
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    /// Latest record decoded as `T` if present and fresh at `now`.
    fn fresh_latest<T: DeserializeOwned>(
        &self,
        symbol: &str,
        key: &str,
        now: Millis,
    ) -> Result<Option<CacheRecord<T>>, CacheError> {
        let symbol = Symbol::new(symbol);
        let record = {
            let state = self.state.read();
            let interval = state.effective_interval(&symbol, key);
            state
                .tickers
                .get(&symbol)
                .and_then(|ticker| ticker.latest.get(key))
                .filter(|record| record.age(now) < interval)
                .cloned()
        };

        record.map(decode_latest).transpose()
    }

    fn commit(&self, symbol: Symbol, key: &str, value: Value, computed_at: Millis) {
        let mut state = self.state.write();
        let ticker = state.tickers.entry(symbol).or_default();

        ticker
            .history
            .entry(key.to_string())
            .or_default()
            .append(key, value.clone(), computed_at);

        ticker.latest.insert(
            key.to_string(),
            CacheRecord {
                key: key.to_string(),
                value,
                computed_at,
            },
        );
    }
}

// =============================================================================
// Tests
// =============================================================================
