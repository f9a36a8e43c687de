//! Cache record types.

use serde::{Deserialize, Serialize};

use crate::domain::clock::Millis;

/// Latest known value of one metric for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord<T> {
    /// Metric key (e.g. `sentiment`, `fundamental:dcf-core`).
    pub key: String,
    /// Cached payload.
    pub value: T,
    /// When the value was produced, as supplied by the caller.
    pub computed_at: Millis,
}

impl<T> CacheRecord<T> {
    /// Age of the record at `now`. Saturates at zero for `now < computed_at`.
    #[must_use]
    pub const fn age(&self, now: Millis) -> Millis {
        now.saturating_sub(self.computed_at)
    }

}

/// One immutable entry in a slot's history.
///
/// Versions start at 1 and increase by exactly one per write to the
/// same (symbol, key) slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheHistoryRecord<T> {
    /// Metric key.
    pub key: String,
    /// Payload as written.
    pub value: T,
    /// When the value was produced.
    pub computed_at: Millis,
    /// Per-slot write sequence number.
    pub version: u64,
}
