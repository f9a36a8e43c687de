//! Metadata cache.
//!
//! Latest value, bounded versioned history and refresh policy per
//! (symbol, metric key) slot.

mod error;
mod record;
mod snapshot;
mod store;

pub use error::CacheError;
pub use record::{CacheHistoryRecord, CacheRecord};
pub use snapshot::{StoreSnapshot, TickerSnapshot};
pub use store::{DEFAULT_REFRESH_INTERVAL_MS, HISTORY_LIMIT, MIN_REFRESH_INTERVAL_MS, MetadataStore};
