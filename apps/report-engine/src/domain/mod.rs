//! Domain Layer - Cache and report types.
//!
//! Pure types and logic with no I/O: the metadata cache, report value
//! objects and the analysis models that produce them.

/// Time source for cache decisions.
pub mod clock;

/// Per-symbol, per-metric metadata cache.
pub mod metadata;

/// Fundamental, entry, sentiment and consensus models.
pub mod models;

/// Report value types and cache keys.
pub mod report;

/// Ticker symbol value object.
pub mod symbol;
