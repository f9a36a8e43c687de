#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements,
        clippy::cast_possible_truncation
    )
)]

//! Report Engine - Cached Watchlist Analysis
//!
//! Builds per-symbol analysis reports (analyst consensus, news sentiment,
//! fundamentals, entry plans) on top of an in-memory metadata cache. Each
//! (symbol, metric) slot has its own refresh interval and a bounded,
//! versioned history.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Cache and report logic with no I/O
//!   - `metadata`: The metadata store, records and snapshots
//!   - `models`: Fundamental, entry, sentiment and consensus models
//!   - `report`: Report value types and metric keys
//!   - `clock`: Injected time source
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Market data provider interface
//!   - `services`: Report assembly (fresh, cached, live)
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `providers`: Mock and Yahoo Finance market data
//!   - `http`: JSON API, health and metrics endpoints
//!   - `config`: Environment configuration
//!   - `metrics` / `telemetry`: Prometheus and OpenTelemetry
//!
//! # Data Flow
//!
//! ```text
//! provider ──► ReportAssembler ──► MetadataStore (due slots only)
//!                    │
//!                    └──► models (stale slots, comparisons) ──► AnalysisReport
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Cache and report types with no external I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::clock::{Clock, ManualClock, Millis, SystemClock};
pub use domain::metadata::{
    CacheError, CacheHistoryRecord, CacheRecord, MetadataStore, StoreSnapshot, TickerSnapshot,
};
pub use domain::models::ModelRegistry;
pub use domain::report::{
    AnalysisReport, LiveReport, MetricKey, NewsSignal, ReportMode, ReportOptions,
};
pub use domain::symbol::Symbol;

// Application
pub use application::ports::{MarketDataPort, ProviderError};
pub use application::services::ReportAssembler;

// Infrastructure config
pub use infrastructure::config::{ConfigError, EngineConfig, ProviderKind};

// Providers
pub use infrastructure::providers::{AnyProvider, MockMarketData, YahooConfig, YahooMarketData};

// HTTP API
pub use infrastructure::http::{ApiServer, ApiServerError, AppState, create_router};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
