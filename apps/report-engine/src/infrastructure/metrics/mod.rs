//! Prometheus Metrics Module
//!
//! Exposes cache and report metrics via Prometheus format.
//!
//! # Metrics Categories
//!
//! - **Cache**: Lookups (hit/miss) and writes (computed/live) per metric family
//! - **Providers**: Failed provider calls by operation
//! - **Reports**: Build latency per assembly mode
//! - **Store**: Number of tracked symbols
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the HTTP API port. Recording
//! functions are no-ops until [`init_metrics`] installs the recorder.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::domain::report::ReportMode;

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// Subsequent calls return the handle installed by the first one.
///
/// # Errors
///
/// Returns an error if another global recorder is already installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();

    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "report_engine_cache_lookups_total",
        "Cache lookups by metric family and outcome"
    );
    describe_counter!(
        "report_engine_cache_writes_total",
        "Cache writes by metric family and origin"
    );
    describe_counter!(
        "report_engine_provider_errors_total",
        "Failed provider calls by provider and operation"
    );
    describe_histogram!(
        "report_engine_report_build_seconds",
        "Time to assemble a report"
    );
    describe_gauge!(
        "report_engine_tracked_symbols",
        "Number of symbols with cache state"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Where a cached value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOrigin {
    /// Computed by a model on a stale lookup.
    Computed,
    /// Fetched from a provider and written directly.
    Live,
}

impl WriteOrigin {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Computed => "computed",
            Self::Live => "live",
        }
    }
}

/// Provider call kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderOperation {
    /// Spot price.
    Price,
    /// Analyst consensus.
    Consensus,
    /// News signals.
    News,
}

impl ProviderOperation {
    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Price => "price",
            Self::Consensus => "consensus",
            Self::News => "news",
        }
    }
}

/// Record a cache lookup.
pub fn record_cache_lookup(metric: &'static str, hit: bool) {
    counter!(
        "report_engine_cache_lookups_total",
        "metric" => metric,
        "outcome" => if hit { "hit" } else { "miss" }
    )
    .increment(1);
}

/// Record a cache write.
pub fn record_cache_write(metric: &'static str, origin: WriteOrigin) {
    counter!(
        "report_engine_cache_writes_total",
        "metric" => metric,
        "origin" => origin.as_str()
    )
    .increment(1);
}

/// Record a failed provider call.
pub fn record_provider_error(provider: &str, operation: ProviderOperation) {
    counter!(
        "report_engine_provider_errors_total",
        "provider" => provider.to_string(),
        "operation" => operation.as_str()
    )
    .increment(1);
}

/// Record report build duration.
pub fn record_report_build(mode: ReportMode, duration: Duration) {
    histogram!(
        "report_engine_report_build_seconds",
        "mode" => mode.as_str()
    )
    .record(duration.as_secs_f64());
}

/// Update the tracked symbol count.
pub fn set_tracked_symbols(count: usize) {
    #[allow(clippy::cast_precision_loss)]
    let count = count as f64;
    gauge!("report_engine_tracked_symbols").set(count);
}

// =============================================================================
// Tests
// =============================================================================
