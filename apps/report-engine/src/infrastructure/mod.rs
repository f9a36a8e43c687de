//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer, plus the HTTP surface and the
//! observability plumbing.

/// Configuration loaded from the environment.
pub mod config;

/// HTTP API, health and metrics endpoints.
pub mod http;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Market data provider adapters.
pub mod providers;

/// OpenTelemetry tracing integration.
pub mod telemetry;
