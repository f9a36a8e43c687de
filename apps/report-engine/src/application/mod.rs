//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the report assembly service and the port
//! interfaces that define how it reaches market data providers.

/// Port interfaces for external systems (market data providers).
pub mod ports;

/// Application services for report assembly.
pub mod services;
