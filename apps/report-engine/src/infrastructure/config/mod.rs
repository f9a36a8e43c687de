//! Configuration Module
//!
//! Environment-driven configuration for the report engine.

mod settings;

pub use settings::{
    CacheSettings, ConfigError, EngineConfig, IntervalOverride, ProviderKind, ProviderSettings,
    ServerSettings,
};
