//! Engine Configuration Settings
//!
//! Configuration types for the report engine, loaded from environment
//! variables. Malformed numbers fall back to their defaults; an unknown
//! provider or a malformed interval override list is an error.

use std::time::Duration;

use crate::domain::clock::Millis;
use crate::domain::metadata::DEFAULT_REFRESH_INTERVAL_MS;
use crate::domain::symbol::Symbol;
use crate::infrastructure::providers::DEFAULT_YAHOO_BASE_URL;

const DEFAULT_WATCHLIST: &str = "AAPL,MSFT,NVDA,TSLA";
const DEFAULT_PROVIDER_TIMEOUT_MS: u64 = 5_000;

/// Market data provider implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderKind {
    /// In-memory provider with simulated ticks.
    #[default]
    Mock,
    /// Yahoo Finance public endpoints.
    Yahoo,
}

impl ProviderKind {
    /// Parse a provider name (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns an error for unknown names.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        match s.trim().to_lowercase().as_str() {
            "mock" => Ok(Self::Mock),
            "yahoo" => Ok(Self::Yahoo),
            _ => Err(ConfigError::InvalidProvider(s.to_string())),
        }
    }

    /// Provider name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Mock => "mock",
            Self::Yahoo => "yahoo",
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// HTTP API port.
    pub http_port: u16,
    /// Whether `/metrics` is served.
    pub metrics_enabled: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            http_port: 8090,
            metrics_enabled: true,
        }
    }
}

/// Per-key refresh interval override applied to every watchlist symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalOverride {
    /// Metric cache key.
    pub key: String,
    /// Interval in milliseconds (clamped by the store).
    pub ms: Millis,
}

/// Cache settings.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Global refresh interval.
    pub refresh_interval_ms: Millis,
    /// Per-key overrides.
    pub interval_overrides: Vec<IntervalOverride>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            refresh_interval_ms: DEFAULT_REFRESH_INTERVAL_MS,
            interval_overrides: Vec::new(),
        }
    }
}

/// Provider settings.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    /// Selected provider.
    pub kind: ProviderKind,
    /// HTTP request timeout.
    pub timeout: Duration,
    /// Yahoo API base URL.
    pub yahoo_base_url: String,
    /// Seed for the simulated mock provider.
    pub mock_seed: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            kind: ProviderKind::Mock,
            timeout: Duration::from_millis(DEFAULT_PROVIDER_TIMEOUT_MS),
            yahoo_base_url: DEFAULT_YAHOO_BASE_URL.to_string(),
            mock_seed: 42,
        }
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Server settings.
    pub server: ServerSettings,
    /// Cache settings.
    pub cache: CacheSettings,
    /// Provider settings.
    pub provider: ProviderSettings,
    /// Symbols warmed at startup.
    pub watchlist: Vec<Symbol>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            cache: CacheSettings::default(),
            provider: ProviderSettings::default(),
            watchlist: parse_watchlist(DEFAULT_WATCHLIST),
        }
    }
}

impl EngineConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown provider or malformed overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown provider or malformed overrides.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let server = ServerSettings {
            http_port: parse_or(&lookup, "REPORT_ENGINE_HTTP_PORT", defaults.server.http_port),
            metrics_enabled: parse_bool_or(
                &lookup,
                "REPORT_ENGINE_METRICS_ENABLED",
                defaults.server.metrics_enabled,
            ),
        };

        let cache = CacheSettings {
            refresh_interval_ms: parse_or(
                &lookup,
                "REPORT_ENGINE_REFRESH_INTERVAL_MS",
                defaults.cache.refresh_interval_ms,
            ),
            interval_overrides: lookup("REPORT_ENGINE_INTERVAL_OVERRIDES")
                .map(|v| parse_overrides(&v))
                .transpose()?
                .unwrap_or_default(),
        };

        let provider = ProviderSettings {
            kind: lookup("REPORT_ENGINE_PROVIDER")
                .filter(|v| !v.trim().is_empty())
                .map(|v| ProviderKind::parse(&v))
                .transpose()?
                .unwrap_or(defaults.provider.kind),
            timeout: Duration::from_millis(parse_or(
                &lookup,
                "REPORT_ENGINE_PROVIDER_TIMEOUT_MS",
                DEFAULT_PROVIDER_TIMEOUT_MS,
            )),
            yahoo_base_url: lookup("REPORT_ENGINE_YAHOO_BASE_URL")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.provider.yahoo_base_url),
            mock_seed: parse_or(&lookup, "REPORT_ENGINE_MOCK_SEED", defaults.provider.mock_seed),
        };

        let watchlist = lookup("REPORT_ENGINE_WATCHLIST")
            .map_or(defaults.watchlist, |v| parse_watchlist(&v));

        Ok(Self {
            server,
            cache,
            provider,
            watchlist,
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Unknown provider name.
    #[error("unknown market data provider: {0} (expected mock or yahoo)")]
    InvalidProvider(String),
    /// Malformed interval override entry.
    #[error("invalid interval override '{0}' (expected key=ms)")]
    InvalidOverride(String),
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_bool_or<F>(lookup: &F, key: &str, default: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| match v.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

fn parse_watchlist(value: &str) -> Vec<Symbol> {
    let mut symbols: Vec<Symbol> = Vec::new();
    for symbol in value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(Symbol::new)
    {
        if !symbols.contains(&symbol) {
            symbols.push(symbol);
        }
    }
    symbols
}

fn parse_overrides(value: &str) -> Result<Vec<IntervalOverride>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (key, ms) = entry
                .split_once('=')
                .ok_or_else(|| ConfigError::InvalidOverride(entry.to_string()))?;
            let key = key.trim();
            let ms = ms
                .trim()
                .parse::<Millis>()
                .map_err(|_| ConfigError::InvalidOverride(entry.to_string()))?;
            if key.is_empty() {
                return Err(ConfigError::InvalidOverride(entry.to_string()));
            }
            Ok(IntervalOverride {
                key: key.to_string(),
                ms,
            })
        })
        .collect()
}
