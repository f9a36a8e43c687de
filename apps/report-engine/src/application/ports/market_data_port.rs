//! Market Data Port (Driven Port)
//!
//! Interface for fetching live price, analyst consensus and news from an
//! external provider. Report building treats every failure here as a
//! warning, never as a hard error.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::report::{NewsSignal, TargetConsensus};
use crate::domain::symbol::Symbol;

/// Provider failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// Transport failure or timeout.
    #[error("network error: {0}")]
    Network(String),

    /// Non-success HTTP status.
    #[error("API error {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body or reason.
        message: String,
    },

    /// Response could not be understood.
    #[error("parse error: {0}")]
    Parse(String),

    /// Provider switched off or not reachable.
    #[error("provider unavailable")]
    Unavailable,
}

/// Port for live market data.
///
/// `Ok(None)` means the provider answered but has no value for the symbol.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketDataPort: Send + Sync {
    /// Provider name, used in warnings and metric labels.
    fn name(&self) -> &'static str;

    /// Latest trade price. Implementations return only positive prices.
    async fn fetch_price(&self, symbol: &Symbol) -> Result<Option<Decimal>, ProviderError>;

    /// Analyst target consensus, if the provider covers the symbol.
    async fn fetch_consensus(&self, symbol: &Symbol)
    -> Result<Option<TargetConsensus>, ProviderError>;

    /// Recent news signals, newest first. May be empty.
    async fn fetch_news(&self, symbol: &Symbol) -> Result<Vec<NewsSignal>, ProviderError>;
}
