//! Market Data Providers
//!
//! Adapters implementing `MarketDataPort`.
//!
//! - [`MockMarketData`]: in-memory, optionally simulated
//! - [`YahooMarketData`]: public Yahoo Finance endpoints

mod mock;
mod yahoo;

use async_trait::async_trait;
use rust_decimal::Decimal;

pub use mock::MockMarketData;
pub use yahoo::{DEFAULT_YAHOO_BASE_URL, YahooConfig, YahooMarketData};

use crate::application::ports::{MarketDataPort, ProviderError};
use crate::domain::report::{NewsSignal, TargetConsensus};
use crate::domain::symbol::Symbol;

/// Provider selected at startup.
#[derive(Debug)]
pub enum AnyProvider {
    /// Mock provider.
    Mock(MockMarketData),
    /// Yahoo Finance provider.
    Yahoo(YahooMarketData),
}

#[async_trait]
impl MarketDataPort for AnyProvider {
    fn name(&self) -> &'static str {
        match self {
            Self::Mock(p) => p.name(),
            Self::Yahoo(p) => p.name(),
        }
    }

    async fn fetch_price(&self, symbol: &Symbol) -> Result<Option<Decimal>, ProviderError> {
        match self {
            Self::Mock(p) => p.fetch_price(symbol).await,
            Self::Yahoo(p) => p.fetch_price(symbol).await,
        }
    }

    async fn fetch_consensus(
        &self,
        symbol: &Symbol,
    ) -> Result<Option<TargetConsensus>, ProviderError> {
        match self {
            Self::Mock(p) => p.fetch_consensus(symbol).await,
            Self::Yahoo(p) => p.fetch_consensus(symbol).await,
        }
    }

    async fn fetch_news(&self, symbol: &Symbol) -> Result<Vec<NewsSignal>, ProviderError> {
        match self {
            Self::Mock(p) => p.fetch_news(symbol).await,
            Self::Yahoo(p) => p.fetch_news(symbol).await,
        }
    }
}
