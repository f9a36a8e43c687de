//! Mock market data provider.
//!
//! Serves explicitly configured prices, consensus and news. In simulated
//! mode it also produces a seeded random-walk price per symbol and the
//! occasional synthetic headline, so the service runs without network
//! access.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;

use crate::application::ports::{MarketDataPort, ProviderError};
use crate::domain::models::{synthetic_price, to_f64, to_price};
use crate::domain::report::{NewsSignal, TargetConsensus};
use crate::domain::symbol::Symbol;

/// Largest relative move per simulated tick.
const MAX_TICK_MOVE: f64 = 0.02;

const HEADLINES: &[&str] = &[
    "{symbol} shares rally after strong quarterly growth",
    "Analysts upgrade {symbol} on record demand",
    "{symbol} falls as guidance cut weighs on outlook",
    "{symbol} faces probe over accounting practices",
    "{symbol} holds steady ahead of earnings",
];

#[derive(Debug)]
struct Simulation {
    rng: Mutex<StdRng>,
    walk: RwLock<HashMap<Symbol, Decimal>>,
}

/// In-memory market data provider.
#[derive(Debug, Default)]
pub struct MockMarketData {
    prices: RwLock<HashMap<Symbol, Decimal>>,
    consensus: RwLock<HashMap<Symbol, TargetConsensus>>,
    news: RwLock<HashMap<Symbol, Vec<NewsSignal>>>,
    failure: RwLock<Option<ProviderError>>,
    simulation: Option<Simulation>,
}

impl MockMarketData {
    /// Provider with no data: every lookup answers "nothing available".
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider that simulates price ticks and headlines from `seed`.
    #[must_use]
    pub fn simulated(seed: u64) -> Self {
        Self {
            simulation: Some(Simulation {
                rng: Mutex::new(StdRng::seed_from_u64(seed)),
                walk: RwLock::new(HashMap::new()),
            }),
            ..Self::default()
        }
    }

    /// Pin the price for a symbol.
    pub fn set_price(&self, symbol: &str, price: Decimal) {
        self.prices.write().insert(Symbol::new(symbol), price);
    }

    /// Set the analyst consensus for a symbol.
    pub fn set_consensus(&self, symbol: &str, consensus: TargetConsensus) {
        self.consensus.write().insert(Symbol::new(symbol), consensus);
    }

    /// Add a news signal for a symbol.
    pub fn push_news(&self, symbol: &str, signal: NewsSignal) {
        self.news
            .write()
            .entry(Symbol::new(symbol))
            .or_default()
            .push(signal);
    }

    /// Make every call fail with `error` until cleared with `None`.
    pub fn set_failure(&self, error: Option<ProviderError>) {
        *self.failure.write() = error;
    }

    fn check_failure(&self) -> Result<(), ProviderError> {
        self.failure.read().clone().map_or(Ok(()), Err)
    }

    fn simulated_tick(&self, symbol: &Symbol) -> Option<Decimal> {
        let simulation = self.simulation.as_ref()?;
        let step: f64 = simulation
            .rng
            .lock()
            .random_range(-MAX_TICK_MOVE..=MAX_TICK_MOVE);

        let mut walk = simulation.walk.write();
        let last = walk
            .entry(symbol.clone())
            .or_insert_with(|| synthetic_price(symbol));
        let next = to_price(to_f64(*last) * (1.0 + step)).max(Decimal::new(1, 2));
        *last = next;
        Some(next)
    }

    fn simulated_headline(&self, symbol: &Symbol) -> Option<NewsSignal> {
        let simulation = self.simulation.as_ref()?;
        let mut rng = simulation.rng.lock();
        if !rng.random_bool(0.5) {
            return None;
        }

        let template = HEADLINES[rng.random_range(0..HEADLINES.len())];
        let confidence = rng.random_range(0.4..=0.9);
        Some(NewsSignal::new(
            "simulated-wire",
            template.replace("{symbol}", symbol.as_str()),
            confidence,
        ))
    }
}

#[async_trait]
impl MarketDataPort for MockMarketData {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn fetch_price(&self, symbol: &Symbol) -> Result<Option<Decimal>, ProviderError> {
        self.check_failure()?;

        if let Some(price) = self.prices.read().get(symbol).copied() {
            return Ok(Some(price));
        }
        Ok(self.simulated_tick(symbol))
    }

    async fn fetch_consensus(
        &self,
        symbol: &Symbol,
    ) -> Result<Option<TargetConsensus>, ProviderError> {
        self.check_failure()?;
        Ok(self.consensus.read().get(symbol).cloned())
    }

    async fn fetch_news(&self, symbol: &Symbol) -> Result<Vec<NewsSignal>, ProviderError> {
        self.check_failure()?;

        let mut signals = self.news.read().get(symbol).cloned().unwrap_or_default();
        if signals.is_empty() {
            signals.extend(self.simulated_headline(symbol));
        }
        Ok(signals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn empty_provider_has_nothing() {
        let provider = MockMarketData::new();
        let symbol = Symbol::new("AAPL");

        assert_eq!(provider.fetch_price(&symbol).await.unwrap(), None);
        assert_eq!(provider.fetch_consensus(&symbol).await.unwrap(), None);
        assert!(provider.fetch_news(&symbol).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn configured_values_are_returned() {
        let provider = MockMarketData::new();
        provider.set_price("aapl", dec!(222.22));
        provider.push_news("AAPL", NewsSignal::new("wire", "Apple beats", 0.7));

        let symbol = Symbol::new("AAPL");
        assert_eq!(provider.fetch_price(&symbol).await.unwrap(), Some(dec!(222.22)));
        assert_eq!(provider.fetch_news(&symbol).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failure_mode_fails_every_call() {
        let provider = MockMarketData::new();
        provider.set_failure(Some(ProviderError::Unavailable));
        let symbol = Symbol::new("AAPL");

        assert_eq!(
            provider.fetch_price(&symbol).await,
            Err(ProviderError::Unavailable)
        );
        assert!(provider.fetch_news(&symbol).await.is_err());

        provider.set_failure(None);
        assert!(provider.fetch_consensus(&symbol).await.is_ok());
    }

    #[tokio::test]
    async fn simulated_walk_stays_near_baseline() {
        let provider = MockMarketData::simulated(42);
        let symbol = Symbol::new("MSFT");
        let baseline = to_f64(synthetic_price(&symbol));

        let first = provider.fetch_price(&symbol).await.unwrap().unwrap();
        let first = to_f64(first);
        assert!((first - baseline).abs() <= baseline * MAX_TICK_MOVE + 0.01);

        for _ in 0..20 {
            let price = provider.fetch_price(&symbol).await.unwrap().unwrap();
            assert!(price > Decimal::ZERO);
        }
    }

    #[tokio::test]
    async fn simulation_is_reproducible_for_a_seed() {
        let a = MockMarketData::simulated(7);
        let b = MockMarketData::simulated(7);
        let symbol = Symbol::new("TSLA");

        for _ in 0..5 {
            assert_eq!(
                a.fetch_price(&symbol).await.unwrap(),
                b.fetch_price(&symbol).await.unwrap()
            );
        }
    }

    #[tokio::test]
    async fn pinned_price_overrides_simulation() {
        let provider = MockMarketData::simulated(42);
        provider.set_price("NVDA", dec!(123.45));

        let price = provider.fetch_price(&Symbol::new("NVDA")).await.unwrap();
        assert_eq!(price, Some(dec!(123.45)));
    }
}
