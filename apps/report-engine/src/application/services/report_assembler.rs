//! Report Assembler
//!
//! Decides, per metric, whether to trust the metadata cache or recompute,
//! and merges the results into one report. The spot price is never cached;
//! consensus, sentiment, fundamentals and entry plans are.
//!
//! # Modes
//!
//! - [`build_report`](ReportAssembler::build_report): everything fresh, cache untouched
//! - [`build_report_cached`](ReportAssembler::build_report_cached): `get_or_compute` per metric
//! - [`build_report_live`](ReportAssembler::build_report_live): provider data first,
//!   written to the cache only where the slot was due, then a cached build

use std::cell::Cell;
use std::sync::Arc;
use std::time::Instant;

use rust_decimal::Decimal;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::application::ports::{MarketDataPort, ProviderError};
use crate::domain::clock::Millis;
use crate::domain::metadata::MetadataStore;
use crate::domain::models::{ModelRegistry, synthetic_price};
use crate::domain::report::{
    AnalysisReport, EntryPlan, FundamentalSummary, LiveReport, MetricKey, ReportMode,
    ReportOptions,
};
use crate::domain::symbol::Symbol;
use crate::infrastructure::metrics::{
    ProviderOperation, WriteOrigin, record_cache_lookup, record_cache_write,
    record_provider_error, record_report_build, set_tracked_symbols,
};

/// Builds analysis reports on top of a shared metadata store.
pub struct ReportAssembler<P>
where
    P: MarketDataPort,
{
    store: Arc<MetadataStore>,
    models: Arc<ModelRegistry>,
    provider: Arc<P>,
}

impl<P> std::fmt::Debug for ReportAssembler<P>
where
    P: MarketDataPort,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportAssembler")
            .field("provider", &self.provider.name())
            .field("models", &self.models)
            .finish_non_exhaustive()
    }
}

impl<P> ReportAssembler<P>
where
    P: MarketDataPort,
{
    /// Create a new assembler.
    pub const fn new(store: Arc<MetadataStore>, models: Arc<ModelRegistry>, provider: Arc<P>) -> Self {
        Self {
            store,
            models,
            provider,
        }
    }

    /// Shared metadata store.
    #[must_use]
    pub const fn store(&self) -> &Arc<MetadataStore> {
        &self.store
    }

    /// Model registry.
    #[must_use]
    pub const fn models(&self) -> &Arc<ModelRegistry> {
        &self.models
    }

    /// Market data provider.
    #[must_use]
    pub const fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    // -------------------------------------------------------------------------
    // Fresh
    // -------------------------------------------------------------------------

    /// Recompute every metric, bypassing the cache entirely.
    #[must_use]
    pub fn build_report(
        &self,
        symbol: &Symbol,
        current_price: Decimal,
        options: &ReportOptions,
    ) -> AnalysisReport {
        let start = Instant::now();
        let fundamental = self.models.fundamental(options.fundamental_model.as_deref());
        let entry = self.models.entry(options.entry_model.as_deref());

        let report = AnalysisReport {
            symbol: symbol.clone(),
            current_price,
            target_consensus: self.models.consensus().estimate(symbol, current_price),
            sentiment: self.models.sentiment().digest(symbol, &options.signals),
            fundamentals: fundamental.evaluate(symbol, current_price),
            entry_plan: entry.plan(symbol, current_price),
            fundamental_comparison: self.fundamental_comparison(symbol, current_price),
            entry_comparison: self.entry_comparison(symbol, current_price),
            mode: ReportMode::Fresh,
        };

        record_report_build(ReportMode::Fresh, start.elapsed());
        report
    }

    // -------------------------------------------------------------------------
    // Cached
    // -------------------------------------------------------------------------

    /// Serve each cacheable metric from the store when fresh at `now`,
    /// recomputing and writing back only the stale ones.
    #[must_use]
    pub fn build_report_cached(
        &self,
        symbol: &Symbol,
        current_price: Decimal,
        options: &ReportOptions,
        now: Millis,
    ) -> AnalysisReport {
        let start = Instant::now();
        let report = self.assemble_cached(symbol, current_price, options, now, ReportMode::Cached);
        record_report_build(ReportMode::Cached, start.elapsed());
        report
    }

    fn assemble_cached(
        &self,
        symbol: &Symbol,
        current_price: Decimal,
        options: &ReportOptions,
        now: Millis,
        mode: ReportMode,
    ) -> AnalysisReport {
        let fundamental = self.models.fundamental(options.fundamental_model.as_deref());
        let entry = self.models.entry(options.entry_model.as_deref());

        let target_consensus = self.cached(symbol, &MetricKey::TargetConsensus, now, || {
            self.models.consensus().estimate(symbol, current_price)
        });
        let sentiment = self.cached(symbol, &MetricKey::Sentiment, now, || {
            self.models.sentiment().digest(symbol, &options.signals)
        });
        let fundamentals = self.cached(
            symbol,
            &MetricKey::Fundamental(fundamental.id().to_string()),
            now,
            || fundamental.evaluate(symbol, current_price),
        );
        let entry_plan = self.cached(
            symbol,
            &MetricKey::Entry(entry.id().to_string()),
            now,
            || entry.plan(symbol, current_price),
        );

        set_tracked_symbols(self.store.tracked_symbols().len());

        AnalysisReport {
            symbol: symbol.clone(),
            current_price,
            target_consensus,
            sentiment,
            fundamentals,
            entry_plan,
            fundamental_comparison: self.fundamental_comparison(symbol, current_price),
            entry_comparison: self.entry_comparison(symbol, current_price),
            mode,
        }
    }

    /// Cached value of one metric. A slot the store refuses to serve or
    /// accept is bypassed: the metric is computed and returned uncached.
    fn cached<T, F>(&self, symbol: &Symbol, metric: &MetricKey, now: Millis, compute: F) -> T
    where
        T: Serialize + DeserializeOwned,
        F: Fn() -> T,
    {
        let computed = Cell::new(false);
        let result = self.store.get_or_compute(
            symbol.as_str(),
            &metric.cache_key(),
            || {
                computed.set(true);
                compute()
            },
            now,
        );

        match result {
            Ok(record) => {
                record_cache_lookup(metric.family(), !computed.get());
                if computed.get() {
                    record_cache_write(metric.family(), WriteOrigin::Computed);
                    tracing::debug!(symbol = %symbol, key = %metric, now, "Recomputed stale metric");
                }
                record.value
            }
            Err(e) => {
                tracing::warn!(
                    symbol = %symbol,
                    key = %metric,
                    error = %e,
                    "Cache slot unusable, computing uncached"
                );
                compute()
            }
        }
    }

    // -------------------------------------------------------------------------
    // Live
    // -------------------------------------------------------------------------

    /// Fetch live data, let the cache's staleness policy decide which live
    /// values are written, then run a cached build at the resolved price.
    ///
    /// Provider failures never fail the build; each one becomes a warning.
    pub async fn build_report_live(
        &self,
        symbol: &Symbol,
        options: &ReportOptions,
        now: Millis,
    ) -> LiveReport {
        let start = Instant::now();
        let mut warnings = Vec::new();

        let (price, consensus, news) = tokio::join!(
            self.provider.fetch_price(symbol),
            self.provider.fetch_consensus(symbol),
            self.provider.fetch_news(symbol),
        );

        let live_price = self
            .absorb(price, ProviderOperation::Price, symbol, &mut warnings)
            .flatten()
            .filter(|p| *p > Decimal::ZERO);
        let current_price = self.resolve_price(symbol, live_price, options, &mut warnings);

        let live_consensus = self
            .absorb(consensus, ProviderOperation::Consensus, symbol, &mut warnings)
            .flatten()
            .map(|c| c.with_reference_price(current_price));
        let signals = self
            .absorb(news, ProviderOperation::News, symbol, &mut warnings)
            .unwrap_or_default();
        let live_sentiment =
            (!signals.is_empty()).then(|| self.models.sentiment().digest(symbol, &signals));

        self.check_model_ids(options, &mut warnings);

        // Staleness is decided before anything is written.
        let consensus_key = MetricKey::TargetConsensus;
        let sentiment_key = MetricKey::Sentiment;
        let consensus_due = self
            .store
            .should_refresh(symbol.as_str(), &consensus_key.cache_key(), now);
        let sentiment_due = self
            .store
            .should_refresh(symbol.as_str(), &sentiment_key.cache_key(), now);

        if let Some(value) = live_consensus.filter(|_| consensus_due) {
            self.write_live(symbol, &consensus_key, value, now);
        }
        if let Some(value) = live_sentiment.filter(|_| sentiment_due) {
            self.write_live(symbol, &sentiment_key, value, now);
        }

        let report = self.assemble_cached(symbol, current_price, options, now, ReportMode::Live);

        if !warnings.is_empty() {
            tracing::warn!(
                symbol = %symbol,
                provider = self.provider.name(),
                warnings = warnings.len(),
                "Live report built with degraded inputs"
            );
        }
        record_report_build(ReportMode::Live, start.elapsed());

        LiveReport { report, warnings }
    }

    fn write_live<T: Serialize>(&self, symbol: &Symbol, metric: &MetricKey, value: T, now: Millis) {
        match self.store.upsert(symbol.as_str(), &metric.cache_key(), value, now) {
            Ok(_) => {
                record_cache_write(metric.family(), WriteOrigin::Live);
                tracing::debug!(symbol = %symbol, key = %metric, now, "Wrote live value to cache");
            }
            Err(e) => {
                tracing::warn!(symbol = %symbol, key = %metric, error = %e, "Live value not cached");
            }
        }
    }

    /// Turn a provider failure into a warning.
    fn absorb<T>(
        &self,
        result: Result<T, ProviderError>,
        operation: ProviderOperation,
        symbol: &Symbol,
        warnings: &mut Vec<String>,
    ) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                let provider = self.provider.name();
                tracing::warn!(
                    symbol = %symbol,
                    provider,
                    operation = operation.as_str(),
                    error = %e,
                    "Provider call failed"
                );
                record_provider_error(provider, operation);
                warnings.push(format!(
                    "{provider} {} lookup failed for {symbol}: {e}",
                    operation.as_str()
                ));
                None
            }
        }
    }

    fn resolve_price(
        &self,
        symbol: &Symbol,
        live_price: Option<Decimal>,
        options: &ReportOptions,
        warnings: &mut Vec<String>,
    ) -> Decimal {
        if let Some(price) = live_price {
            return price;
        }

        let provider = self.provider.name();
        if let Some(price) = options.fallback_price.filter(|p| *p > Decimal::ZERO) {
            warnings.push(format!(
                "No live price for {symbol} from {provider}; using supplied price {price}"
            ));
            return price;
        }

        let price = synthetic_price(symbol);
        warnings.push(format!(
            "No live price for {symbol} from {provider}; using synthetic price {price}"
        ));
        price
    }

    fn check_model_ids(&self, options: &ReportOptions, warnings: &mut Vec<String>) {
        if let Some(id) = options
            .fundamental_model
            .as_deref()
            .filter(|id| !self.models.has_fundamental(id))
        {
            warnings.push(format!(
                "Unknown fundamental model '{id}'; using '{}'",
                self.models.fundamental(None).id()
            ));
        }
        if let Some(id) = options
            .entry_model
            .as_deref()
            .filter(|id| !self.models.has_entry(id))
        {
            warnings.push(format!(
                "Unknown entry model '{id}'; using '{}'",
                self.models.entry(None).id()
            ));
        }
    }

    // -------------------------------------------------------------------------
    // Comparisons (never cached)
    // -------------------------------------------------------------------------

    fn fundamental_comparison(&self, symbol: &Symbol, price: Decimal) -> Vec<FundamentalSummary> {
        self.models
            .fundamentals()
            .map(|model| model.evaluate(symbol, price))
            .collect()
    }

    fn entry_comparison(&self, symbol: &Symbol, price: Decimal) -> Vec<EntryPlan> {
        self.models
            .entries()
            .map(|model| model.plan(symbol, price))
            .collect()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::MockMarketDataPort;
    use crate::domain::metadata::CacheHistoryRecord;
    use crate::domain::report::{NewsSignal, SentimentDigest, TargetConsensus};
    use rust_decimal_macros::dec;
    use serde_json::Value;

    fn quiet_provider() -> MockMarketDataPort {
        let mut provider = MockMarketDataPort::new();
        provider.expect_name().return_const("mock");
        provider.expect_fetch_price().returning(|_| Ok(None));
        provider.expect_fetch_consensus().returning(|_| Ok(None));
        provider.expect_fetch_news().returning(|_| Ok(vec![]));
        provider
    }

    fn assembler(provider: MockMarketDataPort) -> ReportAssembler<MockMarketDataPort> {
        ReportAssembler::new(
            Arc::new(MetadataStore::with_global_refresh_interval(60_000)),
            Arc::new(ModelRegistry::with_defaults()),
            Arc::new(provider),
        )
    }

    fn history_len(assembler: &ReportAssembler<MockMarketDataPort>, symbol: &str, key: &str) -> usize {
        assembler
            .store()
            .get_history::<Value>(symbol, key)
            .unwrap()
            .len()
    }

    fn analyst_consensus() -> TargetConsensus {
        TargetConsensus {
            mean_target: dec!(250),
            high_target: dec!(300),
            low_target: dec!(200),
            analyst_count: 31,
            rating: "buy".to_string(),
            upside_pct: 0.0,
        }
    }

    #[test]
    fn fresh_build_leaves_cache_untouched() {
        let assembler = assembler(quiet_provider());
        let symbol = Symbol::new("AAPL");

        let report = assembler.build_report(&symbol, dec!(180), &ReportOptions::default());

        assert_eq!(report.mode, ReportMode::Fresh);
        assert_eq!(report.current_price, dec!(180));
        assert_eq!(report.fundamental_comparison.len(), 2);
        assert_eq!(report.entry_comparison.len(), 2);
        assert!(assembler.store().dump().tickers.is_empty());
    }

    #[test]
    fn cached_build_reuses_fresh_metrics() {
        let assembler = assembler(quiet_provider());
        let symbol = Symbol::new("MSFT");
        let options = ReportOptions::default();

        let first = assembler.build_report_cached(&symbol, dec!(300), &options, 1_000);
        // A different price inside the interval still returns the cached metrics.
        let second = assembler.build_report_cached(&symbol, dec!(330), &options, 1_500);

        assert_eq!(first.target_consensus, second.target_consensus);
        assert_eq!(first.fundamentals, second.fundamentals);
        assert_eq!(second.current_price, dec!(330));
        assert_eq!(history_len(&assembler, "MSFT", "target-consensus"), 1);
        assert_eq!(history_len(&assembler, "MSFT", "fundamental:dcf-core"), 1);
        assert_eq!(history_len(&assembler, "MSFT", "entry:momentum-breakout"), 1);
    }

    #[test]
    fn model_variants_use_independent_slots() {
        let assembler = assembler(quiet_provider());
        let symbol = Symbol::new("AAPL");

        let dcf = assembler.build_report_cached(
            &symbol,
            dec!(180),
            &ReportOptions::default().with_fundamental_model("dcf-core"),
            1_000,
        );
        let quality = assembler.build_report_cached(
            &symbol,
            dec!(180),
            &ReportOptions::default().with_fundamental_model("quality-factors"),
            1_100,
        );

        assert_eq!(dcf.fundamentals.model_id, "dcf-core");
        assert_eq!(quality.fundamentals.model_id, "quality-factors");
        assert_eq!(history_len(&assembler, "AAPL", "fundamental:dcf-core"), 1);
        assert_eq!(history_len(&assembler, "AAPL", "fundamental:quality-factors"), 1);
    }

    #[test]
    fn cached_value_wins_even_if_model_output_would_differ() {
        let assembler = assembler(quiet_provider());
        let symbol = Symbol::new("AAPL");
        let seeded = SentimentDigest {
            score: -0.9,
            label: "bearish".to_string(),
            signal_count: 3,
            headlines: vec![],
            sources: vec![],
        };
        assembler
            .store()
            .upsert("AAPL", "sentiment", seeded.clone(), 900)
            .unwrap();

        let report = assembler.build_report_cached(&symbol, dec!(180), &ReportOptions::default(), 1_000);

        assert_eq!(report.sentiment, seeded);
    }

    #[test]
    fn mismatched_fresh_slot_is_bypassed_not_overwritten() {
        let assembler = assembler(quiet_provider());
        let symbol = Symbol::new("AAPL");
        let options = ReportOptions::default();
        assembler
            .store()
            .upsert("AAPL", "sentiment", "garbled", 900)
            .unwrap();

        let report = assembler.build_report_cached(&symbol, dec!(180), &options, 1_000);
        let fresh = assembler.build_report(&symbol, dec!(180), &options);

        assert_eq!(report.sentiment, fresh.sentiment);
        assert_eq!(history_len(&assembler, "AAPL", "sentiment"), 1);
        let latest = assembler
            .store()
            .get_latest::<String>("AAPL", "sentiment")
            .unwrap()
            .unwrap();
        assert_eq!(latest.value, "garbled");
    }

    #[tokio::test]
    async fn live_price_is_used_exactly() {
        let mut provider = MockMarketDataPort::new();
        provider.expect_name().return_const("mock");
        provider
            .expect_fetch_price()
            .returning(|_| Ok(Some(dec!(222.22))));
        provider.expect_fetch_consensus().returning(|_| Ok(None));
        provider.expect_fetch_news().returning(|_| {
            Ok(vec![NewsSignal::new("wire", "Shares rally on strong demand", 0.8)])
        });
        let assembler = assembler(provider);

        let live = assembler
            .build_report_live(&Symbol::new("AAPL"), &ReportOptions::default(), 1_000)
            .await;

        assert_eq!(live.report.current_price, dec!(222.22));
        assert_eq!(live.report.mode, ReportMode::Live);
        assert!(live.warnings.is_empty());
        assert_eq!(live.report.sentiment.signal_count, 1);
        assert_eq!(live.report.sentiment.label, "bullish");
        assert_eq!(history_len(&assembler, "AAPL", "sentiment"), 1);
    }

    #[tokio::test]
    async fn live_consensus_written_when_due() {
        let mut provider = MockMarketDataPort::new();
        provider.expect_name().return_const("mock");
        provider.expect_fetch_price().returning(|_| Ok(Some(dec!(200))));
        provider
            .expect_fetch_consensus()
            .returning(|_| Ok(Some(analyst_consensus())));
        provider.expect_fetch_news().returning(|_| Ok(vec![]));
        let assembler = assembler(provider);

        let live = assembler
            .build_report_live(&Symbol::new("NVDA"), &ReportOptions::default(), 5_000)
            .await;

        assert_eq!(live.report.target_consensus.mean_target, dec!(250));
        assert_eq!(live.report.target_consensus.analyst_count, 31);
        assert!((live.report.target_consensus.upside_pct - 25.0).abs() < f64::EPSILON);

        let history: Vec<CacheHistoryRecord<TargetConsensus>> = assembler
            .store()
            .get_history("NVDA", "target-consensus")
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].computed_at, 5_000);
    }

    #[tokio::test]
    async fn fresh_cache_beats_live_value() {
        let mut provider = MockMarketDataPort::new();
        provider.expect_name().return_const("mock");
        provider.expect_fetch_price().returning(|_| Ok(Some(dec!(200))));
        provider
            .expect_fetch_consensus()
            .returning(|_| Ok(Some(analyst_consensus())));
        provider.expect_fetch_news().returning(|_| Ok(vec![]));
        let assembler = assembler(provider);
        let symbol = Symbol::new("NVDA");

        let cached = assembler.build_report_cached(&symbol, dec!(200), &ReportOptions::default(), 1_000);
        let live = assembler
            .build_report_live(&symbol, &ReportOptions::default(), 2_000)
            .await;

        assert_eq!(live.report.target_consensus, cached.target_consensus);
        assert_eq!(history_len(&assembler, "NVDA", "target-consensus"), 1);
    }

    #[tokio::test]
    async fn provider_failures_become_warnings() {
        let mut provider = MockMarketDataPort::new();
        provider.expect_name().return_const("mock");
        provider
            .expect_fetch_price()
            .returning(|_| Err(ProviderError::Network("connection refused".into())));
        provider
            .expect_fetch_consensus()
            .returning(|_| Err(ProviderError::Unavailable));
        provider.expect_fetch_news().returning(|_| {
            Err(ProviderError::Api {
                status: 503,
                message: "Service Unavailable".into(),
            })
        });
        let assembler = assembler(provider);
        let options = ReportOptions::default().with_fallback_price(dec!(150));

        let live = assembler
            .build_report_live(&Symbol::new("TSLA"), &options, 1_000)
            .await;

        assert_eq!(live.report.current_price, dec!(150));
        assert_eq!(live.warnings.len(), 4);
        assert!(live.warnings[0].contains("price lookup failed for TSLA"));
        assert!(live.warnings.iter().any(|w| w.contains("supplied price 150")));
        assert!(live.warnings.iter().any(|w| w.contains("503")));
        // Metrics still computed from the models.
        assert_eq!(history_len(&assembler, "TSLA", "target-consensus"), 1);
        assert_eq!(history_len(&assembler, "TSLA", "sentiment"), 1);
    }

    #[tokio::test]
    async fn missing_price_without_fallback_uses_synthetic() {
        let assembler = assembler(quiet_provider());
        let symbol = Symbol::new("GME");

        let live = assembler
            .build_report_live(&symbol, &ReportOptions::default(), 1_000)
            .await;

        assert_eq!(live.report.current_price, synthetic_price(&symbol));
        assert_eq!(live.warnings.len(), 1);
        assert!(live.warnings[0].contains("synthetic price"));
    }

    #[tokio::test]
    async fn unknown_model_ids_warn_and_fall_back() {
        let mut provider = MockMarketDataPort::new();
        provider.expect_name().return_const("mock");
        provider.expect_fetch_price().returning(|_| Ok(Some(dec!(90))));
        provider.expect_fetch_consensus().returning(|_| Ok(None));
        provider.expect_fetch_news().returning(|_| Ok(vec![]));
        let assembler = assembler(provider);
        let options = ReportOptions::default()
            .with_fundamental_model("graham")
            .with_entry_model("turtle");

        let live = assembler
            .build_report_live(&Symbol::new("AMD"), &options, 1_000)
            .await;

        assert_eq!(live.report.fundamentals.model_id, "dcf-core");
        assert_eq!(live.report.entry_plan.model_id, "momentum-breakout");
        assert_eq!(live.warnings.len(), 2);
        assert!(live.warnings[0].contains("'graham'"));
        assert!(live.warnings[1].contains("'turtle'"));
    }
}
